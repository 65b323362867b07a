//! Report rendering. Reports go to stdout, logs to stderr.

use std::fmt::Write as _;
use std::io::Write;

use fundflow_core::{render_text, RunReport};
use fundflow_warehouse::RetryTrendRow;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::CommandOutput;
use crate::error::CliError;

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let rendered = render_to_string(output, format, pretty)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    if !rendered.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

fn render_to_string(
    output: &CommandOutput,
    format: OutputFormat,
    pretty: bool,
) -> Result<String, CliError> {
    match (output, format) {
        (CommandOutput::Run { summary, .. }, OutputFormat::Table) => Ok(render_text(summary)),
        (CommandOutput::Run { summary, .. }, OutputFormat::Json) => {
            to_json(&RunReport::from(summary), pretty)
        }
        (CommandOutput::History(rows), OutputFormat::Table) => Ok(history_table(rows)),
        (CommandOutput::History(rows), OutputFormat::Json) => to_json(rows, pretty),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn history_table(rows: &[RetryTrendRow]) -> String {
    if rows.is_empty() {
        return String::from("no runs recorded");
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36}  {:<20}  {:>8} {:>9} {:>6} {:>13} {:>7} {:>9}",
        "RUN", "STARTED", "ENTITIES", "SUCCEEDED", "FAILED", "NOT_ATTEMPTED", "RETRIES", "RECOVERED"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<36}  {:<20}  {:>8} {:>9} {:>6} {:>13} {:>7} {:>9}",
            row.run_id,
            row.started_at,
            row.entity_count,
            row.succeeded,
            row.failed,
            row.not_attempted,
            row.total_retry_attempts,
            row.recovered_via_retry
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend_row() -> RetryTrendRow {
        RetryTrendRow {
            run_id: String::from("5f0c7c1e-2a57-4a55-9f39-0d6d8d1f4b11"),
            started_at: String::from("2024-04-02T10:00:00Z"),
            entity_count: 3,
            succeeded: 2,
            failed: 1,
            not_attempted: 0,
            total_retry_attempts: 4,
            recovered_via_retry: 1,
        }
    }

    #[test]
    fn history_table_has_one_line_per_run() {
        let text = render_to_string(
            &CommandOutput::History(vec![trend_row()]),
            OutputFormat::Table,
            false,
        )
        .expect("render");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("RUN"));
        assert!(lines[1].contains("2024-04-02T10:00:00Z"));
    }

    #[test]
    fn empty_history_says_so() {
        let text = render_to_string(&CommandOutput::History(Vec::new()), OutputFormat::Table, false)
            .expect("render");
        assert_eq!(text, "no runs recorded");
    }

    #[test]
    fn history_json_is_an_array() {
        let text = render_to_string(
            &CommandOutput::History(vec![trend_row()]),
            OutputFormat::Json,
            false,
        )
        .expect("render");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value[0]["total_retry_attempts"], 4);
    }
}
