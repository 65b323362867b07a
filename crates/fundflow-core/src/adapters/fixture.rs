use serde_json::{json, Map, Value};

use crate::payload::RawPayload;
use crate::source::{BoxFuture, FetchError, MetricsSource};
use crate::EntityId;

/// Offline source producing deterministic overview payloads seeded by the symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureSource;

impl FixtureSource {
    pub fn overview_for(entity_id: &EntityId) -> Value {
        let seed = symbol_seed(entity_id);
        let mut object = Map::new();
        object.insert(String::from("Symbol"), json!(entity_id.as_str()));
        object.insert(String::from("AssetType"), json!("Common Stock"));

        let market_cap = 4_000_000_000_u64 + (seed % 280_000) * 1_000_000;
        let pe_ratio = 12.0 + (seed % 220) as f64 / 10.0;
        let eps = 1.5 + (seed % 90) as f64 / 10.0;
        let beta = 0.6 + (seed % 120) as f64 / 100.0;
        let high = 80.0 + (seed % 300) as f64;

        insert_str(&mut object, "MarketCapitalization", market_cap.to_string());
        insert_str(&mut object, "PERatio", format!("{pe_ratio:.2}"));
        insert_str(&mut object, "EPS", format!("{eps:.2}"));
        insert_str(&mut object, "Beta", format!("{beta:.3}"));
        insert_str(&mut object, "52WeekHigh", format!("{high:.2}"));
        insert_str(&mut object, "52WeekLow", format!("{:.2}", high * 0.62));
        insert_str(&mut object, "SharesOutstanding", (market_cap / 150).to_string());
        insert_str(&mut object, "LatestQuarter", String::from("2024-03-31"));

        // Non-payers report sentinels, the way the live API does.
        if seed % 3 == 0 {
            insert_str(&mut object, "DividendYield", String::from("None"));
            insert_str(&mut object, "DividendPerShare", String::from("0"));
            insert_str(&mut object, "ExDividendDate", String::from("None"));
        } else {
            let yield_ratio = 0.003 + (seed % 55) as f64 / 10_000.0;
            insert_str(&mut object, "DividendYield", format!("{yield_ratio:.4}"));
            insert_str(
                &mut object,
                "DividendPerShare",
                format!("{:.2}", yield_ratio * high),
            );
            insert_str(&mut object, "ExDividendDate", String::from("2024-02-09"));
        }

        Value::Object(object)
    }
}

impl MetricsSource for FixtureSource {
    fn source_name(&self) -> &'static str {
        "fixture"
    }

    fn fetch_entity_metrics<'a>(
        &'a self,
        entity_id: &'a EntityId,
    ) -> BoxFuture<'a, Result<RawPayload, FetchError>> {
        let payload = RawPayload::from_value(Self::overview_for(entity_id));
        Box::pin(async move { Ok(payload) })
    }
}

fn insert_str(object: &mut Map<String, Value>, key: &str, value: String) {
    object.insert(key.to_owned(), Value::String(value));
}

fn symbol_seed(entity_id: &EntityId) -> u64 {
    entity_id.as_str().bytes().fold(11_u64, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(u64::from(byte))
    })
}
