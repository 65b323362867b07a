//! Raw upstream payloads and the schema used to read them.
//!
//! Upstream responses are dynamically shaped JSON. They are captured as a
//! [`RawPayload`] tagged union as soon as they arrive so that the validator
//! can handle every shape exhaustively instead of probing attributes.

use serde_json::{Map, Value};

/// A fetched response body, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Empty body or JSON `null`.
    Missing,
    /// Body is not JSON at all.
    Malformed { reason: String },
    /// A JSON object, the only shape that can carry metrics.
    Object(Map<String, Value>),
    /// Valid JSON of any other type.
    Unexpected { json_type: &'static str },
}

impl RawPayload {
    pub fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::Missing;
        }

        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::from_value(value),
            Err(error) => Self::Malformed {
                reason: error.to_string(),
            },
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Object(map) => Self::Object(map),
            Value::Bool(_) => Self::Unexpected { json_type: "boolean" },
            Value::Number(_) => Self::Unexpected { json_type: "number" },
            Value::String(_) => Self::Unexpected { json_type: "string" },
            Value::Array(_) => Self::Unexpected { json_type: "array" },
        }
    }

    /// Short shape label used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed { .. } => "malformed",
            Self::Object(_) => "object",
            Self::Unexpected { json_type } => json_type,
        }
    }
}

/// Target type of a metric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Finite decimal number, given either as a JSON number or a numeric string.
    Number,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    Date,
}

/// Maps an upstream payload key to a canonical metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub metric: &'static str,
    pub kind: FieldKind,
}

const fn number(key: &'static str, metric: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        metric,
        kind: FieldKind::Number,
    }
}

const fn date(key: &'static str, metric: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        metric,
        kind: FieldKind::Date,
    }
}

/// Values upstream APIs use to mean "no value". Compared case-insensitively
/// after trimming.
pub const EMPTY_SENTINELS: &[&str] = &["", "none", "-", "n/a", "na", "null", "nan"];

const OVERVIEW_FIELDS: &[FieldSpec] = &[
    number("MarketCapitalization", "market_cap"),
    number("EBITDA", "ebitda"),
    number("PERatio", "pe_ratio"),
    number("PEGRatio", "peg_ratio"),
    number("BookValue", "book_value"),
    number("DividendPerShare", "dividend_per_share"),
    number("DividendYield", "dividend_yield"),
    number("EPS", "eps"),
    number("RevenuePerShareTTM", "revenue_per_share_ttm"),
    number("ProfitMargin", "profit_margin"),
    number("OperatingMarginTTM", "operating_margin_ttm"),
    number("ReturnOnAssetsTTM", "return_on_assets_ttm"),
    number("ReturnOnEquityTTM", "return_on_equity_ttm"),
    number("RevenueTTM", "revenue_ttm"),
    number("GrossProfitTTM", "gross_profit_ttm"),
    number("QuarterlyEarningsGrowthYOY", "quarterly_earnings_growth_yoy"),
    number("QuarterlyRevenueGrowthYOY", "quarterly_revenue_growth_yoy"),
    number("AnalystTargetPrice", "analyst_target_price"),
    number("TrailingPE", "trailing_pe"),
    number("ForwardPE", "forward_pe"),
    number("PriceToSalesRatioTTM", "price_to_sales_ttm"),
    number("PriceToBookRatio", "price_to_book"),
    number("Beta", "beta"),
    number("52WeekHigh", "week52_high"),
    number("52WeekLow", "week52_low"),
    number("50DayMovingAverage", "moving_average_50d"),
    number("200DayMovingAverage", "moving_average_200d"),
    number("SharesOutstanding", "shares_outstanding"),
    date("LatestQuarter", "latest_quarter"),
    date("DividendDate", "dividend_date"),
    date("ExDividendDate", "ex_dividend_date"),
];

/// Where the identity lives in a payload and which fields carry metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSchema {
    pub identity_key: &'static str,
    pub fields: &'static [FieldSpec],
}

impl PayloadSchema {
    /// Alpha Vantage `OVERVIEW` (company fundamentals) response.
    pub const fn company_overview() -> Self {
        Self {
            identity_key: "Symbol",
            fields: OVERVIEW_FIELDS,
        }
    }
}

impl Default for PayloadSchema {
    fn default() -> Self {
        Self::company_overview()
    }
}

/// True when `value` is one of the recognized "no value" markers.
pub fn is_empty_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => {
            let normalized = text.trim().to_ascii_lowercase();
            EMPTY_SENTINELS.contains(&normalized.as_str())
        }
        _ => false,
    }
}
