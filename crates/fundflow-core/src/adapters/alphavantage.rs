use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, ReqwestHttpClient};
use crate::payload::RawPayload;
use crate::source::{BoxFuture, FetchError, MetricsSource};
use crate::throttling::RateGate;
use crate::{ConfigError, EntityId};

/// Keys Alpha Vantage uses for notices. These arrive with HTTP 200 and replace
/// the payload.
const NOTICE_KEYS: &[&str] = &["Note", "Information"];

/// Wording that marks a notice as call-frequency throttling. Other notices
/// (invalid key, premium endpoint) are permanent.
const THROTTLE_MARKERS: &[&str] = &[
    "rate limit",
    "call frequency",
    "calls per",
    "requests per",
    "per minute",
    "per second",
    "per day",
];

/// Company fundamentals from the Alpha Vantage `OVERVIEW` function.
pub struct AlphaVantageOverviewSource {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
    gate: RateGate,
}

impl AlphaVantageOverviewSource {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        gate: RateGate,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout_ms: crate::config::DEFAULT_REQUEST_TIMEOUT_MS,
            gate,
        }
    }

    /// Reqwest-backed source using the configured key, endpoint, timeout and quota.
    pub fn from_config(config: &IngestConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(
            Arc::new(ReqwestHttpClient::new()),
            api_key,
            config.alphavantage_base_url.clone(),
            RateGate::new(config.rate_limit),
        )
        .with_timeout_ms(config.request_timeout_ms))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn overview_url(&self, entity_id: &EntityId) -> String {
        format!(
            "{}/query?function=OVERVIEW&symbol={}&apikey={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(entity_id.as_str()),
            urlencoding::encode(&self.api_key)
        )
    }

    async fn fetch_overview(&self, entity_id: &EntityId) -> Result<RawPayload, FetchError> {
        if !self.gate.try_acquire() {
            let limit = self.gate.limit();
            debug!(
                quota = limit.quota_limit,
                window_secs = limit.quota_window.as_secs(),
                "rate gate saturated, waiting for a token"
            );
            self.gate.wait().await;
        }

        let request = HttpRequest::get(self.overview_url(entity_id)).with_timeout_ms(self.timeout_ms);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| transport_error(&error))?;

        if !response.is_success() {
            return Err(FetchError::status(
                response.status,
                format!("alphavantage upstream returned status {}", response.status),
            ));
        }

        let payload = RawPayload::from_body(&response.body);
        if let RawPayload::Object(object) = &payload {
            if let Some(notice) = notice(object) {
                if is_throttle_notice(notice) {
                    return Err(FetchError::rate_limited(format!(
                        "alphavantage throttling notice: {notice}"
                    )));
                }
                warn!(
                    entity = %entity_id,
                    notice,
                    "alphavantage returned a notice instead of data"
                );
            }
        }

        debug!(shape = payload.shape(), bytes = response.body.len(), "overview fetched");
        Ok(payload)
    }
}

impl MetricsSource for AlphaVantageOverviewSource {
    fn source_name(&self) -> &'static str {
        "alphavantage"
    }

    fn fetch_entity_metrics<'a>(
        &'a self,
        entity_id: &'a EntityId,
    ) -> BoxFuture<'a, Result<RawPayload, FetchError>> {
        Box::pin(self.fetch_overview(entity_id))
    }
}

/// A notice is an object holding only notice keys.
fn notice(object: &Map<String, Value>) -> Option<&str> {
    if object.len() > NOTICE_KEYS.len() {
        return None;
    }
    NOTICE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
}

fn is_throttle_notice(notice: &str) -> bool {
    let lowered = notice.to_ascii_lowercase();
    THROTTLE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn transport_error(error: &HttpError) -> FetchError {
    let message = format!("alphavantage transport error: {}", error.message());
    match error.kind() {
        HttpErrorKind::Timeout => FetchError::timeout(message),
        HttpErrorKind::Connect => FetchError::connect(message),
        HttpErrorKind::Body | HttpErrorKind::Other => FetchError::other(message),
    }
}
