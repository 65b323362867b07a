//! [`MetricsSource`](crate::MetricsSource) implementations.

mod alphavantage;
mod fixture;

pub use alphavantage::AlphaVantageOverviewSource;
pub use fixture::FixtureSource;
