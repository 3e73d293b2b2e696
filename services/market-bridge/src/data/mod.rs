//! Market data layer.
//!
//! Providers fetch provider-shaped records, [`reshape`] maps them into the
//! stable output schema below, and [`MarketRouter`] applies the per-endpoint
//! routing and failure policy.
//!
//! # Data Sources
//! - **eastmoney / cls.cn** (CN): K-lines, bulk quotes, profiles, news
//! - **Yahoo Finance** (global): charts, quotes, profiles, news, screener
//! - **Static calendar**: economic events

mod eastmoney;
mod events;
mod provider;
pub mod reshape;
mod router;
mod yahoo;

pub use eastmoney::EastmoneyAdapter;
pub use events::StaticCalendar;
pub use provider::{
    ChartBar, ChartSeries, CnArticle, CnMarketProvider, CnProfile, EventSource, GlobalArticle,
    GlobalMarketProvider, GlobalProfile, InstrumentQuote, KlineFrequency, KlineRow,
    ProviderError, ScreenerQuery, ScreenerQuote, SpotRow, Telegraph,
};
pub use router::{MarketRouter, RouterConfig};
pub use yahoo::YahooAdapter;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

// ============================================================================
// Output Schema
// ============================================================================

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBar {
    /// `YYYY-MM-DD`
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bulk A-share quote row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuote {
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub change: Option<f64>,
    pub volume: Option<f64>,
    pub amount: Option<f64>,
    pub amplitude: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub total_market_cap: Option<f64>,
    pub float_market_cap: Option<f64>,
    pub five_min_change: Option<f64>,
    pub rise_speed: Option<f64>,
    pub sixty_day_change: Option<f64>,
    pub ytd_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub published_at: String,
    pub headline: String,
    pub url: String,
    pub summary: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndex {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub prev_close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorPerformance {
    /// Display name, translated for CN
    pub name: String,
    /// English sector key usable as a screener filter
    pub filter_key: String,
    /// Signed percentage, e.g. `+1.23%`
    pub change: String,
    pub is_up: bool,
    pub color: String,
}

/// Company profile. Text fields fall back to `"N/A"`, numerics to `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub currency: String,
    pub country: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: Option<f64>,
    pub description: String,
    pub website: String,
    pub ceo: String,
    pub employees: Option<i64>,
    pub founded: Option<i64>,
    pub ipo_date: Option<i64>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub average_volume: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub forward_eps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, local to the releasing country
    pub time: String,
    pub country: String,
    pub event: String,
    pub actual: String,
    pub forecast: String,
    /// `High`, `Medium` or `Low`
    pub impact: String,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a best-effort, list-shaped fetch.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// Upstream answered
    Ok(T),
    /// Upstream failed in a way the endpoint absorbs; rendered as empty
    Degraded { reason: String },
    /// The request itself was unusable
    Failed(BridgeError),
}

impl<T: Default> FetchOutcome<T> {
    /// Collapse into a response value, logging degradations.
    pub fn into_result(self, endpoint: &str) -> Result<T, BridgeError> {
        match self {
            Self::Ok(data) => Ok(data),
            Self::Degraded { reason } => {
                tracing::warn!(endpoint, reason = %reason, "Serving empty result");
                Ok(T::default())
            }
            Self::Failed(err) => Err(err),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

// ============================================================================
// Request Vocabulary
// ============================================================================

/// Trading-day count for a history period. Unknown periods get five years.
pub fn period_to_trading_days(period: &str) -> usize {
    match period.trim().to_ascii_lowercase().as_str() {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 22,
        "3mo" => 66,
        "6mo" => 125,
        "1y" | "ytd" => 250,
        "2y" => 500,
        "5y" => 1250,
        "10y" => 2500,
        "max" => 10_000,
        _ => 1250,
    }
}

/// Translate a request interval into the global provider's vocabulary.
pub fn global_interval(interval: &str) -> String {
    match interval {
        "1d" => "1d".into(),
        "1w" => "1wk".into(),
        "1m" => "1mo".into(),
        "1y" => "3mo".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1d", 1)]
    #[test_case("5d", 5)]
    #[test_case("1mo", 22)]
    #[test_case("3mo", 66)]
    #[test_case("6mo", 125)]
    #[test_case("1y", 250)]
    #[test_case("2y", 500)]
    #[test_case("5y", 1250)]
    #[test_case("10y", 2500)]
    #[test_case("ytd", 250)]
    #[test_case("max", 10_000)]
    #[test_case("forever", 1250 ; "unrecognized")]
    fn test_period_to_trading_days(period: &str, days: usize) {
        assert_eq!(period_to_trading_days(period), days);
    }

    #[test]
    fn test_global_interval_aliases() {
        assert_eq!(global_interval("1d"), "1d");
        assert_eq!(global_interval("1w"), "1wk");
        assert_eq!(global_interval("1m"), "1mo");
        assert_eq!(global_interval("1y"), "3mo");
        assert_eq!(global_interval("1h"), "1h");
    }

    #[test]
    fn test_profile_serializes_camel_case_with_nulls() {
        let profile = reshape::empty_profile("AAPL");
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["sector"], "N/A");
        assert!(value["trailingPE"].is_null());
        assert!(value["fiftyTwoWeekHigh"].is_null());
        assert!(value.get("ipoDate").is_some());
    }

    #[test]
    fn test_degraded_outcome_is_empty() {
        let outcome: FetchOutcome<Vec<NewsItem>> = FetchOutcome::Degraded {
            reason: "upstream down".into(),
        };
        assert!(outcome.is_degraded());
        assert!(outcome.into_result("news").unwrap().is_empty());
    }

    #[test]
    fn test_failed_outcome_is_error() {
        let outcome: FetchOutcome<Vec<EconomicEvent>> =
            FetchOutcome::Failed(BridgeError::InvalidRequest("bad impact".into()));
        assert!(outcome.into_result("events").is_err());
    }
}
