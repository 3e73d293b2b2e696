//! Provider abstractions for the two upstream market-data sources.
//!
//! Each provider returns its own record shapes. Nothing here is in the
//! output schema; [`super::reshape`] owns that mapping.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use thiserror::Error;

use super::EconomicEvent;
use crate::symbol::AShareCode;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised by a single provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection failed or the request could not be sent
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from upstream")]
    Http { status: u16 },

    /// Response body did not match the expected shape
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Upstream answered but carried no data
    #[error("No data: {0}")]
    Empty(String),

    /// Call exceeded the configured deadline
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Upstream reported an application-level error
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Empty(_) | Self::Upstream(_) => true,
            Self::Http { status } => *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// CN Provider Records
// ============================================================================

/// K-line frequency supported by the CN history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl KlineFrequency {
    /// Map a request interval onto a CN frequency. Unknown values are daily.
    pub fn from_interval(interval: &str) -> Self {
        match interval.trim().to_ascii_lowercase().as_str() {
            "1w" | "1wk" | "5d" => Self::Weekly,
            "1m" | "1mo" | "3mo" | "1y" => Self::Monthly,
            _ => Self::Daily,
        }
    }
}

/// One CN K-line row. A missing value is a `-` upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KlineRow {
    /// `YYYY-MM-DD`
    pub date: String,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

/// One row of the CN bulk quote list.
///
/// Field codes follow the eastmoney list API; a suspended ticker carries
/// `-` for most numerics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotRow {
    #[serde(rename = "f12", default)]
    pub code: String,
    #[serde(rename = "f14", default)]
    pub name: String,
    #[serde(rename = "f2", default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(rename = "f3", default, deserialize_with = "lenient_f64")]
    pub change_percent: Option<f64>,
    #[serde(rename = "f4", default, deserialize_with = "lenient_f64")]
    pub change: Option<f64>,
    #[serde(rename = "f5", default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    #[serde(rename = "f6", default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(rename = "f7", default, deserialize_with = "lenient_f64")]
    pub amplitude: Option<f64>,
    #[serde(rename = "f8", default, deserialize_with = "lenient_f64")]
    pub turnover_rate: Option<f64>,
    #[serde(rename = "f9", default, deserialize_with = "lenient_f64")]
    pub pe_dynamic: Option<f64>,
    #[serde(rename = "f10", default, deserialize_with = "lenient_f64")]
    pub volume_ratio: Option<f64>,
    #[serde(rename = "f11", default, deserialize_with = "lenient_f64")]
    pub five_min_change: Option<f64>,
    #[serde(rename = "f15", default, deserialize_with = "lenient_f64")]
    pub high: Option<f64>,
    #[serde(rename = "f16", default, deserialize_with = "lenient_f64")]
    pub low: Option<f64>,
    #[serde(rename = "f17", default, deserialize_with = "lenient_f64")]
    pub open: Option<f64>,
    #[serde(rename = "f18", default, deserialize_with = "lenient_f64")]
    pub prev_close: Option<f64>,
    #[serde(rename = "f20", default, deserialize_with = "lenient_f64")]
    pub total_market_cap: Option<f64>,
    #[serde(rename = "f21", default, deserialize_with = "lenient_f64")]
    pub float_market_cap: Option<f64>,
    #[serde(rename = "f22", default, deserialize_with = "lenient_f64")]
    pub rise_speed: Option<f64>,
    #[serde(rename = "f23", default, deserialize_with = "lenient_f64")]
    pub pb_ratio: Option<f64>,
    #[serde(rename = "f24", default, deserialize_with = "lenient_f64")]
    pub sixty_day_change: Option<f64>,
    #[serde(rename = "f25", default, deserialize_with = "lenient_f64")]
    pub ytd_change: Option<f64>,
}

/// Single-stock profile from the CN quote API.
#[derive(Debug, Clone, Default)]
pub struct CnProfile {
    pub code: String,
    pub name: Option<String>,
    pub industry: Option<String>,
    pub total_market_cap: Option<f64>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub pe_dynamic: Option<f64>,
    pub pb_ratio: Option<f64>,
    /// Listing date as `YYYYMMDD`
    pub listing_date: Option<i64>,
}

/// Per-stock news article from the CN search API.
#[derive(Debug, Clone, Default)]
pub struct CnArticle {
    /// `YYYY-MM-DD HH:MM:SS`
    pub published_at: String,
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Cailian Press telegraph entry.
#[derive(Debug, Clone, Default)]
pub struct Telegraph {
    pub title: String,
    pub content: String,
    /// Unix seconds
    pub ctime: i64,
}

// ============================================================================
// Global Provider Records
// ============================================================================

/// One chart bar, in provider units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartBar {
    /// Unix seconds
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Chart series with the exchange's UTC offset.
#[derive(Debug, Clone, Default)]
pub struct ChartSeries {
    pub symbol: String,
    /// Seconds east of UTC for the listing exchange
    pub gmt_offset: i64,
    pub bars: Vec<ChartBar>,
}

/// Latest-session quote for a single instrument.
#[derive(Debug, Clone, Default)]
pub struct InstrumentQuote {
    pub symbol: String,
    pub last_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<f64>,
}

/// Company profile as the global provider describes it.
#[derive(Debug, Clone, Default)]
pub struct GlobalProfile {
    pub symbol: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub business_summary: Option<String>,
    pub website: Option<String>,
    pub full_time_employees: Option<i64>,
    pub first_trade_epoch: Option<i64>,
    pub current_price: Option<f64>,
    pub regular_market_price: Option<f64>,
    pub regular_market_change: Option<f64>,
    pub regular_market_change_percent: Option<f64>,
    pub trailing_pe: Option<f64>,
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

/// News article from the global provider.
#[derive(Debug, Clone, Default)]
pub struct GlobalArticle {
    pub title: Option<String>,
    pub url: Option<String>,
    /// Pre-formatted publication date, when the provider sends one
    pub pub_date: Option<String>,
    /// Unix seconds, used when `pub_date` is absent
    pub publish_time: Option<i64>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
}

/// One screener hit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerQuote {
    #[serde(default)]
    pub symbol: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    pub long_business_summary: Option<String>,
    pub first_trade_date_milliseconds: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub regular_market_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub regular_market_change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub regular_market_change_percent: Option<f64>,
    #[serde(rename = "trailingPE", default, deserialize_with = "lenient_f64")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE", default, deserialize_with = "lenient_f64")]
    pub forward_pe: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_to_book: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dividend_yield: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub beta: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fifty_two_week_high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fifty_two_week_low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_daily_volume3_month: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub eps_trailing_twelve_months: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub eps_forward: Option<f64>,
}

/// Structured screener filter.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenerQuery {
    /// `field == value`
    Eq { field: String, value: String },
    /// All operands must match
    And(Vec<ScreenerQuery>),
}

impl ScreenerQuery {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Operator/operands tree as the screener API expects it.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq { field, value } => json!({
                "operator": "EQ",
                "operands": [field, value],
            }),
            Self::And(operands) => json!({
                "operator": "AND",
                "operands": operands.iter().map(Self::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Chinese A-share data source.
#[async_trait]
pub trait CnMarketProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Forward-adjusted K-lines, at most `limit` rows ending today.
    async fn klines(
        &self,
        code: &AShareCode,
        frequency: KlineFrequency,
        limit: usize,
    ) -> Result<Vec<KlineRow>, ProviderError>;

    /// Quote rows for every listed A-share.
    async fn spot_quotes(&self) -> Result<Vec<SpotRow>, ProviderError>;

    /// Company profile for one ticker.
    async fn profile(&self, code: &AShareCode) -> Result<CnProfile, ProviderError>;

    /// Recent news for one ticker.
    async fn stock_news(&self, code: &AShareCode) -> Result<Vec<CnArticle>, ProviderError>;

    /// Market-wide telegraph feed.
    async fn telegraph(&self) -> Result<Vec<Telegraph>, ProviderError>;
}

/// Global / US equities data source. Symbols are in vendor form.
#[async_trait]
pub trait GlobalMarketProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// OHLCV series for a period (`5y`, `ytd`, ...) and interval (`1d`, `1wk`, ...).
    async fn chart(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<ChartSeries, ProviderError>;

    /// Latest-session quote.
    async fn quote(&self, symbol: &str) -> Result<InstrumentQuote, ProviderError>;

    /// Company profile.
    async fn profile(&self, symbol: &str) -> Result<GlobalProfile, ProviderError>;

    /// Recent news for one ticker.
    async fn news(&self, symbol: &str) -> Result<Vec<GlobalArticle>, ProviderError>;

    /// Run a screener query sorted by descending intraday market cap.
    async fn screen(
        &self,
        query: &ScreenerQuery,
        size: usize,
    ) -> Result<Vec<ScreenerQuote>, ProviderError>;
}

/// Economic calendar source.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn events(&self) -> Result<Vec<EconomicEvent>, ProviderError>;
}

// ============================================================================
// Helpers
// ============================================================================

/// Accept a number, a numeric string, or a placeholder (`-`, `""`, `null`).
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

/// Numeric view of a JSON value; placeholders become `None`.
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("raw").and_then(value_as_f64),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

// ============================================================================
// Tests
// ============================================================================
