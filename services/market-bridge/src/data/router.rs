//! Request router for the bridge endpoints.
//!
//! Normalizes the ticker, picks the provider from its classification, wraps
//! every upstream call in a deadline and applies the endpoint's failure
//! policy. The bulk snapshot is the only call that is retried.

use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use bridge_common::MarketConfig;

use super::provider::{
    CnMarketProvider, EventSource, GlobalMarketProvider, KlineFrequency, ProviderError,
    ScreenerQuery,
};
use super::reshape::{self, SECTORS};
use super::{
    global_interval, period_to_trading_days, CompanyProfile, EconomicEvent, FetchOutcome,
    HistoryBar, MarketIndex, NewsItem, SectorPerformance, SnapshotQuote,
};
use crate::error::BridgeError;
use crate::names::SymbolNameMap;
use crate::symbol::{to_vendor_form, AShareCode, Region};

/// Ticker used for US news when none is given.
const DEFAULT_NEWS_TICKER: &str = "SPY";

/// Impact levels accepted by the events filter.
const IMPACT_LEVELS: &[&str] = &["high", "medium", "low"];

// ============================================================================
// Router Configuration
// ============================================================================

/// Configuration for the market router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Deadline for every upstream call
    pub upstream_timeout: Duration,
    /// Total snapshot attempts, including the first
    pub snapshot_attempts: u32,
    /// Fixed sleep between snapshot attempts
    pub snapshot_backoff: Duration,
    /// Screener page size
    pub screener_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(15),
            snapshot_attempts: 3,
            snapshot_backoff: Duration::from_secs(1),
            screener_size: 100,
        }
    }
}

impl From<&MarketConfig> for RouterConfig {
    fn from(config: &MarketConfig) -> Self {
        Self {
            upstream_timeout: Duration::from_secs(config.upstream_timeout_secs),
            snapshot_attempts: config.snapshot_retry.max_attempts,
            snapshot_backoff: Duration::from_millis(config.snapshot_retry.backoff_ms),
            ..Self::default()
        }
    }
}

// ============================================================================
// Market Router
// ============================================================================

/// Routes endpoint requests to the CN or global provider.
pub struct MarketRouter {
    cn: Arc<dyn CnMarketProvider>,
    global: Arc<dyn GlobalMarketProvider>,
    events: Arc<dyn EventSource>,
    names: Arc<SymbolNameMap>,
    config: RouterConfig,
}

impl MarketRouter {
    /// Create a router with default configuration
    pub fn new(
        cn: Arc<dyn CnMarketProvider>,
        global: Arc<dyn GlobalMarketProvider>,
        events: Arc<dyn EventSource>,
        names: Arc<SymbolNameMap>,
    ) -> Self {
        Self::with_config(cn, global, events, names, RouterConfig::default())
    }

    pub fn with_config(
        cn: Arc<dyn CnMarketProvider>,
        global: Arc<dyn GlobalMarketProvider>,
        events: Arc<dyn EventSource>,
        names: Arc<SymbolNameMap>,
        config: RouterConfig,
    ) -> Self {
        info!(
            cn = cn.name(),
            global = global.name(),
            events = events.name(),
            names = names.len(),
            timeout_secs = config.upstream_timeout.as_secs(),
            "Market router ready"
        );

        Self {
            cn,
            global,
            events,
            names,
            config,
        }
    }

    pub fn names(&self) -> &SymbolNameMap {
        &self.names
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Run one upstream call under the configured deadline.
    async fn call<T, F>(
        &self,
        provider: &'static str,
        operation: &'static str,
        fut: F,
    ) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let started = Instant::now();
        match tokio::time::timeout(self.config.upstream_timeout, fut).await {
            Ok(result) => {
                debug!(
                    provider,
                    operation,
                    ok = result.is_ok(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upstream call finished"
                );
                result
            }
            Err(_) => {
                let secs = self.config.upstream_timeout.as_secs();
                warn!(provider, operation, timeout_secs = secs, "Upstream call timed out");
                Err(ProviderError::Timeout(secs))
            }
        }
    }

    // ========================================================================
    // History
    // ========================================================================

    /// OHLCV history. A-share tickers go to the CN provider, everything else
    /// to the global provider.
    pub async fn history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<HistoryBar>, BridgeError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(BridgeError::InvalidRequest("symbol is required".into()));
        }

        let result = match AShareCode::parse(symbol) {
            Some(code) => {
                let frequency = KlineFrequency::from_interval(interval);
                let limit = bar_limit(frequency, period_to_trading_days(period));
                debug!(symbol = %code, ?frequency, limit, "Routing history to CN provider");

                self.call(self.cn.name(), "klines", self.cn.klines(&code, frequency, limit))
                    .await
                    .map(reshape::history_from_klines)
            }
            None => {
                let vendor = to_vendor_form(symbol);
                let interval = global_interval(interval);
                debug!(symbol = %vendor, period, interval = %interval, "Routing history to global provider");

                self.call(
                    self.global.name(),
                    "chart",
                    self.global.chart(&vendor, period, &interval),
                )
                .await
                .map(|series| reshape::history_from_chart(&series))
            }
        };

        match result {
            Ok(bars) => Ok(bars),
            Err(ProviderError::Empty(reason)) => {
                debug!(symbol, reason = %reason, "History is empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Every A-share quote, retried with a fixed backoff.
    pub async fn snapshot(&self) -> Result<Vec<SnapshotQuote>, BridgeError> {
        let attempts = self.config.snapshot_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.call(self.cn.name(), "spot_quotes", self.cn.spot_quotes()).await {
                Ok(rows) => {
                    info!(rows = rows.len(), attempt, "Fetched A-share snapshot");
                    return Ok(rows.into_iter().map(reshape::snapshot_row).collect());
                }
                Err(e) if attempt < attempts && e.is_transient() => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Snapshot fetch failed, retrying"
                    );
                    tokio::time::sleep(self.config.snapshot_backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Snapshot fetch failed, giving up");
                    return Err(match e {
                        ProviderError::Timeout(_) => e.into(),
                        other => BridgeError::Upstream(format!(
                            "Failed to fetch market data: {}",
                            other
                        )),
                    });
                }
            }
        }
    }

    // ========================================================================
    // Company Profile
    // ========================================================================

    /// Company profile; any failure is reported as not found.
    pub async fn info(&self, symbol: &str) -> Result<CompanyProfile, BridgeError> {
        let result = match AShareCode::parse(symbol) {
            Some(code) => self
                .call(self.cn.name(), "profile", self.cn.profile(&code))
                .await
                .map(|profile| reshape::profile_from_cn(&code, profile)),
            None => {
                let vendor = to_vendor_form(symbol);
                self.call(self.global.name(), "profile", self.global.profile(&vendor))
                    .await
                    .map(|profile| reshape::profile_from_global(&vendor, profile))
            }
        };

        let mut profile = result
            .map_err(|e| BridgeError::NotFound(format!("Stock info not found: {}", e)))?;

        if let Some(name) = self.names.lookup(symbol) {
            profile.name = name.to_string();
        }
        Ok(profile)
    }

    // ========================================================================
    // News
    // ========================================================================

    /// Recent news for a region, optionally for one ticker.
    pub async fn news(&self, symbol: Option<&str>, region: &Region) -> FetchOutcome<Vec<NewsItem>> {
        let symbol = symbol.map(str::trim).filter(|s| !s.is_empty());

        let result = match (region, symbol) {
            (Region::Cn, Some(symbol)) => {
                let Some(code) = AShareCode::parse(symbol) else {
                    return FetchOutcome::Degraded {
                        reason: format!("{} is not an A-share ticker", symbol),
                    };
                };
                self.call(self.cn.name(), "stock_news", self.cn.stock_news(&code))
                    .await
                    .map(reshape::news_from_articles)
            }
            (Region::Cn, None) => self
                .call(self.cn.name(), "telegraph", self.cn.telegraph())
                .await
                .map(reshape::news_from_telegraph),
            (Region::Us, symbol) => {
                let target = symbol
                    .map(to_vendor_form)
                    .unwrap_or_else(|| DEFAULT_NEWS_TICKER.to_string());
                self.call(self.global.name(), "news", self.global.news(&target))
                    .await
                    .map(reshape::news_from_global)
            }
            (Region::Other(code), _) => {
                debug!(region = %code, "No news source for region");
                return FetchOutcome::Ok(Vec::new());
            }
        };

        match result {
            Ok(items) => FetchOutcome::Ok(items),
            Err(e) => FetchOutcome::Degraded {
                reason: e.to_string(),
            },
        }
    }

    // ========================================================================
    // Markets & Sectors
    // ========================================================================

    /// Benchmark index table for a region; failing items are omitted.
    pub async fn markets(&self, region: &Region) -> FetchOutcome<Vec<MarketIndex>> {
        let table = reshape::index_table(region);
        let quotes = join_all(
            table
                .iter()
                .map(|(symbol, _)| self.call(self.global.name(), "quote", self.global.quote(symbol))),
        )
        .await;

        let mut failures = 0;
        let items: Vec<MarketIndex> = table
            .iter()
            .zip(quotes)
            .filter_map(|((symbol, name), result)| match result {
                Ok(quote) => {
                    let item = reshape::market_index(symbol, name, region, &quote);
                    if item.is_none() {
                        debug!(symbol, "Index quote lacks price or previous close, omitting");
                    }
                    item
                }
                Err(e) => {
                    failures += 1;
                    warn!(symbol, error = %e, "Index quote failed, omitting");
                    None
                }
            })
            .collect();

        if failures == table.len() {
            return FetchOutcome::Degraded {
                reason: format!("all {} index quotes failed", failures),
            };
        }
        FetchOutcome::Ok(items)
    }

    /// Sector ETF performance for a region; failing items are omitted.
    pub async fn sectors(&self, region: &Region) -> FetchOutcome<Vec<SectorPerformance>> {
        let symbols: Vec<String> = SECTORS
            .iter()
            .map(|proxy| to_vendor_form(proxy.etf_for(region)))
            .collect();
        let quotes = join_all(
            symbols
                .iter()
                .map(|symbol| self.call(self.global.name(), "quote", self.global.quote(symbol))),
        )
        .await;

        let mut failures = 0;
        let items: Vec<SectorPerformance> = SECTORS
            .iter()
            .zip(symbols.iter())
            .zip(quotes)
            .filter_map(|((proxy, symbol), result)| match result {
                Ok(quote) => reshape::sector_performance(proxy, region, &quote),
                Err(e) => {
                    failures += 1;
                    warn!(symbol = %symbol, sector = proxy.key, error = %e, "Sector quote failed, omitting");
                    None
                }
            })
            .collect();

        if failures == SECTORS.len() {
            return FetchOutcome::Degraded {
                reason: format!("all {} sector quotes failed", failures),
            };
        }
        FetchOutcome::Ok(items)
    }

    // ========================================================================
    // Screener
    // ========================================================================

    /// Largest equities matching a sector and region.
    pub async fn screener(
        &self,
        sector: &str,
        region: &Region,
    ) -> Result<Vec<CompanyProfile>, BridgeError> {
        let query = screener_query(sector, region);
        // Only a sector that actually filtered the query may label its hits.
        let fallback_sector = reshape::recognized_sector(sector).unwrap_or(reshape::NOT_AVAILABLE);

        let quotes = self
            .call(
                self.global.name(),
                "screen",
                self.global.screen(&query, self.config.screener_size),
            )
            .await
            .map_err(|e| match e {
                ProviderError::Timeout(_) => BridgeError::from(e),
                other => BridgeError::Upstream(format!("Screener error: {}", other)),
            })?;

        let mut profiles: Vec<CompanyProfile> = quotes
            .into_iter()
            .filter_map(|quote| reshape::profile_from_screener(quote, fallback_sector))
            .collect();
        profiles.sort_by(|a, b| by_market_cap_desc(a.market_cap, b.market_cap));
        profiles.truncate(self.config.screener_size);

        if region.is_cn() {
            for profile in &mut profiles {
                if let Some(name) = self.names.lookup(&profile.symbol) {
                    profile.name = name.to_string();
                }
            }
        }

        debug!(sector = fallback_sector, region = %region, hits = profiles.len(), "Screener finished");
        Ok(profiles)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Economic calendar, optionally filtered by impact level.
    pub async fn events(&self, impact: Option<&str>) -> FetchOutcome<Vec<EconomicEvent>> {
        let filter = match impact.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(level) if level.eq_ignore_ascii_case("all") => None,
            Some(level) if IMPACT_LEVELS.iter().any(|l| level.eq_ignore_ascii_case(l)) => {
                Some(level.to_ascii_lowercase())
            }
            Some(level) => {
                return FetchOutcome::Failed(BridgeError::InvalidRequest(format!(
                    "unknown impact level '{}', expected one of all, high, medium, low",
                    level
                )))
            }
        };

        match self.call(self.events.name(), "events", self.events.events()).await {
            Ok(events) => FetchOutcome::Ok(match filter {
                Some(level) => events
                    .into_iter()
                    .filter(|e| e.impact.eq_ignore_ascii_case(&level))
                    .collect(),
                None => events,
            }),
            Err(e) => FetchOutcome::Degraded {
                reason: e.to_string(),
            },
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Bars needed to cover `trading_days` at a given frequency.
pub fn bar_limit(frequency: KlineFrequency, trading_days: usize) -> usize {
    let bars = match frequency {
        KlineFrequency::Daily => trading_days,
        KlineFrequency::Weekly => trading_days / 5,
        KlineFrequency::Monthly => trading_days / 22,
    };
    bars.max(1)
}

/// `AND(sector == S, region == R)`; semiconductors filter on industry and an
/// empty or unknown sector leaves only the region filter.
pub fn screener_query(sector: &str, region: &Region) -> ScreenerQuery {
    let region_filter = ScreenerQuery::eq("region", region.code());
    match reshape::recognized_sector(sector) {
        Some("Semiconductors") => ScreenerQuery::And(vec![
            ScreenerQuery::eq("industry", "Semiconductors"),
            region_filter,
        ]),
        Some(key) => ScreenerQuery::And(vec![ScreenerQuery::eq("sector", key), region_filter]),
        None => region_filter,
    }
}

/// Larger capitalization first; missing values sort last.
fn by_market_cap_desc(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_common::RetryConfig;

    #[test]
    fn test_router_config_from_market_config() {
        let market = MarketConfig {
            upstream_timeout_secs: 7,
            snapshot_retry: RetryConfig {
                max_attempts: 5,
                backoff_ms: 250,
            },
            ..MarketConfig::default()
        };
        let config = RouterConfig::from(&market);
        assert_eq!(config.upstream_timeout, Duration::from_secs(7));
        assert_eq!(config.snapshot_attempts, 5);
        assert_eq!(config.snapshot_backoff, Duration::from_millis(250));
        assert_eq!(config.screener_size, 100);
    }

    #[test]
    fn test_bar_limit() {
        assert_eq!(bar_limit(KlineFrequency::Daily, 1250), 1250);
        assert_eq!(bar_limit(KlineFrequency::Weekly, 1250), 250);
        assert_eq!(bar_limit(KlineFrequency::Monthly, 250), 11);
        assert_eq!(bar_limit(KlineFrequency::Monthly, 1), 1);
    }

    #[test]
    fn test_screener_query_sector_and_region() {
        let query = screener_query("technology", &Region::Us);
        assert_eq!(
            query,
            ScreenerQuery::And(vec![
                ScreenerQuery::eq("sector", "Technology"),
                ScreenerQuery::eq("region", "us"),
            ])
        );
    }

    #[test]
    fn test_screener_query_semiconductors_uses_industry() {
        let query = screener_query("Semiconductors", &Region::Cn);
        assert_eq!(
            query,
            ScreenerQuery::And(vec![
                ScreenerQuery::eq("industry", "Semiconductors"),
                ScreenerQuery::eq("region", "cn"),
            ])
        );
    }

    #[test]
    fn test_market_cap_order_puts_missing_last() {
        let mut caps = vec![Some(1.0), None, Some(3.0), Some(2.0), None];
        caps.sort_by(|a, b| by_market_cap_desc(*a, *b));
        assert_eq!(caps, vec![Some(3.0), Some(2.0), Some(1.0), None, None]);
    }

    #[test]
    fn test_screener_query_region_only() {
        assert_eq!(screener_query("", &Region::Us), ScreenerQuery::eq("region", "us"));
        assert_eq!(
            screener_query("crypto", &Region::parse("HK")),
            ScreenerQuery::eq("region", "hk")
        );
    }
}
