//! Mock providers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use market_bridge::data::{
    ChartBar, ChartSeries, CnArticle, CnMarketProvider, CnProfile, EconomicEvent, EventSource,
    GlobalArticle, GlobalMarketProvider, GlobalProfile, InstrumentQuote, KlineFrequency, KlineRow,
    MarketRouter, ProviderError, RouterConfig, ScreenerQuery, ScreenerQuote, SpotRow, Telegraph,
};
use market_bridge::names::SymbolNameMap;
use market_bridge::symbol::AShareCode;

// ============================================================================
// CN Provider
// ============================================================================

/// CN provider that counts calls and can fail a set number of snapshots.
#[derive(Default)]
pub struct MockCn {
    pub spot_failures_remaining: AtomicU32,
    pub spot_calls: AtomicU32,
    pub kline_calls: AtomicU32,
    pub last_kline_limit: AtomicUsize,
    pub profile_calls: AtomicU32,
    pub fail_feeds: bool,
    pub fail_profile: bool,
}

impl MockCn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spot_failures(failures: u32) -> Self {
        Self {
            spot_failures_remaining: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn failing_feeds() -> Self {
        Self {
            fail_feeds: true,
            fail_profile: true,
            ..Self::default()
        }
    }

    pub fn spot_calls(&self) -> u32 {
        self.spot_calls.load(Ordering::SeqCst)
    }

    pub fn kline_calls(&self) -> u32 {
        self.kline_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CnMarketProvider for MockCn {
    fn name(&self) -> &'static str {
        "mock-cn"
    }

    async fn klines(
        &self,
        _code: &AShareCode,
        _frequency: KlineFrequency,
        limit: usize,
    ) -> Result<Vec<KlineRow>, ProviderError> {
        self.kline_calls.fetch_add(1, Ordering::SeqCst);
        self.last_kline_limit.store(limit, Ordering::SeqCst);
        Ok(vec![
            KlineRow {
                date: "2024-01-03".into(),
                open: Some(10.2),
                close: Some(10.4),
                high: Some(10.6),
                low: Some(10.1),
                volume: Some(2000.0),
            },
            KlineRow {
                date: "2024-01-02".into(),
                open: Some(10.0),
                close: Some(10.2),
                high: Some(10.3),
                low: Some(9.9),
                volume: None,
            },
        ])
    }

    async fn spot_quotes(&self) -> Result<Vec<SpotRow>, ProviderError> {
        self.spot_calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .spot_failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProviderError::Network("connection reset".into()));
        }
        Ok(vec![SpotRow {
            code: "600519".into(),
            name: "贵州茅台".into(),
            price: Some(1700.0),
            change_percent: Some(1.2),
            ..SpotRow::default()
        }])
    }

    async fn profile(&self, code: &AShareCode) -> Result<CnProfile, ProviderError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile {
            return Err(ProviderError::Empty(format!("no profile for {}", code)));
        }
        Ok(CnProfile {
            code: code.code.clone(),
            name: Some("平安银行".into()),
            industry: Some("银行".into()),
            price: Some(10.5),
            listing_date: Some(19910403),
            ..CnProfile::default()
        })
    }

    async fn stock_news(&self, code: &AShareCode) -> Result<Vec<CnArticle>, ProviderError> {
        if self.fail_feeds {
            return Err(ProviderError::Network("search unavailable".into()));
        }
        Ok(vec![CnArticle {
            published_at: "2024-01-02 09:30:00".into(),
            title: format!("{} announces results", code.code),
            url: format!("http://finance.eastmoney.com/a/{}.html", code.code),
            content: String::new(),
        }])
    }

    async fn telegraph(&self) -> Result<Vec<Telegraph>, ProviderError> {
        if self.fail_feeds {
            return Err(ProviderError::Http { status: 503 });
        }
        Ok(vec![Telegraph {
            title: String::new(),
            content: "Northbound inflows rise".into(),
            ctime: 1_704_160_800,
        }])
    }
}

// ============================================================================
// Global Provider
// ============================================================================

/// Global provider that counts calls and can fail individual quotes.
#[derive(Default)]
pub struct MockGlobal {
    pub chart_calls: AtomicU32,
    pub quote_calls: AtomicU32,
    pub failing_quotes: Vec<&'static str>,
    pub fail_all: bool,
    pub screen_hits: Vec<ScreenerQuote>,
    pub screen_queries: Mutex<Vec<(ScreenerQuery, usize)>>,
    pub requested: Mutex<Vec<String>>,
    /// Held before every chart and news response
    pub delay: Option<Duration>,
}

impl MockGlobal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_quotes(symbols: &[&'static str]) -> Self {
        Self {
            failing_quotes: symbols.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_screen_hits(hits: Vec<ScreenerQuote>) -> Self {
        Self {
            screen_hits: hits,
            ..Self::default()
        }
    }

    pub fn chart_calls(&self) -> u32 {
        self.chart_calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn record(&self, symbol: &str) {
        self.requested.lock().unwrap().push(symbol.to_string());
    }

    async fn hold(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GlobalMarketProvider for MockGlobal {
    fn name(&self) -> &'static str {
        "mock-global"
    }

    async fn chart(
        &self,
        symbol: &str,
        _period: &str,
        _interval: &str,
    ) -> Result<ChartSeries, ProviderError> {
        self.chart_calls.fetch_add(1, Ordering::SeqCst);
        self.record(symbol);
        self.hold().await;
        if self.fail_all {
            return Err(ProviderError::Http { status: 502 });
        }
        Ok(ChartSeries {
            symbol: symbol.to_string(),
            gmt_offset: 0,
            bars: vec![ChartBar {
                timestamp: 1_704_205_800,
                open: Some(185.0),
                high: Some(186.5),
                low: Some(184.2),
                close: Some(185.6),
                volume: Some(1.0e6),
            }],
        })
    }

    async fn quote(&self, symbol: &str) -> Result<InstrumentQuote, ProviderError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.record(symbol);
        if self.fail_all || self.failing_quotes.contains(&symbol) {
            return Err(ProviderError::Http { status: 404 });
        }
        Ok(InstrumentQuote {
            symbol: symbol.to_string(),
            last_price: Some(101.0),
            previous_close: Some(100.0),
            ..InstrumentQuote::default()
        })
    }

    async fn profile(&self, symbol: &str) -> Result<GlobalProfile, ProviderError> {
        self.record(symbol);
        if self.fail_all {
            return Err(ProviderError::Http { status: 404 });
        }
        Ok(GlobalProfile {
            symbol: Some(symbol.to_string()),
            long_name: Some("Apple Inc.".into()),
            exchange: Some("NMS".into()),
            currency: Some("USD".into()),
            current_price: Some(185.6),
            ..GlobalProfile::default()
        })
    }

    async fn news(&self, symbol: &str) -> Result<Vec<GlobalArticle>, ProviderError> {
        self.record(symbol);
        self.hold().await;
        if self.fail_all {
            return Err(ProviderError::Network("dns failure".into()));
        }
        Ok(vec![GlobalArticle {
            title: Some(format!("{} rallies", symbol)),
            url: Some("https://finance.yahoo.com/news/x".into()),
            publish_time: Some(1_704_205_800),
            ..GlobalArticle::default()
        }])
    }

    async fn screen(
        &self,
        query: &ScreenerQuery,
        size: usize,
    ) -> Result<Vec<ScreenerQuote>, ProviderError> {
        self.screen_queries
            .lock()
            .unwrap()
            .push((query.clone(), size));
        if self.fail_all {
            return Err(ProviderError::Upstream("screener rejected query".into()));
        }
        Ok(self.screen_hits.clone())
    }
}

// ============================================================================
// Event Source
// ============================================================================

pub struct MockEvents {
    pub fail: bool,
}

#[async_trait]
impl EventSource for MockEvents {
    fn name(&self) -> &'static str {
        "mock-events"
    }

    async fn events(&self) -> Result<Vec<EconomicEvent>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Network("calendar offline".into()));
        }
        let event = |time: &str, event: &str, impact: &str| EconomicEvent {
            date: "2024-03-12".into(),
            time: time.into(),
            country: "USA".into(),
            event: event.into(),
            actual: "-".into(),
            forecast: "-".into(),
            impact: impact.into(),
        };
        Ok(vec![
            event("08:30", "CPI", "High"),
            event("10:00", "Wholesale Inventories", "Low"),
            event("14:00", "FOMC Minutes", "High"),
        ])
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn names() -> SymbolNameMap {
    SymbolNameMap::from_map(HashMap::from([
        ("SZ000001".to_string(), "平安银行(映射)".to_string()),
        ("600519".to_string(), "贵州茅台".to_string()),
    ]))
}

pub fn test_config() -> RouterConfig {
    RouterConfig {
        upstream_timeout: Duration::from_secs(5),
        snapshot_attempts: 3,
        snapshot_backoff: Duration::from_millis(1000),
        screener_size: 100,
    }
}

pub fn router_with(cn: Arc<MockCn>, global: Arc<MockGlobal>, events_fail: bool) -> MarketRouter {
    MarketRouter::with_config(
        cn,
        global,
        Arc::new(MockEvents { fail: events_fail }),
        Arc::new(names()),
        test_config(),
    )
}
