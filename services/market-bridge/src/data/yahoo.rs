//! Yahoo Finance adapter for global / US equities.
//!
//! Endpoints used:
//! - `/v8/finance/chart/{symbol}`: history and latest-session quotes
//! - `/v10/finance/quoteSummary/{symbol}`: company profile (crumb required)
//! - `/v1/finance/search`: per-ticker news
//! - `/v1/finance/screener`: structured equity screener (crumb required)
//!
//! Crumb-protected endpoints need a session cookie from `fc.yahoo.com` and a
//! crumb bound to it. Both are cached and refreshed once on a 401/403.

use async_trait::async_trait;
use bridge_common::YahooConfig;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::provider::{
    value_as_f64, ChartBar, ChartSeries, GlobalArticle, GlobalMarketProvider, GlobalProfile,
    InstrumentQuote, ProviderError, ScreenerQuery, ScreenerQuote,
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const SUMMARY_MODULES: &str =
    "price,summaryProfile,summaryDetail,defaultKeyStatistics,financialData,quoteType";

/// Maximum news articles requested per ticker.
const NEWS_COUNT: usize = 20;

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

#[derive(Debug, Clone)]
struct Session {
    cookie: String,
    crumb: String,
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Global provider backed by Yahoo Finance.
pub struct YahooAdapter {
    client: reqwest::Client,
    config: YahooConfig,
    session: RwLock<Option<Session>>,
}

impl YahooAdapter {
    pub fn new(config: &YahooConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            session: RwLock::new(None),
        }
    }

    /// Build `{base}/{segments...}?{params}` with each segment percent-encoded.
    fn endpoint(
        base: &str,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<Url, ProviderError> {
        let mut url = Url::parse(base)
            .map_err(|e| ProviderError::Upstream(format!("Invalid endpoint {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Upstream(format!("Endpoint {} cannot take a path", base)))?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        debug!(url = %url, "Fetching from yahoo");
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    // ========================================================================
    // Session
    // ========================================================================

    async fn session(&self) -> Result<Session, ProviderError> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        let session = self.fetch_session().await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn fetch_session(&self) -> Result<Session, ProviderError> {
        // The cookie host answers 404 but still sets the session cookie.
        let response = self.client.get(&self.config.cookie_url).send().await?;
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(';').next())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Upstream("Yahoo did not set a session cookie".into()))?;

        let url = Self::endpoint(&self.config.query_base, &["v1", "test", "getcrumb"], &[])?;
        let response = self.client.get(url).header(COOKIE, &cookie).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Http {
                status: response.status().as_u16(),
            });
        }
        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(ProviderError::Upstream("Yahoo returned an invalid crumb".into()));
        }

        debug!("Obtained Yahoo session crumb");
        Ok(Session { cookie, crumb })
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    /// Send a crumb-protected request, re-authenticating once on 401/403.
    async fn send_with_crumb<F>(&self, build: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn(&Session) -> Result<reqwest::RequestBuilder, ProviderError>,
    {
        for attempt in 0..2 {
            let session = self.session().await?;
            let response = build(&session)?.header(COOKIE, &session.cookie).send().await?;

            let status = response.status();
            if (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN) && attempt == 0
            {
                warn!(status = status.as_u16(), "Yahoo session rejected, refreshing crumb");
                self.clear_session().await;
                continue;
            }
            return Ok(response);
        }
        Err(ProviderError::Upstream("Yahoo authentication failed".into()))
    }
}

#[async_trait]
impl GlobalMarketProvider for YahooAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn chart(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<ChartSeries, ProviderError> {
        let url = Self::endpoint(
            &self.config.query_base,
            &["v8", "finance", "chart", symbol],
            &[
                ("range", period.to_string()),
                ("interval", interval.to_string()),
                ("includePrePost", "false".into()),
                ("events", "div,splits".into()),
            ],
        )?;

        let response: ChartResponse = self.get_json(url).await?;
        let result = response.into_result(symbol)?;
        Ok(parse_chart(symbol, result))
    }

    async fn quote(&self, symbol: &str) -> Result<InstrumentQuote, ProviderError> {
        let url = Self::endpoint(
            &self.config.query_base,
            &["v8", "finance", "chart", symbol],
            &[("range", "1d".into()), ("interval", "1d".into())],
        )?;

        let response: ChartResponse = self.get_json(url).await?;
        let result = response.into_result(symbol)?;
        Ok(parse_quote(symbol, &result))
    }

    async fn profile(&self, symbol: &str) -> Result<GlobalProfile, ProviderError> {
        let base = self.config.summary_base.clone();
        let response = self
            .send_with_crumb(|session| {
                let url = Self::endpoint(
                    &base,
                    &["v10", "finance", "quoteSummary", symbol],
                    &[
                        ("modules", SUMMARY_MODULES.into()),
                        ("crumb", session.crumb.clone()),
                    ],
                )?;
                Ok(self.client.get(url))
            })
            .await?;

        let summary: Value = Self::decode(response).await?;
        let result = summary
            .pointer("/quoteSummary/result/0")
            .ok_or_else(|| ProviderError::Empty(format!("no quoteSummary for {}", symbol)))?;
        Ok(parse_profile(result))
    }

    async fn news(&self, symbol: &str) -> Result<Vec<GlobalArticle>, ProviderError> {
        let url = Self::endpoint(
            &self.config.query_base,
            &["v1", "finance", "search"],
            &[
                ("q", symbol.to_string()),
                ("quotesCount", "0".into()),
                ("newsCount", NEWS_COUNT.to_string()),
            ],
        )?;

        let response: SearchResponse = self.get_json(url).await?;
        Ok(response.news.into_iter().map(parse_article).collect())
    }

    async fn screen(
        &self,
        query: &ScreenerQuery,
        size: usize,
    ) -> Result<Vec<ScreenerQuote>, ProviderError> {
        let base = self.config.query_base.clone();
        let body = json!({
            "size": size,
            "offset": 0,
            "sortField": "intradaymarketcap",
            "sortType": "DESC",
            "quoteType": "EQUITY",
            "query": query.to_json(),
            "userId": "",
            "userIdType": "guid",
        });

        let response = self
            .send_with_crumb(|session| {
                let url = Self::endpoint(
                    &base,
                    &["v1", "finance", "screener"],
                    &[
                        ("crumb", session.crumb.clone()),
                        ("formatted", "false".into()),
                        ("lang", "en-US".into()),
                    ],
                )?;
                Ok(self.client.post(url).json(&body))
            })
            .await?;

        let screener: ScreenerResponse = Self::decode(response).await?;
        Ok(screener
            .finance
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|r| r.quotes)
            .unwrap_or_default())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_chart(symbol: &str, result: ChartResult) -> ChartSeries {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, ts)| ChartBar {
            timestamp: *ts,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
            volume: at(&quote.volume, i),
        })
        .collect();

    ChartSeries {
        symbol: result.meta.symbol.unwrap_or_else(|| symbol.to_string()),
        gmt_offset: result.meta.gmtoffset.unwrap_or(0),
        bars,
    }
}

fn parse_quote(symbol: &str, result: &ChartResult) -> InstrumentQuote {
    let meta = &result.meta;
    let first_open = result
        .indicators
        .quote
        .first()
        .and_then(|q| q.open.iter().flatten().next().copied());

    InstrumentQuote {
        symbol: meta.symbol.clone().unwrap_or_else(|| symbol.to_string()),
        last_price: meta.regular_market_price,
        previous_close: meta.previous_close.or(meta.chart_previous_close),
        open: first_open,
        day_high: meta.regular_market_day_high,
        day_low: meta.regular_market_day_low,
        volume: meta.regular_market_volume,
    }
}

/// Map one quoteSummary result. Numbers arrive as `{raw, fmt}` objects.
fn parse_profile(result: &Value) -> GlobalProfile {
    let field = |module: &str, key: &str| result.get(module).and_then(|m| m.get(key));
    let num = |module: &str, key: &str| field(module, key).and_then(value_as_f64);
    let int = |module: &str, key: &str| num(module, key).map(|v| v as i64);
    let text = |module: &str, key: &str| {
        field(module, key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    GlobalProfile {
        symbol: text("price", "symbol"),
        long_name: text("price", "longName"),
        short_name: text("price", "shortName"),
        exchange: text("price", "exchange"),
        currency: text("price", "currency"),
        country: text("summaryProfile", "country"),
        sector: text("summaryProfile", "sector"),
        industry: text("summaryProfile", "industry"),
        market_cap: num("price", "marketCap").or_else(|| num("summaryDetail", "marketCap")),
        business_summary: text("summaryProfile", "longBusinessSummary"),
        website: text("summaryProfile", "website"),
        full_time_employees: int("summaryProfile", "fullTimeEmployees"),
        first_trade_epoch: int("quoteType", "firstTradeDateEpochUtc"),
        current_price: num("financialData", "currentPrice"),
        regular_market_price: num("price", "regularMarketPrice"),
        regular_market_change: num("price", "regularMarketChange"),
        // quoteSummary reports a fraction; the output is in percent.
        regular_market_change_percent: num("price", "regularMarketChangePercent")
            .map(|v| v * 100.0),
        trailing_pe: num("summaryDetail", "trailingPE"),
        forward_pe: num("summaryDetail", "forwardPE"),
        price_to_book: num("defaultKeyStatistics", "priceToBook"),
        dividend_yield: num("summaryDetail", "dividendYield"),
        beta: num("summaryDetail", "beta").or_else(|| num("defaultKeyStatistics", "beta")),
        fifty_two_week_high: num("summaryDetail", "fiftyTwoWeekHigh"),
        fifty_two_week_low: num("summaryDetail", "fiftyTwoWeekLow"),
        average_volume: num("summaryDetail", "averageVolume"),
        trailing_eps: num("defaultKeyStatistics", "trailingEps"),
        forward_eps: num("defaultKeyStatistics", "forwardEps"),
    }
}

/// Search results come flat or wrapped in `content`; read both.
fn parse_article(entry: NewsEntry) -> GlobalArticle {
    let content = entry.content.unwrap_or_default();

    GlobalArticle {
        title: content.title.or(entry.title),
        url: content
            .click_through_url
            .and_then(|u| u.url)
            .or(content.canonical_url.and_then(|u| u.url))
            .or(entry.link),
        pub_date: content.pub_date,
        publish_time: entry.provider_publish_time,
        summary: content.summary.or(entry.summary),
        publisher: content
            .provider
            .and_then(|p| p.display_name)
            .or(entry.publisher),
    }
}

// ============================================================================
// Yahoo API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

impl ChartResponse {
    fn into_result(self, symbol: &str) -> Result<ChartResult, ProviderError> {
        if let Some(error) = self.chart.error {
            return Err(ProviderError::Upstream(format!(
                "{}: {}",
                error.code.unwrap_or_default(),
                error.description.unwrap_or_default()
            )));
        }
        self.chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::Empty(format!("no chart for {}", symbol)))
    }
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    gmtoffset: Option<i64>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<NewsEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsEntry {
    title: Option<String>,
    link: Option<String>,
    publisher: Option<String>,
    provider_publish_time: Option<i64>,
    summary: Option<String>,
    content: Option<NewsContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsContent {
    title: Option<String>,
    summary: Option<String>,
    pub_date: Option<String>,
    click_through_url: Option<NewsUrl>,
    canonical_url: Option<NewsUrl>,
    provider: Option<NewsProvider>,
}

#[derive(Debug, Deserialize)]
struct NewsUrl {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsProvider {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    finance: ScreenerFinance,
}

#[derive(Debug, Deserialize)]
struct ScreenerFinance {
    result: Option<Vec<ScreenerResult>>,
}

#[derive(Debug, Deserialize)]
struct ScreenerResult {
    #[serde(default)]
    quotes: Vec<ScreenerQuote>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_BODY: &str = r#"{"chart":{"result":[{
        "meta":{"symbol":"^GSPC","gmtoffset":-18000,"regularMarketPrice":4780.5,
                "chartPreviousClose":4769.8,"regularMarketDayHigh":4793.3,
                "regularMarketDayLow":4750.1,"regularMarketVolume":2.1e9},
        "timestamp":[1704205800,1704292200],
        "indicators":{"quote":[{"open":[4745.2,null],"high":[4754.3,4790.0],
                                "low":[4722.7,4750.0],"close":[4742.8,4780.5],
                                "volume":[3.7e9,2.1e9]}]}
    }],"error":null}}"#;

    #[test]
    fn test_endpoint_builds_path_and_query() {
        let url = YahooAdapter::endpoint(
            "https://query1.finance.yahoo.com",
            &["v8", "finance", "chart", "^GSPC"],
            &[("range", "5y".into()), ("events", "div,splits".into())],
        )
        .unwrap();
        assert_eq!(url.path(), "/v8/finance/chart/^GSPC");
        assert_eq!(url.query(), Some("range=5y&events=div%2Csplits"));

        let url = YahooAdapter::endpoint("https://query1.finance.yahoo.com", &["v1", "finance", "search"], &[])
            .unwrap();
        assert_eq!(url.as_str(), "https://query1.finance.yahoo.com/v1/finance/search");
    }

    #[test]
    fn test_parse_chart() {
        let response: ChartResponse = serde_json::from_str(CHART_BODY).unwrap();
        let series = parse_chart("^GSPC", response.into_result("^GSPC").unwrap());
        assert_eq!(series.gmt_offset, -18000);
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.bars[0].open, Some(4745.2));
        assert_eq!(series.bars[1].open, None);
    }

    #[test]
    fn test_parse_quote_falls_back_to_chart_previous_close() {
        let response: ChartResponse = serde_json::from_str(CHART_BODY).unwrap();
        let quote = parse_quote("^GSPC", &response.into_result("^GSPC").unwrap());
        assert_eq!(quote.last_price, Some(4780.5));
        assert_eq!(quote.previous_close, Some(4769.8));
        assert_eq!(quote.open, Some(4745.2));
    }

    #[test]
    fn test_chart_error_is_upstream() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        let err = response.into_result("NOPE").unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_parse_profile_modules() {
        let result = json!({
            "price": {"symbol": "AAPL", "longName": "Apple Inc.", "exchange": "NMS",
                      "currency": "USD", "regularMarketPrice": {"raw": 185.6, "fmt": "185.60"},
                      "regularMarketChangePercent": {"raw": 0.0123}},
            "summaryProfile": {"country": "United States", "industry": "Consumer Electronics",
                               "fullTimeEmployees": 161000},
            "summaryDetail": {"trailingPE": {"raw": 30.2}, "fiftyTwoWeekHigh": {"raw": 199.6}},
            "quoteType": {"firstTradeDateEpochUtc": 345479400}
        });
        let profile = parse_profile(&result);
        assert_eq!(profile.symbol.as_deref(), Some("AAPL"));
        assert_eq!(profile.sector, None);
        assert_eq!(profile.full_time_employees, Some(161000));
        assert_eq!(profile.regular_market_price, Some(185.6));
        assert!((profile.regular_market_change_percent.unwrap() - 1.23).abs() < 1e-9);
        assert_eq!(profile.first_trade_epoch, Some(345479400));
    }

    #[test]
    fn test_parse_article_shapes() {
        let flat: SearchResponse = serde_json::from_str(
            r#"{"news":[{"title":"Flat","link":"https://a","publisher":"Reuters","providerPublishTime":1704205800}]}"#,
        )
        .unwrap();
        let article = parse_article(flat.news.into_iter().next().unwrap());
        assert_eq!(article.url.as_deref(), Some("https://a"));
        assert_eq!(article.publisher.as_deref(), Some("Reuters"));

        let nested: SearchResponse = serde_json::from_str(
            r#"{"news":[{"content":{"title":"Nested","pubDate":"2024-01-02T14:30:00Z",
                "clickThroughUrl":{"url":"https://b"},"provider":{"displayName":"Barron's"}}}]}"#,
        )
        .unwrap();
        let article = parse_article(nested.news.into_iter().next().unwrap());
        assert_eq!(article.title.as_deref(), Some("Nested"));
        assert_eq!(article.url.as_deref(), Some("https://b"));
        assert_eq!(article.pub_date.as_deref(), Some("2024-01-02T14:30:00Z"));
    }

    #[test]
    fn test_parse_screener() {
        let body = r#"{"finance":{"result":[{"quotes":[
            {"symbol":"NVDA","longName":"NVIDIA Corporation","marketCap":3.1e12,
             "regularMarketPrice":120.5,"trailingPE":55.1,"averageDailyVolume3Month":3.0e8}
        ]}],"error":null}}"#;
        let response: ScreenerResponse = serde_json::from_str(body).unwrap();
        let quotes = response.finance.result.unwrap().remove(0).quotes;
        assert_eq!(quotes[0].symbol.as_deref(), Some("NVDA"));
        assert_eq!(quotes[0].trailing_pe, Some(55.1));
        assert_eq!(quotes[0].average_daily_volume3_month, Some(3.0e8));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_quote() {
        let adapter = YahooAdapter::new(&YahooConfig::default());
        let quote = adapter.quote("^GSPC").await.unwrap();
        assert!(quote.last_price.is_some());
    }
}
