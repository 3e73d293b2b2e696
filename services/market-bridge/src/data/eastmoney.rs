//! Eastmoney / Cailian Press adapter for A-share data.
//!
//! # Data Sources
//! - K-lines: push2his.eastmoney.com (forward-adjusted)
//! - Bulk quote list: push2.eastmoney.com clist
//! - Single-stock profile: push2.eastmoney.com stock/get
//! - Per-stock news: search-api-web.eastmoney.com (JSONP)
//! - Telegraph feed: www.cls.cn
//!
//! No API key required.

use async_trait::async_trait;
use bridge_common::EastmoneyConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::provider::{
    value_as_f64, CnArticle, CnMarketProvider, CnProfile, KlineFrequency, KlineRow,
    ProviderError, SpotRow, Telegraph,
};
use crate::symbol::{AShareCode, Exchange};

// ============================================================================
// Constants
// ============================================================================

/// Every listed A-share: SZ main/ChiNext, SH main/STAR, plus the Beijing
/// segment (`m:0 t:81 s:2048`), whose codes have no exchange prefix and stay bare.
const SPOT_MARKETS: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";

const SPOT_FIELDS: &str =
    "f2,f3,f4,f5,f6,f7,f8,f9,f10,f11,f12,f14,f15,f16,f17,f18,f20,f21,f22,f23,f24,f25";

const PROFILE_FIELDS: &str = "f43,f57,f58,f116,f127,f162,f167,f169,f170,f189";

/// Rows per clist page; the API ignores larger values.
const SPOT_PAGE_SIZE: usize = 100;

/// Hard stop for pagination.
const SPOT_MAX_PAGES: usize = 100;

const JSONP_CALLBACK: &str = "jQuery_market_bridge";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";

// ============================================================================
// Code Mapping
// ============================================================================

/// Eastmoney secid: `1.600519` for SH, `0.000001` for SZ.
fn to_secid(code: &AShareCode) -> String {
    let market = match code.exchange {
        Exchange::Sh => "1",
        _ => "0",
    };
    format!("{}.{}", market, code.code)
}

fn frequency_to_klt(frequency: KlineFrequency) -> u32 {
    match frequency {
        KlineFrequency::Daily => 101,
        KlineFrequency::Weekly => 102,
        KlineFrequency::Monthly => 103,
    }
}

// ============================================================================
// Eastmoney Adapter
// ============================================================================

/// CN provider backed by eastmoney and cls.cn.
pub struct EastmoneyAdapter {
    client: reqwest::Client,
    config: EastmoneyConfig,
}

impl EastmoneyAdapter {
    pub fn new(config: &EastmoneyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn build_url(base: &str, params: &[(&str, String)]) -> Result<Url, ProviderError> {
        Url::parse_with_params(base, params)
            .map_err(|e| ProviderError::Upstream(format!("Invalid endpoint {}: {}", base, e)))
    }

    async fn get_text(&self, url: Url) -> Result<String, ProviderError> {
        debug!(url = %url, "Fetching from eastmoney");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Http {
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        let text = self.get_text(url).await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn fetch_spot_page(&self, page: usize) -> Result<SpotPage, ProviderError> {
        let url = Self::build_url(
            &self.config.spot_url,
            &[
                ("pn", page.to_string()),
                ("pz", SPOT_PAGE_SIZE.to_string()),
                ("po", "1".into()),
                ("np", "1".into()),
                ("fltt", "2".into()),
                ("invt", "2".into()),
                ("fid", "f12".into()),
                ("fs", SPOT_MARKETS.into()),
                ("fields", SPOT_FIELDS.into()),
            ],
        )?;

        let response: EastmoneyResponse<SpotPage> = self.get_json(url).await?;
        response.into_data("clist")
    }
}

#[async_trait]
impl CnMarketProvider for EastmoneyAdapter {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn klines(
        &self,
        code: &AShareCode,
        frequency: KlineFrequency,
        limit: usize,
    ) -> Result<Vec<KlineRow>, ProviderError> {
        let url = Self::build_url(
            &self.config.kline_url,
            &[
                ("secid", to_secid(code)),
                ("klt", frequency_to_klt(frequency).to_string()),
                // 1 = forward-adjusted
                ("fqt", "1".into()),
                ("lmt", limit.to_string()),
                ("end", "20500101".into()),
                ("fields1", "f1,f2,f3,f4,f5,f6".into()),
                ("fields2", "f51,f52,f53,f54,f55,f56,f57".into()),
            ],
        )?;

        let response: EastmoneyResponse<KlineData> = self.get_json(url).await?;
        if response.rc != 0 {
            return Err(ProviderError::Upstream(format!("kline rc={}", response.rc)));
        }

        let klines = response.data.and_then(|d| d.klines).unwrap_or_default();
        Ok(klines.iter().filter_map(|line| parse_kline(line)).collect())
    }

    async fn spot_quotes(&self) -> Result<Vec<SpotRow>, ProviderError> {
        let first = self.fetch_spot_page(1).await?;
        let total = first.total;
        let mut rows = first.diff;

        let mut page = 2;
        while rows.len() < total && page <= SPOT_MAX_PAGES {
            let next = self.fetch_spot_page(page).await?;
            if next.diff.is_empty() {
                break;
            }
            rows.extend(next.diff);
            page += 1;
        }

        if rows.is_empty() {
            return Err(ProviderError::Empty("clist returned no rows".into()));
        }

        debug!(rows = rows.len(), total, pages = page - 1, "Fetched A-share spot list");
        Ok(rows)
    }

    async fn profile(&self, code: &AShareCode) -> Result<CnProfile, ProviderError> {
        let url = Self::build_url(
            &self.config.quote_url,
            &[
                ("secid", to_secid(code)),
                ("fltt", "2".into()),
                ("invt", "2".into()),
                ("fields", PROFILE_FIELDS.into()),
            ],
        )?;

        let response: EastmoneyResponse<Value> = self.get_json(url).await?;
        let data = response.into_data("stock/get")?;
        parse_profile(code, &data)
    }

    async fn stock_news(&self, code: &AShareCode) -> Result<Vec<CnArticle>, ProviderError> {
        let param = json!({
            "uid": "",
            "keyword": code.code,
            "type": ["cmsArticleWebOld"],
            "client": "web",
            "clientType": "web",
            "clientVersion": "curr",
            "param": {
                "cmsArticleWebOld": {
                    "searchScope": "default",
                    "sort": "default",
                    "pageIndex": 1,
                    "pageSize": 100,
                    "preTag": "<em>",
                    "postTag": "</em>"
                }
            }
        });
        let url = Self::build_url(
            &self.config.news_url,
            &[("cb", JSONP_CALLBACK.into()), ("param", param.to_string())],
        )?;

        let text = self.get_text(url).await?;
        let payload: NewsSearchResponse = serde_json::from_str(strip_jsonp(&text))
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(payload
            .result
            .map(|r| r.articles)
            .unwrap_or_default()
            .into_iter()
            .map(|a| CnArticle {
                published_at: a.date,
                title: strip_highlight(&a.title),
                url: format!("http://finance.eastmoney.com/a/{}.html", a.code),
                content: strip_highlight(&a.content),
            })
            .collect())
    }

    async fn telegraph(&self) -> Result<Vec<Telegraph>, ProviderError> {
        let url = Self::build_url(
            &self.config.telegraph_url,
            &[
                ("app", "CailianpressWeb".into()),
                ("os", "web".into()),
                ("sv", "8.4.6".into()),
                ("rn", "50".into()),
            ],
        )?;

        let response: TelegraphResponse = self.get_json(url).await?;
        if response.error != 0 {
            return Err(ProviderError::Upstream(format!(
                "telegraph error={}",
                response.error
            )));
        }

        Ok(response
            .data
            .map(|d| d.roll_data)
            .unwrap_or_default()
            .into_iter()
            .map(|t| Telegraph {
                title: t.title,
                content: t.content,
                ctime: t.ctime,
            })
            .collect())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse `date,open,close,high,low,volume[,amount...]`; `-` becomes `None`.
fn parse_kline(line: &str) -> Option<KlineRow> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        warn!(line = line, "Invalid kline format, skipping");
        return None;
    }

    let num = |s: &str| s.trim().parse::<f64>().ok();
    Some(KlineRow {
        date: parts[0].trim().to_string(),
        open: num(parts[1]),
        close: num(parts[2]),
        high: num(parts[3]),
        low: num(parts[4]),
        volume: num(parts[5]),
    })
}

fn parse_profile(code: &AShareCode, data: &Value) -> Result<CnProfile, ProviderError> {
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-")
            .map(str::to_string)
    };
    let num = |key: &str| data.get(key).and_then(value_as_f64);

    let profile = CnProfile {
        code: text("f57").unwrap_or_else(|| code.code.clone()),
        name: text("f58"),
        industry: text("f127"),
        total_market_cap: num("f116"),
        price: num("f43"),
        change: num("f169"),
        change_percent: num("f170"),
        pe_dynamic: num("f162"),
        pb_ratio: num("f167"),
        listing_date: num("f189").map(|d| d as i64).filter(|d| *d > 0),
    };

    if profile.name.is_none() && profile.price.is_none() {
        return Err(ProviderError::Empty(format!("no profile for {}", code)));
    }
    Ok(profile)
}

/// Unwrap `callback({...})` into `{...}`.
fn strip_jsonp(text: &str) -> &str {
    match (text.find('('), text.rfind(')')) {
        (Some(start), Some(end)) if start < end => &text[start + 1..end],
        _ => text,
    }
}

/// Remove search highlight tags and full-width padding.
fn strip_highlight(text: &str) -> String {
    text.replace("<em>", "")
        .replace("</em>", "")
        .replace('\u{3000}', "")
        .replace("\r\n", " ")
        .trim()
        .to_string()
}

// ============================================================================
// Eastmoney API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct EastmoneyResponse<T> {
    /// Return code (0 = success)
    #[serde(default)]
    rc: i32,
    data: Option<T>,
}

impl<T> EastmoneyResponse<T> {
    fn into_data(self, api: &str) -> Result<T, ProviderError> {
        if self.rc != 0 {
            return Err(ProviderError::Upstream(format!("{} rc={}", api, self.rc)));
        }
        self.data
            .ok_or_else(|| ProviderError::Empty(format!("{} returned no data", api)))
    }
}

#[derive(Debug, Deserialize)]
struct KlineData {
    /// K-line rows as CSV strings
    klines: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpotPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    diff: Vec<SpotRow>,
}

#[derive(Debug, Deserialize)]
struct NewsSearchResponse {
    result: Option<NewsSearchResult>,
}

#[derive(Debug, Deserialize)]
struct NewsSearchResult {
    #[serde(rename = "cmsArticleWebOld", default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    date: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct TelegraphResponse {
    #[serde(default)]
    error: i32,
    data: Option<TelegraphData>,
}

#[derive(Debug, Deserialize)]
struct TelegraphData {
    #[serde(default)]
    roll_data: Vec<TelegraphEntry>,
}

#[derive(Debug, Deserialize)]
struct TelegraphEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    ctime: i64,
}

// ============================================================================
// Tests
// ============================================================================
