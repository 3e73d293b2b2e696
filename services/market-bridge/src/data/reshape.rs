//! Pure mappings from provider records into the output schema, plus the
//! fixed instrument tables behind `/markets` and `/sectors`.

use chrono::{DateTime, FixedOffset, NaiveDate};

use super::provider::{
    ChartSeries, CnArticle, CnProfile, GlobalArticle, GlobalProfile, InstrumentQuote, KlineRow,
    ScreenerQuote, SpotRow, Telegraph,
};
use super::{CompanyProfile, HistoryBar, MarketIndex, NewsItem, SectorPerformance, SnapshotQuote};
use crate::symbol::{to_fixed_form, AShareCode, Exchange, Region};

/// Placeholder for unavailable text fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Maximum number of news items returned.
pub const NEWS_LIMIT: usize = 20;

const COLOR_UP: &str = "text-green-300";
const COLOR_DOWN: &str = "text-red-300";

const CHINA_UTC_OFFSET_SECS: i32 = 8 * 3600;

// ============================================================================
// Instrument Tables
// ============================================================================

/// CN benchmark indices, in vendor form.
pub const CN_INDICES: &[(&str, &str)] = &[
    ("000001.SS", "上证指数"),
    ("399001.SZ", "深证成指"),
    ("000300.SS", "沪深300"),
    ("^HSI", "恒生指数"),
    ("399006.SZ", "创业板指"),
    ("000688.SS", "科创50"),
    ("000905.SS", "中证500"),
    ("000016.SS", "上证50"),
];

/// US benchmarks and macro instruments.
pub const US_INDICES: &[(&str, &str)] = &[
    ("^GSPC", "S&P 500"),
    ("^DJI", "Dow Jones"),
    ("^IXIC", "Nasdaq"),
    ("^RUT", "Russell 2000"),
    ("^VIX", "VIX"),
    ("GC=F", "Gold"),
    ("CL=F", "Crude Oil"),
    ("^TNX", "10Y Treasury"),
];

/// ETF standing in for a sector.
#[derive(Debug, Clone, Copy)]
pub struct SectorProxy {
    /// English key, shared with the screener
    pub key: &'static str,
    /// Chinese display name
    pub cn_name: &'static str,
    /// Domestic ETF, bare code
    pub cn_etf: &'static str,
    /// SPDR / US ETF ticker
    pub us_etf: &'static str,
}

impl SectorProxy {
    pub fn etf_for(&self, region: &Region) -> &'static str {
        if region.is_cn() {
            self.cn_etf
        } else {
            self.us_etf
        }
    }

    pub fn display_name(&self, region: &Region) -> &'static str {
        if region.is_cn() {
            self.cn_name
        } else {
            self.key
        }
    }
}

pub const SECTORS: &[SectorProxy] = &[
    SectorProxy { key: "Basic Materials", cn_name: "基础材料", cn_etf: "512400", us_etf: "XLB" },
    SectorProxy { key: "Communication Services", cn_name: "通信服务", cn_etf: "515050", us_etf: "XLC" },
    SectorProxy { key: "Consumer Cyclical", cn_name: "周期性消费", cn_etf: "510200", us_etf: "XLY" },
    SectorProxy { key: "Consumer Defensive", cn_name: "防御性消费", cn_etf: "510630", us_etf: "XLP" },
    SectorProxy { key: "Energy", cn_name: "能源", cn_etf: "159930", us_etf: "XLE" },
    SectorProxy { key: "Financial Services", cn_name: "金融服务", cn_etf: "510230", us_etf: "XLF" },
    SectorProxy { key: "Healthcare", cn_name: "医疗保健", cn_etf: "512170", us_etf: "XLV" },
    SectorProxy { key: "Industrials", cn_name: "工业", cn_etf: "512660", us_etf: "XLI" },
    SectorProxy { key: "Real Estate", cn_name: "房地产", cn_etf: "512200", us_etf: "XLRE" },
    SectorProxy { key: "Technology", cn_name: "科技", cn_etf: "512760", us_etf: "XLK" },
    SectorProxy { key: "Utilities", cn_name: "公用事业", cn_etf: "159985", us_etf: "XLU" },
    SectorProxy { key: "Semiconductors", cn_name: "半导体", cn_etf: "512480", us_etf: "SMH" },
];

/// Index table for a region. Anything other than CN gets the US table.
pub fn index_table(region: &Region) -> &'static [(&'static str, &'static str)] {
    if region.is_cn() {
        CN_INDICES
    } else {
        US_INDICES
    }
}

/// Title-case a sector parameter (`consumer cyclical` → `Consumer Cyclical`).
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical sector key for a request parameter, if it names a known sector.
pub fn recognized_sector(sector: &str) -> Option<&'static str> {
    let wanted = title_case(sector);
    SECTORS
        .iter()
        .map(|s| s.key)
        .find(|key| *key == wanted)
}

// ============================================================================
// History
// ============================================================================

/// CN K-lines into bars, dropping incomplete rows, ascending by date.
pub fn history_from_klines(rows: Vec<KlineRow>) -> Vec<HistoryBar> {
    let mut bars: Vec<HistoryBar> = rows
        .into_iter()
        .filter_map(|row| {
            Some(HistoryBar {
                date: row.date,
                open: row.open?,
                high: row.high?,
                low: row.low?,
                close: row.close?,
                volume: row.volume.unwrap_or(0.0),
            })
        })
        .collect();
    bars.sort_by(|a, b| a.date.cmp(&b.date));
    bars
}

/// Global chart series into bars dated in the exchange's local calendar.
pub fn history_from_chart(series: &ChartSeries) -> Vec<HistoryBar> {
    let mut bars: Vec<(i64, HistoryBar)> = series
        .bars
        .iter()
        .filter_map(|bar| {
            let date = DateTime::from_timestamp(bar.timestamp + series.gmt_offset, 0)?
                .format("%Y-%m-%d")
                .to_string();
            Some((
                bar.timestamp,
                HistoryBar {
                    date,
                    open: bar.open?,
                    high: bar.high?,
                    low: bar.low?,
                    close: bar.close?,
                    volume: bar.volume.unwrap_or(0.0),
                },
            ))
        })
        .collect();
    bars.sort_by_key(|(ts, _)| *ts);
    bars.into_iter().map(|(_, bar)| bar).collect()
}

// ============================================================================
// Snapshot
// ============================================================================

pub fn snapshot_row(row: SpotRow) -> SnapshotQuote {
    SnapshotQuote {
        symbol: to_fixed_form(&row.code),
        name: row.name,
        price: row.price,
        change_percent: row.change_percent,
        change: row.change,
        volume: row.volume,
        amount: row.amount,
        amplitude: row.amplitude,
        turnover_rate: row.turnover_rate,
        pe_ratio: row.pe_dynamic,
        pb_ratio: row.pb_ratio,
        volume_ratio: row.volume_ratio,
        high: row.high,
        low: row.low,
        open: row.open,
        prev_close: row.prev_close,
        total_market_cap: row.total_market_cap,
        float_market_cap: row.float_market_cap,
        five_min_change: row.five_min_change,
        rise_speed: row.rise_speed,
        sixty_day_change: row.sixty_day_change,
        ytd_change: row.ytd_change,
    }
}

// ============================================================================
// News
// ============================================================================

/// Per-stock CN articles, newest first.
pub fn news_from_articles(mut articles: Vec<CnArticle>) -> Vec<NewsItem> {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    articles
        .into_iter()
        .take(NEWS_LIMIT)
        .map(|a| NewsItem {
            published_at: a.published_at,
            summary: a.title.clone(),
            headline: a.title,
            url: a.url,
            source: "East Money".into(),
        })
        .collect()
}

/// Telegraph feed, newest first; an empty title falls back to the content.
pub fn news_from_telegraph(mut items: Vec<Telegraph>) -> Vec<NewsItem> {
    let china = FixedOffset::east_opt(CHINA_UTC_OFFSET_SECS);
    items.sort_by(|a, b| b.ctime.cmp(&a.ctime));
    items
        .into_iter()
        .take(NEWS_LIMIT)
        .map(|t| {
            let published_at = match (DateTime::from_timestamp(t.ctime, 0), china) {
                (Some(utc), Some(offset)) => utc
                    .with_timezone(&offset)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                _ => String::new(),
            };
            let headline = if t.title.trim().is_empty() {
                t.content.clone()
            } else {
                t.title
            };
            NewsItem {
                published_at,
                headline,
                url: String::new(),
                summary: t.content,
                source: "Cailian Press".into(),
            }
        })
        .collect()
}

/// Publication instant in unix seconds; `pub_date` wins when it parses.
fn article_timestamp(article: &GlobalArticle) -> Option<i64> {
    article
        .pub_date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|dt| dt.timestamp())
        .or(article.publish_time)
}

/// Global articles, newest first; articles without a title are skipped and
/// undated ones sink to the end.
pub fn news_from_global(mut articles: Vec<GlobalArticle>) -> Vec<NewsItem> {
    articles.sort_by_key(|a| std::cmp::Reverse(article_timestamp(a)));
    articles
        .into_iter()
        .filter_map(|a| {
            let headline = a.title.filter(|t| !t.is_empty())?;
            let published_at = a
                .pub_date
                .or_else(|| {
                    a.publish_time
                        .and_then(|ts| DateTime::from_timestamp(ts, 0))
                        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                })
                .unwrap_or_default();
            Some(NewsItem {
                published_at,
                headline,
                url: a.url.unwrap_or_default(),
                summary: a.summary.unwrap_or_default(),
                source: a.publisher.unwrap_or_else(|| "Yahoo Finance".into()),
            })
        })
        .take(NEWS_LIMIT)
        .collect()
}

// ============================================================================
// Markets & Sectors
// ============================================================================

/// Price and previous close, when both are present and usable.
fn price_pair(quote: &InstrumentQuote) -> Option<(f64, f64)> {
    let price = quote.last_price?;
    let prev_close = quote.previous_close.filter(|p| *p != 0.0)?;
    Some((price, prev_close))
}

/// Index row, or `None` when the quote lacks a price or previous close.
pub fn market_index(
    symbol: &str,
    name: &str,
    region: &Region,
    quote: &InstrumentQuote,
) -> Option<MarketIndex> {
    let (price, prev_close) = price_pair(quote)?;
    let change = price - prev_close;
    let display_symbol = if region.is_cn() {
        to_fixed_form(symbol)
    } else {
        symbol.to_string()
    };

    Some(MarketIndex {
        symbol: display_symbol,
        name: name.to_string(),
        price,
        change,
        change_percent: change / prev_close * 100.0,
        prev_close,
        open: quote.open,
        high: quote.day_high,
        low: quote.day_low,
        volume: quote.volume,
        amount: 0.0,
    })
}

/// Sector row, or `None` when the quote lacks a price or previous close.
pub fn sector_performance(
    proxy: &SectorProxy,
    region: &Region,
    quote: &InstrumentQuote,
) -> Option<SectorPerformance> {
    let (price, prev_close) = price_pair(quote)?;
    let change = price - prev_close;
    let change_percent = change / prev_close * 100.0;
    let is_up = change >= 0.0;

    Some(SectorPerformance {
        name: proxy.display_name(region).to_string(),
        filter_key: proxy.key.to_string(),
        change: format!("{:+.2}%", change_percent),
        is_up,
        color: if is_up { COLOR_UP } else { COLOR_DOWN }.to_string(),
    })
}

// ============================================================================
// Profiles
// ============================================================================

fn text_or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Profile with every text field `N/A` and every numeric `null`.
pub fn empty_profile(symbol: &str) -> CompanyProfile {
    CompanyProfile {
        symbol: symbol.to_string(),
        name: NOT_AVAILABLE.into(),
        exchange: NOT_AVAILABLE.into(),
        currency: NOT_AVAILABLE.into(),
        country: NOT_AVAILABLE.into(),
        sector: NOT_AVAILABLE.into(),
        industry: NOT_AVAILABLE.into(),
        market_cap: None,
        description: NOT_AVAILABLE.into(),
        website: NOT_AVAILABLE.into(),
        ceo: NOT_AVAILABLE.into(),
        employees: None,
        founded: None,
        ipo_date: None,
        price: None,
        change: None,
        change_percent: None,
        trailing_pe: None,
        forward_pe: None,
        price_to_book: None,
        dividend_yield: None,
        beta: None,
        fifty_two_week_high: None,
        fifty_two_week_low: None,
        average_volume: None,
        trailing_eps: None,
        forward_eps: None,
    }
}

/// `YYYYMMDD` listing date into Unix seconds at UTC midnight.
fn listing_date_epoch(date: i64) -> Option<i64> {
    NaiveDate::parse_from_str(&date.to_string(), "%Y%m%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
}

pub fn profile_from_cn(code: &AShareCode, profile: CnProfile) -> CompanyProfile {
    let exchange = match code.exchange {
        Exchange::Sh => "SSE",
        Exchange::Sz => "SZSE",
        Exchange::Unknown => NOT_AVAILABLE,
    };

    CompanyProfile {
        name: text_or_na(profile.name),
        exchange: exchange.into(),
        currency: "CNY".into(),
        country: "China".into(),
        industry: text_or_na(profile.industry),
        market_cap: profile.total_market_cap,
        ipo_date: profile.listing_date.and_then(listing_date_epoch),
        price: profile.price,
        change: profile.change,
        change_percent: profile.change_percent,
        trailing_pe: profile.pe_dynamic,
        price_to_book: profile.pb_ratio,
        ..empty_profile(&code.fixed_form())
    }
}

pub fn profile_from_global(requested: &str, profile: GlobalProfile) -> CompanyProfile {
    let symbol = to_fixed_form(profile.symbol.as_deref().unwrap_or(requested));

    CompanyProfile {
        name: text_or_na(profile.long_name.or(profile.short_name)),
        exchange: text_or_na(profile.exchange),
        currency: text_or_na(profile.currency),
        country: text_or_na(profile.country),
        sector: text_or_na(profile.sector),
        industry: text_or_na(profile.industry),
        market_cap: profile.market_cap,
        description: text_or_na(profile.business_summary),
        website: text_or_na(profile.website),
        employees: profile.full_time_employees,
        ipo_date: profile.first_trade_epoch,
        price: profile.current_price.or(profile.regular_market_price),
        change: profile.regular_market_change,
        change_percent: profile.regular_market_change_percent,
        trailing_pe: profile.trailing_pe,
        forward_pe: profile.forward_pe,
        price_to_book: profile.price_to_book,
        dividend_yield: profile.dividend_yield,
        beta: profile.beta,
        fifty_two_week_high: profile.fifty_two_week_high,
        fifty_two_week_low: profile.fifty_two_week_low,
        average_volume: profile.average_volume,
        trailing_eps: profile.trailing_eps,
        forward_eps: profile.forward_eps,
        ..empty_profile(&symbol)
    }
}

/// Screener hit into a profile; hits without a symbol are dropped.
pub fn profile_from_screener(quote: ScreenerQuote, fallback_sector: &str) -> Option<CompanyProfile> {
    let symbol = quote.symbol.filter(|s| !s.is_empty())?;
    let sector = quote
        .sector
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_sector.to_string());

    Some(CompanyProfile {
        name: text_or_na(quote.long_name.or(quote.short_name)),
        exchange: text_or_na(quote.exchange),
        currency: text_or_na(quote.currency),
        country: text_or_na(quote.country),
        sector: text_or_na(Some(sector)),
        industry: text_or_na(quote.industry),
        market_cap: quote.market_cap,
        description: text_or_na(quote.long_business_summary),
        ipo_date: quote.first_trade_date_milliseconds.map(|ms| ms / 1000),
        price: quote.regular_market_price,
        change: quote.regular_market_change,
        change_percent: quote.regular_market_change_percent,
        trailing_pe: quote.trailing_pe,
        forward_pe: quote.forward_pe,
        price_to_book: quote.price_to_book,
        dividend_yield: quote.dividend_yield,
        beta: quote.beta,
        fifty_two_week_high: quote.fifty_two_week_high,
        fifty_two_week_low: quote.fifty_two_week_low,
        average_volume: quote.average_daily_volume3_month,
        trailing_eps: quote.eps_trailing_twelve_months,
        forward_eps: quote.eps_forward,
        ..empty_profile(&to_fixed_form(&symbol))
    })
}

// ============================================================================
// Tests
// ============================================================================
