//! Ticker normalization for A-share symbols.
//!
//! Three representations of the same A-share ticker are in circulation:
//!
//! | Form   | Example     | Used by                         |
//! |--------|-------------|---------------------------------|
//! | bare   | `600519`    | eastmoney, the name map         |
//! | fixed  | `SH600519`  | every response of this service  |
//! | vendor | `600519.SS` | Yahoo Finance                   |
//!
//! All conversions are total: input that is not a recognizable A-share
//! ticker (indices such as `^GSPC`, futures such as `GC=F`, Beijing codes)
//! comes back as-is after trimming and upper-casing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange prefix of the fixed form for Shanghai.
const SH_PREFIX: &str = "SH";
/// Exchange prefix of the fixed form for Shenzhen.
const SZ_PREFIX: &str = "SZ";
/// Vendor suffix for Shanghai.
const SS_SUFFIX: &str = ".SS";
/// Vendor suffix for Shenzhen.
const SZ_SUFFIX: &str = ".SZ";

/// A-share exchange classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// Shanghai Stock Exchange
    Sh,
    /// Shenzhen Stock Exchange
    Sz,
    /// Not an A-share ticker this service can place
    Unknown,
}

impl Exchange {
    /// Fixed-form prefix (`SH` / `SZ`).
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::Sh => Some(SH_PREFIX),
            Self::Sz => Some(SZ_PREFIX),
            Self::Unknown => None,
        }
    }

    /// Vendor-form suffix (`.SS` / `.SZ`).
    pub fn vendor_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Sh => Some(SS_SUFFIX),
            Self::Sz => Some(SZ_SUFFIX),
            Self::Unknown => None,
        }
    }

    /// Whether this is a classified A-share exchange.
    pub fn is_a_share(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Infer the exchange from the leading digit of a bare code.
    fn from_leading_digit(code: &str) -> Self {
        match code.as_bytes().first() {
            Some(b'6') | Some(b'5') => Self::Sh,
            Some(b'0') | Some(b'3') | Some(b'1') => Self::Sz,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sh => write!(f, "SH"),
            Self::Sz => write!(f, "SZ"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Recognized shape of a canonicalized ticker.
enum Shape<'a> {
    /// `600519.SS`, carries the exchange named by the suffix
    Vendor(Exchange, &'a str),
    /// `SH600519`
    Fixed(Exchange, &'a str),
    /// `600519`
    Bare(&'a str),
    /// anything else
    Other,
}

fn is_six_digits(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit())
}

fn canonicalize(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

/// Classify a canonicalized ticker. Suffix and prefix checks run before
/// digit inference so an explicit exchange is never overridden.
fn shape(symbol: &str) -> Shape<'_> {
    if let Some(code) = symbol.strip_suffix(SS_SUFFIX) {
        return Shape::Vendor(Exchange::Sh, code);
    }
    if let Some(code) = symbol.strip_suffix(SZ_SUFFIX) {
        return Shape::Vendor(Exchange::Sz, code);
    }
    if symbol.len() == 8 {
        if let Some(code) = symbol.strip_prefix(SH_PREFIX).filter(|c| is_six_digits(c)) {
            return Shape::Fixed(Exchange::Sh, code);
        }
        if let Some(code) = symbol.strip_prefix(SZ_PREFIX).filter(|c| is_six_digits(c)) {
            return Shape::Fixed(Exchange::Sz, code);
        }
    }
    if is_six_digits(symbol) {
        return Shape::Bare(symbol);
    }
    Shape::Other
}

/// Classify the exchange of any ticker form.
///
/// A vendor suffix counts only when it wraps a 6-digit code, so
/// `^HSI.SS`-style garbage stays [`Exchange::Unknown`].
pub fn classify_exchange(ticker: &str) -> Exchange {
    let symbol = canonicalize(ticker);
    match shape(&symbol) {
        Shape::Vendor(exchange, code) if is_six_digits(code) => exchange,
        Shape::Vendor(..) | Shape::Other => Exchange::Unknown,
        Shape::Fixed(exchange, _) => exchange,
        Shape::Bare(code) => Exchange::from_leading_digit(code),
    }
}

/// Normalize into fixed form (`SH600519`).
///
/// Idempotent; unclassifiable input is returned canonicalized.
pub fn to_fixed_form(ticker: &str) -> String {
    let symbol = canonicalize(ticker);
    let (exchange, code) = match shape(&symbol) {
        Shape::Vendor(exchange, code) if is_six_digits(code) => (exchange, code),
        Shape::Fixed(..) => return symbol,
        Shape::Bare(code) => (Exchange::from_leading_digit(code), code),
        Shape::Vendor(..) | Shape::Other => return symbol,
    };

    match exchange.prefix() {
        Some(prefix) => format!("{}{}", prefix, code),
        None => symbol,
    }
}

/// Normalize into vendor form (`600519.SS`) for the global provider.
///
/// Idempotent; anything already bearing `.SS`/`.SZ` is left alone.
pub fn to_vendor_form(ticker: &str) -> String {
    let symbol = canonicalize(ticker);
    let (exchange, code) = match shape(&symbol) {
        Shape::Vendor(..) => return symbol,
        Shape::Fixed(exchange, code) => (exchange, code),
        Shape::Bare(code) => (Exchange::from_leading_digit(code), code),
        Shape::Other => return symbol,
    };

    match exchange.vendor_suffix() {
        Some(suffix) => format!("{}{}", code, suffix),
        None => symbol,
    }
}

/// The 6-digit code of a classifiable A-share ticker.
pub fn bare_code(ticker: &str) -> Option<String> {
    AShareCode::parse(ticker).map(|c| c.code)
}

/// A classified A-share ticker: exchange plus bare code.
///
/// The exchange is carried alongside the code because the code alone is
/// ambiguous for indices (`000001.SS` is the SSE Composite, `000001` by
/// digits is a Shenzhen stock).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AShareCode {
    pub exchange: Exchange,
    pub code: String,
}

impl AShareCode {
    /// Parse any ticker form; `None` when unclassifiable.
    pub fn parse(ticker: &str) -> Option<Self> {
        let fixed = to_fixed_form(ticker);
        match shape(&fixed) {
            Shape::Fixed(exchange, code) => Some(Self {
                exchange,
                code: code.to_string(),
            }),
            _ => None,
        }
    }

    pub fn fixed_form(&self) -> String {
        format!("{}{}", self.exchange, self.code)
    }

    pub fn vendor_form(&self) -> String {
        format!("{}{}", self.code, self.exchange.vendor_suffix().unwrap_or_default())
    }
}

impl fmt::Display for AShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.exchange, self.code)
    }
}

// ============================================================================
// Region
// ============================================================================

/// Market region driving provider and field-table selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Region {
    /// Mainland China A-shares
    Cn,
    /// United States
    Us,
    /// Any other region string, lower-cased
    Other(String),
}

impl Region {
    /// Parse a request parameter, case-insensitively. Empty input means US.
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "cn" => Self::Cn,
            "us" | "" => Self::Us,
            _ => Self::Other(value),
        }
    }

    /// Infer the region from the shape of a ticker.
    pub fn infer(ticker: &str) -> Self {
        if classify_exchange(ticker).is_a_share() {
            Self::Cn
        } else {
            Self::Us
        }
    }

    /// Lower-case code used in provider queries.
    pub fn code(&self) -> &str {
        match self {
            Self::Cn => "cn",
            Self::Us => "us",
            Self::Other(code) => code,
        }
    }

    pub fn is_cn(&self) -> bool {
        matches!(self, Self::Cn)
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::Us
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_examples() {
        assert_eq!(to_fixed_form("601318"), "SH601318");
        assert_eq!(to_fixed_form("601318.SS"), "SH601318");
        assert_eq!(to_vendor_form("SZ000001"), "000001.SZ");
    }

    #[test_case("600519" ; "sh main board")]
    #[test_case("510300" ; "sh fund")]
    #[test_case("688981" ; "star market")]
    fn test_shanghai_codes(code: &str) {
        assert_eq!(to_fixed_form(code), format!("SH{}", code));
        assert_eq!(to_vendor_form(code), format!("{}.SS", code));
        assert_eq!(classify_exchange(code), Exchange::Sh);
    }

    #[test_case("000001" ; "sz main board")]
    #[test_case("300750" ; "chinext")]
    #[test_case("159915" ; "sz fund")]
    fn test_shenzhen_codes(code: &str) {
        assert_eq!(to_fixed_form(code), format!("SZ{}", code));
        assert_eq!(to_vendor_form(code), format!("{}.SZ", code));
        assert_eq!(classify_exchange(code), Exchange::Sz);
    }

    #[test_case("^GSPC")]
    #[test_case("GC=F")]
    #[test_case("AAPL")]
    #[test_case("^HSI")]
    #[test_case("830799" ; "beijing")]
    #[test_case("430047" ; "beijing legacy")]
    #[test_case("200002" ; "b share")]
    #[test_case("900901" ; "sh b share")]
    #[test_case("60051" ; "five digits")]
    #[test_case("SH60051X" ; "prefix without digits")]
    #[test_case("" ; "empty")]
    fn test_pass_through(symbol: &str) {
        assert_eq!(to_fixed_form(symbol), symbol);
        assert_eq!(to_vendor_form(symbol), symbol);
        assert_eq!(classify_exchange(symbol), Exchange::Unknown);
        assert_eq!(bare_code(symbol), None);
    }

    #[test]
    fn test_canonicalization() {
        assert_eq!(to_fixed_form("  sh600519 "), "SH600519");
        assert_eq!(to_fixed_form("600519.ss"), "SH600519");
        assert_eq!(to_vendor_form("sz000001"), "000001.SZ");
        assert_eq!(to_fixed_form("aapl"), "AAPL");
    }

    #[test]
    fn test_suffix_wins_over_digits() {
        // A Shenzhen-looking code with a Shanghai suffix keeps the suffix.
        assert_eq!(to_fixed_form("000001.SS"), "SH000001");
        assert_eq!(classify_exchange("000001.SS"), Exchange::Sh);
        // And a Shanghai-looking code with an SZ prefix keeps the prefix.
        assert_eq!(to_vendor_form("SZ600000"), "600000.SZ");
        assert_eq!(classify_exchange("SZ600000"), Exchange::Sz);
    }

    #[test]
    fn test_vendor_suffix_is_idempotent_for_vendor_form() {
        assert_eq!(to_vendor_form("600519.SS"), "600519.SS");
        assert_eq!(to_vendor_form("ABC.SZ"), "ABC.SZ");
        // Not a 6-digit code, so no fixed form exists.
        assert_eq!(to_fixed_form("ABC.SZ"), "ABC.SZ");
    }

    #[test]
    fn test_idempotence_and_round_trip() {
        let inputs = [
            "601318", "601318.SS", "SH601318", "000001", "000001.SZ", "SZ000001", "300750",
            "159915", "512480", "^GSPC", "GC=F", "830799", "XLK", " 600519 ", "abc.ss",
        ];
        for input in inputs {
            let once = to_fixed_form(input);
            assert_eq!(to_fixed_form(&once), once, "fixed idempotence for {input}");

            let vendor = to_vendor_form(input);
            assert_eq!(to_vendor_form(&vendor), vendor, "vendor idempotence for {input}");
        }

        for code in ["600519", "510300", "000001", "300750", "159915"] {
            let fixed = to_fixed_form(code);
            assert_eq!(to_fixed_form(&to_vendor_form(&fixed)), fixed);
        }
    }

    #[test]
    fn test_bare_code() {
        assert_eq!(bare_code("SH600519").as_deref(), Some("600519"));
        assert_eq!(bare_code("000001.SZ").as_deref(), Some("000001"));
        assert_eq!(bare_code("300750").as_deref(), Some("300750"));
    }

    #[test]
    fn test_a_share_code_keeps_explicit_exchange() {
        let index = AShareCode::parse("000001.SS").unwrap();
        assert_eq!(index.exchange, Exchange::Sh);
        assert_eq!(index.code, "000001");
        assert_eq!(index.fixed_form(), "SH000001");
        assert_eq!(index.vendor_form(), "000001.SS");

        let stock = AShareCode::parse("000001").unwrap();
        assert_eq!(stock.exchange, Exchange::Sz);
        assert_eq!(stock.to_string(), "SZ000001");

        assert!(AShareCode::parse("^GSPC").is_none());
    }

    #[test]
    fn test_exchange_affixes() {
        assert_eq!(Exchange::Sh.prefix(), Some("SH"));
        assert_eq!(Exchange::Sz.vendor_suffix(), Some(".SZ"));
        assert_eq!(Exchange::Unknown.prefix(), None);
        assert_eq!(Exchange::Sh.to_string(), "SH");
    }

    #[test]
    fn test_region_parse_and_infer() {
        assert_eq!(Region::parse("CN"), Region::Cn);
        assert_eq!(Region::parse("us"), Region::Us);
        assert_eq!(Region::parse(""), Region::Us);
        assert_eq!(Region::parse("HK"), Region::Other("hk".into()));
        assert_eq!(Region::infer("600519"), Region::Cn);
        assert_eq!(Region::infer("AAPL"), Region::Us);
        assert_eq!(Region::Cn.code(), "cn");
    }
}
