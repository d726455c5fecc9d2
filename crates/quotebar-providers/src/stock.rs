//! Stock quotes from the Sina real-time quote list.
//!
//! The endpoint answers with GBK text of the form
//! `var hq_str_sh600519="name,open,prev_close,price,...";`. Field layout
//! depends on the market, see [`Market`].

use async_trait::async_trait;
use quotebar_core::error::{ConfigError, FetchError};
use quotebar_core::traits::Provider;
use quotebar_core::types::QuoteRecord;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};
use crate::settings::StockSettings;

/// Listing market, which decides the quote code and the payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Market {
    Shanghai,
    Shenzhen,
    Beijing,
    HongKong,
    Us,
}

impl Market {
    fn prefix(&self) -> &'static str {
        match self {
            Market::Shanghai => "sh",
            Market::Shenzhen => "sz",
            Market::Beijing => "bj",
            Market::HongKong => "hk",
            Market::Us => "gb_",
        }
    }

    /// Route a bare six-digit mainland code by its leading digit.
    fn for_mainland_code(code: &str) -> Option<Market> {
        match code.chars().next()? {
            '5' | '6' | '9' => Some(Market::Shanghai),
            '0' | '1' | '2' | '3' => Some(Market::Shenzhen),
            '4' | '8' => Some(Market::Beijing),
            _ => None,
        }
    }
}

/// A resolved quote code such as `sh600519` or `gb_aapl`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuoteCode {
    market: Market,
    code: String,
}

impl QuoteCode {
    fn resolve(symbol: &str) -> Result<Self, FetchError> {
        let lower = symbol.trim().to_lowercase();
        let is_digits = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_digit());
        let not_found = || FetchError::NotFound(symbol.to_string());

        if is_digits(&lower, 6) {
            let market = Market::for_mainland_code(&lower).ok_or_else(not_found)?;
            return Ok(Self::new(market, &lower));
        }

        for (prefix, market) in [
            ("sh", Market::Shanghai),
            ("sz", Market::Shenzhen),
            ("bj", Market::Beijing),
        ] {
            if let Some(rest) = lower.strip_prefix(prefix) {
                if is_digits(rest, 6) {
                    return Ok(Self::new(market, rest));
                }
            }
        }

        if let Some(rest) = lower.strip_prefix("hk") {
            if !rest.is_empty() && rest.len() <= 5 && rest.chars().all(|c| c.is_ascii_digit()) {
                return Ok(Self::new(Market::HongKong, &format!("{:0>5}", rest)));
            }
        }

        if !lower.is_empty()
            && lower.len() <= 10
            && lower.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
        {
            return Ok(Self::new(Market::Us, &lower.replace('.', "$")));
        }

        Err(not_found())
    }

    fn new(market: Market, code: &str) -> Self {
        Self {
            market,
            code: format!("{}{}", market.prefix(), code),
        }
    }
}

/// Fields extracted from one quote line.
#[derive(Debug, Clone, PartialEq)]
struct ParsedQuote {
    name: String,
    price: f64,
    change_percent: f64,
}

fn field(fields: &[&str], idx: usize, what: &str) -> Result<f64, FetchError> {
    let raw = fields
        .get(idx)
        .ok_or_else(|| FetchError::Parse(format!("missing {} field", what)))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FetchError::Parse(format!("bad {} value '{}'", what, raw)))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Parse the payload returned for `code`.
fn parse_payload(code: &QuoteCode, symbol: &str, body: &str) -> Result<ParsedQuote, FetchError> {
    let marker = format!("hq_str_{}=\"", code.code);
    let start = body
        .find(&marker)
        .map(|i| i + marker.len())
        .ok_or_else(|| FetchError::Parse(format!("no quote line for {}", code.code)))?;
    let rest = &body[start..];
    let end = rest
        .find('"')
        .ok_or_else(|| FetchError::Parse("unterminated quote line".to_string()))?;
    let inner = rest[..end].trim();

    if inner.is_empty() {
        return Err(FetchError::NotFound(symbol.to_string()));
    }

    let fields: Vec<&str> = inner.split(',').collect();

    match code.market {
        Market::Shanghai | Market::Shenzhen | Market::Beijing => {
            let prev_close = field(&fields, 2, "previous close")?;
            let mut price = field(&fields, 3, "price")?;
            // Before the opening auction the price is reported as zero
            if price <= 0.0 {
                price = prev_close;
            }
            if price <= 0.0 {
                return Err(FetchError::Parse(format!("no price for {}", symbol)));
            }
            let change_percent = if prev_close > 0.0 {
                round2((price - prev_close) / prev_close * 100.0)
            } else {
                0.0
            };
            Ok(ParsedQuote {
                name: fields[0].trim().to_string(),
                price,
                change_percent,
            })
        }
        Market::HongKong => {
            let price = field(&fields, 6, "price")?;
            let change_percent = field(&fields, 8, "change percent")?;
            let name = match fields.get(1).map(|s| s.trim()) {
                Some(cn) if !cn.is_empty() => cn.to_string(),
                _ => fields[0].trim().to_string(),
            };
            Ok(ParsedQuote {
                name,
                price,
                change_percent: round2(change_percent),
            })
        }
        Market::Us => {
            let price = field(&fields, 1, "price")?;
            let change_percent = field(&fields, 2, "change percent")?;
            Ok(ParsedQuote {
                name: fields[0].trim().to_string(),
                price,
                change_percent: round2(change_percent),
            })
        }
    }
}

/// Stock quote provider.
pub struct StockProvider {
    settings: StockSettings,
    client: Client,
}

impl StockProvider {
    /// Create a new stock provider.
    pub fn new(settings: StockSettings) -> Result<Self, ConfigError> {
        let client = build_client(&[(header::REFERER, settings.referer.as_str())])?;
        Ok(Self { settings, client })
    }
}

#[async_trait]
impl Provider for StockProvider {
    async fn fetch(&self, instrument_id: &str, timeout: Duration) -> Result<QuoteRecord, FetchError> {
        let code = QuoteCode::resolve(instrument_id)?;
        let url = format!("{}{}", self.settings.base_url, code.code);

        let resp = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        let resp = check_status(resp, instrument_id).await?;

        let body = resp
            .text_with_charset("gbk")
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let quote = parse_payload(&code, instrument_id, &body)?;
        debug!(symbol = instrument_id, price = quote.price, "parsed stock quote");

        let name = if quote.name.is_empty() {
            instrument_id.to_string()
        } else {
            quote.name
        };
        Ok(QuoteRecord::new(instrument_id, name, quote.price, quote.change_percent))
    }

    fn name(&self) -> &str {
        "stock"
    }

    fn description(&self) -> &str {
        "Real-time quotes for mainland, Hong Kong and US listings"
    }

    fn examples(&self) -> &[&'static str] {
        &["600519", "sh000001", "hk00700", "AAPL"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_mainland_codes() {
        assert_eq!(QuoteCode::resolve("600519").unwrap().code, "sh600519");
        assert_eq!(QuoteCode::resolve("000001").unwrap().code, "sz000001");
        assert_eq!(QuoteCode::resolve("300750").unwrap().code, "sz300750");
        assert_eq!(QuoteCode::resolve("830799").unwrap().code, "bj830799");
        assert_eq!(QuoteCode::resolve("SH000001").unwrap().code, "sh000001");
    }

    #[test]
    fn test_resolve_foreign_codes() {
        assert_eq!(QuoteCode::resolve("hk00700").unwrap().code, "hk00700");
        assert_eq!(QuoteCode::resolve("hk700").unwrap().code, "hk00700");
        assert_eq!(QuoteCode::resolve("AAPL").unwrap().code, "gb_aapl");
        assert_eq!(QuoteCode::resolve("BRK.B").unwrap().code, "gb_brk$b");
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(matches!(QuoteCode::resolve("7005"), Err(FetchError::NotFound(_))));
        assert!(matches!(QuoteCode::resolve("##"), Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_parse_mainland_payload() {
        let code = QuoteCode::resolve("600519").unwrap();
        let body = "var hq_str_sh600519=\"贵州茅台,1400.00,1396.00,1426.00,1430.00,1398.00\";\n";
        let quote = parse_payload(&code, "600519", body).unwrap();

        assert_eq!(quote.name, "贵州茅台");
        assert_eq!(quote.price, 1426.0);
        assert_eq!(quote.change_percent, 2.15);
    }

    #[test]
    fn test_parse_pre_open_uses_previous_close() {
        let code = QuoteCode::resolve("000001").unwrap();
        let body = "var hq_str_sz000001=\"平安银行,0.000,11.20,0.000,0.000,0.000\";";
        let quote = parse_payload(&code, "000001", body).unwrap();

        assert_eq!(quote.price, 11.2);
        assert_eq!(quote.change_percent, 0.0);
    }

    #[test]
    fn test_parse_hk_and_us_payloads() {
        let hk = QuoteCode::resolve("hk00700").unwrap();
        let body = "var hq_str_hk00700=\"TENCENT,腾讯控股,380.0,378.0,385.0,377.0,383.2,5.2,1.376\";";
        let quote = parse_payload(&hk, "hk00700", body).unwrap();
        assert_eq!(quote.name, "腾讯控股");
        assert_eq!(quote.price, 383.2);
        assert_eq!(quote.change_percent, 1.38);

        let us = QuoteCode::resolve("AAPL").unwrap();
        let body = "var hq_str_gb_aapl=\"苹果,227.5200,-0.8700,2024-09-20\";";
        let quote = parse_payload(&us, "AAPL", body).unwrap();
        assert_eq!(quote.price, 227.52);
        assert_eq!(quote.change_percent, -0.87);
    }

    #[test]
    fn test_parse_empty_payload_is_not_found() {
        let code = QuoteCode::resolve("600000").unwrap();
        let body = "var hq_str_sh600000=\"\";";
        assert_eq!(
            parse_payload(&code, "600000", body),
            Err(FetchError::NotFound("600000".into()))
        );
    }

    #[test]
    fn test_parse_malformed_payload() {
        let code = QuoteCode::resolve("600519").unwrap();
        let body = "var hq_str_sh600519=\"贵州茅台,abc\";";
        assert!(matches!(
            parse_payload(&code, "600519", body),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(
            parse_payload(&code, "600519", "<html>blocked</html>"),
            Err(FetchError::Parse(_))
        ));
    }
}
