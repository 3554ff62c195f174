//! Yahoo Finance chart API data adapter.
//!
//! Fetches `GET {base}/v8/finance/chart/{ticker}` and converts the columnar
//! response into bars. Prices are split/dividend adjusted when the response
//! carries an `adjclose` series; rows with any missing field are dropped.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::error::PatternIqError;
use crate::domain::ohlcv::Bar;
use crate::domain::settings::DataSettings;
use crate::ports::data_port::DataPort;

const INDEX_ALIASES: &[(&str, &str)] = &[
    ("NIFTY", "^NSEI"),
    ("NIFTY 50", "^NSEI"),
    ("NIFTY50", "^NSEI"),
    ("BANKNIFTY", "^NSEBANK"),
    ("NIFTY BANK", "^NSEBANK"),
    ("SENSEX", "^BSESN"),
];

/// Map a user-facing symbol to the exchange ticker.
///
/// Index names resolve through the alias table. Plain equities default to
/// the NSE listing (`.NS`); symbols that already carry an exchange suffix or
/// are index tickers (`^...`) pass through upper-cased.
pub fn resolve_ticker(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if let Some((_, ticker)) = INDEX_ALIASES.iter().find(|(alias, _)| *alias == upper) {
        return (*ticker).to_string();
    }
    if upper.starts_with('^') || upper.contains('.') {
        upper
    } else {
        format!("{upper}.NS")
    }
}

pub struct YahooAdapter {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl YahooAdapter {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, PatternIqError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("patterniq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| yahoo_error(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms,
        })
    }

    pub fn from_settings(settings: &DataSettings) -> Result<Self, PatternIqError> {
        Self::new(&settings.base_url, settings.timeout_ms)
    }
}

fn yahoo_error(reason: impl Into<String>) -> PatternIqError {
    PatternIqError::service("yahoo", reason)
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    #[serde(default)]
    adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
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
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn column(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

/// Decode a chart response body into sorted bars in exchange-local time.
///
/// A "Not Found" chart error yields an empty series; the orchestrator turns
/// that into `NoData`.
pub fn parse_chart(body: &str) -> Result<Vec<Bar>, PatternIqError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| yahoo_error(format!("unexpected chart payload: {e}")))?;

    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(Vec::new());
        }
        return Err(yahoo_error(format!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|c| c.adjclose)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    let mut dropped = 0usize;
    for (i, &secs) in result.timestamp.iter().enumerate() {
        let Some(timestamp) = DateTime::from_timestamp(secs + result.meta.gmtoffset, 0)
            .map(|dt| dt.naive_utc())
        else {
            dropped += 1;
            continue;
        };
        let fields = (
            column(&quote.open, i),
            column(&quote.high, i),
            column(&quote.low, i),
            column(&quote.close, i),
            column(&quote.volume, i),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields else {
            dropped += 1;
            continue;
        };
        let factor = match column(&adjclose, i) {
            Some(adj) if close > 0.0 => adj / close,
            _ => 1.0,
        };
        bars.push(Bar::new(
            timestamp,
            open * factor,
            high * factor,
            low * factor,
            close * factor,
            volume as i64,
        ));
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped chart rows with missing fields");
    }
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

impl DataPort for YahooAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, PatternIqError> {
        let ticker = resolve_ticker(symbol);
        let endpoint = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let span = tracing::info_span!(
            "data.yahoo.chart",
            endpoint = %endpoint,
            interval,
            timeout_ms = self.timeout_ms
        );
        let _enter = span.enter();

        let period1 = start.and_utc().timestamp().to_string();
        let period2 = end.and_utc().timestamp().to_string();
        let resp = self
            .client
            .get(&endpoint)
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", interval),
                ("events", "history"),
            ])
            .send()
            .map_err(|e| yahoo_error(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| yahoo_error(format!("failed to read response: {e}")))?;

        // Unknown tickers come back as 404 with a chart error body.
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(yahoo_error(format!("status {}", status.as_u16())));
        }

        let bars = parse_chart(&body)?;
        tracing::debug!(ticker = %ticker, bars = bars.len(), "chart fetched");
        Ok(bars)
    }
}
