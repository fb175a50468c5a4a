//! Yahoo Finance data provider.
//!
//! Metadata and the earnings/dividend calendar come from the v10 quoteSummary
//! API; daily history with dividend and split events comes from the v8 chart
//! API. quoteSummary needs a session cookie and a crumb token. Both are fetched
//! lazily, and the crumb is refreshed once when Yahoo answers 401.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    CalendarData, DataError, HistoryRange, MarketDataProvider, Metadata, RawRow, Resource,
};
use super::shape;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const CONSENT_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Upper bound on a server-requested `retry-after` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// 1900-01-01, the earliest `period1` Yahoo accepts for a full history.
const MAX_HISTORY_START: i64 = -2_208_994_789;

/// quoteSummary modules merged into `info.json`.
pub const DEFAULT_METADATA_MODULES: &[&str] = &[
    "assetProfile",
    "summaryProfile",
    "summaryDetail",
    "price",
    "quoteType",
    "defaultKeyStatistics",
    "financialData",
];

const CALENDAR_MODULE: &str = "calendarEvents";

/// calendarEvents keys → labels used in `calendar.json`.
const CALENDAR_LABELS: &[(&str, &str)] = &[
    ("dividendDate", "Dividend Date"),
    ("exDividendDate", "Ex-Dividend Date"),
    ("earningsDate", "Earnings Date"),
    ("earningsHigh", "Earnings High"),
    ("earningsLow", "Earnings Low"),
    ("earningsAverage", "Earnings Average"),
    ("revenueHigh", "Revenue High"),
    ("revenueLow", "Revenue Low"),
    ("revenueAverage", "Revenue Average"),
];

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendWire>,
    #[serde(default)]
    splits: HashMap<String, SplitWire>,
}

#[derive(Debug, Deserialize)]
struct DividendWire {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitWire {
    date: i64,
    numerator: Option<f64>,
    denominator: Option<f64>,
    #[serde(rename = "splitRatio")]
    split_ratio: Option<String>,
}

impl SplitWire {
    /// 4:1 → 4.0. Zero when Yahoo sends nothing usable.
    fn ratio(&self) -> f64 {
        if let (Some(n), Some(d)) = (self.numerator, self.denominator) {
            if n > 0.0 && d > 0.0 {
                return n / d;
            }
        }
        self.split_ratio
            .as_deref()
            .and_then(|r| r.split_once(':'))
            .and_then(|(n, d)| Some((n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?)))
            .filter(|(_, d)| *d > 0.0)
            .map_or(0.0, |(n, d)| n / d)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<ApiError>,
}

// ── Provider ────────────────────────────────────────────────────────

/// Tunables for [`YahooProvider`].
#[derive(Debug, Clone)]
pub struct YahooOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Scale OHLC by `adjclose / close` and report the adjusted close.
    pub auto_adjust: bool,
    pub metadata_modules: Vec<String>,
}

impl Default for YahooOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            auto_adjust: true,
            metadata_modules: DEFAULT_METADATA_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    crumb: Mutex<Option<String>>,
    options: YahooOptions,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, options: YahooOptions) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            crumb: Mutex::new(None),
            options,
        })
    }

    /// Query parameters for the chart API. `max` is sent as an explicit
    /// period because `range=max` makes Yahoo coarsen the interval.
    fn history_query(range: HistoryRange, now: i64) -> Vec<(&'static str, String)> {
        let mut query = match range {
            HistoryRange::Max => vec![
                ("period1", MAX_HISTORY_START.to_string()),
                ("period2", now.to_string()),
            ],
            other => vec![("range", other.as_str().to_string())],
        };
        query.push(("interval", "1d".into()));
        query.push(("events", "div|split".into()));
        query.push(("includeAdjustedClose", "true".into()));
        query
    }

    /// Parse the chart API response into RawRows.
    ///
    /// A listed symbol that never traded has no timestamps; that is an empty
    /// history, not an error.
    fn parse_chart(
        symbol: &str,
        resp: ChartResponse,
        auto_adjust: bool,
    ) -> Result<Vec<RawRow>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let offset = data.meta.gmtoffset;
        let events = data.events.unwrap_or_default();

        let mut dividends: HashMap<NaiveDate, f64> = HashMap::new();
        for div in events.dividends.values() {
            if let Some(ts) = local_datetime(div.date, offset) {
                *dividends.entry(ts.date()).or_insert(0.0) += div.amount;
            }
        }

        let mut splits: HashMap<NaiveDate, f64> = HashMap::new();
        for split in events.splits.values() {
            let ratio = split.ratio();
            if ratio <= 0.0 {
                continue;
            }
            if let Some(ts) = local_datetime(split.date, offset) {
                splits.insert(ts.date(), ratio);
            }
        }

        let mut rows = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = local_datetime(ts, offset).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            let open = quote.open.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();

            // Holidays and halted days come back with null prices.
            let (Some(mut open), Some(mut close)) = (open, close) else {
                continue;
            };

            let mut high = quote
                .high
                .get(i)
                .copied()
                .flatten()
                .unwrap_or(open.max(close));
            let mut low = quote
                .low
                .get(i)
                .copied()
                .flatten()
                .unwrap_or(open.min(close));
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);

            if auto_adjust {
                let adj = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
                if let Some(adj) = adj {
                    if close != 0.0 {
                        let ratio = adj / close;
                        open *= ratio;
                        high *= ratio;
                        low *= ratio;
                        close = adj;
                    }
                }
            }

            let date = timestamp.date();
            rows.push(RawRow {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
                dividends: dividends.get(&date).copied().unwrap_or(0.0),
                stock_splits: splits.get(&date).copied().unwrap_or(0.0),
            });
        }

        Ok(rows)
    }

    /// First (and only) quoteSummary result: module name → module object.
    fn parse_quote_summary(
        symbol: &str,
        resp: QuoteSummaryResponse,
    ) -> Result<Map<String, Value>, DataError> {
        let summary = resp.quote_summary;
        let result = summary.result.ok_or_else(|| match summary.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty quoteSummary with no error".into()),
        })?;

        Ok(result.into_iter().next().unwrap_or_default())
    }

    /// Merge every module into one flat record; later modules win on key clashes.
    fn metadata_from_modules(modules: Map<String, Value>) -> Metadata {
        let mut metadata = Metadata::new();
        for (_, module) in modules {
            if let Value::Object(fields) = module {
                metadata.extend(shape::normalize_object(fields));
            }
        }
        metadata
    }

    fn calendar_from_module(symbol: &str, module: Option<Value>) -> Result<CalendarData, DataError> {
        let no_data = || DataError::NoData {
            symbol: symbol.to_string(),
            resource: Resource::Calendar,
        };

        let Some(Value::Object(events)) = module else {
            return Err(no_data());
        };

        let mut calendar = Map::new();
        for (key, value) in shape::normalize_object(events) {
            match value {
                Value::Object(earnings) if key == "earnings" => {
                    for (k, v) in earnings {
                        calendar.insert(calendar_label(&k), v);
                    }
                }
                Value::Null if key == "earnings" => {}
                other => {
                    calendar.insert(calendar_label(&key), other);
                }
            }
        }

        if calendar.is_empty() {
            return Err(no_data());
        }
        Ok(CalendarData::Mapping(calendar))
    }

    fn forget_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Cached crumb token, bootstrapping the session cookie on first use.
    fn crumb(&self) -> Result<String, DataError> {
        let mut cached = self.crumb.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        // fc.yahoo.com answers 404 but still sets the session cookie.
        if let Err(e) = self.client.get(CONSENT_URL).send() {
            tracing::debug!(error = %e, "session cookie request failed");
        }

        let resp = self
            .client
            .get(CRUMB_URL)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
            });
        }
        if !status.is_success() {
            return Err(DataError::AuthenticationRequired(format!(
                "crumb request returned HTTP {status}"
            )));
        }

        let crumb = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?
            .trim()
            .to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(DataError::AuthenticationRequired(
                "crumb response was not a token".into(),
            ));
        }

        tracing::debug!("obtained Yahoo crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    fn quote_summary(&self, symbol: &str, modules: &[String]) -> Result<Map<String, Value>, DataError> {
        let url = symbol_url(QUOTE_SUMMARY_BASE, symbol)?;
        let modules = modules.join(",");
        let mut refreshed = false;

        loop {
            let crumb = self.crumb()?;
            let query = [("modules", modules.clone()), ("crumb", crumb)];
            match self.get_json::<QuoteSummaryResponse>(&url, &query, symbol) {
                Err(DataError::AuthenticationRequired(_)) if !refreshed => {
                    tracing::debug!(symbol, "crumb rejected, refreshing");
                    self.forget_crumb();
                    refreshed = true;
                }
                other => return Self::parse_quote_summary(symbol, other?),
            }
        }
    }

    /// Execute a GET with retry and circuit breaker logic, decoding JSON.
    fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                std::thread::sleep(retry_delay(self.options.base_delay, attempt, retry_after.take()));
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url.clone()).query(query).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP ban
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let secs = resp
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse::<u64>().ok());
                        tracing::debug!(symbol, attempt, retry_after = ?secs, "rate limited");
                        retry_after = secs.map(Duration::from_secs);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: secs.unwrap_or(60),
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(format!(
                            "HTTP 401 for {symbol}"
                        )));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let body: T = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        tracing::debug!(symbol, attempt, error = %e, "request failed, retrying");
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_metadata(&self, symbol: &str) -> Result<Metadata, DataError> {
        let modules = self.quote_summary(symbol, &self.options.metadata_modules)?;
        let metadata = Self::metadata_from_modules(modules);
        if metadata.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                resource: Resource::Metadata,
            });
        }
        Ok(metadata)
    }

    fn fetch_calendar(&self, symbol: &str) -> Result<CalendarData, DataError> {
        let mut modules = self.quote_summary(symbol, &[CALENDAR_MODULE.to_string()])?;
        Self::calendar_from_module(symbol, modules.remove(CALENDAR_MODULE))
    }

    fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<RawRow>, DataError> {
        let url = symbol_url(CHART_BASE, symbol)?;
        let query = Self::history_query(range, chrono::Utc::now().timestamp());
        let chart: ChartResponse = self.get_json(&url, &query, symbol)?;
        Self::parse_chart(symbol, chart, self.options.auto_adjust)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

/// Epoch seconds shifted into exchange-local wall time.
fn local_datetime(ts: i64, gmtoffset: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.naive_utc())
}

fn calendar_label(key: &str) -> String {
    CALENDAR_LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map_or_else(|| key.to_string(), |(_, label)| label.to_string())
}

/// `base` with the ticker appended as one encoded path segment.
fn symbol_url(base: &str, symbol: &str) -> Result<Url, DataError> {
    let mut url =
        Url::parse(base).map_err(|e| DataError::Other(format!("invalid URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| DataError::Other(format!("URL {base} cannot take a path segment")))?
        .push(symbol);
    Ok(url)
}

/// Exponential backoff, stretched to a server `retry-after` (capped) when longer.
fn retry_delay(base: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let backoff = base * 2u32.pow(attempt.saturating_sub(1));
    match retry_after {
        Some(wait) => backoff.max(wait.min(MAX_RETRY_AFTER)),
        None => backoff,
    }
}
