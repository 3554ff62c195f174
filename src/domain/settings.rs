//! Runtime settings.
//!
//! Built once from a `ConfigPort` and handed to the adapters and the
//! orchestrator at construction time. Every key is optional; missing keys take
//! the defaults below.

use crate::domain::config_validation::validate_config;
use crate::domain::error::PatternIqError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_LLM_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_SCAN_SYMBOLS: &[&str] = &[
    "RELIANCE",
    "TCS",
    "HDFCBANK",
    "INFY",
    "HINDUNILVR",
    "ICICIBANK",
    "BHARTIARTL",
    "SBIN",
    "ITC",
    "LT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProvider {
    Yahoo,
    Csv,
}

impl DataProvider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "yahoo" => Some(DataProvider::Yahoo),
            "csv" => Some(DataProvider::Csv),
            _ => None,
        }
    }
}

/// How far back the orchestrator fetches, by interval class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback {
    pub intraday_days: i64,
    pub daily_days: i64,
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback {
            intraday_days: 59,
            daily_days: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub provider: DataProvider,
    pub csv_dir: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub lookback: Lookback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Config value only; the HTTP adapter falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxSettings {
    pub time_budget_ms: u64,
    pub fuel: u64,
    pub max_source_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub symbols: Vec<String>,
    pub window: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data: DataSettings,
    pub llm: LlmSettings,
    pub sandbox: SandboxSettings,
    pub listen: String,
    pub log: LogSettings,
    pub scan: ScanSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data: DataSettings {
                provider: DataProvider::Yahoo,
                csv_dir: "data".into(),
                base_url: DEFAULT_YAHOO_URL.into(),
                timeout_ms: 10_000,
                lookback: Lookback::default(),
            },
            llm: LlmSettings {
                base_url: DEFAULT_LLM_URL.into(),
                model: DEFAULT_LLM_MODEL.into(),
                api_key: None,
                timeout_ms: 30_000,
            },
            sandbox: SandboxSettings {
                time_budget_ms: 2_000,
                fuel: 5_000_000,
                max_source_bytes: 16 * 1024,
            },
            listen: DEFAULT_LISTEN.into(),
            log: LogSettings {
                level: "info".into(),
                json: false,
            },
            scan: ScanSettings {
                symbols: DEFAULT_SCAN_SYMBOLS.iter().map(|s| s.to_string()).collect(),
                window: 20,
                threshold: 1.5,
            },
        }
    }
}

impl Settings {
    /// Validate `config` and overlay its values on the defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PatternIqError> {
        validate_config(config)?;
        let d = Settings::default();

        let provider = config
            .get_string("data", "provider")
            .and_then(|p| DataProvider::parse(&p))
            .unwrap_or(d.data.provider);

        let symbols = config
            .get_string("scan", "symbols")
            .map(|s| parse_symbols(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or(d.scan.symbols);

        Ok(Settings {
            data: DataSettings {
                provider,
                csv_dir: config.get_string_or("data", "csv_dir", &d.data.csv_dir),
                base_url: config.get_string_or("data", "base_url", &d.data.base_url),
                timeout_ms: config.get_int("data", "timeout_ms", d.data.timeout_ms as i64) as u64,
                lookback: Lookback {
                    intraday_days: config.get_int(
                        "data",
                        "intraday_lookback_days",
                        d.data.lookback.intraday_days,
                    ),
                    daily_days: config.get_int(
                        "data",
                        "daily_lookback_days",
                        d.data.lookback.daily_days,
                    ),
                },
            },
            llm: LlmSettings {
                base_url: config.get_string_or("llm", "base_url", &d.llm.base_url),
                model: config.get_string_or("llm", "model", &d.llm.model),
                api_key: config
                    .get_string("llm", "api_key")
                    .filter(|k| !k.trim().is_empty()),
                timeout_ms: config.get_int("llm", "timeout_ms", d.llm.timeout_ms as i64) as u64,
            },
            sandbox: SandboxSettings {
                time_budget_ms: config.get_int(
                    "sandbox",
                    "time_budget_ms",
                    d.sandbox.time_budget_ms as i64,
                ) as u64,
                fuel: config.get_int("sandbox", "fuel", d.sandbox.fuel as i64) as u64,
                max_source_bytes: config.get_int(
                    "sandbox",
                    "max_source_bytes",
                    d.sandbox.max_source_bytes as i64,
                ) as usize,
            },
            listen: config.get_string_or("web", "listen", &d.listen),
            log: LogSettings {
                level: config.get_string_or("log", "level", &d.log.level),
                json: config.get_string_or("log", "format", "text").eq_ignore_ascii_case("json"),
            },
            scan: ScanSettings {
                symbols,
                window: config.get_int("scan", "window", d.scan.window as i64) as usize,
                threshold: config.get_double("scan", "threshold", d.scan.threshold),
            },
        })
    }
}

/// Split a comma-separated symbol list, upper-casing and dropping blanks.
pub fn parse_symbols(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
