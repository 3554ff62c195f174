//! Configuration validation.
//!
//! Rejects out-of-range values before any I/O happens. Every key is optional;
//! only keys that are present are checked.

use std::net::SocketAddr;

use crate::domain::error::PatternIqError;
use crate::domain::settings::DataProvider;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    validate_data(config)?;
    validate_llm(config)?;
    validate_sandbox(config)?;
    validate_web(config)?;
    validate_log(config)?;
    validate_scan(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PatternIqError {
    PatternIqError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn require_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), PatternIqError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(());
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(()),
        Ok(_) => Err(invalid(section, key, format!("{key} must be positive"))),
        Err(_) => Err(invalid(section, key, format!("{key} must be an integer"))),
    }
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    if let Some(provider) = config.get_string("data", "provider") {
        if DataProvider::parse(&provider).is_none() {
            return Err(invalid(
                "data",
                "provider",
                format!("unknown provider '{provider}', expected yahoo or csv"),
            ));
        }
    }
    require_positive_int(config, "data", "timeout_ms")?;
    require_positive_int(config, "data", "intraday_lookback_days")?;
    require_positive_int(config, "data", "daily_lookback_days")?;
    Ok(())
}

fn validate_llm(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    require_positive_int(config, "llm", "timeout_ms")
}

fn validate_sandbox(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    require_positive_int(config, "sandbox", "time_budget_ms")?;
    require_positive_int(config, "sandbox", "fuel")?;
    require_positive_int(config, "sandbox", "max_source_bytes")?;
    Ok(())
}

fn validate_web(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    if let Some(listen) = config.get_string("web", "listen") {
        if listen.trim().parse::<SocketAddr>().is_err() {
            return Err(invalid(
                "web",
                "listen",
                format!("'{listen}' is not a socket address"),
            ));
        }
    }
    Ok(())
}

fn validate_log(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    if let Some(format) = config.get_string("log", "format") {
        match format.trim().to_lowercase().as_str() {
            "json" | "text" => {}
            _ => {
                return Err(invalid("log", "format", "format must be json or text"));
            }
        }
    }
    Ok(())
}

fn validate_scan(config: &dyn ConfigPort) -> Result<(), PatternIqError> {
    require_positive_int(config, "scan", "window")?;
    if config.get_string("scan", "threshold").is_some() {
        let threshold = config.get_double("scan", "threshold", f64::NAN);
        if threshold.is_nan() || threshold <= 1.0 {
            return Err(invalid(
                "scan",
                "threshold",
                "threshold must be a number greater than 1",
            ));
        }
    }
    Ok(())
}
