//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::PatternIqError;
use crate::domain::report::Report;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter;

/// Pretty-printed report, as written to disk and returned by the HTTP API.
pub fn render_json(report: &Report) -> Result<String, PatternIqError> {
    serde_json::to_string_pretty(report).map_err(|e| PatternIqError::Io(e.into()))
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &Report, output_path: &Path) -> Result<(), PatternIqError> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut json = render_json(report)?;
        json.push('\n');
        fs::write(output_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalSource;
    use tempfile::TempDir;

    fn report() -> Report {
        Report {
            symbol: "TCS".into(),
            interval: "1d".into(),
            pnl: 1500.0,
            pnl_percent: 1.5,
            win_rate: 100.0,
            num_trades: 1,
            max_drawdown: 0.0,
            profit_factor: 999.0,
            final_equity: 101_500.0,
            equity_curve: Vec::new(),
            drawdown_curve: Vec::new(),
            trades: Vec::new(),
            signal_source: SignalSource::Template,
            bars_evaluated: 30,
            narrative: "### Executive Summary\nfine".into(),
        }
    }

    #[test]
    fn writes_pretty_json_creating_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("tcs.json");
        JsonReportAdapter.write(&report(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"symbol\": \"TCS\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["num_trades"], 1);
        assert_eq!(value["final_equity"], 101500.0);
        assert_eq!(value["signal_source"], "template");
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = JsonReportAdapter
            .write(&report(), &blocker.join("report.json"))
            .unwrap_err();
        assert!(matches!(err, PatternIqError::Io(_)));
    }
}
