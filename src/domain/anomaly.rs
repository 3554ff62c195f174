//! Volume anomaly detection.
//!
//! The latest bar is compared with the average volume of the `window` bars
//! that end just before it. `scan_volume` runs the check over a watch list.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::domain::ohlcv::{Bar, normalize_series};
use crate::domain::settings::ScanSettings;
use crate::ports::data_port::DataPort;

const SCAN_INTERVAL: &str = "1d";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeAnomaly {
    pub latest_volume: i64,
    pub average_volume: f64,
    pub spike_percent: f64,
    pub message: String,
}

pub fn detect_volume_spike(bars: &[Bar], window: usize, threshold: f64) -> Option<VolumeAnomaly> {
    if window == 0 || bars.len() < window + 2 {
        return None;
    }
    let last = bars.len() - 1;
    // window ending at the second-to-last bar
    let history = &bars[last - window..last];
    let average = history.iter().map(|b| b.volume as f64).sum::<f64>() / window as f64;
    if average == 0.0 || !average.is_finite() {
        return None;
    }

    let latest = bars[last].volume;
    tracing::debug!(
        latest,
        average,
        threshold = average * threshold,
        "volume check"
    );
    if (latest as f64) <= average * threshold {
        return None;
    }

    let spike_percent = latest as f64 / average * 100.0;
    Some(VolumeAnomaly {
        latest_volume: latest,
        average_volume: average,
        spike_percent,
        message: format!(
            "Unusual Volume: Today's volume is {spike_percent:.0}% of the {window}-day average."
        ),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanAlert {
    pub symbol: String,
    #[serde(flatten)]
    pub anomaly: VolumeAnomaly,
}

/// Calendar days that cover `window + 2` daily sessions with room for
/// weekends and exchange holidays.
pub fn scan_lookback_days(window: usize) -> i64 {
    (((window + 2) * 7).div_ceil(5) + 7) as i64
}

/// Check every configured symbol's daily bars up to `now`.
///
/// A symbol whose fetch fails is logged and skipped.
pub fn scan_volume(
    data: &dyn DataPort,
    settings: &ScanSettings,
    now: NaiveDateTime,
) -> Vec<ScanAlert> {
    let span = tracing::info_span!("scan.volume", symbols = settings.symbols.len());
    let _enter = span.enter();

    let start = now - Duration::days(scan_lookback_days(settings.window));
    let mut alerts = Vec::new();
    for symbol in &settings.symbols {
        let bars = match data.fetch_bars(symbol, SCAN_INTERVAL, start, now) {
            Ok(bars) => normalize_series(bars),
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "skipping symbol");
                continue;
            }
        };
        if let Some(anomaly) = detect_volume_spike(&bars, settings.window, settings.threshold) {
            tracing::info!(symbol = %symbol, spike_percent = anomaly.spike_percent, "volume anomaly");
            alerts.push(ScanAlert {
                symbol: symbol.clone(),
                anomaly,
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn with_volumes(volumes: &[i64]) -> Vec<Bar> {
        let mut bars = make_bars(&vec![100.0; volumes.len()]);
        for (bar, &v) in bars.iter_mut().zip(volumes) {
            bar.volume = v;
        }
        bars
    }

    #[test]
    fn spike_is_reported() {
        // 22 bars: first is outside the window, 20 of 1000, then 2500
        let mut volumes = vec![50_000];
        volumes.extend(std::iter::repeat_n(1000, 20));
        volumes.push(2500);
        let anomaly = detect_volume_spike(&with_volumes(&volumes), 20, 1.5).unwrap();
        assert_eq!(anomaly.average_volume, 1000.0);
        assert_eq!(anomaly.spike_percent, 250.0);
        assert_eq!(
            anomaly.message,
            "Unusual Volume: Today's volume is 250% of the 20-day average."
        );
    }

    #[test]
    fn below_threshold_is_quiet() {
        let mut volumes = vec![1000; 21];
        volumes.push(1500);
        assert!(detect_volume_spike(&with_volumes(&volumes), 20, 1.5).is_none());
    }

    #[test]
    fn needs_window_plus_two_bars() {
        let mut volumes = vec![1000; 20];
        volumes.push(9000);
        assert_eq!(volumes.len(), 21);
        assert!(detect_volume_spike(&with_volumes(&volumes), 20, 1.5).is_none());
    }

    #[test]
    fn zero_average_is_ignored() {
        let mut volumes = vec![0; 21];
        volumes.push(1000);
        assert!(detect_volume_spike(&with_volumes(&volumes), 20, 1.5).is_none());
    }

    #[test]
    fn window_is_substituted_in_message() {
        let volumes = [10, 10, 10, 100];
        let anomaly = detect_volume_spike(&with_volumes(&volumes), 2, 1.5).unwrap();
        assert!(anomaly.message.ends_with("of the 2-day average."));
        assert_eq!(anomaly.message, "Unusual Volume: Today's volume is 1000% of the 2-day average.");
    }

    struct MapData(Vec<(&'static str, Vec<i64>)>);

    impl DataPort for MapData {
        fn fetch_bars(
            &self,
            symbol: &str,
            _interval: &str,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> Result<Vec<Bar>, crate::domain::error::PatternIqError> {
            self.0
                .iter()
                .find(|(s, _)| *s == symbol)
                .map(|(_, v)| with_volumes(v))
                .ok_or_else(|| crate::domain::error::PatternIqError::service("test", "offline"))
        }
    }

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap()
    }

    #[test]
    fn lookback_covers_window() {
        assert_eq!(scan_lookback_days(20), 38);
        assert!(scan_lookback_days(20) * 5 / 7 >= 22);
    }

    #[test]
    fn scan_reports_spikes_and_skips_failures() {
        let mut spiky = vec![1000; 21];
        spiky.push(3000);
        let quiet = vec![1000; 22];
        let data = MapData(vec![("TCS", spiky), ("INFY", quiet)]);
        let settings = ScanSettings {
            symbols: vec!["TCS".into(), "BROKEN".into(), "INFY".into()],
            window: 20,
            threshold: 1.5,
        };

        let alerts = scan_volume(&data, &settings, now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].symbol, "TCS");
        assert_eq!(alerts[0].anomaly.spike_percent, 300.0);

        let json = serde_json::to_value(&alerts[0]).unwrap();
        assert_eq!(json["symbol"], "TCS");
        assert_eq!(json["latest_volume"], 3000);
    }
}
