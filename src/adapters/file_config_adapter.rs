//! INI file configuration adapter.

use configparser::ini::Ini;
use std::path::Path;

use crate::domain::error::PatternIqError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PatternIqError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| PatternIqError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, PatternIqError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| PatternIqError::ConfigParse {
                file: "<inline>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).map(|v| v.trim().to_string())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[data]
provider = csv
csv_dir = /var/lib/bars

[llm]
model = gemini-1.5-flash-latest
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("data", "provider"), Some("csv".to_string()));
        assert_eq!(
            adapter.get_string("llm", "model"),
            Some("gemini-1.5-flash-latest".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[data]\nprovider = yahoo\n").unwrap();
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_string_or_skips_blank_values() {
        let adapter = FileConfigAdapter::from_string("[web]\nlisten =   \n").unwrap();
        assert_eq!(adapter.get_string_or("web", "listen", "127.0.0.1:8000"), "127.0.0.1:8000");
    }

    #[test]
    fn numeric_getters_fall_back_on_garbage() {
        let adapter = FileConfigAdapter::from_string(
            "[sandbox]\nfuel = 1000\ntime_budget_ms = soon\n[scan]\nthreshold = 1.75\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("sandbox", "fuel", 0), 1000);
        assert_eq!(adapter.get_int("sandbox", "time_budget_ms", 42), 42);
        assert_eq!(adapter.get_int("sandbox", "missing", 7), 7);
        assert_eq!(adapter.get_double("scan", "threshold", 0.0), 1.75);
        assert_eq!(adapter.get_double("scan", "window", 9.5), 9.5);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[flags]\na = true\nb = Yes\nc = 1\nd = off\ne = no\nf = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("flags", "a", false));
        assert!(adapter.get_bool("flags", "b", false));
        assert!(adapter.get_bool("flags", "c", false));
        assert!(!adapter.get_bool("flags", "d", true));
        assert!(!adapter.get_bool("flags", "e", true));
        assert!(adapter.get_bool("flags", "f", true));
        assert!(!adapter.get_bool("flags", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[log]\nformat = json\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("log", "format"), Some("json".to_string()));
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/patterniq.ini").unwrap_err();
        assert!(
            matches!(err, PatternIqError::ConfigParse { ref file, .. } if file.contains("patterniq.ini"))
        );
    }
}
