//! Offline interpretation adapter.
//!
//! Serves a fixed structured spec (same JSON shape the remote service
//! returns) and an optional predicate file. With no spec at all, the
//! strategy text itself becomes the entry condition for template matching.

use std::fs;
use std::path::Path;

use crate::domain::error::{PatternIqError, SignalEvaluationError};
use crate::domain::strategy::{
    PatternName, PredicateSource, StrategySpec, parse_strategy_response,
};
use crate::ports::interpretation_port::InterpretationPort;

#[derive(Debug, Clone, Default)]
pub struct StaticInterpreter {
    spec_json: Option<String>,
    predicate: Option<String>,
}

impl StaticInterpreter {
    pub fn new(spec_json: Option<String>, predicate: Option<String>) -> Self {
        Self {
            spec_json,
            predicate,
        }
    }

    /// Interpret every strategy text as a template entry condition.
    pub fn templates_only() -> Self {
        Self::default()
    }

    pub fn from_files(
        spec_path: Option<&Path>,
        predicate_path: Option<&Path>,
    ) -> Result<Self, PatternIqError> {
        let spec_json = spec_path.map(fs::read_to_string).transpose()?;
        let predicate = predicate_path.map(fs::read_to_string).transpose()?;
        Ok(Self::new(spec_json, predicate))
    }
}

impl InterpretationPort for StaticInterpreter {
    fn interpret(&self, strategy_text: &str) -> Result<StrategySpec, PatternIqError> {
        match &self.spec_json {
            Some(json) => parse_strategy_response(json),
            None => Ok(StrategySpec {
                entry_condition: strategy_text.trim().to_string(),
                pattern: PatternName::None,
                required_indicators: Vec::new(),
            }),
        }
    }

    fn generate_predicate(
        &self,
        _spec: &StrategySpec,
        _columns: &[String],
    ) -> Result<PredicateSource, SignalEvaluationError> {
        self.predicate
            .as_deref()
            .map(PredicateSource::new)
            .ok_or(SignalEvaluationError::MissingPredicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn serves_fixed_spec() {
        let interp = StaticInterpreter::new(
            Some(r#"{"entry_condition":"RSI below 30","pattern_to_find":"none","required_indicators":["RSI"]}"#.into()),
            None,
        );
        let spec = interp.interpret("ignored").unwrap();
        assert_eq!(spec.entry_condition, "RSI below 30");
        assert!(spec.pattern.is_none());
        assert_eq!(spec.required_indicators, vec!["RSI".to_string()]);
    }

    #[test]
    fn malformed_spec_is_strategy_parse_error() {
        let interp = StaticInterpreter::new(Some("{not json".into()), None);
        assert!(matches!(
            interp.interpret("x"),
            Err(PatternIqError::StrategyParse { .. })
        ));
    }

    #[test]
    fn templates_only_uses_strategy_text() {
        let spec = StaticInterpreter::templates_only()
            .interpret("  golden cross ")
            .unwrap();
        assert_eq!(spec.entry_condition, "golden cross");
        assert!(spec.pattern.is_none());
    }

    #[test]
    fn predicate_comes_from_file() {
        let mut spec_file = NamedTempFile::new().unwrap();
        write!(
            spec_file,
            r#"{{"entry_condition":"bounce","pattern_to_find":"support_bounce"}}"#
        )
        .unwrap();
        let mut pred_file = NamedTempFile::new().unwrap();
        write!(pred_file, "```\nCROSS_ABOVE(close, SUPPORT(3))\n```").unwrap();

        let interp =
            StaticInterpreter::from_files(Some(spec_file.path()), Some(pred_file.path())).unwrap();
        let spec = interp.interpret("").unwrap();
        assert_eq!(spec.pattern.as_str(), "support_bounce");
        let source = interp.generate_predicate(&spec, &[]).unwrap();
        assert_eq!(source.as_str(), "CROSS_ABOVE(close, SUPPORT(3))");
    }

    #[test]
    fn missing_predicate_is_recoverable_error() {
        let interp = StaticInterpreter::templates_only();
        let spec = interp.interpret("x").unwrap();
        assert_eq!(
            interp.generate_predicate(&spec, &[]),
            Err(SignalEvaluationError::MissingPredicate)
        );
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let err = StaticInterpreter::from_files(Some(Path::new("/nonexistent/spec.json")), None)
            .unwrap_err();
        assert!(matches!(err, PatternIqError::Io(_)));
    }
}
