//! Domain error types.
//!
//! `PatternIqError` is the fatal path: any variant aborts the backtest.
//! `SignalEvaluationError` is recoverable and never escapes the signal
//! evaluator; it is logged and replaced by an all-false signal.

/// A parse error with position information for predicate parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for patterniq.
#[derive(Debug, thiserror::Error)]
pub enum PatternIqError {
    #[error("could not interpret strategy: {reason}")]
    StrategyParse { reason: String },

    #[error("no data found for {symbol} at interval {interval}")]
    NoData { symbol: String, interval: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid request field {field}: {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("simulation invariant violated: {reason}")]
    SimulationInvariant { reason: String },

    #[error("{service} service error: {reason}")]
    Service { service: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    PredicateParse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PatternIqError {
    pub fn invalid_request(field: &str, reason: impl Into<String>) -> Self {
        PatternIqError::InvalidRequest {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn service(service: &str, reason: impl Into<String>) -> Self {
        PatternIqError::Service {
            service: service.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors caused by the caller's input rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PatternIqError::StrategyParse { .. }
                | PatternIqError::NoData { .. }
                | PatternIqError::InsufficientData { .. }
                | PatternIqError::InvalidRequest { .. }
                | PatternIqError::PredicateParse(_)
        )
    }
}

impl From<&PatternIqError> for std::process::ExitCode {
    fn from(err: &PatternIqError) -> Self {
        let code: u8 = match err {
            PatternIqError::Io(_) => 1,
            PatternIqError::ConfigParse { .. }
            | PatternIqError::ConfigMissing { .. }
            | PatternIqError::ConfigInvalid { .. } => 2,
            PatternIqError::Service { .. } => 3,
            PatternIqError::StrategyParse { .. }
            | PatternIqError::PredicateParse(_)
            | PatternIqError::InvalidRequest { .. } => 4,
            PatternIqError::NoData { .. } | PatternIqError::InsufficientData { .. } => 5,
            PatternIqError::SimulationInvariant { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

/// Why a dynamic predicate could not produce a usable signal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalEvaluationError {
    #[error("pattern strategy has no predicate")]
    MissingPredicate,

    #[error("predicate could not be obtained: {reason}")]
    Unavailable { reason: String },

    #[error("predicate rejected: {reason}")]
    Rejected { reason: String },

    #[error("predicate does not compile: {0}")]
    Compile(ParseError),

    #[error("predicate exceeded its time budget of {budget_ms} ms")]
    TimedOut { budget_ms: u64 },

    #[error("predicate exhausted its evaluation fuel ({fuel} steps)")]
    FuelExhausted { fuel: u64 },

    #[error("predicate returned {actual} signals for {expected} bars")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("predicate faulted: {reason}")]
    Faulted { reason: String },

    #[error("sandbox codec error: {reason}")]
    Codec { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_context_places_caret() {
        let err = ParseError {
            message: "expected ')'".into(),
            position: 6,
        };
        let rendered = err.display_with_context("ABOVE(close");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ABOVE(close");
        assert_eq!(lines[1], "      ^");
        assert!(lines[2].contains("position 6"));
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(
            PatternIqError::StrategyParse {
                reason: "bad json".into()
            }
            .is_client_error()
        );
        assert!(
            PatternIqError::NoData {
                symbol: "TCS".into(),
                interval: "1d".into()
            }
            .is_client_error()
        );
        assert!(
            !PatternIqError::SimulationInvariant {
                reason: "NaN".into()
            }
            .is_client_error()
        );
        assert!(!PatternIqError::service("llm", "timeout").is_client_error());
    }

    #[test]
    fn signal_error_messages() {
        let err = SignalEvaluationError::LengthMismatch {
            expected: 10,
            actual: 9,
        };
        assert_eq!(err.to_string(), "predicate returned 9 signals for 10 bars");
        let err = SignalEvaluationError::TimedOut { budget_ms: 250 };
        assert!(err.to_string().contains("250 ms"));
    }
}
