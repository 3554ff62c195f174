//! Gemini `generateContent` adapter.
//!
//! One HTTP client serves both the interpretation port (strategy parsing and
//! predicate generation) and the narrative port (analyst commentary).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::domain::backtest::BacktestRequest;
use crate::domain::error::{PatternIqError, SignalEvaluationError};
use crate::domain::metrics::PerformanceSummary;
use crate::domain::narrative::report_facts;
use crate::domain::settings::LlmSettings;
use crate::domain::strategy::{PredicateSource, StrategySpec, parse_strategy_response};
use crate::ports::interpretation_port::InterpretationPort;
use crate::ports::narrative_port::NarrativePort;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct GeminiAdapter {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout_ms: u64,
}

impl GeminiAdapter {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout_ms: u64,
    ) -> Result<Self, PatternIqError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| gemini_error(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout_ms,
        })
    }

    /// Build from settings, falling back to `GEMINI_API_KEY` when the config
    /// file has no key.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, PatternIqError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PatternIqError::ConfigMissing {
                section: "llm".into(),
                key: format!("api_key (or {API_KEY_ENV})"),
            })?;
        Self::new(&settings.base_url, &settings.model, &api_key, settings.timeout_ms)
    }

    /// Send one prompt and return the first candidate's text.
    pub fn generate(&self, prompt: &str) -> Result<String, PatternIqError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let span = tracing::info_span!(
            "llm.gemini.generate",
            endpoint = %endpoint,
            timeout_ms = self.timeout_ms,
            prompt_bytes = prompt.len()
        );
        let _enter = span.enter();

        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let resp = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| gemini_error(format!("request failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(gemini_error(format!("status {}", status.as_u16())));
        }
        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| gemini_error(format!("failed to parse response: {e}")))?;
        let text = first_candidate_text(parsed)?;
        tracing::debug!(response_bytes = text.len(), "generation complete");
        Ok(text)
    }
}

fn gemini_error(reason: impl Into<String>) -> PatternIqError {
    PatternIqError::service("gemini", reason)
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn first_candidate_text(resp: GenerateResponse) -> Result<String, PatternIqError> {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| gemini_error("empty response"))
}

pub fn parsing_prompt(strategy_text: &str) -> String {
    format!(
        r#"You are a trading strategy analysis bot. Your only job is to parse the user's plain-English strategy into a structured JSON object.
The user's strategy is: "{strategy_text}"

Return ONLY the JSON object with these keys:
1. "entry_condition": a short description of the main entry signal (e.g. "RSI is below 30", "Price bounces off support").
2. "pattern_to_find": the chart pattern if the strategy involves one (e.g. "support_bounce", "resistance_breakout"), otherwise "none".
3. "required_indicators": the technical indicators needed (e.g. ["RSI", "MACD", "SMA_50"]).

Example:
- User: "Buy when the price bounces off a support level, but only if it's also above the 50-day moving average."
- Output: {{"entry_condition": "Price bounces off support level", "pattern_to_find": "support_bounce", "required_indicators": ["SMA_50"]}}"#
    )
}

const PREDICATE_GRAMMAR: &str = "\
Operands: open, high, low, close, volume, numbers, SMA(n), EMA(n), RSI(n), \
MACD_LINE(f,s,g), MACD_SIGNAL(f,s,g), MACD_HISTOGRAM(f,s,g), RESISTANCE(n), \
SUPPORT(n), COLUMN(name).
Rules: ABOVE(a, b), BELOW(a, b), CROSS_ABOVE(a, b), CROSS_BELOW(a, b), \
EQUALS(a, b), BETWEEN(a, low, high), AND(r1, r2, ...), OR(r1, r2, ...), \
NOT(r), CONSECUTIVE(r, n), ANY_OF(r, n).
RESISTANCE(n) and SUPPORT(n) are the most recent confirmed pivot high/low \
with n bars on each side.";

pub fn predicate_prompt(spec: &StrategySpec, columns: &[String]) -> String {
    let available = columns
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"You are an expert in technical analysis. Write a single entry rule that is true on the bars where the pattern "{pattern}" ({condition}) gives an entry signal.

The rule is evaluated once per bar. The data has the following columns: {available}.
You MUST ONLY use these available columns or the operands below. Do NOT invent columns.

{grammar}

Example: AND(CROSS_ABOVE(close, RESISTANCE(5)), ABOVE(volume, COLUMN(SMA_20)))

Provide ONLY the rule, nothing else."#,
        pattern = spec.pattern.as_str(),
        condition = spec.entry_condition,
        grammar = PREDICATE_GRAMMAR,
    )
}

pub fn analysis_prompt(summary: &PerformanceSummary, request: &BacktestRequest) -> String {
    format!(
        r#"**Instruction:** You are a trading analysis engine. Your sole function is to analyze the provided backtest report and generate a structured analysis in Markdown format. Do not ask for more information. Do not act like a conversational chatbot. Analyze only the data provided.

**Backtest Report Data:**
{facts}

**Required Output Format (Use this exact Markdown structure):**

### Executive Summary
[State whether the strategy was profitable and how well it managed risk, based on Profit Factor and Max Drawdown.]

### Performance Breakdown
**Profitability:** [Explain the relationship between Win Rate and Profit Factor.]
**Risk Management:** [Comment on the Max Drawdown relative to the return.]

### Actionable Insight & Suggestion
[A specific, data-driven suggestion. If there were no trades, explain why. If performance was poor, suggest a specific parameter change.]"#,
        facts = report_facts(summary, request),
    )
}

impl InterpretationPort for GeminiAdapter {
    fn interpret(&self, strategy_text: &str) -> Result<StrategySpec, PatternIqError> {
        let text = self.generate(&parsing_prompt(strategy_text))?;
        parse_strategy_response(&text)
    }

    fn generate_predicate(
        &self,
        spec: &StrategySpec,
        columns: &[String],
    ) -> Result<PredicateSource, SignalEvaluationError> {
        let text = self
            .generate(&predicate_prompt(spec, columns))
            .map_err(|e| SignalEvaluationError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(PredicateSource::new(&text))
    }
}

impl NarrativePort for GeminiAdapter {
    fn narrate(
        &self,
        summary: &PerformanceSummary,
        request: &BacktestRequest,
    ) -> Result<String, PatternIqError> {
        self.generate(&analysis_prompt(summary, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::Settings;
    use crate::domain::strategy::PatternName;

    fn request() -> BacktestRequest {
        BacktestRequest {
            symbol: "RELIANCE".into(),
            interval: "1d".into(),
            capital: 100_000.0,
            risk_percent: 2.0,
            sl_percent: 2.0,
            target_percent: 4.0,
            strategy_text: "Buy when RSI is below 30".into(),
        }
    }

    #[test]
    fn extracts_first_candidate_text() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"  hello \n"}],"role":"model"}},
                              {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_candidate_text(resp).unwrap(), "hello");
    }

    #[test]
    fn empty_candidates_are_service_errors() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        let err = first_candidate_text(resp).unwrap_err();
        assert!(matches!(err, PatternIqError::Service { ref service, .. } if service == "gemini"));
    }

    #[test]
    fn parsing_prompt_quotes_strategy() {
        let prompt = parsing_prompt("Buy on a golden cross");
        assert!(prompt.contains(r#"The user's strategy is: "Buy on a golden cross""#));
        assert!(prompt.contains(r#""pattern_to_find": "support_bounce""#));
    }

    #[test]
    fn predicate_prompt_lists_columns_and_grammar() {
        let spec = StrategySpec {
            entry_condition: "Price bounces off support".into(),
            pattern: PatternName::parse("support_bounce"),
            required_indicators: vec!["SMA_50".into()],
        };
        let columns = vec!["close".to_string(), "SMA_50".to_string()];
        let prompt = predicate_prompt(&spec, &columns);
        assert!(prompt.contains("'close', 'SMA_50'"));
        assert!(prompt.contains("support_bounce"));
        assert!(prompt.contains("CROSS_ABOVE(a, b)"));
        assert!(prompt.contains("MUST ONLY use these available columns"));
    }

    #[test]
    fn analysis_prompt_embeds_report_facts() {
        let summary = PerformanceSummary {
            starting_capital: 100_000.0,
            final_equity: 112_345.0,
            pnl: 12_345.0,
            pnl_percent: 12.345,
            win_rate: 60.0,
            profit_factor: 1.8,
            max_drawdown: 4.2,
            num_trades: 5,
            ..PerformanceSummary::default()
        };
        let prompt = analysis_prompt(&summary, &request());
        assert!(prompt.starts_with("**Instruction:** You are a trading analysis engine."));
        assert!(prompt.contains("- **Final Equity:** ₹112,345"));
        assert!(prompt.contains("- **Total Trades:** 5"));
        assert!(prompt.contains("### Actionable Insight & Suggestion"));
    }

    #[test]
    fn configured_api_key_builds_client() {
        let settings = LlmSettings {
            api_key: Some("test-key".into()),
            ..Settings::default().llm
        };
        assert!(GeminiAdapter::from_settings(&settings).is_ok());
    }
}
