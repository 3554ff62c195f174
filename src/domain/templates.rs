//! Built-in entry templates.
//!
//! When the interpreted strategy names no chart pattern, its entry condition
//! is matched against a small set of well-known phrasings ("RSI is below 30",
//! "golden cross", ...). A match yields a trusted `Rule` evaluated directly,
//! without the sandbox.

use crate::domain::indicator::{
    DEFAULT_RSI_PERIOD, IndicatorType,
    macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW},
    valid_period,
};
use crate::domain::rule::{IndicatorField, IndicatorRef, Operand, Rule};

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: &'static str,
    pub rule: Rule,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Above,
    Below,
}

/// Match an entry condition against the built-in templates.
///
/// Matching is case-insensitive and ignores punctuation. Returns `None` when
/// no template applies.
pub fn match_template(entry_condition: &str) -> Option<Template> {
    let tokens = tokenize(entry_condition);
    let has = |w: &str| tokens.iter().any(|t| t == w);

    if has("golden") && has("cross") {
        return Some(Template {
            name: "golden_cross",
            rule: Rule::CrossAbove {
                left: Operand::indicator(IndicatorType::Sma(50)),
                right: Operand::indicator(IndicatorType::Sma(200)),
            },
        });
    }
    if has("death") && has("cross") {
        return Some(Template {
            name: "death_cross",
            rule: Rule::CrossBelow {
                left: Operand::indicator(IndicatorType::Sma(50)),
                right: Operand::indicator(IndicatorType::Sma(200)),
            },
        });
    }

    if has("macd") {
        return macd_template(&tokens);
    }
    if tokens.iter().any(|t| is_rsi_word(t)) {
        return rsi_template(&tokens);
    }
    moving_average_template(&tokens)
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_rsi_word(token: &str) -> bool {
    matches!(token, "rsi" | "oscillator")
}

fn direction_at(token: &str) -> Option<Direction> {
    match token {
        "above" | "over" | "exceeds" | "greater" => Some(Direction::Above),
        "below" | "under" | "less" => Some(Direction::Below),
        _ => None,
    }
}

fn first_direction(tokens: &[String]) -> Option<(usize, Direction)> {
    tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| direction_at(t).map(|d| (i, d)))
}

fn number_after(tokens: &[String], from: usize) -> Option<f64> {
    tokens[from..].iter().find_map(|t| t.parse::<f64>().ok())
}

fn compare(dir: Direction, left: Operand, right: Operand) -> Rule {
    match dir {
        Direction::Above => Rule::Above { left, right },
        Direction::Below => Rule::Below { left, right },
    }
}

fn rsi_template(tokens: &[String]) -> Option<Template> {
    let (dir_idx, dir) = first_direction(tokens)?;
    let threshold = number_after(tokens, dir_idx + 1)?;

    // "RSI 7 below 20" / "RSI(7) below 20": a number between RSI and the direction is the period.
    let rsi_idx = tokens.iter().position(|t| is_rsi_word(t))?;
    let explicit = if rsi_idx < dir_idx {
        tokens[rsi_idx + 1..dir_idx]
            .iter()
            .find(|t| t.bytes().all(|b| b.is_ascii_digit()))
    } else {
        None
    };
    let period = match explicit {
        Some(t) => t.parse::<usize>().ok().filter(|&p| valid_period(p))?,
        None => DEFAULT_RSI_PERIOD,
    };

    Some(Template {
        name: match dir {
            Direction::Above => "rsi_above",
            Direction::Below => "rsi_below",
        },
        rule: compare(
            dir,
            Operand::indicator(IndicatorType::Rsi(period)),
            Operand::Constant(threshold),
        ),
    })
}

fn macd_template(tokens: &[String]) -> Option<Template> {
    let has = |w: &str| tokens.iter().any(|t| t == w);
    let crossing = has("cross") || has("crosses") || has("crossover") || has("crossing");

    let dir = if has("bullish") {
        Direction::Above
    } else if has("bearish") {
        Direction::Below
    } else if crossing {
        first_direction(tokens)?.1
    } else {
        return None;
    };

    let macd = IndicatorType::Macd {
        fast: DEFAULT_FAST,
        slow: DEFAULT_SLOW,
        signal: DEFAULT_SIGNAL,
    };
    let line = Operand::Indicator(IndicatorRef {
        indicator_type: macd.clone(),
        field: IndicatorField::MacdLine,
    });
    let signal = Operand::Indicator(IndicatorRef {
        indicator_type: macd,
        field: IndicatorField::MacdSignal,
    });

    Some(match dir {
        Direction::Above => Template {
            name: "macd_cross_above",
            rule: Rule::CrossAbove {
                left: line,
                right: signal,
            },
        },
        Direction::Below => Template {
            name: "macd_cross_below",
            rule: Rule::CrossBelow {
                left: line,
                right: signal,
            },
        },
    })
}

fn moving_average_template(tokens: &[String]) -> Option<Template> {
    let has = |w: &str| tokens.iter().any(|t| t == w);
    if !(has("price") || has("close") || has("closes")) {
        return None;
    }
    let exponential = has("ema") || has("exponential");
    let average = exponential || has("sma") || has("ma") || (has("moving") && has("average"));
    if !average {
        return None;
    }

    let (dir_idx, dir) = first_direction(tokens)?;
    let period = tokens[dir_idx + 1..]
        .iter()
        .find(|t| t.bytes().all(|b| b.is_ascii_digit()))?
        .parse::<usize>()
        .ok()
        .filter(|&p| valid_period(p))?;
    let indicator = if exponential {
        IndicatorType::Ema(period)
    } else {
        IndicatorType::Sma(period)
    };

    Some(Template {
        name: match dir {
            Direction::Above => "price_above_average",
            Direction::Below => "price_below_average",
        },
        rule: compare(dir, Operand::Close, Operand::indicator(indicator)),
    })
}
