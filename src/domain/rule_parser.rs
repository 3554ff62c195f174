//! Predicate DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! Sources may come from an untrusted generator, so nesting depth is capped
//! and integer parameters must lie in `1..=MAX_PERIOD`.

use crate::domain::error::ParseError;
use crate::domain::indicator::{IndicatorType, MAX_PERIOD};
use crate::domain::rule::{IndicatorField, IndicatorRef, Operand, Rule};

/// Maximum rule nesting accepted by the parser.
pub const MAX_DEPTH: usize = 32;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch), self.pos)),
            None => Err(self.error(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(format!("expected '{}', found '{}'", keyword, found), self.pos))
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error("expected number", start));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number: {}", num_str), start))
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }

        if self.pos == start {
            return Err(self.error("expected integer", start));
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<usize>() {
            Ok(0) => Err(self.error("expected positive integer, found 0", start)),
            Ok(n) if n > MAX_PERIOD => Err(self.error(
                format!("integer {} exceeds maximum of {}", n, MAX_PERIOD),
                start,
            )),
            Ok(n) => Ok(n),
            Err(_) => Err(self.error(format!("invalid integer: {}", num_str), start)),
        }
    }

    /// `(n)` after an indicator keyword.
    fn parse_period(&mut self) -> Result<usize, ParseError> {
        self.expect_char('(')?;
        let n = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(n)
    }

    /// `(fast, slow, signal)` after a MACD keyword.
    fn parse_macd_params(&mut self) -> Result<IndicatorType, ParseError> {
        self.expect_char('(')?;
        let start = self.pos;
        let fast = self.parse_integer()?;
        self.expect_char(',')?;
        let slow = self.parse_integer()?;
        self.expect_char(',')?;
        let signal = self.parse_integer()?;
        self.expect_char(')')?;
        if fast >= slow {
            return Err(self.error("MACD fast period must be below slow period", start));
        }
        Ok(IndicatorType::Macd { fast, slow, signal })
    }

    fn parse_column_name(&mut self) -> Result<String, ParseError> {
        self.expect_char('(')?;
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("expected column name", start));
        }
        let name = self.input[start..self.pos].to_string();
        self.expect_char(')')?;
        Ok(name)
    }

    fn parse_indicator(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();

        let simple = |t: IndicatorType| Operand::Indicator(IndicatorRef::value(t));
        let macd = |t: IndicatorType, field: IndicatorField| {
            Operand::Indicator(IndicatorRef {
                indicator_type: t,
                field,
            })
        };

        let operand = match word.as_str() {
            "SMA" | "EMA" | "RSI" | "RESISTANCE" | "SUPPORT" => {
                self.pos += word.len();
                let n = self.parse_period()?;
                simple(match word.as_str() {
                    "SMA" => IndicatorType::Sma(n),
                    "EMA" => IndicatorType::Ema(n),
                    "RSI" => IndicatorType::Rsi(n),
                    "RESISTANCE" => IndicatorType::Resistance(n),
                    _ => IndicatorType::Support(n),
                })
            }
            "MACD_LINE" | "MACD_SIGNAL" | "MACD_HISTOGRAM" => {
                self.pos += word.len();
                let t = self.parse_macd_params()?;
                let field = match word.as_str() {
                    "MACD_LINE" => IndicatorField::MacdLine,
                    "MACD_SIGNAL" => IndicatorField::MacdSignal,
                    _ => IndicatorField::MacdHistogram,
                };
                macd(t, field)
            }
            "COLUMN" => {
                self.pos += word.len();
                Operand::Column(self.parse_column_name()?)
            }
            _ => {
                return Err(self.error(format!("expected indicator, found '{}'", word), self.pos));
            }
        };
        Ok(operand)
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let word = self.peek_word();
        let operand = match word.as_str() {
            "open" => Operand::Open,
            "high" => Operand::High,
            "low" => Operand::Low,
            "close" => Operand::Close,
            "volume" => Operand::Volume,
            _ => return self.parse_indicator(),
        };
        self.pos += word.len();
        Ok(operand)
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        match keyword {
            "CROSS_ABOVE" => Ok(Rule::CrossAbove { left, right }),
            "CROSS_BELOW" => Ok(Rule::CrossBelow { left, right }),
            "ABOVE" => Ok(Rule::Above { left, right }),
            "BELOW" => Ok(Rule::Below { left, right }),
            "EQUALS" => Ok(Rule::Equals { left, right }),
            other => Err(self.error(format!("unknown comparison '{}'", other), start)),
        }
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;

        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();
        if self.depth >= MAX_DEPTH {
            return Err(self.error(
                format!("rule nesting exceeds {} levels", MAX_DEPTH),
                self.pos,
            ));
        }
        self.depth += 1;
        let rule = self.parse_rule_inner();
        self.depth -= 1;
        rule
    }

    fn parse_rule_inner(&mut self) -> Result<Rule, ParseError> {
        for keyword in ["CROSS_ABOVE", "CROSS_BELOW", "ABOVE", "BELOW", "EQUALS"] {
            if self.peek_keyword(keyword) {
                return self.parse_comparison(keyword);
            }
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }
        if self.peek_keyword("AND") {
            return self.parse_list("AND").map(Rule::And);
        }
        if self.peek_keyword("OR") {
            return self.parse_list("OR").map(Rule::Or);
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }
        if self.peek_keyword("CONSECUTIVE") {
            let (rule, count) = self.parse_windowed("CONSECUTIVE")?;
            return Ok(Rule::Consecutive { rule, count });
        }
        if self.peek_keyword("ANY_OF") {
            let (rule, count) = self.parse_windowed("ANY_OF")?;
            return Ok(Rule::AnyOf { rule, count });
        }

        let word = self.peek_word();
        Err(self.error(format!("expected rule, found '{}'", word), self.pos))
    }

    fn parse_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(self.error(format!("{} requires at least 2 rules", keyword), self.pos));
        }
        Ok(rules)
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse_windowed(&mut self, keyword: &str) -> Result<(Box<Rule>, usize), ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(',')?;
        let count = self.parse_integer()?;
        self.expect_char(')')?;
        Ok((Box::new(rule), count))
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(
                format!("unexpected input after rule: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    Parser::new(input).parse()
}
