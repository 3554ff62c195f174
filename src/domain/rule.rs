//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for entry predicates:
//! - `Operand`: What can be compared (price fields, constants, indicators, raw columns)
//! - `IndicatorRef`: Reference to an indicator with a specific field
//! - `IndicatorField`: Which field of a multi-value indicator to use
//! - `Rule`: The rule AST with comparison, composite, and temporal variants
//!
//! `Display` renders the canonical DSL text, which `rule_parser::parse`
//! accepts back.

use crate::domain::indicator::IndicatorType;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
    /// Any annotated column, looked up by name on the bar.
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    Equals {
        left: Operand,
        right: Operand,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
}

impl IndicatorRef {
    pub fn value(indicator_type: IndicatorType) -> Self {
        IndicatorRef {
            indicator_type,
            field: IndicatorField::Value,
        }
    }

    /// The bar column holding this reference's value.
    pub fn column(&self) -> String {
        let columns = self.indicator_type.columns();
        let idx = match self.field {
            IndicatorField::Value | IndicatorField::MacdLine => 0,
            IndicatorField::MacdSignal => 1,
            IndicatorField::MacdHistogram => 2,
        };
        columns
            .get(idx)
            .cloned()
            .unwrap_or_else(|| self.indicator_type.primary_column())
    }
}

impl Operand {
    pub fn indicator(indicator_type: IndicatorType) -> Self {
        Operand::Indicator(IndicatorRef::value(indicator_type))
    }
}

impl Rule {
    /// Every indicator the rule reads, deduplicated and ordered.
    pub fn extract_indicators(&self) -> BTreeSet<IndicatorType> {
        let mut out = BTreeSet::new();
        self.collect_indicators(&mut out);
        out
    }

    fn collect_indicators(&self, out: &mut BTreeSet<IndicatorType>) {
        match self {
            Rule::CrossAbove { left, right }
            | Rule::CrossBelow { left, right }
            | Rule::Above { left, right }
            | Rule::Below { left, right }
            | Rule::Equals { left, right } => {
                collect_operand(left, out);
                collect_operand(right, out);
            }
            Rule::Between { operand, .. } => collect_operand(operand, out),
            Rule::And(rules) | Rule::Or(rules) => {
                for r in rules {
                    r.collect_indicators(out);
                }
            }
            Rule::Not(rule) | Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => {
                rule.collect_indicators(out)
            }
        }
    }

    /// Number of AST nodes, operands included.
    pub fn node_count(&self) -> usize {
        match self {
            Rule::CrossAbove { .. }
            | Rule::CrossBelow { .. }
            | Rule::Above { .. }
            | Rule::Below { .. }
            | Rule::Equals { .. } => 3,
            Rule::Between { .. } => 2,
            Rule::And(rules) | Rule::Or(rules) => {
                1 + rules.iter().map(Rule::node_count).sum::<usize>()
            }
            Rule::Not(rule) | Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => {
                1 + rule.node_count()
            }
        }
    }
}

fn collect_operand(operand: &Operand, out: &mut BTreeSet<IndicatorType>) {
    if let Operand::Indicator(ind) = operand {
        out.insert(ind.indicator_type.clone());
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Open => write!(f, "open"),
            Operand::High => write!(f, "high"),
            Operand::Low => write!(f, "low"),
            Operand::Close => write!(f, "close"),
            Operand::Volume => write!(f, "volume"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Column(name) => write!(f, "COLUMN({})", name),
            Operand::Indicator(ind) => match (&ind.indicator_type, ind.field) {
                (IndicatorType::Macd { fast, slow, signal }, field) => {
                    let name = match field {
                        IndicatorField::MacdSignal => "MACD_SIGNAL",
                        IndicatorField::MacdHistogram => "MACD_HISTOGRAM",
                        _ => "MACD_LINE",
                    };
                    write!(f, "{}({},{},{})", name, fast, slow, signal)
                }
                (other, _) => write!(f, "{}", other),
            },
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::CrossAbove { left, right } => write!(f, "CROSS_ABOVE({}, {})", left, right),
            Rule::CrossBelow { left, right } => write!(f, "CROSS_BELOW({}, {})", left, right),
            Rule::Above { left, right } => write!(f, "ABOVE({}, {})", left, right),
            Rule::Below { left, right } => write!(f, "BELOW({}, {})", left, right),
            Rule::Equals { left, right } => write!(f, "EQUALS({}, {})", left, right),
            Rule::Between {
                operand,
                lower,
                upper,
            } => write!(f, "BETWEEN({}, {}, {})", operand, lower, upper),
            Rule::And(rules) => write_list(f, "AND", rules),
            Rule::Or(rules) => write_list(f, "OR", rules),
            Rule::Not(rule) => write!(f, "NOT({})", rule),
            Rule::Consecutive { rule, count } => write!(f, "CONSECUTIVE({}, {})", rule, count),
            Rule::AnyOf { rule, count } => write!(f, "ANY_OF({}, {})", rule, count),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, rules: &[Rule]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, r) in rules.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", r)?;
    }
    write!(f, ")")
}
