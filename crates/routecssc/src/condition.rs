use std::sync::OnceLock;

use regex::Regex;

use crate::ast::{CompareOp, Condition};
use crate::parser::is_numeric;
use crate::scan::strip_quotes;
use crate::value::Value;

fn relational_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Two-character operators come first so `=` never matches inside `!=`.
    PATTERN.get_or_init(|| {
        Regex::new(r"^--([A-Za-z0-9_-]+?)\s*(!=|>=|<=|=|>|<)\s*(.+)$")
            .unwrap_or_else(|err| panic!("invalid relational pattern: {err}"))
    })
}

/// Parses the condition half of an `if()` branch.
///
/// Connectives split at their first textual occurrence, `or` before `and`,
/// so each fragment holds at most one level of boolean nesting. Deeper
/// logic has to be written as nested `if()` branches.
pub fn parse_condition(text: &str) -> Condition {
    let text = text.trim();
    if let Some((left, right)) = text.split_once(" or ") {
        return Condition::Or(vec![parse_condition(left), parse_condition(right)]);
    }
    if let Some((left, right)) = text.split_once(" and ") {
        return Condition::And(vec![parse_condition(left), parse_condition(right)]);
    }
    if let Some(rest) = text.strip_prefix("not ") {
        return Condition::Not(Box::new(parse_condition(rest)));
    }
    if let Some(caps) = relational_pattern().captures(text) {
        let op = CompareOp::from_symbol(&caps[2]);
        if let Some(op) = op {
            return Condition::Compare {
                var: caps[1].to_string(),
                op,
                value: parse_comparand(caps[3].trim()),
            };
        }
    }
    Condition::Truthy(text.strip_prefix("--").unwrap_or(text).to_string())
}

fn parse_comparand(text: &str) -> Value {
    if is_numeric(text) {
        if let Ok(number) = text.parse::<f64>() {
            return Value::Number(number);
        }
    }
    Value::String(strip_quotes(text).to_string())
}
