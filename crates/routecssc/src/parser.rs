use std::sync::OnceLock;

use regex::Regex;

use crate::ast::{Expr, ReturnKind, ReturnSpec, StatusSpec};
use crate::condition::parse_condition;
use crate::scan::{call_args, find_top_level, first_quoted, split_top_level, strip_quotes};
use crate::value::Value;

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?\d+(\.\d+)?$").unwrap_or_else(|err| panic!("invalid numeric pattern: {err}"))
    })
}

pub fn is_numeric(text: &str) -> bool {
    numeric_pattern().is_match(text)
}

/// Parses one expression fragment. Never fails: anything that is not a
/// recognized call form becomes a literal.
pub fn parse_expr(text: &str) -> Expr {
    let text = text.trim();
    if let Some(inner) = call_args(text, "sql") {
        return parse_sql(inner);
    }
    if let Some(inner) = call_args(text, "param") {
        let name = inner.trim();
        return Expr::ParamRef(name.strip_prefix(':').unwrap_or(name).to_string());
    }
    if let Some(inner) = call_args(text, "query") {
        return Expr::QueryRef(inner.trim().to_string());
    }
    if let Some(inner) = call_args(text, "body") {
        return Expr::BodyRef(inner.trim().to_string());
    }
    if let Some(inner) = call_args(text, "header") {
        return Expr::HeaderRef(inner.trim().to_string());
    }
    if let Some(inner) = call_args(text, "var") {
        let name = inner.trim();
        return Expr::VarRef(name.strip_prefix("--").unwrap_or(name).to_string());
    }
    if let Some(inner) = call_args(text, "if") {
        return parse_conditional(inner);
    }
    if let Some(inner) = call_args(text, "concat") {
        return Expr::Concat(parse_args(inner));
    }
    parse_literal(text)
}

fn parse_literal(text: &str) -> Expr {
    if is_numeric(text) {
        if let Ok(number) = text.parse::<f64>() {
            return Expr::Literal(Value::Number(number));
        }
    }
    match text {
        "true" => return Expr::Literal(Value::Bool(true)),
        "false" => return Expr::Literal(Value::Bool(false)),
        "null" => return Expr::Literal(Value::Null),
        _ => {}
    }
    if text.starts_with('[') || text.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
            return Expr::JsonLiteral(Value::from_json(&json));
        }
    }
    Expr::Literal(Value::String(strip_quotes(text).to_string()))
}

/// `sql("text", a1, a2)`. Input without a quoted statement degrades to an
/// empty statement rather than failing the load.
fn parse_sql(inner: &str) -> Expr {
    let Some((sql, end)) = first_quoted(inner) else {
        return Expr::Query {
            sql: String::new(),
            args: Vec::new(),
        };
    };
    let rest = inner[end..].trim();
    let rest = rest.strip_prefix(',').unwrap_or(rest);
    Expr::Query {
        sql: sql.to_string(),
        args: parse_args(rest),
    }
}

/// Splits call arguments on top-level commas. Commas only separate at
/// parenthesis depth zero, so a JSON array or object argument is rejoined
/// from the following pieces once the joined text parses as JSON.
fn parse_args(text: &str) -> Vec<Expr> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let parts = split_top_level(text, ',');
    let mut args = Vec::new();
    let mut idx = 0;
    while idx < parts.len() {
        let part = parts[idx].trim();
        let mut taken = 1;
        let mut arg = part.to_string();
        if part.starts_with('[') || part.starts_with('{') {
            let mut joined = parts[idx].to_string();
            for (offset, next) in parts[idx + 1..].iter().enumerate() {
                if is_json(joined.trim()) {
                    break;
                }
                joined.push(',');
                joined.push_str(next);
                if is_json(joined.trim()) {
                    taken = offset + 2;
                    arg = joined.trim().to_string();
                    break;
                }
            }
        }
        idx += taken;
        if !arg.is_empty() {
            args.push(parse_expr(&arg));
        }
    }
    args
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn parse_conditional(inner: &str) -> Expr {
    let mut branches = Vec::new();
    let mut else_branch = None;
    for part in split_top_level(inner, ';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(rest) = part.strip_prefix("else:") {
            if else_branch.is_none() {
                else_branch = Some(Box::new(parse_expr(rest)));
            }
            continue;
        }
        let Some(colon) = find_top_level(part, ':') else {
            tracing::debug!(branch = part, "if() branch without ':' ignored");
            continue;
        };
        let condition = parse_condition(&part[..colon]);
        let value = parse_expr(&part[colon + 1..]);
        branches.push((condition, value));
    }
    Expr::Conditional {
        branches,
        else_branch,
    }
}

/// Parses the text of a `return:` declaration, unwrapping `json(...)` or
/// `html(...)`. Unwrapped bodies are JSON returns.
pub fn parse_return(text: &str) -> ReturnSpec {
    let text = text.trim();
    if let Some(inner) = call_args(text, "json") {
        return ReturnSpec {
            kind: ReturnKind::Json,
            body: parse_expr(inner),
        };
    }
    if let Some(inner) = call_args(text, "html") {
        let body = match parse_expr(inner) {
            Expr::Literal(Value::String(markup)) => Expr::HtmlLiteral(markup),
            other => other,
        };
        return ReturnSpec {
            kind: ReturnKind::Html,
            body,
        };
    }
    ReturnSpec {
        kind: ReturnKind::Json,
        body: parse_expr(text),
    }
}

/// Parses the text of a `status:` declaration: an integer literal,
/// `var(--x)`, or `if(...)`.
pub fn parse_status(text: &str) -> Result<StatusSpec, String> {
    let text = text.trim();
    if is_numeric(text) {
        return text
            .parse::<u16>()
            .ok()
            .filter(|code| (100..=999).contains(code))
            .map(StatusSpec::Literal)
            .ok_or_else(|| format!("status {text} is not a valid HTTP status code"));
    }
    match parse_expr(text) {
        Expr::VarRef(name) => Ok(StatusSpec::Var(name)),
        expr @ Expr::Conditional { .. } => Ok(StatusSpec::Conditional(expr)),
        _ => Err(format!(
            "status expects an integer, var(--name) or if(...), found `{text}`"
        )),
    }
}
