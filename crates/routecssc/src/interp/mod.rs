use std::collections::HashMap;

use routecss_rt::error as rt_error;

use crate::ast::{CompareOp, Condition, Expr};
use crate::db::QueryExecutor;
use crate::value::{Object, Value};

/// Request-scoped bindings. The four request maps are read-only once built;
/// `vars` fills up left to right as a route's assignments run.
#[derive(Debug, Default)]
pub struct Env {
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Object,
    headers: HashMap<String, String>,
    vars: HashMap<String, Value>,
}

impl Env {
    pub fn new(
        params: HashMap<String, String>,
        query: HashMap<String, String>,
        body: Object,
        headers: HashMap<String, String>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        Self {
            params,
            query,
            body,
            headers,
            vars: HashMap::new(),
        }
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn var(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or(Value::Missing)
    }

    fn param(&self, name: &str) -> Value {
        string_or_missing(self.params.get(name))
    }

    fn query_param(&self, name: &str) -> Value {
        string_or_missing(self.query.get(name))
    }

    fn body_field(&self, name: &str) -> Value {
        self.body.get(name).cloned().unwrap_or(Value::Missing)
    }

    fn header(&self, name: &str) -> Value {
        string_or_missing(self.headers.get(&name.to_ascii_lowercase()))
    }
}

fn string_or_missing(value: Option<&String>) -> Value {
    match value {
        Some(value) => Value::String(value.clone()),
        None => Value::Missing,
    }
}

/// Leading keyword of a statement, which decides how it is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

fn statement_kind(sql: &str) -> StatementKind {
    let keyword = sql
        .trim()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" => StatementKind::Select,
        "INSERT" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}

/// Evaluates expression trees against one request's `Env`. Evaluation is
/// total: database failures and missing data come back as ordinary values.
pub struct Interpreter<'a> {
    db: Option<&'a dyn QueryExecutor>,
}

impl<'a> Interpreter<'a> {
    pub fn new(db: Option<&'a dyn QueryExecutor>) -> Self {
        Self { db }
    }

    pub fn eval_expr(&self, expr: &Expr, env: &Env) -> Value {
        match expr {
            Expr::Literal(value) | Expr::JsonLiteral(value) => value.clone(),
            Expr::VarRef(name) => env.var(name),
            Expr::ParamRef(name) => env.param(name),
            Expr::QueryRef(name) => env.query_param(name),
            Expr::BodyRef(name) => env.body_field(name),
            Expr::HeaderRef(name) => env.header(name),
            Expr::Query { sql, args } => {
                let params: Vec<Value> = args.iter().map(|arg| self.eval_expr(arg, env)).collect();
                self.eval_query(sql, &params)
            }
            Expr::Conditional {
                branches,
                else_branch,
            } => {
                for (condition, value) in branches {
                    if self.eval_condition(condition, env) {
                        return self.eval_expr(value, env);
                    }
                }
                match else_branch {
                    Some(expr) => self.eval_expr(expr, env),
                    None => Value::Null,
                }
            }
            Expr::HtmlLiteral(markup) => Value::String(markup.clone()),
            Expr::Concat(parts) => Value::String(
                parts
                    .iter()
                    .map(|part| self.eval_expr(part, env).to_text())
                    .collect(),
            ),
        }
    }

    /// Dispatches on the statement's leading keyword. A `SELECT` returns one
    /// row when the text contains `LIMIT 1` or exactly one argument is bound,
    /// otherwise every row.
    fn eval_query(&self, sql: &str, params: &[Value]) -> Value {
        let Some(db) = self.db else {
            return Value::error_object(rt_error::DATABASE_NOT_CONFIGURED);
        };
        let kind = statement_kind(sql);
        tracing::debug!(?kind, sql, params = params.len(), "executing query");
        let result = match kind {
            StatementKind::Select if sql.contains("LIMIT 1") || params.len() == 1 => db
                .get(sql, params)
                .map(|row| row.map(Value::Object).unwrap_or(Value::Null)),
            StatementKind::Select => db
                .all(sql, params)
                .map(|rows| Value::Array(rows.into_iter().map(Value::Object).collect())),
            StatementKind::Insert => db.run(sql, params).map(|info| {
                let mut map = Object::new();
                map.insert("id".to_string(), Value::Number(info.last_insert_id as f64));
                map.insert("changes".to_string(), Value::Number(info.changes as f64));
                Value::Object(map)
            }),
            StatementKind::Update | StatementKind::Delete => db.run(sql, params).map(|info| {
                let mut map = Object::new();
                map.insert("changes".to_string(), Value::Number(info.changes as f64));
                Value::Object(map)
            }),
            StatementKind::Other => db.run(sql, params).map(Value::QueryResult),
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(sql, error = %err, "query failed");
                Value::error_object(err.to_string())
            }
        }
    }

    pub fn eval_condition(&self, condition: &Condition, env: &Env) -> bool {
        match condition {
            Condition::Truthy(name) => env.var(name).is_truthy(),
            Condition::Compare { var, op, value } => compare(&env.var(var), *op, value),
            Condition::And(items) => items
                .iter()
                .map(|item| self.eval_condition(item, env))
                .fold(true, |acc, item| acc && item),
            Condition::Or(items) => items
                .iter()
                .map(|item| self.eval_condition(item, env))
                .fold(false, |acc, item| acc || item),
            Condition::Not(inner) => !self.eval_condition(inner, env),
        }
    }
}

fn compare(current: &Value, op: CompareOp, expected: &Value) -> bool {
    let ordering = match (current.as_number(), expected.as_number()) {
        (Some(left), Some(right)) => left.partial_cmp(&right),
        _ => None,
    };
    match op {
        CompareOp::Eq => current == expected,
        CompareOp::Ne => current != expected,
        CompareOp::Gt => ordering.is_some_and(|ord| ord.is_gt()),
        CompareOp::Lt => ordering.is_some_and(|ord| ord.is_lt()),
        CompareOp::Ge => ordering.is_some_and(|ord| ord.is_ge()),
        CompareOp::Le => ordering.is_some_and(|ord| ord.is_le()),
    }
}
