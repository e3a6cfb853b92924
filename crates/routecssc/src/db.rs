use std::sync::Mutex;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use thiserror::Error;

use crate::value::{Object, RunInfo, Value};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported db url `{0}` (expected sqlite://...)")]
    UnsupportedUrl(String),
    #[error("sqlite url missing path")]
    MissingPath,
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// The statement interface the evaluator talks to. Each call prepares `sql`,
/// binds `params` positionally and runs it to completion.
pub trait QueryExecutor {
    /// First row, or `None` when nothing matched.
    fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Object>, DbError>;
    fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Object>, DbError>;
    fn run(&self, sql: &str, params: &[Value]) -> Result<RunInfo, DbError>;
}

/// One SQLite connection, opened at startup and shared by every request.
/// The mutex serializes access when requests are handled concurrently.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(url: &str) -> Result<Self, DbError> {
        let path = parse_sqlite_url(url)?;
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs one or more `;`-separated statements without parameters.
    pub fn exec_batch(&self, sql: &str) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn query_rows(&self, sql: &str, params: &[Value], limit: Option<usize>) -> Result<Vec<Object>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        let mut stmt = conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut rows = stmt.query(params_from_iter(params_to_sql(params)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Object::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                map.insert(name.clone(), value_from_ref(row.get_ref(idx)?));
            }
            out.push(map);
            if limit.is_some_and(|limit| out.len() >= limit) {
                break;
            }
        }
        Ok(out)
    }
}

impl QueryExecutor for Db {
    fn get(&self, sql: &str, params: &[Value]) -> Result<Option<Object>, DbError> {
        Ok(self.query_rows(sql, params, Some(1))?.into_iter().next())
    }

    fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Object>, DbError> {
        self.query_rows(sql, params, None)
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<RunInfo, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        let mut stmt = conn.prepare_cached(sql)?;
        let changes = stmt.execute(params_from_iter(params_to_sql(params)))?;
        Ok(RunInfo {
            last_insert_id: conn.last_insert_rowid(),
            changes: changes as u64,
        })
    }
}

fn params_to_sql(params: &[Value]) -> Vec<SqlValue> {
    params.iter().map(param_to_sql).collect()
}

fn param_to_sql(param: &Value) -> SqlValue {
    match param {
        Value::Missing | Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(if *v { 1 } else { 0 }),
        Value::Number(v) => {
            if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                SqlValue::Integer(*v as i64)
            } else {
                SqlValue::Real(*v)
            }
        }
        Value::String(v) => SqlValue::Text(v.clone()),
        Value::Array(_) | Value::Object(_) | Value::QueryResult(_) => {
            SqlValue::Text(param.to_json().to_string())
        }
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Number(v as f64),
        ValueRef::Real(v) => Value::Number(v),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
    }
}

pub fn parse_sqlite_url(url: &str) -> Result<&str, DbError> {
    let url = url.trim();
    let path = if let Some(path) = url.strip_prefix("sqlite://") {
        path
    } else if let Some(path) = url.strip_prefix("sqlite:") {
        path
    } else {
        return Err(DbError::UnsupportedUrl(url.to_string()));
    };
    if path.is_empty() {
        return Err(DbError::MissingPath);
    }
    Ok(path)
}
