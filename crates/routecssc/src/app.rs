use thiserror::Error;

use crate::ast::Stylesheet;
use crate::db::{Db, DbError, QueryExecutor};
use crate::route::{Request, Response, RouteTable};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to open database: {0}")]
    Open(#[source] DbError),
    #[error("@schema statement failed: {source}\n  {statement}")]
    Schema {
        statement: String,
        #[source]
        source: DbError,
    },
}

/// The loaded routes and the database connection they share.
pub struct App {
    routes: RouteTable,
    db: Option<Db>,
}

impl App {
    pub fn new(routes: RouteTable, db: Option<Db>) -> Self {
        Self { routes, db }
    }

    /// Opens the database (an explicit `db_url` wins over the sheet's
    /// `@database`) and runs the `@schema` statements in order.
    pub fn from_stylesheet(sheet: Stylesheet, db_url: Option<&str>) -> Result<Self, AppError> {
        let url = db_url.map(str::to_string).or(sheet.database);
        let db = match url {
            Some(url) => {
                let db = Db::open(&url).map_err(AppError::Open)?;
                tracing::info!(url = %url, "database opened");
                Some(db)
            }
            None => {
                tracing::warn!("no database configured; sql() expressions will return an error");
                None
            }
        };
        if let Some(db) = &db {
            for statement in &sheet.schema {
                db.exec_batch(statement).map_err(|source| AppError::Schema {
                    statement: statement.clone(),
                    source,
                })?;
            }
        } else if !sheet.schema.is_empty() {
            tracing::warn!(count = sheet.schema.len(), "@schema statements skipped without a database");
        }
        Ok(Self::new(RouteTable::new(sheet.routes), db))
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn db(&self) -> Option<&Db> {
        self.db.as_ref()
    }

    /// Runs the matching route, or `None` if no route matches.
    pub fn handle(&self, method: &str, path: &str, mut request: Request) -> Option<Response> {
        let (route, params) = self.routes.find(method, path)?;
        for (name, raw) in params {
            request.params.insert(name, percent_decode(raw, false));
        }
        let db = self.db.as_ref().map(|db| db as &dyn QueryExecutor);
        Some(route.handle(request, db))
    }
}

/// Decodes `%XX` escapes (and `+` as space when `plus_as_space`). Invalid
/// escapes are kept as written.
pub fn percent_decode(raw: &str, plus_as_space: bool) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte == b'%' && idx + 2 < bytes.len() {
            let hex = (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2]));
            if let (Some(hi), Some(lo)) = hex {
                out.push(hi << 4 | lo);
                idx += 3;
                continue;
            }
        }
        if byte == b'+' && plus_as_space {
            out.push(b' ');
        } else {
            out.push(byte);
        }
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
