pub mod app;
pub mod ast;
pub mod condition;
pub mod db;
pub mod diag;
pub mod http;
pub mod interp;
pub mod loader;
pub mod observability;
pub mod parser;
pub mod route;
pub mod scan;
pub mod value;

pub use app::App;
pub use loader::{LoadError, load_file, load_stylesheet};
pub use parser::{parse_expr, parse_return, parse_status};
pub use condition::parse_condition;
