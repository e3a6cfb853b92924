use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    VarRef(String),
    ParamRef(String),
    QueryRef(String),
    BodyRef(String),
    HeaderRef(String),
    Query { sql: String, args: Vec<Expr> },
    Conditional {
        branches: Vec<(Condition, Expr)>,
        else_branch: Option<Box<Expr>>,
    },
    JsonLiteral(Value),
    HtmlLiteral(String),
    Concat(Vec<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Ge),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Truthy(String),
    Compare {
        var: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatusSpec {
    Literal(u16),
    Var(String),
    Conditional(Expr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    Json,
    Html,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSpec {
    pub kind: ReturnKind,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub assignments: Vec<Assignment>,
    pub status: Option<StatusSpec>,
    pub ret: ReturnSpec,
    pub line: usize,
}

/// A loaded stylesheet: the routes plus the datastore declarations that
/// accompany them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stylesheet {
    pub database: Option<String>,
    pub schema: Vec<String>,
    pub routes: Vec<Route>,
}
