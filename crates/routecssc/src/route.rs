use std::collections::HashMap;

use routecss_rt::error as rt_error;

use crate::ast::{ReturnKind, Route, StatusSpec};
use crate::db::QueryExecutor;
use crate::interp::{Env, Interpreter};
use crate::value::{Object, Value};

/// What the transport hands over for one request.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Object,
    pub headers: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseBody {
    Json(String),
    Html(String),
}

impl ResponseBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseBody::Json(_) => "application/json",
            ResponseBody::Html(_) => "text/html; charset=utf-8",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ResponseBody::Json(text) | ResponseBody::Html(text) => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// `None` leaves the transport's default status in place.
    pub status: Option<u16>,
    pub body: ResponseBody,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// A route whose trees are parsed and whose path is split, ready to run
/// against any number of requests.
#[derive(Clone, Debug)]
pub struct CompiledRoute {
    route: Route,
    segments: Vec<Segment>,
}

impl CompiledRoute {
    pub fn compile(route: Route) -> Self {
        let segments = split_path(&route.path)
            .into_iter()
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Static(seg.to_string()),
            })
            .collect();
        Self { route, segments }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Route params captured from `path`, or `None` if it does not match.
    /// Captured segments are returned as they appear in the path.
    pub fn match_path<'p>(&self, path: &'p str) -> Option<Vec<(String, &'p str)>> {
        let req_segments = split_path(path);
        if req_segments.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (seg, req) in self.segments.iter().zip(req_segments) {
            match seg {
                Segment::Static(expected) if expected == req => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => params.push((name.clone(), req)),
            }
        }
        Some(params)
    }

    /// Runs the route: bind request maps, evaluate assignments in order,
    /// resolve the status, evaluate and render the return body.
    pub fn handle(&self, request: Request, db: Option<&dyn QueryExecutor>) -> Response {
        let interp = Interpreter::new(db);
        let mut env = Env::new(request.params, request.query, request.body, request.headers);
        for assignment in &self.route.assignments {
            let value = interp.eval_expr(&assignment.value, &env);
            env.bind(&assignment.name, value);
        }
        let status = self.route.status.as_ref().and_then(|spec| match spec {
            StatusSpec::Literal(code) => Some(*code),
            StatusSpec::Var(name) => coerce_status(&env.var(name)),
            StatusSpec::Conditional(expr) => coerce_status(&interp.eval_expr(expr, &env)),
        });
        let value = interp.eval_expr(&self.route.ret.body, &env);
        let body = match self.route.ret.kind {
            ReturnKind::Json => ResponseBody::Json(
                serde_json::to_string(&value).unwrap_or_else(|err| rt_error::error_body(&err.to_string())),
            ),
            // Markup goes out as written; route authors are trusted.
            ReturnKind::Html => ResponseBody::Html(value.to_text()),
        };
        Response { status, body }
    }
}

/// Coerces a resolved status value to an HTTP status code. Anything that is
/// not a finite number (or numeric text) in 100..=999 yields `None`.
pub fn coerce_status(value: &Value) -> Option<u16> {
    let number = match value {
        Value::Number(v) => *v,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    let code = number.trunc();
    if (100.0..=999.0).contains(&code) {
        Some(code as u16)
    } else {
        tracing::warn!(status = code, "resolved status outside the HTTP range ignored");
        None
    }
}

/// Routes in declaration order; the first method + path match wins.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: routes.into_iter().map(CompiledRoute::compile).collect(),
        }
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn find<'p>(
        &self,
        method: &str,
        path: &'p str,
    ) -> Option<(&CompiledRoute, Vec<(String, &'p str)>)> {
        self.routes
            .iter()
            .filter(|route| route.route.method.eq_ignore_ascii_case(method))
            .find_map(|route| route.match_path(path).map(|params| (route, params)))
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}
