use std::collections::HashMap;

use pretty_assertions::assert_eq;
use routecssc::ast::Stylesheet;
use routecssc::diag::has_errors;
use routecssc::route::{Request, ResponseBody};
use routecssc::{App, load_stylesheet};

const USERS_SHEET: &str = r#"
@database "sqlite::memory:";
@schema "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, role TEXT)";
@schema "INSERT INTO users (name, role) VALUES ('Ada', 'admin')";

/* lookup one user */
route[method="GET"][path="/users/:id"] {
  --id: param(:id);
  --user: sql("SELECT * FROM users WHERE id = ?", var(--id));
  status: if(--user: 200; else: 404);
  return: json(if(--user: var(--user); else: {"error":"Not found"}));
}

route[method="GET"][path="/admin"] {
  --role: header(x-user-role);
  status: if(--role = admin: 200; else: 403);
  return: json(if(--role = admin: {"ok":true}; else: {"error":"Forbidden"}));
}

route[method="POST"][path="/users"] {
  --created: sql("INSERT INTO users (name, role) VALUES (?, ?)", body(name), body(role));
  status: 201;
  return: json(var(--created));
}

route[path="/users"] {
  --users: sql("SELECT name FROM users ORDER BY id");
  return: json(var(--users));
}

route[method="GET"][path="/hello/:name"] {
  --name: param(name);
  return: html(concat("<h1>Hello ", var(--name), "</h1>"));
}

route[method="GET"][path="/page"] {
  return: html("<p>static</p>");
}
"#;

fn load(src: &str) -> Stylesheet {
    let (sheet, diags) = load_stylesheet(src);
    assert!(!has_errors(&diags), "unexpected errors: {diags:?}");
    sheet
}

fn users_app() -> App {
    App::from_stylesheet(load(USERS_SHEET), None).expect("app")
}

fn json_body(body: &ResponseBody) -> serde_json::Value {
    match body {
        ResponseBody::Json(text) => serde_json::from_str(text).expect("valid json body"),
        ResponseBody::Html(text) => panic!("expected json, got html: {text}"),
    }
}

#[test]
fn user_lookup_returns_row_or_not_found() {
    let app = users_app();

    let found = app
        .handle("GET", "/users/1", Request::default())
        .expect("route matches");
    assert_eq!(found.status, Some(200));
    assert_eq!(
        json_body(&found.body),
        serde_json::json!({"id": 1, "name": "Ada", "role": "admin"})
    );

    let missing = app
        .handle("GET", "/users/999", Request::default())
        .expect("route matches");
    assert_eq!(missing.status, Some(404));
    assert_eq!(json_body(&missing.body), serde_json::json!({"error": "Not found"}));
}

#[test]
fn role_header_decides_status() {
    let app = users_app();

    let denied = app
        .handle("GET", "/admin", Request::default())
        .expect("route matches");
    assert_eq!(denied.status, Some(403));

    let mut headers = HashMap::new();
    headers.insert("X-User-Role".to_string(), "admin".to_string());
    let allowed = app
        .handle(
            "GET",
            "/admin",
            Request {
                headers,
                ..Request::default()
            },
        )
        .expect("route matches");
    assert_eq!(allowed.status, Some(200));
    assert_eq!(json_body(&allowed.body), serde_json::json!({"ok": true}));
}

#[test]
fn insert_then_list() {
    let app = users_app();
    let mut body = routecssc::value::Object::new();
    body.insert("name".to_string(), "Linus".into());
    body.insert("role".to_string(), "staff".into());

    let created = app
        .handle(
            "POST",
            "/users",
            Request {
                body,
                ..Request::default()
            },
        )
        .expect("route matches");
    assert_eq!(created.status, Some(201));
    assert_eq!(json_body(&created.body), serde_json::json!({"id": 2, "changes": 1}));

    let listed = app
        .handle("get", "/users", Request::default())
        .expect("method defaults to GET and matches case-insensitively");
    assert_eq!(listed.status, None);
    assert_eq!(
        json_body(&listed.body),
        serde_json::json!([{"name": "Ada"}, {"name": "Linus"}])
    );
}

#[test]
fn html_returns_markup_as_written() {
    let app = users_app();

    let hello = app
        .handle("GET", "/hello/Ada%20L", Request::default())
        .expect("route matches");
    assert_eq!(hello.body, ResponseBody::Html("<h1>Hello Ada L</h1>".to_string()));
    assert_eq!(hello.body.content_type(), "text/html; charset=utf-8");

    let page = app
        .handle("GET", "/page", Request::default())
        .expect("route matches");
    assert_eq!(page.body.text(), "<p>static</p>");
}

#[test]
fn unmatched_requests_have_no_route() {
    let app = users_app();
    assert!(app.handle("DELETE", "/users/1", Request::default()).is_none());
    assert!(app.handle("GET", "/users/1/extra", Request::default()).is_none());
    assert!(app.handle("GET", "/nowhere", Request::default()).is_none());
}

#[test]
fn missing_database_turns_queries_into_errors() {
    let sheet = load(
        r#"
route[path="/count"] {
  --n: sql("SELECT count(*) AS n FROM t");
  return: json(var(--n));
}
"#,
    );
    let app = App::from_stylesheet(sheet, None).expect("app");
    assert!(app.db().is_none());
    let response = app
        .handle("GET", "/count", Request::default())
        .expect("route matches");
    assert_eq!(
        json_body(&response.body),
        serde_json::json!({"error": "Database not configured"})
    );
}

#[test]
fn explicit_database_url_overrides_sheet() {
    let sheet = load(
        r#"
@database "sqlite:///nonexistent-dir/never.db";
route[path="/one"] { return: json(sql("SELECT 1 AS one LIMIT 1")); }
"#,
    );
    let app = App::from_stylesheet(sheet, Some("sqlite::memory:")).expect("app");
    let response = app
        .handle("GET", "/one", Request::default())
        .expect("route matches");
    assert_eq!(json_body(&response.body), serde_json::json!({"one": 1}));
}

#[test]
fn out_of_range_status_keeps_default() {
    let sheet = load(
        r#"
route[path="/weird"] {
  --code: 42;
  status: var(--code);
  return: json("ok");
}
"#,
    );
    let app = App::from_stylesheet(sheet, None).expect("app");
    let response = app
        .handle("GET", "/weird", Request::default())
        .expect("route matches");
    assert_eq!(response.status, None);
    assert_eq!(json_body(&response.body), serde_json::json!("ok"));
}
