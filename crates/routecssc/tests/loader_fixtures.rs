use std::fs;

use pretty_assertions::assert_eq;
use routecssc::ast::{Expr, ReturnKind, StatusSpec};
use routecssc::diag::{Diag, Level, has_errors};
use routecssc::value::Value;
use routecssc::{LoadError, load_file, load_stylesheet};

fn messages(diags: &[Diag], level: Level) -> Vec<String> {
    diags
        .iter()
        .filter(|diag| diag.level == level)
        .map(|diag| diag.message.clone())
        .collect()
}

#[test]
fn loads_routes_in_declaration_order() {
    let (sheet, diags) = load_stylesheet(
        r#"
@database "sqlite::memory:";
@schema "CREATE TABLE t (id INTEGER PRIMARY KEY)";

route[method="get"][path="/a"] {
  --x: 1;
  --y: var(--x);
  return: json(var(--y));
}

route[method='POST'][path=/b] {
  status: 201;
  return: html("<p>b</p>");
}
"#,
    );
    assert!(diags.is_empty(), "diags: {diags:?}");
    assert_eq!(sheet.database.as_deref(), Some("sqlite::memory:"));
    assert_eq!(sheet.schema, vec!["CREATE TABLE t (id INTEGER PRIMARY KEY)".to_string()]);
    assert_eq!(sheet.routes.len(), 2);

    let first = &sheet.routes[0];
    assert_eq!(first.method, "GET");
    assert_eq!(first.path, "/a");
    assert_eq!(first.line, 5);
    let names: Vec<&str> = first.assignments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(first.assignments[1].value, Expr::VarRef("x".to_string()));
    assert_eq!(first.assignments[1].line, 7);
    assert_eq!(first.status, None);

    let second = &sheet.routes[1];
    assert_eq!(second.method, "POST");
    assert_eq!(second.path, "/b");
    assert_eq!(second.status, Some(StatusSpec::Literal(201)));
    assert_eq!(second.ret.kind, ReturnKind::Html);
}

#[test]
fn database_url_can_come_from_env() {
    // SAFETY: no other test reads this variable.
    unsafe {
        std::env::set_var("ROUTECSS_LOADER_TEST_DB", "sqlite://from-env.db");
    }
    let (sheet, diags) = load_stylesheet("@database env(ROUTECSS_LOADER_TEST_DB);");
    assert!(diags.is_empty(), "diags: {diags:?}");
    assert_eq!(sheet.database.as_deref(), Some("sqlite://from-env.db"));
}

#[test]
fn semicolons_inside_expressions_do_not_end_declarations() {
    let (sheet, diags) = load_stylesheet(
        r#"
route[path="/x"] {
  --label: "a;b";
  return: json(if(--label: var(--label); else: "none"));
}
"#,
    );
    assert!(diags.is_empty(), "diags: {diags:?}");
    let route = &sheet.routes[0];
    assert_eq!(route.assignments[0].value, Expr::Literal(Value::from("a;b")));
    assert!(matches!(route.ret.body, Expr::Conditional { .. }));
}

#[test]
fn structural_problems_are_errors() {
    let (sheet, diags) = load_stylesheet(
        r#"
route[method="GET"] { return: json(1); }
route[path="/no-return"] { --x: 1; }
route[path="/bad-status"] { status: 42; return: json(1); }
"#,
    );
    assert!(has_errors(&diags));
    let errors = messages(&diags, Level::Error);
    assert_eq!(errors.len(), 3, "errors: {errors:?}");
    assert!(errors[0].contains("missing a path"));
    assert!(errors[1].contains("no return"));
    assert!(errors[2].contains("not a valid HTTP status"));
    // The bad status drops only the declaration, not the route.
    assert_eq!(sheet.routes.len(), 1);
    assert_eq!(sheet.routes[0].path, "/bad-status");
    assert_eq!(sheet.routes[0].status, None);
}

#[test]
fn lenient_problems_are_warnings() {
    let (sheet, diags) = load_stylesheet(
        r#"
@charset "utf-8";
.card { color: red; }
route[path="/w"][role="admin"] {
  --x: 1;
  --x: 2;
  --q: sql(nothing quoted);
  color: blue;
  return: json(var(--x));
}
route[path="/w"] { return: json("second"); }
"#,
    );
    assert!(!has_errors(&diags), "diags: {diags:?}");
    let warnings = messages(&diags, Level::Warning);
    let expected = [
        "unknown at-rule",
        "unknown selector",
        "unknown route attribute",
        "assigned more than once",
        "empty query",
        "unknown property",
        "duplicate route",
    ];
    assert_eq!(warnings.len(), expected.len(), "warnings: {warnings:?}");
    for (warning, needle) in warnings.iter().zip(expected) {
        assert!(warning.contains(needle), "`{warning}` should mention `{needle}`");
    }
    assert_eq!(sheet.routes.len(), 1);
    assert_eq!(sheet.routes[0].assignments.len(), 3);
}

#[test]
fn diagnostics_carry_line_numbers() {
    let (_, diags) = load_stylesheet("\n\nroute[path=\"/x\"] {\n  --a: 1;\n}\n");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line, 3);
    assert_eq!(
        diags[0].to_string(),
        "error: route GET /x has no return declaration (line 3)"
    );
}

#[test]
fn load_file_reads_from_disk() {
    let dir = std::env::temp_dir().join(format!("routecss_loader_{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create dir");
    let path = dir.join("api.css");
    fs::write(&path, "route[path=\"/\"] { return: json(\"root\"); }\n").expect("write");
    let (sheet, diags) = load_file(&path).expect("load");
    assert!(diags.is_empty());
    assert_eq!(sheet.routes[0].path, "/");

    let missing = load_file(&dir.join("missing.css"));
    assert!(matches!(missing, Err(LoadError::Read { .. })));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn markup_brackets_do_not_swallow_later_routes() {
    let (sheet, diags) = load_stylesheet(
        r#"
route[path="/a"] {
  return: html(<p>[draft</p>);
}
route[path="/b"] {
  return: html(<p>done}</p>);
}
route[path="/c"] { return: json(1); }
"#,
    );
    assert!(diags.is_empty(), "diags: {diags:?}");
    let paths: Vec<&str> = sheet.routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/a", "/b", "/c"]);
    assert_eq!(sheet.routes[0].ret.body, Expr::HtmlLiteral("<p>[draft</p>".to_string()));
    assert_eq!(sheet.routes[1].ret.body, Expr::HtmlLiteral("<p>done}</p>".to_string()));
}
