use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use routecss_rt::config as rt_config;
use thiserror::Error;

use crate::ast::{Assignment, Expr, ReturnSpec, Route, StatusSpec, Stylesheet};
use crate::diag::{Diag, Diagnostics};
use crate::parser::{parse_expr, parse_return, parse_status};
use crate::scan::{block_content, find_opening, find_top_level, split_top_level, strip_quotes};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn load_file(path: &Path) -> Result<(Stylesheet, Vec<Diag>), LoadError> {
    let src = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(load_stylesheet(&src))
}

/// Parses a stylesheet into routes. Problems are reported as diagnostics;
/// a malformed declaration never stops the rest of the sheet from loading.
pub fn load_stylesheet(src: &str) -> (Stylesheet, Vec<Diag>) {
    let mut loader = SheetLoader::new(src);
    loader.load();
    (loader.sheet, loader.diags.into_vec())
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\[\s*([A-Za-z_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s]+))\s*\]"#)
            .unwrap_or_else(|err| panic!("invalid attribute pattern: {err}"))
    })
}

struct SheetLoader {
    src: String,
    sheet: Stylesheet,
    diags: Diagnostics,
    seen_routes: HashSet<(String, String)>,
}

impl SheetLoader {
    fn new(src: &str) -> Self {
        Self {
            src: strip_comments(src),
            sheet: Stylesheet::default(),
            diags: Diagnostics::default(),
            seen_routes: HashSet::new(),
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        self.src[..offset.min(self.src.len())].matches('\n').count() + 1
    }

    fn load(&mut self) {
        let src = self.src.clone();
        let mut pos = 0;
        while pos < src.len() {
            let rest = &src[pos..];
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                break;
            }
            let start = pos + (rest.len() - trimmed.len());
            let item = &src[start..];
            let consumed = if item.starts_with('@') {
                self.load_at_rule(item, start)
            } else {
                self.load_block(item, start)
            };
            pos = start + consumed.max(1);
        }
    }

    /// `@name value;`. Returns the bytes consumed.
    fn load_at_rule(&mut self, item: &str, offset: usize) -> usize {
        let end = find_top_level(item, ';').unwrap_or(item.len());
        let line = self.line_at(offset);
        let rule = item[1..end].trim();
        let (name, value) = match rule.find(char::is_whitespace) {
            Some(idx) => (&rule[..idx], rule[idx..].trim()),
            None => (rule, ""),
        };
        match name {
            "database" => match rt_config::resolve_value(value) {
                Some(url) => {
                    if self.sheet.database.is_some() {
                        self.diags
                            .warning(line, "@database declared more than once; last one wins");
                    }
                    self.sheet.database = Some(url);
                }
                None => self
                    .diags
                    .warning(line, format!("@database `{value}` resolved to nothing")),
            },
            "schema" => {
                let sql = strip_quotes(value).trim();
                if sql.is_empty() {
                    self.diags.warning(line, "empty @schema statement ignored");
                } else {
                    self.sheet.schema.push(sql.to_string());
                }
            }
            other => self
                .diags
                .warning(line, format!("unknown at-rule @{other} ignored")),
        }
        end + 1
    }

    /// `selector { declarations }`. Returns the bytes consumed.
    fn load_block(&mut self, item: &str, offset: usize) -> usize {
        let line = self.line_at(offset);
        let Some(open) = find_opening(item, '{') else {
            self.diags
                .error(line, format!("expected `{{` after `{}`", item.trim()));
            return item.len();
        };
        if let Some(semi) = find_top_level(&item[..open], ';') {
            self.diags.warning(
                line,
                format!("stray text `{}` ignored", item[..semi].trim()),
            );
            return semi + 1;
        }
        let selector = item[..open].trim();
        let body = block_content(item, open);
        let consumed = open + 1 + body.len() + 1;
        let Some(rest) = selector.strip_prefix("route") else {
            self.diags
                .warning(line, format!("unknown selector `{selector}` ignored"));
            return consumed;
        };
        let mut method = "GET".to_string();
        let mut path = None;
        for caps in attribute_pattern().captures_iter(rest) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match &caps[1] {
                "method" => method = value.to_ascii_uppercase(),
                "path" => path = Some(value),
                other => self
                    .diags
                    .warning(line, format!("unknown route attribute `{other}` ignored")),
            }
        }
        let Some(path) = path else {
            self.diags
                .error(line, format!("route `{selector}` is missing a path attribute"));
            return consumed;
        };
        let body_offset = offset + open + 1;
        if let Some(route) = self.load_route(method, path, body, body_offset, line) {
            if self
                .seen_routes
                .insert((route.method.clone(), route.path.clone()))
            {
                self.sheet.routes.push(route);
            } else {
                self.diags.warning(
                    line,
                    format!(
                        "duplicate route {} {}; the first declaration wins",
                        route.method, route.path
                    ),
                );
            }
        }
        consumed
    }

    fn load_route(
        &mut self,
        method: String,
        path: String,
        body: &str,
        body_offset: usize,
        line: usize,
    ) -> Option<Route> {
        let mut assignments: Vec<Assignment> = Vec::new();
        let mut status: Option<StatusSpec> = None;
        let mut ret: Option<ReturnSpec> = None;
        for decl in split_top_level(body, ';') {
            let decl_line = self.line_at(body_offset + offset_in(body, decl) + leading_ws(decl));
            let decl = decl.trim();
            if decl.is_empty() {
                continue;
            }
            let Some(colon) = find_top_level(decl, ':') else {
                self.diags
                    .warning(decl_line, format!("declaration `{decl}` has no value"));
                continue;
            };
            let property = decl[..colon].trim();
            let value = decl[colon + 1..].trim();
            if let Some(name) = property.strip_prefix("--") {
                if assignments.iter().any(|a| a.name == name) {
                    self.diags.warning(
                        decl_line,
                        format!("variable --{name} assigned more than once; later value shadows"),
                    );
                }
                let expr = parse_expr(value);
                self.check_queries(&expr, decl_line);
                assignments.push(Assignment {
                    name: name.to_string(),
                    value: expr,
                    line: decl_line,
                });
                continue;
            }
            match property {
                "status" => match parse_status(value) {
                    Ok(spec) => {
                        if let StatusSpec::Conditional(expr) = &spec {
                            self.check_queries(expr, decl_line);
                        }
                        status = Some(spec);
                    }
                    Err(message) => self.diags.error(decl_line, message),
                },
                "return" => {
                    if ret.is_some() {
                        self.diags
                            .warning(decl_line, "return declared more than once; last one wins");
                    }
                    let spec = parse_return(value);
                    self.check_queries(&spec.body, decl_line);
                    ret = Some(spec);
                }
                other => self
                    .diags
                    .warning(decl_line, format!("unknown property `{other}` ignored")),
            }
        }
        let Some(ret) = ret else {
            self.diags
                .error(line, format!("route {method} {path} has no return declaration"));
            return None;
        };
        Some(Route {
            method,
            path,
            assignments,
            status,
            ret,
            line,
        })
    }

    fn check_queries(&mut self, expr: &Expr, line: usize) {
        visit_exprs(expr, &mut |node| {
            if let Expr::Query { sql, .. } = node {
                if sql.trim().is_empty() {
                    self.diags
                        .warning(line, "sql() without a quoted statement runs an empty query");
                }
            }
        });
    }
}

fn visit_exprs(expr: &Expr, f: &mut dyn FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Query { args, .. } => args.iter().for_each(|arg| visit_exprs(arg, f)),
        Expr::Conditional {
            branches,
            else_branch,
        } => {
            for (_, value) in branches {
                visit_exprs(value, f);
            }
            if let Some(value) = else_branch {
                visit_exprs(value, f);
            }
        }
        Expr::Concat(parts) => parts.iter().for_each(|part| visit_exprs(part, f)),
        Expr::Literal(_)
        | Expr::VarRef(_)
        | Expr::ParamRef(_)
        | Expr::QueryRef(_)
        | Expr::BodyRef(_)
        | Expr::HeaderRef(_)
        | Expr::JsonLiteral(_)
        | Expr::HtmlLiteral(_) => {}
    }
}

/// Byte offset of `inner` within `outer`; `inner` must be a subslice.
fn offset_in(outer: &str, inner: &str) -> usize {
    (inner.as_ptr() as usize).saturating_sub(outer.as_ptr() as usize)
}

fn leading_ws(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

/// Blanks out `/* ... */` comments outside quotes, keeping newlines so line
/// numbers still point into the stylesheet as written.
fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
            out.push(ch);
            continue;
        }
        if ch == '/' && chars.peek() == Some(&'*') {
            chars.next();
            out.push_str("  ");
            let mut prev = '\0';
            for inner in chars.by_ref() {
                if prev == '*' && inner == '/' {
                    out.push(' ');
                    break;
                }
                out.push(if inner == '\n' { '\n' } else { ' ' });
                prev = inner;
            }
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comments_keeps_line_count_and_quoted_text() {
        let src = "a /* one\ntwo */ b \"/* kept */\"";
        let stripped = strip_comments(src);
        assert_eq!(stripped.matches('\n').count(), 1);
        assert!(stripped.contains("\"/* kept */\""));
        assert!(!stripped.contains("one"));
        assert!(stripped.ends_with("b \"/* kept */\""));
    }
}
