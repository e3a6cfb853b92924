use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use routecss_rt::error as rt_error;
use thiserror::Error;

use crate::app::{App, percent_decode};
use crate::observability;
use crate::route::Request;
use crate::value::{Object, Value};

const MAX_HEADER_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Stop after this many requests; 0 serves forever.
    pub max_requests: usize,
    /// A client that sends nothing for this long gets a 400.
    pub read_timeout: Option<Duration>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_requests: 0,
            read_timeout: Some(Duration::from_secs(5)),
        }
    }
}

pub fn serve(app: &App, config: &ServeConfig) -> Result<(), ServeError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).map_err(|source| ServeError::Bind {
        addr: addr.clone(),
        source,
    })?;
    tracing::info!(addr = %addr, routes = app.routes().routes().len(), "listening");
    serve_listener(app, listener, config)
}

/// Accepts connections one at a time and answers one request per
/// connection.
pub fn serve_listener(app: &App, listener: TcpListener, config: &ServeConfig) -> Result<(), ServeError> {
    let mut handled = 0usize;
    for stream in listener.incoming() {
        let mut stream = stream.map_err(ServeError::Accept)?;
        if let Err(err) = stream.set_read_timeout(config.read_timeout) {
            tracing::warn!(error = %err, "failed to set read timeout");
        }
        handle_connection(app, &mut stream);
        handled += 1;
        if config.max_requests > 0 && handled >= config.max_requests {
            break;
        }
    }
    Ok(())
}

fn handle_connection(app: &App, stream: &mut TcpStream) {
    let started = Instant::now();
    let (request_id, method, path, status, response) = match read_http_request(stream) {
        Ok(request) => {
            let request_id = observability::resolve_request_id(&request.headers);
            let (status, response) = respond(app, &request);
            (request_id, request.method, request.path, status, response)
        }
        Err(message) => {
            let body = rt_error::error_body(&message);
            (
                observability::resolve_request_id(&HashMap::new()),
                String::new(),
                String::new(),
                400,
                http_response(400, &body, "application/json"),
            )
        }
    };
    if let Err(err) = stream.write_all(response.as_bytes()) {
        tracing::warn!(error = %err, "failed to write response");
    }
    observability::log_request(
        &request_id,
        &method,
        &path,
        status,
        started.elapsed(),
        response.len(),
    );
}

fn respond(app: &App, request: &HttpRequest) -> (u16, String) {
    let (path, query_string) = match request.path.split_once('?') {
        Some((path, query)) => (path, query),
        None => (request.path.as_str(), ""),
    };
    let route_request = Request {
        params: HashMap::new(),
        query: parse_query_string(query_string),
        body: parse_body(&request.headers, &request.body),
        headers: request.headers.clone(),
    };
    match app.handle(&request.method, path, route_request) {
        Some(response) => {
            let status = response.status.unwrap_or(200);
            let body = http_response(status, response.body.text(), response.body.content_type());
            (status, body)
        }
        None => {
            let body = rt_error::error_body(rt_error::NOT_FOUND);
            (404, http_response(404, &body, "application/json"))
        }
    }
}

/// Repeated keys are joined with `,` in order of appearance.
pub fn parse_query_string(raw: &str) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();
    for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key, true);
        let value = percent_decode(value, true);
        out.entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// JSON objects and urlencoded forms become body fields; anything else is
/// an empty body.
pub fn parse_body(headers: &HashMap<String, String>, body: &[u8]) -> Object {
    if body.is_empty() {
        return Object::new();
    }
    let content_type = headers
        .get("content-type")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let text = String::from_utf8_lossy(body);
        return parse_query_string(&text)
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(json @ serde_json::Value::Object(_)) => match Value::from_json(&json) {
            Value::Object(map) => map,
            _ => Object::new(),
        },
        _ => Object::new(),
    }
}

struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_http_request(stream: &TcpStream) -> Result<HttpRequest, String> {
    let mut reader = BufReader::new(stream);
    let mut budget = MAX_HEADER_BYTES;
    let request_line = read_header_line(&mut reader, &mut budget)?
        .ok_or_else(|| "invalid HTTP request: missing headers".to_string())?;
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Err("invalid HTTP request line".to_string());
    };
    let method = method.to_ascii_uppercase();
    let path = path.to_string();

    let mut headers = HashMap::new();
    loop {
        let line = read_header_line(&mut reader, &mut budget)?
            .ok_or_else(|| "invalid HTTP request: missing headers".to_string())?;
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let mut body = Vec::new();
    reader
        .by_ref()
        .take(content_length)
        .read_to_end(&mut body)
        .map_err(read_error)?;
    Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    })
}

/// Reads one header line without its line ending, charging it against the
/// remaining header budget. `None` means the client closed the stream.
fn read_header_line<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<Option<String>, String> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(*budget as u64 + 1)
        .read_until(b'\n', &mut line)
        .map_err(read_error)?;
    if read == 0 {
        return Ok(None);
    }
    if read > *budget {
        return Err("request header too large".to_string());
    }
    *budget -= read;
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

fn read_error(err: std::io::Error) -> String {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => "timed out reading request".to_string(),
        _ => format!("failed to read request: {err}"),
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn http_response(status: u16, body: &str, content_type: &str) -> String {
    let reason = reason_phrase(status);
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
