use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const REQUEST_ID_FALLBACK_HEADER: &str = "x-correlation-id";

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Takes the caller's request id if it looks sane, else allocates one.
/// `headers` must already be lowercased.
pub fn resolve_request_id(headers: &HashMap<String, String>) -> String {
    request_id_from_header(headers, REQUEST_ID_HEADER)
        .or_else(|| request_id_from_header(headers, REQUEST_ID_FALLBACK_HEADER))
        .unwrap_or_else(next_request_id)
}

fn request_id_from_header(headers: &HashMap<String, String>, name: &str) -> Option<String> {
    let value = headers.get(name)?.trim();
    if value.is_empty() || value.len() > 128 {
        return None;
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':'))
    {
        return None;
    }
    Some(value.to_string())
}

fn next_request_id() -> String {
    format!("req-{}", NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn log_request(
    request_id: &str,
    method: &str,
    path: &str,
    status: u16,
    duration: Duration,
    response_bytes: usize,
) {
    let duration_ms = duration.as_secs_f64() * 1000.0;
    if status >= 500 {
        tracing::error!(request_id, method, path, status, duration_ms, response_bytes, "http.request");
    } else {
        tracing::info!(request_id, method, path, status, duration_ms, response_bytes, "http.request");
    }
}
