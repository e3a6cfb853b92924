pub const ENV_PREFIX: &str = "ROUTECSS";

/// Environment override key for a manifest field: `serve`/`max_requests`
/// becomes `ROUTECSS_SERVE_MAX_REQUESTS`.
pub fn env_key(section: &str, field: &str) -> String {
    format!("{ENV_PREFIX}_{}_{}", to_env_key(section), to_env_key(field))
}

pub fn env_override(section: &str, field: &str) -> Option<String> {
    std::env::var(env_key(section, field))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Resolves `env(NAME)` to the variable's value; any other text is returned
/// trimmed with one layer of quotes removed.
pub fn resolve_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix("env(").and_then(|rest| rest.strip_suffix(')')) {
        let name = inner.trim().trim_matches(|c| c == '"' || c == '\'');
        return std::env::var(name).ok().filter(|value| !value.is_empty());
    }
    let unquoted = strip_quotes(raw);
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

fn strip_quotes(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

fn to_env_key(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == '.' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
            continue;
        }
        let is_upper = ch.is_ascii_uppercase();
        if is_upper && prev_lower {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
    }
    out
}
