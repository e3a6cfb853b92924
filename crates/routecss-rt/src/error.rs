use serde_json::{Map, Value as JsonValue};

pub const NOT_FOUND: &str = "Not found";
pub const DATABASE_NOT_CONFIGURED: &str = "Database not configured";

/// `{"error": message}`, the single error shape used by routes and transport.
pub fn error_json(message: &str) -> JsonValue {
    let mut root = Map::new();
    root.insert("error".to_string(), JsonValue::String(message.to_string()));
    JsonValue::Object(root)
}

pub fn error_body(message: &str) -> String {
    error_json(message).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_is_compact_json() {
        assert_eq!(error_body(NOT_FOUND), r#"{"error":"Not found"}"#);
        assert_eq!(
            error_body("say \"hi\""),
            r#"{"error":"say \"hi\""}"#
        );
    }
}
