//! Redaction of credentials before requests, responses or bodies end up in logs.
use std::sync::OnceLock;

use http::{HeaderMap, HeaderValue};
use regex::Regex;
use serde_json::Value;

static REGEX: OnceLock<Regex> = OnceLock::new();

fn regex() -> &'static Regex {
    REGEX.get_or_init(|| {
        let segments = ["secret", "key", "pkey", "session", "password"]
            .map(|s| format!(r"(^|[-_]){s}($|[-_])"))
            .join("|");
        // camelCase keys such as `accessToken` and `refreshToken` have no delimiter before `token`.
        Regex::new(&format!(r"(?i)({segments}|token$)")).expect("Unable to compile regex")
    })
}

pub static SANITIZED_VALUE: &str = "**********";

pub fn should_sanitize(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    match key.as_str() {
        "authorization" | "cookie" | "password" | "set-cookie" => true,
        _ => regex().is_match(&key),
    }
}

pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if should_sanitize(key) {
                    *value = Value::String(SANITIZED_VALUE.to_string());
                } else {
                    sanitize_value(value);
                }
            }
        }
        Value::Array(vec) => {
            for value in vec.iter_mut() {
                sanitize_value(value);
            }
        }
        _ => {}
    }
}

pub fn sanitize_headers(headers: &mut HeaderMap) {
    let sanitized = HeaderValue::from_static(SANITIZED_VALUE);
    for (key, value) in headers.iter_mut() {
        if should_sanitize(key.as_str()) {
            *value = sanitized.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use http::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_sanitize() {
        for key in ["Authorization", "accessToken", "refreshToken", "access_token", "token", "x-api-key", "client_secret", "password"] {
            assert!(should_sanitize(key), "{key} should be sanitized");
        }
        for key in ["amount", "categoryName", "monkey", "tokenizer", "email"] {
            assert!(!should_sanitize(key), "{key} should be kept");
        }
    }

    #[test]
    fn test_sanitize_nested_values() {
        let mut value = json!({"token": "T1", "name": "Ana", "sessions": [{"refreshToken": "R1", "id": 1}]});
        sanitize_value(&mut value);
        assert_eq!(value, json!({"token": SANITIZED_VALUE, "name": "Ana", "sessions": [{"refreshToken": SANITIZED_VALUE, "id": 1}]}));
    }

    #[test]
    fn test_sanitize_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer T1"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        sanitize_headers(&mut headers);
        assert_eq!(headers[AUTHORIZATION], SANITIZED_VALUE);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }
}
