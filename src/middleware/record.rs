use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const REDACTED: &str = "[REDACTED]";

/// One structured log entry for a single HTTP exchange.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub message: String,
    pub request_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub request: RequestAttributes,
    pub response: ResponseAttributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestAttributes {
    pub method: String,
    pub path: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub remote_addr: Option<String>,
    pub host: Option<String>,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseAttributes {
    pub status_code: u16,
    pub status_message: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl LogRecord {
    pub fn summary(
        method: &str,
        url: &str,
        status_code: u16,
        status_message: &str,
        elapsed_ms: Option<u64>,
    ) -> String {
        let line = format!("{method} {url} {status_code} {status_message}");
        let line = line.trim_end();
        match elapsed_ms {
            Some(ms) => format!("{line} {ms}ms"),
            None => line.to_string(),
        }
    }
}

/// Flattens a header map, joining repeated headers with `", "` and masking
/// any header named in `redact` (case-insensitive).
pub fn header_fields(headers: &HeaderMap, redact: &[String]) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let name = name.as_str();
        let value = if redact.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            REDACTED
        } else {
            value.to_str().unwrap_or("<binary>")
        };

        fields
            .entry(name.to_string())
            .and_modify(|existing| {
                if existing != REDACTED {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
            })
            .or_insert_with(|| value.to_string());
    }

    fields
}

/// Renders a body for the log record: parsed JSON when it is JSON, text
/// otherwise. Bodies over `limit` bytes are cut and marked as truncated.
pub fn body_value(body: &[u8], limit: usize) -> Value {
    if body.len() > limit {
        let head = String::from_utf8_lossy(&body[..limit]);
        return Value::String(format!(
            "{head}...[truncated {} of {} bytes]",
            body.len() - limit,
            body.len()
        ));
    }

    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
