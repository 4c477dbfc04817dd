use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

/// Wire-level envelope produced by every handler.
///
/// Each envelope carries a status code, a header set that always starts from
/// the JSON content-type and permissive CORS defaults, and a JSON body. This
/// is the only way handlers produce output; errors are rendered through the
/// same type (see `error.rs`).
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    body: JsonValue,
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        (
            "Access-Control-Allow-Methods".to_string(),
            "GET, POST, PUT, DELETE, OPTIONS".to_string(),
        ),
        (
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type, X-API-Key".to_string(),
        ),
    ])
}

impl Envelope {
    pub fn new(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            headers: default_headers(),
            body,
        }
    }

    /// Override a default header. `Some(value)` replaces the header,
    /// `None` strips it from the final set entirely.
    pub fn header(mut self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => {
                self.headers.insert(name.to_string(), value.to_string());
            }
            None => {
                self.headers.remove(name);
            }
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &JsonValue {
        &self.body
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body.to_string()).into_response();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// 200 envelope; the body is serialized as-is, no extra wrapping key.
pub fn success(data: JsonValue) -> Envelope {
    Envelope::new(StatusCode::OK, data)
}

/// Error envelope with body `{message, error?}`. The `error` member carries
/// the underlying cause's message and is absent (not null) when there is none.
pub fn error(status: StatusCode, message: &str, cause: Option<String>) -> Envelope {
    let mut body = json!({ "message": message });
    if let Some(cause) = cause {
        body["error"] = JsonValue::String(cause);
    }
    Envelope::new(status, body)
}
