use axum::Json;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use html_escape::encode_double_quoted_attribute;
use html_escape::encode_text;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// One entry of the back end's `messages` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default = "default_message_kind")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

fn default_message_kind() -> String {
    "ERROR".to_string()
}

impl Message {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: default_message_kind(),
            text: text.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    NotFound(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("search daemon returned {status}{}", describe(.messages))]
    Upstream {
        status: StatusCode,
        messages: Vec<Message>,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

fn describe(messages: &[Message]) -> String {
    let texts: Vec<&str> = messages
        .iter()
        .map(|message| message.text.as_str())
        .filter(|text| !text.is_empty())
        .collect();
    if texts.is_empty() {
        String::new()
    } else {
        format!(": {}", texts.join("; "))
    }
}

impl ProxyError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ProxyError::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ProxyError::InvalidInput(message.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ProxyError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::AuthFailed => StatusCode::UNAUTHORIZED,
            ProxyError::Forbidden(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Messages shown to the caller. Internal details are escaped, and an
    /// authentication failure never says which check failed.
    pub fn messages(&self) -> Vec<Message> {
        match self {
            ProxyError::Upstream { messages, .. } if !messages.is_empty() => messages.clone(),
            ProxyError::Upstream { status, .. } => {
                vec![Message::error(format!("search daemon returned {status}"))]
            }
            ProxyError::AuthFailed => vec![Message::error("Authentication failed")],
            ProxyError::Internal(message) => vec![Message::error(encode_text(message))],
            ProxyError::NotFound(message)
            | ProxyError::Forbidden(message)
            | ProxyError::InvalidInput(message)
            | ProxyError::Timeout(message) => vec![Message::error(message.as_str())],
        }
    }

    pub fn in_format(self, format: ErrorFormat) -> ApiError {
        ApiError {
            error: self,
            format,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            tracing::error!(error = %err, "search daemon timed out");
            ProxyError::Timeout(
                "The search daemon did not respond in time. Try again later.".to_string(),
            )
        } else {
            ProxyError::internal(format!("search daemon request failed: {err}"))
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Body encoding for error responses, picked from the caller's `output_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFormat {
    Json,
    #[default]
    Xml,
}

impl ErrorFormat {
    pub fn from_output_mode(mode: Option<&str>) -> Self {
        match mode {
            Some(mode) if mode.eq_ignore_ascii_case("json") => ErrorFormat::Json,
            _ => ErrorFormat::Xml,
        }
    }
}

/// A [`ProxyError`] bound to the encoding the caller asked for.
#[derive(Debug)]
pub struct ApiError {
    pub error: ProxyError,
    pub format: ErrorFormat,
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        error.in_format(ErrorFormat::Json)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        if let ProxyError::Internal(message) = &self.error {
            tracing::error!(error = %message, "internal error");
        }
        let messages = self.error.messages();
        match self.format {
            ErrorFormat::Json => {
                let body = serde_json::json!({ "success": false, "messages": messages });
                (status, Json(body)).into_response()
            }
            ErrorFormat::Xml => (
                status,
                [(CONTENT_TYPE, "text/xml; charset=utf-8")],
                render_xml_messages(&messages),
            )
                .into_response(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

pub fn render_xml_messages(messages: &[Message]) -> String {
    let mut out = String::from("<response><messages>");
    for message in messages {
        out.push_str(&format!(
            "<msg type=\"{}\">{}</msg>",
            encode_double_quoted_attribute(&message.kind),
            encode_text(&message.text)
        ));
    }
    out.push_str("</messages></response>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(ProxyError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ProxyError::AuthFailed.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::Forbidden("write".to_string()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(ProxyError::invalid("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::Upstream {
                status: StatusCode::CONFLICT,
                messages: Vec::new(),
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ProxyError::Timeout("slow".to_string()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_messages_are_escaped() {
        let messages = ProxyError::internal("<script>alert(1)</script>").messages();
        assert_eq!(
            messages,
            vec![Message::error("&lt;script&gt;alert(1)&lt;/script&gt;")]
        );
    }

    #[test]
    fn auth_failure_is_generic() {
        assert_eq!(
            ProxyError::AuthFailed.messages(),
            vec![Message::error("Authentication failed")]
        );
    }

    #[test]
    fn xml_body_escapes_text() {
        let xml = render_xml_messages(&[Message {
            kind: "WARN".to_string(),
            text: "a < b & c".to_string(),
        }]);
        assert_eq!(
            xml,
            "<response><messages><msg type=\"WARN\">a &lt; b &amp; c</msg></messages></response>"
        );
    }

    #[test]
    fn output_mode_selects_format() {
        assert_eq!(ErrorFormat::from_output_mode(Some("JSON")), ErrorFormat::Json);
        assert_eq!(ErrorFormat::from_output_mode(Some("csv")), ErrorFormat::Xml);
        assert_eq!(ErrorFormat::from_output_mode(None), ErrorFormat::Xml);
    }
}
