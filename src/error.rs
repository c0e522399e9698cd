//! Crate-level error type.
//!
//! Cancellation is deliberately absent: a cancelled session ends with
//! [`crate::ingestor::Outcome::Cancelled`], never with an error.

use thiserror::Error;

use crate::request::ValidationError;

#[derive(Error, Debug)]
pub enum ArticleError {
    /// Connection-level failure: refused, reset, timed out, or a body read
    /// that broke mid-stream.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success HTTP status before any
    /// streaming began.
    #[error("HTTP error! status: {status}{}", body_suffix(.body))]
    Protocol { status: u16, body: String },

    /// A single framed line carried JSON that could not be parsed.
    /// The ingestor recovers from this; it is only surfaced by the
    /// line-level parser.
    #[error("failed to parse streaming data: {line}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service reported a failure in its payload.
    #[error("{0}")]
    Application(String),

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn body_suffix(body: &str) -> String {
    if body.trim().is_empty() {
        String::new()
    } else {
        format!(" ({})", body.trim())
    }
}

pub type Result<T> = std::result::Result<T, ArticleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_display_without_body() {
        let err = ArticleError::Protocol { status: 503, body: String::new() };
        assert_eq!(err.to_string(), "HTTP error! status: 503");
    }

    #[test]
    fn test_protocol_display_with_body() {
        let err = ArticleError::Protocol {
            status: 400,
            body: "{\"detail\":\"Topic cannot be empty\"}\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error! status: 400 ({\"detail\":\"Topic cannot be empty\"})"
        );
    }

    #[test]
    fn test_application_display_is_message() {
        let err = ArticleError::Application("model not loaded".to_string());
        assert_eq!(err.to_string(), "model not loaded");
    }

    #[test]
    fn test_decode_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = ArticleError::Decode { line: "data: {oops".to_string(), source };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("failed to parse streaming data: data: {oops"));
    }

    #[test]
    fn test_validation_converts() {
        let err: ArticleError = ValidationError::EmptyTopic.into();
        assert!(matches!(err, ArticleError::Validation(ValidationError::EmptyTopic)));
    }
}
