//! Error types for the automation client

use thiserror::Error;

/// Result type alias using [`DriverError`]
pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Session not created: {0}")]
    SessionNotCreated(String),

    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Protocol error ({code}): {message}")]
    Protocol { code: String, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("No locator matched; tried: {}", .attempts.join(", "))]
    LocatorsExhausted { attempts: Vec<String> },

    #[error("Invalid key code: {0}")]
    InvalidKeyCode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl DriverError {
    /// Map a W3C WebDriver error code and message onto a variant
    pub fn from_w3c(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "no such element" => DriverError::NoSuchElement(message),
            "stale element reference" => DriverError::StaleElement(message),
            "invalid selector" => DriverError::InvalidSelector(message),
            "session not created" => DriverError::SessionNotCreated(message),
            "invalid session id" => DriverError::InvalidSession(message),
            "timeout" | "script timeout" => DriverError::Timeout(message),
            _ => DriverError::Protocol {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Whether a lookup simply found nothing, so the next locator may be tried
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DriverError::NoSuchElement(_)
                | DriverError::InvalidSelector(_)
                | DriverError::LocatorsExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("no such element", "NoSuchElement")]
    #[test_case("stale element reference", "StaleElement")]
    #[test_case("invalid selector", "InvalidSelector")]
    #[test_case("session not created", "SessionNotCreated")]
    #[test_case("invalid session id", "InvalidSession")]
    #[test_case("timeout", "Timeout")]
    #[test_case("unknown command", "Protocol")]
    fn maps_w3c_codes(code: &str, expected: &str) {
        let err = DriverError::from_w3c(code, "boom");
        let name = format!("{:?}", err);
        assert!(name.starts_with(expected), "{} mapped to {}", code, name);
    }

    #[test]
    fn exhausted_lists_attempts() {
        let err = DriverError::LocatorsExhausted {
            attempts: vec!["xpath=//a".into(), "accessibility id=b".into()],
        };
        assert_eq!(
            err.to_string(),
            "No locator matched; tried: xpath=//a, accessibility id=b"
        );
        assert!(err.is_not_found());
    }
}
