//! Errors surfaced by the gated API client.

use reqwest::StatusCode;
use serde_json::Value;

/// Failure of a backend call.
///
/// Pages only need to tell [`ClientError::SubscriptionInactive`] apart from
/// everything else; authentication failures are already resolved (session
/// cleared, navigator redirected) by the time one is returned.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 401/403 with no usable refresh token, or the refresh itself failed
    #[error("{message}")]
    AuthExpired {
        status: Option<StatusCode>,
        message: String,
    },

    /// The restaurant's subscription is suspended
    #[error("{0}")]
    SubscriptionInactive(String),

    /// Any other non-2xx response
    #[error("{message}")]
    Request {
        status: StatusCode,
        message: String,
        details: Option<Value>,
    },

    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub(crate) fn auth_expired(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self::AuthExpired {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the failing response, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::AuthExpired { status, .. } => *status,
            ClientError::Request { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::AuthExpired { .. })
    }

    pub fn is_subscription_inactive(&self) -> bool {
        matches!(self, ClientError::SubscriptionInactive(_))
    }
}

/// Whether a backend error message means the tenant's subscription is suspended.
pub(crate) fn is_subscription_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("subscription inactive") || lower.contains("subscription expired")
}

/// Pull a human-readable message out of a JSON error body.
pub(crate) fn error_message(body: Option<&Value>, fallback: &str) -> String {
    body.and_then(|b| {
        b.get("message")
            .or_else(|| b.get("error"))
            .and_then(Value::as_str)
    })
    .filter(|m| !m.is_empty())
    .unwrap_or(fallback)
    .to_string()
}
