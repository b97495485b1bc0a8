use letterbox_api_types::ErrorBody;
use thiserror::Error;

/// Classified failure of a single API request.
///
/// `Clone` so one de-duplicated in-flight result can be handed to every waiting consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No response was received.
    #[error("network error: {message}")]
    Network { message: String },
    /// The server answered with a non-2xx status.
    #[error("server responded with status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: String,
    },
    /// The response payload could not be decoded.
    #[error("failed to parse response: {message}")]
    Parse { message: String },
    /// A write was attempted without a token; nothing was sent.
    #[error("an authorization token is required for this request")]
    Unauthorized,
    /// The request could not be built (bad base URL or target).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Build an `Http` error from a non-2xx response body.
    ///
    /// The message comes from the `{ "message": ... }` body when present, then the raw text.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let raw = String::from_utf8_lossy(body).trim().to_string();
        let message = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => parsed.message,
            Err(_) if !raw.is_empty() => raw.clone(),
            Err(_) => format!("HTTP {status}"),
        };
        Self::Http {
            status,
            message,
            body: raw,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures and 5xx responses may be retried by the caller.
    pub fn is_retry_eligible(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    /// Message suitable for showing to an admin user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Http { status: 401, .. } => "Your session has expired. Sign in again.".to_string(),
            Self::Http { status: 403, .. } => {
                "You do not have permission to perform this action.".to_string()
            }
            Self::Http { status: 404, .. } => "The requested item no longer exists.".to_string(),
            Self::Http { status, message, .. } if *status >= 500 => {
                format!("The server failed to process the request ({status}): {message}. Try again later.")
            }
            Self::Http { message, .. } => message.clone(),
            Self::Parse { .. } => "The server returned an unexpected response.".to_string(),
            Self::Unauthorized => "You must be signed in to make changes.".to_string(),
            Self::InvalidRequest { message } => format!("The request could not be built: {message}"),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::parse(error.to_string())
        } else if error.is_builder() {
            Self::invalid_request(error.to_string())
        } else {
            Self::network(error.to_string())
        }
    }
}
