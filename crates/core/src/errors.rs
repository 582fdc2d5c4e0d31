use std::fmt;

use thiserror::Error;

/// Unified error type for the entire portfolio-dashboard-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("Rate limited by {0}")]
    RateLimited(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cache error: {0}")]
    Cache(String),

    // ── Streaming ───────────────────────────────────────────────────
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Network-class failure categories.
///
/// Used for diagnostics only: every kind gets the same fallback handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionReset,
    ConnectionRefused,
    Dns,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Timeout => write!(f, "timeout"),
            NetworkErrorKind::ConnectionReset => write!(f, "connection reset"),
            NetworkErrorKind::ConnectionRefused => write!(f, "connection refused"),
            NetworkErrorKind::Dns => write!(f, "dns failure"),
            NetworkErrorKind::Other => write!(f, "other"),
        }
    }
}

impl CoreError {
    /// The network failure category, if this is a network-class error.
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            CoreError::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.network_kind() == Some(NetworkErrorKind::Timeout)
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Api {
            provider: "unknown".into(),
            message: format!("Malformed response body: {e}"),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        let kind = classify_reqwest_error(&e);
        // Strip query parameters from URLs: reqwest errors carry the full
        // URL and upstream tokens travel in the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network {
            kind,
            message: sanitized,
        }
    }
}

/// Walk the error source chain to find out what kind of network failure
/// reqwest is wrapping.
fn classify_reqwest_error(e: &reqwest::Error) -> NetworkErrorKind {
    if e.is_timeout() {
        return NetworkErrorKind::Timeout;
    }

    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                    return NetworkErrorKind::ConnectionReset
                }
                std::io::ErrorKind::ConnectionRefused => {
                    return NetworkErrorKind::ConnectionRefused
                }
                _ => {}
            }
        }
        let text = err.to_string().to_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return NetworkErrorKind::Dns;
        }
        source = err.source();
    }

    NetworkErrorKind::Other
}
