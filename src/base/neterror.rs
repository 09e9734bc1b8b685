use std::io;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Resolution Errors
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Host resolver queue too large")]
    HostResolverQueueTooLarge,
    #[error("Name resolution failed")]
    NameResolutionFailed,

    // Connection / TLS Errors
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("SSL protocol error")]
    SslProtocolError,

    // URL / Fetch Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Invalid response")]
    InvalidResponse,

    // Context-rich errors (custom codes starting at -1000)
    #[error("Host name is empty")]
    InvalidHost,
    #[error("Could not resolve {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Failed to load bootstrap configuration: {reason}")]
    ConfigLoadFailed { reason: String },
    #[error("Completion queue unavailable")]
    CompletionQueueUnavailable,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::NameNotResolved => -105,
            NetError::HostResolverQueueTooLarge => -119,
            NetError::NameResolutionFailed => -137,

            NetError::ConnectionFailed => -104,
            NetError::SslProtocolError => -107,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::InvalidResponse => -320,

            // Context-rich variants share the code of their base error
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::InvalidHost => -1000,
            NetError::ConfigLoadFailed { .. } => -1001,
            NetError::CompletionQueueUnavailable => -1002,
            NetError::Unknown(code) => *code,
        }
    }

    /// Create a resolution error carrying the domain that failed.
    pub fn dns_failed(domain: impl Into<String>, source: io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.into(),
            source: Arc::new(source),
        }
    }

    /// Create a bootstrap configuration error.
    pub fn config_load_failed(reason: impl Into<String>) -> Self {
        NetError::ConfigLoadFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error means the name itself could not be resolved,
    /// as opposed to the resolver misbehaving.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::NameResolutionFailed
                | NetError::HostResolverQueueTooLarge
                | NetError::InvalidHost
        )
    }
}

/// Codes map back to their base variant. Context carried by the original
/// error (the failing domain, the load failure reason) is not recoverable
/// from the code alone.
impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -119 => NetError::HostResolverQueueTooLarge,
            -137 => NetError::NameResolutionFailed,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -320 => NetError::InvalidResponse,

            -1000 => NetError::InvalidHost,
            -1001 => NetError::config_load_failed("unspecified"),
            -1002 => NetError::CompletionQueueUnavailable,
            _ => NetError::Unknown(code),
        }
    }
}
