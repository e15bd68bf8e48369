//! Error types for the ENI binder
//!
//! Every failure a reconciliation pass can hit is one of these variants.
//! None of them escape the binder's lifecycle methods: they are logged and
//! turned into a retry or a reschedule at the pass boundary.

use thiserror::Error;

/// Result type alias for binder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the ENI binder
#[derive(Error, Debug)]
pub enum Error {
    /// The zone has no configured or discoverable addresses
    #[error("No candidate addresses for zone {zone}")]
    NoCandidates {
        /// Availability zone that was queried
        zone: String,
    },

    /// A discovered identity cannot be reduced to an IPv4 address
    #[error("Malformed candidate '{candidate}': {reason}")]
    MalformedCandidate {
        /// The raw URL or hostname as discovered
        candidate: String,
        /// Why it was rejected
        reason: String,
    },

    /// Cloud API query failure (describe calls)
    #[error("Provider query failed ({backend}): {message}")]
    ProviderQuery {
        /// Cloud backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Record not found (e.g. the instance's own description)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attaching an interface failed
    #[error("Attach of {interface_id} failed: {message}")]
    Attach {
        /// Interface that was being attached
        interface_id: String,
        /// Error message
        message: String,
    },

    /// Detaching an interface failed
    #[error("Detach of {attachment_id} failed: {message}")]
    Detach {
        /// Attachment that was being released
        attachment_id: String,
        /// Error message
        message: String,
    },

    /// Service URL discovery errors (DNS or static configuration)
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Instance metadata errors
    #[error("Instance identity error: {0}")]
    Identity(String),

    /// Peer registry recovery errors
    #[error("Peer registry error: {0}")]
    Registry(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors (metadata service, DNS-over-HTTPS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "no candidates" error for a zone
    pub fn no_candidates(zone: impl Into<String>) -> Self {
        Self::NoCandidates { zone: zone.into() }
    }

    /// Create a malformed candidate error
    pub fn malformed_candidate(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCandidate {
            candidate: candidate.into(),
            reason: reason.into(),
        }
    }

    /// Create a provider query error
    pub fn provider_query(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderQuery {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an attach error
    pub fn attach(interface_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Attach {
            interface_id: interface_id.into(),
            message: message.into(),
        }
    }

    /// Create a detach error
    pub fn detach(attachment_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detach {
            attachment_id: attachment_id.into(),
            message: message.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create an instance identity error
    pub fn identity(msg: impl Into<String>) -> Self {
        Self::Identity(msg.into())
    }

    /// Create a peer registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error came from the cloud API.
    ///
    /// A missing record for the instance itself counts: it only happens when
    /// the provider is inconsistent, so it is retried like any API failure.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderQuery { .. }
                | Self::NotFound(_)
                | Self::Attach { .. }
                | Self::Detach { .. }
        )
    }

    /// Whether this error comes from candidate configuration rather than the cloud
    pub fn is_candidate_error(&self) -> bool {
        matches!(self, Self::NoCandidates { .. } | Self::MalformedCandidate { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::provider_query("memory", "boom").is_provider_error());
        assert!(Error::not_found("i-123").is_provider_error());
        assert!(Error::attach("eni-1", "in use").is_provider_error());
        assert!(Error::detach("attach-1", "gone").is_provider_error());
        assert!(!Error::no_candidates("us-east-1a").is_provider_error());

        assert!(Error::no_candidates("us-east-1a").is_candidate_error());
        assert!(Error::malformed_candidate("ip-x", "bad").is_candidate_error());
        assert!(!Error::config("bad").is_candidate_error());
    }

    #[test]
    fn test_error_display() {
        let err = Error::malformed_candidate("ip-a-b-c-d.ec2.internal", "translated to 'a.b.c.d'");
        assert_eq!(
            err.to_string(),
            "Malformed candidate 'ip-a-b-c-d.ec2.internal': translated to 'a.b.c.d'"
        );
        assert_eq!(
            Error::no_candidates("us-east-1a").to_string(),
            "No candidate addresses for zone us-east-1a"
        );
    }
}
