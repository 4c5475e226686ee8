use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bearer token plus optional absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Token body, without the authorization scheme prefix.
    pub token: String,
    /// Instant after which the service stops accepting the token.
    #[serde(rename = "expiration", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a credential that never expires locally.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Attach an expiry instant.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Valid iff no expiry is set or `now` is strictly before it.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    /// [`Credential::is_valid_at`] against the current UTC instant.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Parse an ISO-8601 expiry such as `2024-05-01T10:00:00.1234567Z` into UTC.
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Failure of an acquisition strategy.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The strategy finished without producing a token.
    #[error("{0} did not produce a token")]
    Empty(&'static str),
    /// The strategy produced a credential that is already expired.
    #[error("{0} produced an expired token")]
    Expired(&'static str),
    /// Any other failure reported by the strategy.
    #[error("{strategy} failed: {reason}")]
    Failed {
        /// Name of the failing strategy.
        strategy: &'static str,
        /// Human readable cause.
        reason: String,
    },
}

/// A way of obtaining a fresh credential.
///
/// The credential store remembers the last strategy it used and invokes it
/// again whenever the credential expires, so implementations must be safe
/// to call repeatedly.
pub trait AcquisitionStrategy: Send + Sync {
    /// Produce a new credential.
    fn acquire(&self) -> Result<Credential, AcquireError>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Strategy that hands out a token supplied up front (config or environment).
#[derive(Debug, Clone)]
pub struct StaticToken {
    credential: Credential,
}

impl StaticToken {
    /// Wrap a fixed token with an optional expiry.
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            credential: Credential {
                token: token.into(),
                expires_at,
            },
        }
    }
}

impl AcquisitionStrategy for StaticToken {
    fn acquire(&self) -> Result<Credential, AcquireError> {
        if self.credential.token.trim().is_empty() {
            return Err(AcquireError::Empty(self.name()));
        }
        Ok(self.credential.clone())
    }

    fn name(&self) -> &'static str {
        "static-token"
    }
}
