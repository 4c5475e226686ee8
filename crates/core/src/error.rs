//! Error taxonomy for remote calls and batch operations.

use thiserror::Error;

/// Classified failure of a single remote call.
///
/// Gateways never retry; they hand one of these back and the engines decide
/// whether to cool down, renew, skip or abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The service rejected the credential (401/403).
    #[error("authentication error: token expired or rejected")]
    AuthExpired,
    /// Too many requests (429).
    #[error("too many requests; the service is blocking further calls for now")]
    RateLimited,
    /// The achievement was already unlocked on the service side (304).
    #[error("achievement already unlocked")]
    AlreadyDone,
    /// Network-level failure before a status was received.
    #[error("network error: {0}")]
    Transient(String),
    /// The response body did not have the expected shape.
    #[error("unexpected response payload: {0}")]
    Malformed(String),
    /// Any status code without a dedicated meaning.
    #[error("unexpected status {0}")]
    Unexpected(u16),
    /// The credential was invalid and the acquisition strategy could not
    /// produce a new one.
    #[error("token renewal failed: {0}")]
    RenewalFailed(String),
}

/// Result alias for gateway calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure that ends a whole batch.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The credential is invalid and could not be renewed.
    #[error("token expired and could not be renewed: {0}")]
    AuthExpired(String),
    /// A requested game or achievement is not in the catalogue.
    #[error("achievement {achievement_id} of title {title_id} is not in the catalogue")]
    UnknownAchievement {
        /// Title identifier that was looked up.
        title_id: String,
        /// Achievement identifier that was looked up.
        achievement_id: String,
    },
    /// A remote call failed in a way the operation cannot absorb.
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RenewalFailed(reason) => SyncError::AuthExpired(reason),
            other => SyncError::Api(other),
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
