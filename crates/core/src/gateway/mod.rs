//! Typed access to the remote profile, title hub and achievements services.

/// Response body shapes and their conversion into flat records.
pub mod payload;
/// HTTP implementation backed by `reqwest`.
pub mod xbox;

pub use xbox::XboxGateway;

use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, models::Game};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Numeric user id, as a string.
    pub xuid: String,
    /// Display gamertag.
    pub gamertag: String,
}

/// A title returned by the title history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTitle {
    /// Title identifier.
    pub title_id: String,
    /// Display name.
    pub name: Option<String>,
    /// Display image URL.
    pub image: Option<String>,
}

impl From<RemoteTitle> for Game {
    fn from(title: RemoteTitle) -> Self {
        Game {
            name: title.name,
            image: title.image,
            ..Game::new(title.title_id)
        }
    }
}

/// An achievement as reported by the service, before eligibility filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteAchievement {
    /// Achievement identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Description text.
    pub description: Option<String>,
    /// Service configuration identifier.
    pub service_config_id: Option<String>,
    /// Progress state, e.g. `Achieved` or `NotStarted`.
    pub progress_state: Option<String>,
    /// Identifier of the first progression requirement.
    pub requirement_id: Option<String>,
    /// URL of the first media asset.
    pub image: Option<String>,
}

/// One force-complete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// User the update applies to.
    pub xuid: String,
    /// Title owning the achievement.
    pub title_id: String,
    /// Service configuration the update is posted to.
    pub service_config_id: String,
    /// Achievement to complete.
    pub achievement_id: String,
}

/// Remote operations used by the engines.
///
/// Implementations attach a renewed credential to every call and classify
/// the response; they never retry.
pub trait RemoteGateway {
    /// Gamertag and user id of the signed-in account.
    fn profile(&mut self) -> ApiResult<UserProfile>;

    /// Titles the user has played.
    fn title_history(&mut self, xuid: &str) -> ApiResult<Vec<RemoteTitle>>;

    /// Every achievement of `title_id` for the user.
    fn achievements(&mut self, xuid: &str, title_id: &str) -> ApiResult<Vec<RemoteAchievement>>;

    /// Set an achievement to 100% complete.
    fn update_progress(&mut self, update: &ProgressUpdate) -> ApiResult<()>;

    /// Obtain a new credential after the service rejected the current one.
    fn reauthenticate(&mut self) -> ApiResult<()>;
}
