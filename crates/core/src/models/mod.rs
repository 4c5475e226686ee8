//! Shared domain models.

use serde::{Deserialize, Serialize};

/// Where a game is in the discover → unlock pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameStatus {
    /// Known from the title history or `games.json`; achievements not fetched yet.
    #[default]
    Discovered,
    /// At least one eligible achievement is stored.
    AchievementsFetched,
    /// Achievements were fetched and none can be force-completed.
    NoEligibleAchievements,
    /// Every stored achievement is either unlocked or failed.
    UnlockComplete,
}

/// A title in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Service title identifier; the catalogue key.
    pub title_id: String,
    /// Display name, when the source provided one.
    pub name: Option<String>,
    /// Display image URL.
    pub image: Option<String>,
    /// Eligible achievements, in the order the service returned them.
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    /// Pipeline status.
    #[serde(default)]
    pub status: GameStatus,
}

impl Game {
    /// New game in [`GameStatus::Discovered`] with no achievements.
    pub fn new(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            name: None,
            image: None,
            achievements: Vec::new(),
            status: GameStatus::Discovered,
        }
    }

    /// Builder-style name setter.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for user-facing output.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Look up a stored achievement.
    pub fn achievement(&self, achievement_id: &str) -> Option<&Achievement> {
        self.achievements
            .iter()
            .find(|achievement| achievement.id == achievement_id)
    }

    /// Mutable lookup of a stored achievement.
    pub fn achievement_mut(&mut self, achievement_id: &str) -> Option<&mut Achievement> {
        self.achievements
            .iter_mut()
            .find(|achievement| achievement.id == achievement_id)
    }

    /// True when every stored achievement is unlocked or failed.
    pub fn is_settled(&self) -> bool {
        self.achievements.iter().all(Achievement::is_settled)
    }

    /// Number of unlocked achievements.
    pub fn unlocked_count(&self) -> usize {
        self.achievements
            .iter()
            .filter(|achievement| achievement.unlocked)
            .count()
    }
}

/// An achievement that can be force-completed with a single progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Achievement identifier within the title.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Description text.
    pub description: Option<String>,
    /// Service configuration identifier the update is posted to.
    pub service_config_id: String,
    /// Icon URL.
    pub image: Option<String>,
    /// Set once the service accepted (or already had) the unlock.
    #[serde(default)]
    pub unlocked: bool,
    /// Cause of the last failed unlock attempt.
    #[serde(default)]
    pub failure: Option<String>,
}

impl Achievement {
    /// Name for user-facing output.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Unlocked, or given up on for this pass.
    pub fn is_settled(&self) -> bool {
        self.unlocked || self.failure.is_some()
    }
}
