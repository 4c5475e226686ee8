use tracing::{info, warn};

use super::{
    cooldown::{CooldownPolicy, CooldownReason, Flow, Interrupts, Pacer},
    BatchOutcome,
};
use crate::{
    catalogue::Catalogue,
    error::{ApiError, Result},
    gateway::{RemoteAchievement, RemoteGateway},
    models::{Achievement, Game, GameStatus},
};

/// Requirement id of single-step achievements.
pub const ZERO_REQUIREMENT_ID: &str = "00000000-0000-0000-0000-000000000000";
const ZERO_REQUIREMENT_PREFIX: &str = "00000000-0000-0000-0000-";
const ACHIEVED: &str = "Achieved";

/// Whether a single progress update can complete `achievement`.
///
/// It must not be achieved yet, must carry a service configuration id, and
/// its first progression requirement must be the all-zero id (or share its
/// all-zero prefix).
pub fn is_eligible(achievement: &RemoteAchievement) -> bool {
    let pending = achievement.progress_state.as_deref() != Some(ACHIEVED);
    let has_scid = achievement
        .service_config_id
        .as_deref()
        .is_some_and(|scid| !scid.is_empty());
    let single_step = achievement.requirement_id.as_deref().is_some_and(|id| {
        id == ZERO_REQUIREMENT_ID || id.starts_with(ZERO_REQUIREMENT_PREFIX)
    });
    pending && has_scid && single_step
}

fn into_achievement(remote: RemoteAchievement) -> Option<Achievement> {
    Some(Achievement {
        service_config_id: remote.service_config_id?,
        id: remote.id,
        name: remote.name,
        description: remote.description,
        image: remote.image,
        unlocked: false,
        failure: None,
    })
}

/// Counts from a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Games that now have eligible achievements.
    pub fetched: usize,
    /// Games with nothing eligible.
    pub without_eligible: usize,
    /// Games whose fetch failed; they stay `Discovered`.
    pub failed: usize,
    /// Cooldowns entered during the pass.
    pub cooldowns: usize,
    /// How the pass ended.
    pub outcome: BatchOutcome,
}

/// Populates the catalogue and each game's eligible achievements.
#[derive(Debug)]
pub struct SyncEngine {
    pacer: Pacer,
}

impl SyncEngine {
    /// Engine pausing under `policy` and listening to `interrupts`.
    pub fn new(policy: CooldownPolicy, interrupts: Interrupts) -> Self {
        Self {
            pacer: Pacer::new(policy, interrupts),
        }
    }

    /// Merge the user's title history into `catalogue`.
    ///
    /// All titles of a successful call are applied in the order received,
    /// each replacing any existing record; a failed call applies nothing.
    pub fn fetch_catalogue<G>(
        &mut self,
        gateway: &mut G,
        xuid: &str,
        catalogue: &mut Catalogue,
    ) -> Result<usize>
    where
        G: RemoteGateway + ?Sized,
    {
        let titles = gateway.title_history(xuid).map_err(|err| {
            warn!("failed to retrieve the title history: {err}");
            err
        })?;
        if titles.is_empty() {
            warn!("no owned games found");
        }
        let merged = catalogue.extend(titles.into_iter().map(Game::from));
        info!("{merged} game ids retrieved");
        Ok(merged)
    }

    /// Fetch `game`'s achievements and keep only the eligible ones.
    ///
    /// The stored list is replaced, not appended to, so repeating the call
    /// with the same remote data leaves the game unchanged. On error the
    /// game is left untouched.
    pub fn fetch_achievements<G>(
        &mut self,
        gateway: &mut G,
        xuid: &str,
        game: &mut Game,
    ) -> std::result::Result<GameStatus, ApiError>
    where
        G: RemoteGateway + ?Sized,
    {
        let remote = gateway.achievements(xuid, &game.title_id)?;
        let total = remote.len();
        game.achievements = remote
            .into_iter()
            .filter(is_eligible)
            .filter_map(into_achievement)
            .collect();
        game.status = if game.achievements.is_empty() {
            GameStatus::NoEligibleAchievements
        } else {
            GameStatus::AchievementsFetched
        };
        info!(
            title_id = %game.title_id,
            "{} of {total} achievements eligible for {}",
            game.achievements.len(),
            game.display_name()
        );
        Ok(game.status)
    }

    /// Fetch achievements for every `Discovered` game.
    ///
    /// Interrupts are honoured between games. A rate-limited game is
    /// retried after the cooldown; other per-game failures are reported and
    /// skipped.
    pub fn discover_all<G>(
        &mut self,
        gateway: &mut G,
        xuid: &str,
        catalogue: &mut Catalogue,
    ) -> Result<DiscoveryReport>
    where
        G: RemoteGateway + ?Sized,
    {
        let pending = catalogue.title_ids_with(GameStatus::Discovered);
        let cooldowns_before = self.pacer.cooldowns();
        let mut report = DiscoveryReport::default();
        let mut index = 0;
        let mut auth_retried = false;

        while let Some(title_id) = pending.get(index) {
            if self.pacer.checkpoint() == Flow::Abort {
                report.outcome = BatchOutcome::Aborted;
                break;
            }
            let Some(game) = catalogue.get_mut(title_id) else {
                index += 1;
                continue;
            };
            info!(title_id = %title_id, "getting achievements for {}", game.display_name());

            match self.fetch_achievements(gateway, xuid, game) {
                Ok(GameStatus::AchievementsFetched) => report.fetched += 1,
                Ok(_) => report.without_eligible += 1,
                Err(ApiError::RateLimited) => {
                    warn!(title_id = %title_id, "too many requests while collecting achievements");
                    if self.pacer.cool_down(CooldownReason::RateLimited) == Flow::Abort {
                        report.outcome = BatchOutcome::Aborted;
                        break;
                    }
                    continue;
                }
                Err(ApiError::AuthExpired) if !auth_retried => {
                    gateway.reauthenticate()?;
                    auth_retried = true;
                    continue;
                }
                Err(ApiError::RenewalFailed(reason)) => {
                    return Err(ApiError::RenewalFailed(reason).into());
                }
                Err(err) => {
                    warn!(title_id = %title_id, "failed to get achievements: {err}");
                    report.failed += 1;
                }
            }

            info!(
                "achievements collected for game {}/{}",
                index + 1,
                pending.len()
            );
            auth_retried = false;
            index += 1;
        }

        report.cooldowns = self.pacer.cooldowns() - cooldowns_before;
        self.pacer.reset();
        Ok(report)
    }
}
