use tracing::{info, warn};

use super::{
    cooldown::{CooldownPolicy, CooldownReason, Flow, Interrupts, Pacer},
    BatchOutcome,
};
use crate::{
    catalogue::Catalogue,
    error::{ApiError, Result, SyncError},
    gateway::{ProgressUpdate, RemoteGateway},
    models::GameStatus,
};

/// Counts from an unlock pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    /// Achievements the service accepted.
    pub unlocked: usize,
    /// Achievements the service reported as already unlocked.
    pub already_done: usize,
    /// Achievements given up on for this pass.
    pub failed: usize,
    /// Games that reached `UnlockComplete`.
    pub games_completed: usize,
    /// Progress update calls issued, retries included.
    pub writes: usize,
    /// Cooldowns entered during the pass.
    pub cooldowns: usize,
    /// How the pass ended.
    pub outcome: BatchOutcome,
}

/// Final result for one achievement.
enum Settled {
    Unlocked,
    AlreadyDone,
    Failed(ApiError),
}

/// Result of driving one achievement to a settled state.
enum Step {
    Settled(Settled),
    Aborted,
}

/// Force-completes eligible achievements.
#[derive(Debug)]
pub struct UnlockEngine {
    pacer: Pacer,
}

impl UnlockEngine {
    /// Engine pausing under `policy` and listening to `interrupts`.
    pub fn new(policy: CooldownPolicy, interrupts: Interrupts) -> Self {
        Self {
            pacer: Pacer::new(policy, interrupts),
        }
    }

    /// Unlock every pending achievement of every `AchievementsFetched` game.
    ///
    /// Already unlocked achievements are skipped, so calling this again
    /// after an aborted or completed pass only touches what is left.
    pub fn unlock_all<G>(
        &mut self,
        gateway: &mut G,
        xuid: &str,
        catalogue: &mut Catalogue,
    ) -> Result<UnlockReport>
    where
        G: RemoteGateway + ?Sized,
    {
        let pending = catalogue.title_ids_with(GameStatus::AchievementsFetched);
        let cooldowns_before = self.pacer.cooldowns();
        let mut report = UnlockReport::default();

        for (position, title_id) in pending.iter().enumerate() {
            if self.pacer.checkpoint() == Flow::Abort {
                report.outcome = BatchOutcome::Aborted;
                break;
            }
            if self.unlock_game(gateway, xuid, catalogue, title_id, &mut report)? == Flow::Abort {
                report.outcome = BatchOutcome::Aborted;
                break;
            }
            info!("{}/{} games processed", position + 1, pending.len());
        }

        report.cooldowns = self.pacer.cooldowns() - cooldowns_before;
        self.pacer.reset();
        Ok(report)
    }

    /// Unlock a single chosen achievement.
    pub fn unlock_one<G>(
        &mut self,
        gateway: &mut G,
        xuid: &str,
        catalogue: &mut Catalogue,
        title_id: &str,
        achievement_id: &str,
    ) -> Result<UnlockReport>
    where
        G: RemoteGateway + ?Sized,
    {
        let unknown = || SyncError::UnknownAchievement {
            title_id: title_id.to_string(),
            achievement_id: achievement_id.to_string(),
        };
        let achievement = catalogue
            .get(title_id)
            .and_then(|game| game.achievement(achievement_id))
            .ok_or_else(unknown)?;

        let cooldowns_before = self.pacer.cooldowns();
        let mut report = UnlockReport::default();
        if achievement.unlocked {
            info!("{} is already unlocked", achievement.display_name());
            return Ok(report);
        }

        let update = ProgressUpdate {
            xuid: xuid.to_string(),
            title_id: title_id.to_string(),
            service_config_id: achievement.service_config_id.clone(),
            achievement_id: achievement_id.to_string(),
        };
        if self.pacer.checkpoint() == Flow::Abort {
            report.outcome = BatchOutcome::Aborted;
            report.cooldowns = self.pacer.cooldowns() - cooldowns_before;
            self.pacer.reset();
            return Ok(report);
        }
        match self.unlock_item(gateway, &update, &mut report)? {
            Step::Settled(settled) => {
                record(catalogue, &update, settled, &mut report);
                settle_game(catalogue, title_id, &mut report);
            }
            Step::Aborted => report.outcome = BatchOutcome::Aborted,
        }

        report.cooldowns = self.pacer.cooldowns() - cooldowns_before;
        self.pacer.reset();
        Ok(report)
    }

    fn unlock_game<G>(
        &mut self,
        gateway: &mut G,
        xuid: &str,
        catalogue: &mut Catalogue,
        title_id: &str,
        report: &mut UnlockReport,
    ) -> Result<Flow>
    where
        G: RemoteGateway + ?Sized,
    {
        let Some(game) = catalogue.get(title_id) else {
            return Ok(Flow::Continue);
        };
        let name = game.display_name().to_string();
        let total = game.achievements.len();
        let pending: Vec<ProgressUpdate> = game
            .achievements
            .iter()
            .filter(|achievement| !achievement.unlocked)
            .map(|achievement| ProgressUpdate {
                xuid: xuid.to_string(),
                title_id: title_id.to_string(),
                service_config_id: achievement.service_config_id.clone(),
                achievement_id: achievement.id.clone(),
            })
            .collect();
        let mut done = total - pending.len();

        for update in &pending {
            if self.pacer.checkpoint() == Flow::Abort {
                return Ok(Flow::Abort);
            }
            match self.unlock_item(gateway, update, report)? {
                Step::Settled(settled) => record(catalogue, update, settled, report),
                Step::Aborted => return Ok(Flow::Abort),
            }
            done += 1;
            info!("unlocking achievements: {done}/{total} for {name}");
        }

        settle_game(catalogue, title_id, report);
        Ok(Flow::Continue)
    }

    /// Issue the update until it settles, cooling down on rate limits and
    /// renewing the credential once on rejection.
    fn unlock_item<G>(
        &mut self,
        gateway: &mut G,
        update: &ProgressUpdate,
        report: &mut UnlockReport,
    ) -> Result<Step>
    where
        G: RemoteGateway + ?Sized,
    {
        let mut auth_retried = false;
        loop {
            report.writes += 1;
            match gateway.update_progress(update) {
                Ok(()) => return Ok(Step::Settled(Settled::Unlocked)),
                Err(ApiError::AlreadyDone) => return Ok(Step::Settled(Settled::AlreadyDone)),
                Err(ApiError::RateLimited) => {
                    warn!(
                        achievement_id = %update.achievement_id,
                        "too many requests while unlocking"
                    );
                    if self.pacer.cool_down(CooldownReason::RateLimited) == Flow::Abort {
                        return Ok(Step::Aborted);
                    }
                }
                Err(ApiError::AuthExpired) if !auth_retried => {
                    gateway.reauthenticate()?;
                    auth_retried = true;
                }
                Err(ApiError::RenewalFailed(reason)) => return Err(SyncError::AuthExpired(reason)),
                Err(err) => return Ok(Step::Settled(Settled::Failed(err))),
            }
        }
    }
}

fn record(
    catalogue: &mut Catalogue,
    update: &ProgressUpdate,
    settled: Settled,
    report: &mut UnlockReport,
) {
    let Some(achievement) = catalogue
        .get_mut(&update.title_id)
        .and_then(|game| game.achievement_mut(&update.achievement_id))
    else {
        return;
    };

    match settled {
        Settled::Unlocked => {
            info!(
                title_id = %update.title_id,
                "achievement {} unlocked successfully",
                achievement.display_name()
            );
            achievement.unlocked = true;
            achievement.failure = None;
            report.unlocked += 1;
        }
        Settled::AlreadyDone => {
            info!(
                title_id = %update.title_id,
                "achievement {} was already unlocked",
                achievement.display_name()
            );
            achievement.unlocked = true;
            achievement.failure = None;
            report.already_done += 1;
        }
        Settled::Failed(err) => {
            warn!(
                title_id = %update.title_id,
                achievement_id = %update.achievement_id,
                "failed to unlock {}: {err}",
                achievement.display_name()
            );
            achievement.failure = Some(err.to_string());
            report.failed += 1;
        }
    }
}

fn settle_game(catalogue: &mut Catalogue, title_id: &str, report: &mut UnlockReport) {
    let Some(game) = catalogue.get_mut(title_id) else {
        return;
    };
    if game.status != GameStatus::UnlockComplete && game.is_settled() {
        game.status = GameStatus::UnlockComplete;
        report.games_completed += 1;
        info!(
            "all possible unlockable achievements for {} have been processed ({} unlocked)",
            game.display_name(),
            game.unlocked_count()
        );
    }
}
