use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use achsync_core::{
    auth::{AcquisitionStrategy, CredentialStore, StaticToken, TokenFile},
    catalogue::merge_extra_games,
    Achievement, AppConfig, BatchOutcome, Catalogue, Game, Interrupts, RemoteGateway, SyncEngine,
    SyncError, UnlockEngine, XboxGateway,
};

use crate::prompt::{self, Choice, Mode, PromptToken};

/// Everything one run operates on.
struct Session {
    gateway: XboxGateway,
    xuid: String,
    catalogue: Catalogue,
    sync: SyncEngine,
    unlock: UnlockEngine,
    interrupts: Interrupts,
}

/// Authenticate, load the catalogue and run the chosen workflow.
pub fn run(config: AppConfig, interrupts: Interrupts) -> Result<()> {
    let mut credentials = CredentialStore::with_token_file(TokenFile::new(&config.token_path));
    let strategy: Arc<dyn AcquisitionStrategy> =
        match config.token.as_deref().filter(|token| !token.trim().is_empty()) {
            Some(token) => Arc::new(StaticToken::new(token, config.token_expiry())),
            None => Arc::new(PromptToken),
        };
    credentials.remember(Arc::clone(&strategy));
    if !credentials.restore() {
        credentials
            .authenticate(strategy)
            .context("failed to obtain a token")?;
    }

    let mut gateway = XboxGateway::new(&config, credentials)?;
    let profile = gateway
        .profile()
        .context("failed to retrieve the user profile")?;
    prompt::say(format!("\nGamertag: {}\n", profile.gamertag))?;

    let mut session = Session {
        gateway,
        xuid: profile.xuid,
        catalogue: Catalogue::new(),
        sync: SyncEngine::new(config.discovery_policy(), interrupts.clone()),
        unlock: UnlockEngine::new(config.unlock_policy(), interrupts.clone()),
        interrupts,
    };

    match session
        .sync
        .fetch_catalogue(&mut session.gateway, &session.xuid, &mut session.catalogue)
    {
        Ok(_) => {}
        Err(err @ SyncError::AuthExpired(_)) => return Err(err.into()),
        Err(err) => error!("{err}"),
    }

    if prompt::confirm(
        "Would you like to add games that you don't own from games.json as well?\n\
         It will take more time to retrieve all the achievements.",
    )? {
        if let Err(err) = merge_extra_games(&mut session.catalogue, &config.games_path) {
            error!("{err:#}");
        }
    }

    if session.catalogue.is_empty() {
        prompt::say("There are no games to process.")?;
        return Ok(());
    }

    match prompt::mode()? {
        Mode::All => unlock_everything(&mut session),
        Mode::Select => select(&mut session),
        Mode::Quit => Ok(()),
    }
}

fn discover(session: &mut Session) -> Result<()> {
    let _armed = session.interrupts.arm();
    prompt::say(
        "Collecting achievements. Press Ctrl+C to pause for a while; \
         press it again during the pause to resume immediately.",
    )?;
    let report = session
        .sync
        .discover_all(&mut session.gateway, &session.xuid, &mut session.catalogue)?;
    info!(
        fetched = report.fetched,
        without_eligible = report.without_eligible,
        failed = report.failed,
        cooldowns = report.cooldowns,
        "achievement collection finished"
    );
    Ok(())
}

fn unlock_everything(session: &mut Session) -> Result<()> {
    discover(session)?;

    let games = session.catalogue.unlockable().count();
    if games == 0 {
        prompt::say("\nThere are no unlockable achievements.")?;
        return Ok(());
    }

    prompt::say(format!(
        "\nAll achievements from {games} games are about to be unlocked!\n\
         Press Ctrl+C to pause; press it again during the pause to stop."
    ))?;
    let report = {
        let _armed = session.interrupts.arm();
        session
            .unlock
            .unlock_all(&mut session.gateway, &session.xuid, &mut session.catalogue)?
    };

    match report.outcome {
        BatchOutcome::Completed => {
            prompt::say("\nAll possible unlockable achievements have been unlocked.")?
        }
        BatchOutcome::Aborted => prompt::say("\nUnlocking stopped. Exiting...")?,
    }
    if report.failed > 0 {
        warn!("{} achievements could not be unlocked", report.failed);
    }
    prompt::say(format!(
        "{} unlocked, {} already unlocked, {} failed",
        report.unlocked, report.already_done, report.failed
    ))?;
    Ok(())
}

fn select(session: &mut Session) -> Result<()> {
    let games: Vec<&Game> = session.catalogue.iter().collect();
    let chosen = match prompt::choose_game(&games, true)? {
        None => return Ok(()),
        Some(Choice::All) => None,
        Some(Choice::One(game)) => Some(game.title_id.clone()),
    };
    if let Some(title_id) = chosen {
        session.catalogue.retain(|game| game.title_id == title_id);
    }

    discover(session)?;

    loop {
        let games: Vec<&Game> = session.catalogue.unlockable().collect();
        if games.is_empty() {
            prompt::say("There are no unlockable achievements.")?;
            return Ok(());
        }
        let Some(Choice::One(game)) = prompt::choose_game(&games, false)? else {
            return Ok(());
        };
        let title_id = game.title_id.clone();
        prompt::say(format!("\nThe chosen game is {}.", game.display_name()))?;

        unlock_from_game(session, &title_id)?;
    }
}

fn unlock_from_game(session: &mut Session, title_id: &str) -> Result<()> {
    loop {
        let Some(game) = session.catalogue.get(title_id) else {
            return Ok(());
        };
        let pending: Vec<&Achievement> = game
            .achievements
            .iter()
            .filter(|achievement| !achievement.unlocked)
            .collect();
        if pending.is_empty() {
            prompt::say("There are no achievements left for this game.")?;
            return Ok(());
        }
        let Some(Choice::One(achievement)) = prompt::choose_achievement(&pending)? else {
            prompt::say("\nReturn to the game list.\n")?;
            return Ok(());
        };
        let achievement_id = achievement.id.clone();
        let name = achievement.display_name().to_string();

        let report = {
            let _armed = session.interrupts.arm();
            session.unlock.unlock_one(
                &mut session.gateway,
                &session.xuid,
                &mut session.catalogue,
                title_id,
                &achievement_id,
            )?
        };
        if report.outcome == BatchOutcome::Aborted {
            prompt::say("\nUnlocking interrupted.")?;
        } else if report.unlocked + report.already_done > 0 {
            prompt::say(format!("\"{name}\" unlocked successfully"))?;
        }
    }
}
