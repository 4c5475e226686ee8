//! Scripted collaborators for unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    auth::{AcquireError, AcquisitionStrategy, Credential},
    engine::{CooldownPolicy, SecondInterrupt},
    error::{ApiError, ApiResult},
    gateway::{ProgressUpdate, RemoteAchievement, RemoteGateway, RemoteTitle, UserProfile},
    models::Achievement,
};

/// Zero-length cooldowns so tests never sleep.
pub(crate) fn policy(second_interrupt: SecondInterrupt) -> CooldownPolicy {
    CooldownPolicy {
        duration: Duration::ZERO,
        poll_interval: Duration::from_millis(1),
        second_interrupt,
    }
}

pub(crate) fn title(title_id: &str, name: &str) -> RemoteTitle {
    RemoteTitle {
        title_id: title_id.to_string(),
        name: Some(name.to_string()),
        image: None,
    }
}

pub(crate) fn eligible(id: &str) -> RemoteAchievement {
    RemoteAchievement {
        id: id.to_string(),
        name: Some(format!("Achievement {id}")),
        description: None,
        service_config_id: Some(format!("scid-{id}")),
        progress_state: Some("NotStarted".to_string()),
        requirement_id: Some("00000000-0000-0000-0000-000000000000".to_string()),
        image: None,
    }
}

pub(crate) fn achieved(id: &str) -> RemoteAchievement {
    RemoteAchievement {
        progress_state: Some("Achieved".to_string()),
        ..eligible(id)
    }
}

pub(crate) fn stored(id: &str) -> Achievement {
    Achievement {
        id: id.to_string(),
        name: Some(format!("Achievement {id}")),
        description: None,
        service_config_id: format!("scid-{id}"),
        image: None,
        unlocked: false,
        failure: None,
    }
}

type UpdateHook = Box<dyn FnMut(&ProgressUpdate)>;
type FetchHook = Box<dyn FnMut(&str)>;

/// In-memory gateway answering from queued results.
///
/// Queued errors are returned first; once a queue is drained the call
/// succeeds with the fixture data.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    pub titles: VecDeque<ApiResult<Vec<RemoteTitle>>>,
    pub achievements: HashMap<String, Vec<RemoteAchievement>>,
    pub achievement_errors: VecDeque<ApiError>,
    pub achievement_requests: Vec<String>,
    pub on_achievements: Option<FetchHook>,
    pub update_results: VecDeque<ApiResult<()>>,
    pub updates: Vec<ProgressUpdate>,
    pub on_update: Option<UpdateHook>,
    pub reauth_results: VecDeque<ApiResult<()>>,
    pub reauth_calls: usize,
}

impl RemoteGateway for ScriptedGateway {
    fn profile(&mut self) -> ApiResult<UserProfile> {
        Ok(UserProfile {
            xuid: "xuid".to_string(),
            gamertag: "Tester".to_string(),
        })
    }

    fn title_history(&mut self, _xuid: &str) -> ApiResult<Vec<RemoteTitle>> {
        self.titles.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn achievements(&mut self, _xuid: &str, title_id: &str) -> ApiResult<Vec<RemoteAchievement>> {
        self.achievement_requests.push(title_id.to_string());
        if let Some(hook) = self.on_achievements.as_mut() {
            hook(title_id);
        }
        if let Some(err) = self.achievement_errors.pop_front() {
            return Err(err);
        }
        Ok(self.achievements.get(title_id).cloned().unwrap_or_default())
    }

    fn update_progress(&mut self, update: &ProgressUpdate) -> ApiResult<()> {
        self.updates.push(update.clone());
        if let Some(hook) = self.on_update.as_mut() {
            hook(update);
        }
        self.update_results.pop_front().unwrap_or(Ok(()))
    }

    fn reauthenticate(&mut self) -> ApiResult<()> {
        self.reauth_calls += 1;
        self.reauth_results.pop_front().unwrap_or(Ok(()))
    }
}

/// Strategy replaying queued results, then a fallback.
pub(crate) struct ScriptedStrategy {
    queued: Mutex<VecDeque<Result<Credential, String>>>,
    fallback: Option<Credential>,
    calls: AtomicUsize,
}

impl ScriptedStrategy {
    /// Always succeeds with a non-expiring `token`.
    pub fn valid(token: &str) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Some(Credential::new(token)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails.
    pub fn failing() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Replays `results` in order, failing once they run out.
    pub fn sequence(results: Vec<Result<Credential, String>>) -> Self {
        Self {
            queued: Mutex::new(results.into()),
            ..Self::failing()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AcquisitionStrategy for ScriptedStrategy {
    fn acquire(&self) -> Result<Credential, AcquireError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .queued
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone().map(Ok));
        match next {
            Some(Ok(credential)) => Ok(credential),
            Some(Err(reason)) => Err(AcquireError::Failed {
                strategy: self.name(),
                reason,
            }),
            None => Err(AcquireError::Empty(self.name())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
