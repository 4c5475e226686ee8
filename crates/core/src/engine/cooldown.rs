use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::{info, warn};

/// Counter of user interrupts, shared between a signal listener and an engine.
///
/// Raising never blocks; engines only consume interrupts at their
/// suspension points. While no batch is armed the listener is expected to
/// treat an interrupt as a request to exit.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    pending: Arc<AtomicUsize>,
    armed: Arc<AtomicBool>,
}

impl Interrupts {
    /// Fresh handle with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one interrupt.
    pub fn raise(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Consume one pending interrupt, if any.
    pub fn take(&self) -> bool {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok()
    }

    /// Number of interrupts not yet consumed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Drop interrupts raised while no batch was running.
    pub fn clear(&self) {
        self.pending.store(0, Ordering::SeqCst);
    }

    /// Start a batch: stale interrupts are dropped and new ones are queued
    /// for the engine until the returned guard is dropped.
    pub fn arm(&self) -> Armed {
        self.clear();
        self.armed.store(true, Ordering::SeqCst);
        Armed {
            armed: Arc::clone(&self.armed),
        }
    }

    /// Whether a batch is currently listening.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

/// Keeps [`Interrupts`] armed for the lifetime of a batch.
#[derive(Debug)]
#[must_use = "the batch is disarmed as soon as the guard is dropped"]
pub struct Armed {
    armed: Arc<AtomicBool>,
}

impl Drop for Armed {
    fn drop(&mut self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

/// What a second interrupt during a cooldown means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondInterrupt {
    /// End the cooldown and continue with the next item.
    ResumeEarly,
    /// Stop the batch and hand control back to the caller.
    Abort,
}

/// Cooldown length and interrupt handling for one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// How long remote calls are suspended.
    pub duration: Duration,
    /// How often the cooldown checks for a second interrupt.
    pub poll_interval: Duration,
    /// Reaction to an interrupt raised during the cooldown.
    pub second_interrupt: SecondInterrupt,
}

/// Why a cooldown was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownReason {
    /// The user interrupted the batch.
    Interrupted,
    /// The service answered 429.
    RateLimited,
}

/// Engine state as seen at suspension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Issuing remote calls.
    Running,
    /// Remote calls suspended until the instant.
    Cooldown {
        /// End of the suspension.
        until: Instant,
    },
    /// The batch was stopped; no further calls are made.
    Aborted,
}

/// Whether a batch may go on after a suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep processing.
    Continue,
    /// Stop the batch.
    Abort,
}

/// Cooperative pause/resume state shared by the engines.
#[derive(Debug)]
pub struct Pacer {
    policy: CooldownPolicy,
    interrupts: Interrupts,
    state: EngineState,
    cooldowns: usize,
}

impl Pacer {
    /// Pacer driven by `interrupts` under `policy`.
    pub fn new(policy: CooldownPolicy, interrupts: Interrupts) -> Self {
        Self {
            policy,
            interrupts,
            state: EngineState::Running,
            cooldowns: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Cooldowns entered since creation.
    pub fn cooldowns(&self) -> usize {
        self.cooldowns
    }

    /// Return to [`EngineState::Running`] after an aborted batch.
    pub fn reset(&mut self) {
        self.state = EngineState::Running;
    }

    /// Suspension point between items: cools down if an interrupt is pending.
    pub fn checkpoint(&mut self) -> Flow {
        if self.state == EngineState::Aborted {
            return Flow::Abort;
        }
        if self.interrupts.take() {
            return self.cool_down(CooldownReason::Interrupted);
        }
        Flow::Continue
    }

    /// Suspend remote calls for the policy duration.
    ///
    /// An interrupt raised meanwhile either ends the wait early or aborts,
    /// depending on [`CooldownPolicy::second_interrupt`]. A rate-limit
    /// cooldown first absorbs one interrupt raised during the rejected call.
    pub fn cool_down(&mut self, reason: CooldownReason) -> Flow {
        let until = Instant::now() + self.policy.duration;
        self.state = EngineState::Cooldown { until };
        self.cooldowns += 1;
        if reason == CooldownReason::RateLimited && self.interrupts.take() {
            info!("interrupt folded into the rate-limit cooldown");
        }
        match reason {
            CooldownReason::Interrupted => warn!(
                "interrupted; resuming in {}s, interrupt again to {}",
                self.policy.duration.as_secs(),
                self.second_interrupt_verb()
            ),
            CooldownReason::RateLimited => warn!(
                "rate limited; waiting {}s before retrying, interrupt to {}",
                self.policy.duration.as_secs(),
                self.second_interrupt_verb()
            ),
        }

        loop {
            if self.interrupts.take() {
                match self.policy.second_interrupt {
                    SecondInterrupt::ResumeEarly => {
                        info!("cooldown ended early");
                        break;
                    }
                    SecondInterrupt::Abort => {
                        warn!("batch aborted during cooldown");
                        self.state = EngineState::Aborted;
                        return Flow::Abort;
                    }
                }
            }

            let now = Instant::now();
            if now >= until {
                break;
            }
            thread::sleep(self.policy.poll_interval.min(until - now));
        }

        self.state = EngineState::Running;
        Flow::Continue
    }

    fn second_interrupt_verb(&self) -> &'static str {
        match self.policy.second_interrupt {
            SecondInterrupt::ResumeEarly => "resume now",
            SecondInterrupt::Abort => "stop",
        }
    }
}
