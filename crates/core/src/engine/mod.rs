//! Catalogue synchronisation and unlock batches.

/// Interrupt counting and the cooldown state machine.
pub mod cooldown;
/// Title and achievement discovery.
pub mod sync;
/// Progress update batches.
pub mod unlock;

pub use cooldown::{
    Armed, CooldownPolicy, CooldownReason, EngineState, Flow, Interrupts, Pacer,
    SecondInterrupt,
};
pub use sync::{is_eligible, DiscoveryReport, SyncEngine};
pub use unlock::{UnlockEngine, UnlockReport};

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchOutcome {
    /// Every pending item was processed.
    #[default]
    Completed,
    /// The user stopped the batch during a cooldown.
    Aborted,
}
