//! Engine errors

use thiserror::Error;

/// Errors reported by the event/state engine.
///
/// States and event kinds are carried in their `Debug` rendering so one error type
/// serves every machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsmError {
    /// No transition is defined for the entity's current state and the event kind
    #[error("{fsm}: no transition from {state} on {event}")]
    UndefinedTransition {
        /// Machine name
        fsm: &'static str,
        /// Current state of the entity
        state: String,
        /// Rejected event kind
        event: String,
    },

    /// A state referenced by the transition table has no callback
    #[error("{fsm}: state {state} has no callback")]
    MissingCallback {
        /// Machine name
        fsm: &'static str,
        /// State without a callback
        state: String,
    },

    /// A non-transitional event kind also appears in the transition table
    #[error("{fsm}: non-transitional event {event} appears in the transition table")]
    NonTransitionalInTable {
        /// Machine name
        fsm: &'static str,
        /// Overlapping event kind
        event: String,
    },

    /// Non-transitional event kinds were declared without a generic handler
    #[error("{fsm}: non-transitional events declared without a generic handler")]
    MissingGenericHandler {
        /// Machine name
        fsm: &'static str,
    },

    /// The same (state, event) pair was given two different targets
    #[error("{fsm}: conflicting transitions from {state} on {event}")]
    ConflictingTransition {
        /// Machine name
        fsm: &'static str,
        /// Source state
        state: String,
        /// Event kind
        event: String,
    },

    /// The worker pool has been drained
    #[error("state machine is shutting down")]
    ShuttingDown,

    /// The job was dropped before it produced an outcome
    #[error("event job abandoned before completion")]
    Abandoned,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, FsmError>;
