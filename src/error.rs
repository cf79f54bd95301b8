//! Error types for configuration and runtime failures.
//!
//! The engine distinguishes two failure kinds: [`ConfigError`] is raised
//! synchronously from configuration calls and from `start()` when the
//! validator finds a fatal violation; [`RuntimeError`] is raised from the
//! runtime methods and the history sink. Both carry the offending state or
//! event rendered as `index (label)` so diagnostics stay readable once
//! labels are configured.

use thiserror::Error;

/// Errors raised while building the machine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a machine needs at least two states, this one declares {count}")]
    TooFewStates { count: usize },

    #[error("invalid duration unit \"{0}\", expected \"ms\", \"sec\" or \"min\"")]
    InvalidDurationUnit(String),

    #[error("the dispatcher has no timer support, timeouts cannot be configured")]
    TimerUnsupported,

    #[error("the machine is running, configuration is frozen until stop()")]
    MachineRunning,

    #[error("state {state} is a pass-state and cannot be the source of a transition")]
    PassStateSource { state: String },

    #[error("pass-state {state} cannot lead to itself")]
    PassStateSelfLoop { state: String },

    #[error("pass-state {state} cannot be followed by another pass-state")]
    PassStateChain { state: String },

    #[error("state {state} cannot have both a timeout and a pass-state flag")]
    PassStateTimeout { state: String },

    #[error("state {state} already has a timeout, global timeout refused")]
    GlobalTimeoutConflict { state: String },

    #[error("state {state} already has an inner transition for event {event}")]
    DuplicateInnerTransition { state: String, event: String },

    #[error("state {state} has no inner transition for event {event}")]
    NoSuchInnerTransition { state: String, event: String },

    #[error("event {event} on state {state} is bound to an inner transition and cannot be toggled")]
    InnerTransitionConflict { state: String, event: String },
}

/// Errors raised while the machine is running.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("start() called on a machine that is already running")]
    AlreadyRunning,

    #[error("the machine is not running")]
    NotRunning,

    #[error("event {event} is not wired to any inner transition")]
    InnerEventNotWired { event: String },

    #[error("a timeout fired on state {state}, which has no enabled timer")]
    TimerNotArmed { state: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for operations that can fail either way.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
