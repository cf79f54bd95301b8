//! Signalbox: a table-driven finite state machine engine.
//!
//! Signalbox drives reactive control logic — traffic lights, protocol
//! handshakes, UI mode controllers, device sequencers — from a declarative
//! configuration: a transition matrix gated by an allow-mask, per-state
//! timeouts, entry callbacks, pass-states that immediately move on, and
//! signal-driven inner transitions. A one-shot validator checks the
//! configuration at startup (fatal wiring mistakes abort, unreachable and
//! dead-end states warn), and a single-threaded runtime executes it
//! against a pluggable [`EventDispatcher`].
//!
//! # Core Concepts
//!
//! - **States and events**: two contiguous, zero-based identifier domains,
//!   declared with [`state_tags!`] and [`event_tags!`]. State 0 is initial.
//! - **Transitions**: `(state, event) → state` entries, broadcast
//!   variants, timeouts, pass-states ("always-active transitions") and
//!   inner transitions armed at runtime.
//! - **Dispatcher**: the port to the outside world — timers, signals and
//!   the wakeup stream the run loop drains.
//!
//! # Example
//!
//! ```rust
//! use signalbox::{state_tags, Machine, NoEvent, VirtualClockDispatcher};
//!
//! state_tags! {
//!     enum Light {
//!         Init,
//!         Red,
//!         Green,
//!     }
//! }
//!
//! let dispatcher = VirtualClockDispatcher::new().with_horizon_ms(500);
//! let mut fsm: Machine<Light, NoEvent, _> = Machine::new(dispatcher).unwrap();
//! {
//!     let cfg = fsm.configure().unwrap();
//!     cfg.set_default_timer_unit_str("ms").unwrap();
//!     cfg.assign_timeout(Light::Init, 100, Light::Red).unwrap();
//!     cfg.assign_timeout(Light::Red, 300, Light::Green).unwrap();
//!     cfg.assign_timeout(Light::Green, 300, Light::Red).unwrap();
//! }
//! fsm.run().unwrap();
//! assert_eq!(fsm.current_state(), Light::Green);
//! ```

pub mod core;
pub mod dispatch;
pub mod dot;
pub mod error;
pub mod runtime;
pub mod trace;

pub use crate::core::{
    Callback, DurationUnit, EventTag, IgnoredEventCallback, InnerTransition, Labels,
    MachineConfig, NoEvent, StateTag, TimerEvent, ValidationReport, Warning,
};
pub use crate::dispatch::{EventDispatcher, NullDispatcher, VirtualClockDispatcher, Wakeup};
pub use crate::dot::DotOptions;
pub use crate::error::{ConfigError, Error, Result, RuntimeError};
pub use crate::runtime::Machine;
pub use crate::trace::{HistoryRecord, PrintFlags, RunLog, DEFAULT_HISTORY_FILE};

/// Library name used in diagnostics and derived defaults.
pub(crate) const LIB_NAME: &str = "signalbox";
