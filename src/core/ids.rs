//! Identifier domains for states and events.
//!
//! A machine is parameterized over two enumerated, contiguous, zero-based
//! identifier domains. The traits here express exactly that: a `COUNT`
//! sentinel known at compile time and a total mapping to and from
//! `0..COUNT`. The state with index 0 is the initial state.
//!
//! The [`state_tags!`](crate::state_tags) and
//! [`event_tags!`](crate::event_tags) macros generate conforming enums;
//! hand-written implementations only need to keep the mapping contiguous.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A state identifier domain.
///
/// # Example
///
/// ```rust
/// use signalbox::{state_tags, StateTag};
///
/// state_tags! {
///     enum Light {
///         Red,
///         Orange,
///         Green,
///     }
/// }
///
/// assert_eq!(Light::COUNT, 3);
/// assert_eq!(Light::Orange.index(), 1);
/// assert_eq!(Light::from_index(2), Some(Light::Green));
/// assert_eq!(Light::Red.name(), "Red");
/// ```
pub trait StateTag: Copy + PartialEq + Eq + Debug + Send + Sync + 'static {
    /// Number of states in the domain. Must be at least 2.
    const COUNT: usize;

    /// Position of this state in `0..COUNT`.
    fn index(self) -> usize;

    /// Inverse of [`index`](Self::index); `None` outside `0..COUNT`.
    fn from_index(index: usize) -> Option<Self>;

    /// Display name, used as the default state label.
    fn name(self) -> &'static str;
}

/// An event identifier domain.
///
/// Unlike states, an empty domain is legal: purely timer-driven machines
/// use [`NoEvent`]. Synthetic indices `COUNT` and `COUNT + 1` are reserved
/// by the run log for timeout and inner ("AAT") transitions and never name
/// an actual event value.
pub trait EventTag: Copy + PartialEq + Eq + Debug + Send + Sync + 'static {
    /// Number of events in the domain. May be 0.
    const COUNT: usize;

    /// Position of this event in `0..COUNT`.
    fn index(self) -> usize;

    /// Inverse of [`index`](Self::index); `None` outside `0..COUNT`.
    fn from_index(index: usize) -> Option<Self>;

    /// Display name, used as the default event label.
    fn name(self) -> &'static str;
}

/// The empty event domain, for machines driven by timeouts alone.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum NoEvent {}

impl EventTag for NoEvent {
    const COUNT: usize = 0;

    fn index(self) -> usize {
        match self {}
    }

    fn from_index(_: usize) -> Option<Self> {
        None
    }

    fn name(self) -> &'static str {
        match self {}
    }
}
