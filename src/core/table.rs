//! The parallel tables backing a machine configuration.
//!
//! Three structures move together: the transition matrix (next-state
//! values gated by an allow-mask), the per-state info records (timeout,
//! callback, pass-state flag, inner transitions) and the label store.
//! Configuration operations in [`MachineConfig`](crate::MachineConfig)
//! keep them consistent.

use crate::core::ids::{EventTag, StateTag};
use crate::core::timer::TimerEvent;
use std::sync::Arc;

/// Per-state callback type. Receives a clone of the state's callback
/// argument each time the state is entered.
pub type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Callback invoked when an event is delivered but not allowed on the
/// current state.
pub type IgnoredEventCallback<S, E> = Arc<dyn Fn(S, E) + Send + Sync>;

/// Label reserved for the synthetic timeout event index.
pub(crate) const TIMEOUT_LABEL: &str = "*Timeout*";

/// Label reserved for the synthetic inner-transition event index.
pub(crate) const AAT_LABEL: &str = "*AAT*";

/// A transition effective only while its `active` flag is set by
/// [`activate_inner_event`](crate::Machine::activate_inner_event), and
/// dispatched through the signal channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct InnerTransition<S, E> {
    /// Event this transition listens for.
    pub event: E,
    /// Destination once dispatched.
    pub dest: S,
    /// Runtime arming flag; cleared when the transition fires.
    pub(crate) active: bool,
}

impl<S: StateTag, E: EventTag> InnerTransition<S, E> {
    pub(crate) fn new(event: E, dest: S) -> Self {
        Self {
            event,
            dest,
            active: false,
        }
    }

    /// Whether the transition is currently armed.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Everything a machine knows about one state.
#[derive(Clone)]
pub(crate) struct StateInfo<S, E, A> {
    pub(crate) timer: Option<TimerEvent<S>>,
    pub(crate) callback: Option<Callback<A>>,
    pub(crate) callback_arg: A,
    pub(crate) pass_to: Option<S>,
    pub(crate) inner: Vec<InnerTransition<S, E>>,
}

impl<S: StateTag, E: EventTag, A: Default> StateInfo<S, E, A> {
    pub(crate) fn new() -> Self {
        Self {
            timer: None,
            callback: None,
            callback_arg: A::default(),
            pass_to: None,
            inner: Vec::new(),
        }
    }
}

/// The `NumEvents × NumStates` next-state matrix and its allow-mask.
///
/// Rows are events, columns are states. Defaults: every entry points at
/// state 0 and nothing is allowed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct TransitionTable<S> {
    next: Vec<Vec<S>>,
    allowed: Vec<Vec<bool>>,
}

impl<S: StateTag> TransitionTable<S> {
    pub(crate) fn new(events: usize, initial: S) -> Self {
        Self {
            next: vec![vec![initial; S::COUNT]; events],
            allowed: vec![vec![false; S::COUNT]; events],
        }
    }

    pub(crate) fn next_state(&self, event: usize, state: usize) -> S {
        self.next[event][state]
    }

    pub(crate) fn is_allowed(&self, event: usize, state: usize) -> bool {
        self.allowed[event][state]
    }

    pub(crate) fn set(&mut self, event: usize, state: usize, to: S) {
        self.next[event][state] = to;
        self.allowed[event][state] = true;
    }

    pub(crate) fn set_allowed(&mut self, event: usize, state: usize, allowed: bool) {
        self.allowed[event][state] = allowed;
    }

    pub(crate) fn allow_all(&mut self) {
        for row in &mut self.allowed {
            row.fill(true);
        }
    }
}

/// Display labels for states and events.
///
/// Always present: state labels default to the tag names, event labels to
/// the tag names plus the two synthetic entries for timeout and inner
/// transitions at indices `E::COUNT` and `E::COUNT + 1`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Labels {
    states: Vec<String>,
    events: Vec<String>,
}

impl Labels {
    pub(crate) fn new<S: StateTag, E: EventTag>() -> Self {
        let mut states = Vec::with_capacity(S::COUNT);
        for i in 0..S::COUNT {
            match S::from_index(i) {
                Some(s) => states.push(s.name().to_string()),
                None => states.push(format!("St-{i}")),
            }
        }
        let mut events = Vec::with_capacity(E::COUNT + 2);
        for i in 0..E::COUNT {
            match E::from_index(i) {
                Some(e) => events.push(e.name().to_string()),
                None => events.push(format!("Ev-{i}")),
            }
        }
        events.push(TIMEOUT_LABEL.to_string());
        events.push(AAT_LABEL.to_string());
        Self { states, events }
    }

    /// Label of the state at `index`.
    pub fn state(&self, index: usize) -> &str {
        self.states.get(index).map(String::as_str).unwrap_or("")
    }

    /// Label of the event at `index`, including the two synthetic entries.
    pub fn event(&self, index: usize) -> &str {
        self.events.get(index).map(String::as_str).unwrap_or("")
    }

    pub(crate) fn set_state(&mut self, index: usize, label: String) {
        self.states[index] = label;
    }

    pub(crate) fn set_event(&mut self, index: usize, label: String) {
        self.events[index] = label;
    }

    pub(crate) fn max_event_width(&self) -> usize {
        self.events.iter().map(String::len).max().unwrap_or(0)
    }
}
