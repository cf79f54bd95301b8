//! The machine configuration: transition matrix, state-info records,
//! labels, default timer unit and the ignored-event callback, together
//! with every operation that mutates them.
//!
//! A [`MachineConfig`] is owned by a [`Machine`](crate::Machine) and only
//! reachable for mutation through
//! [`Machine::configure`](crate::Machine::configure), which refuses access
//! while the machine is running. The typed `S`/`E` parameters make
//! out-of-range indices unrepresentable.

use crate::core::ids::{EventTag, StateTag};
use crate::core::table::{
    Callback, IgnoredEventCallback, InnerTransition, Labels, StateInfo, TransitionTable,
};
use crate::core::timer::{DurationUnit, TimerEvent};
use crate::error::ConfigError;
use std::io;
use tracing::warn;

/// Declarative description of a machine: what transitions exist, which
/// events are allowed where, which states time out, which callbacks run.
///
/// # Example
///
/// ```rust
/// use signalbox::{state_tags, event_tags, Machine, VirtualClockDispatcher};
///
/// state_tags! {
///     enum Door {
///         Closed,
///         Open,
///     }
/// }
///
/// event_tags! {
///     enum Action {
///         Pull,
///         Slam,
///     }
/// }
///
/// let mut fsm: Machine<Door, Action, _> =
///     Machine::new(VirtualClockDispatcher::new()).unwrap();
/// let cfg = fsm.configure().unwrap();
/// cfg.assign_transition(Door::Closed, Action::Pull, Door::Open).unwrap();
/// cfg.assign_transition(Door::Open, Action::Slam, Door::Closed).unwrap();
/// ```
pub struct MachineConfig<S: StateTag, E: EventTag, A: Clone + Default + Send + Sync + 'static> {
    pub(crate) table: TransitionTable<S>,
    pub(crate) states: Vec<StateInfo<S, E, A>>,
    pub(crate) labels: Labels,
    pub(crate) default_unit: DurationUnit,
    pub(crate) ignored_callback: Option<IgnoredEventCallback<S, E>>,
    timers_available: bool,
}

impl<S: StateTag, E: EventTag, A: Clone + Default + Send + Sync + 'static> MachineConfig<S, E, A> {
    pub(crate) fn new(initial: S, timers_available: bool) -> Self {
        Self {
            table: TransitionTable::new(E::COUNT, initial),
            states: (0..S::COUNT).map(|_| StateInfo::new()).collect(),
            labels: Labels::new::<S, E>(),
            default_unit: DurationUnit::default(),
            ignored_callback: None,
            timers_available,
        }
    }

    /// Wire event `event` to switch the machine from `from` to `to`.
    pub fn assign_transition(&mut self, from: S, event: E, to: S) -> Result<(), ConfigError> {
        self.ensure_not_pass_state(from)?;
        self.table.set(event.index(), from.index(), to);
        Ok(())
    }

    /// Wire event `event` to switch to `to` from every state.
    pub fn assign_transition_always(&mut self, event: E, to: S) {
        for s in 0..S::COUNT {
            self.table.set(event.index(), s, to);
        }
    }

    /// Mark `from` as a pass-state: once entered (and its callback has
    /// run), the machine immediately moves on to `to` via the signal
    /// channel. Clears any timeout or inner transitions on `from`.
    pub fn assign_pass_transition(&mut self, from: S, to: S) -> Result<(), ConfigError> {
        if from == to {
            return Err(ConfigError::PassStateSelfLoop {
                state: self.state_ref(from),
            });
        }
        let state = self.state_ref(from);
        let info = &mut self.states[from.index()];
        if info.timer.take().is_some() {
            warn!("state {state} becomes a pass-state, dropping its timeout");
        }
        if !info.inner.is_empty() {
            info.inner.clear();
            warn!("state {state} becomes a pass-state, dropping its inner transitions");
        }
        info.pass_to = Some(to);
        Ok(())
    }

    /// Append an inner transition on `from`: once activated with
    /// [`activate_inner_event`](crate::Machine::activate_inner_event),
    /// event `event` moves the machine to `to` through the signal channel.
    /// Also wires the ordinary external transition for the same triple.
    pub fn assign_inner_transition(&mut self, from: S, event: E, to: S) -> Result<(), ConfigError> {
        self.ensure_not_pass_state(from)?;
        if self.inner_position(from, event).is_some() {
            return Err(ConfigError::DuplicateInnerTransition {
                state: self.state_ref(from),
                event: self.event_ref(event),
            });
        }
        self.states[from.index()]
            .inner
            .push(InnerTransition::new(event, to));
        self.table.set(event.index(), from.index(), to);
        Ok(())
    }

    /// Append the inner transition `(event, to)` on every state except
    /// `to` itself; states already carrying the event and pass-states are
    /// skipped.
    pub fn assign_inner_transition_always(&mut self, event: E, to: S) {
        for idx in 0..S::COUNT {
            let Some(from) = S::from_index(idx) else {
                continue;
            };
            if from == to
                || self.states[idx].pass_to.is_some()
                || self.inner_position(from, event).is_some()
            {
                continue;
            }
            self.states[idx].inner.push(InnerTransition::new(event, to));
            self.table.set(event.index(), idx, to);
        }
    }

    /// Remove the inner transition for `event` on `from`.
    pub fn disable_inner_transition(&mut self, from: S, event: E) -> Result<(), ConfigError> {
        match self.inner_position(from, event) {
            Some(pos) => {
                self.states[from.index()].inner.remove(pos);
                Ok(())
            }
            None => Err(ConfigError::NoSuchInnerTransition {
                state: self.state_ref(from),
                event: self.event_ref(event),
            }),
        }
    }

    /// Arm a timeout on `from`, expressed in the default unit: after
    /// `duration` the machine switches to `to`.
    pub fn assign_timeout(&mut self, from: S, duration: u64, to: S) -> Result<(), ConfigError> {
        self.assign_timeout_with_unit(from, duration, self.default_unit, to)
    }

    /// Arm a timeout on `from` with an explicit unit.
    pub fn assign_timeout_with_unit(
        &mut self,
        from: S,
        duration: u64,
        unit: DurationUnit,
        to: S,
    ) -> Result<(), ConfigError> {
        self.ensure_timers()?;
        if self.states[from.index()].pass_to.is_some() {
            return Err(ConfigError::PassStateTimeout {
                state: self.state_ref(from),
            });
        }
        self.states[from.index()].timer = Some(TimerEvent {
            next_state: to,
            duration,
            unit,
        });
        Ok(())
    }

    /// Arm the same timeout on every state except `final_state`, in the
    /// default unit.
    pub fn assign_global_timeout(
        &mut self,
        duration: u64,
        final_state: S,
    ) -> Result<(), ConfigError> {
        self.assign_global_timeout_with_unit(duration, self.default_unit, final_state)
    }

    /// Arm the same timeout on every state except `final_state`.
    ///
    /// Fails without mutating anything when some state already carries a
    /// timeout; the error names the first offender. Pass-states are
    /// skipped, they cannot time out.
    pub fn assign_global_timeout_with_unit(
        &mut self,
        duration: u64,
        unit: DurationUnit,
        final_state: S,
    ) -> Result<(), ConfigError> {
        self.ensure_timers()?;
        for idx in 0..S::COUNT {
            if idx != final_state.index() && self.states[idx].timer.is_some() {
                return Err(ConfigError::GlobalTimeoutConflict {
                    state: self.state_ref_idx(idx),
                });
            }
        }
        for idx in 0..S::COUNT {
            if idx == final_state.index() || self.states[idx].pass_to.is_some() {
                continue;
            }
            self.states[idx].timer = Some(TimerEvent {
                next_state: final_state,
                duration,
                unit,
            });
        }
        Ok(())
    }

    /// Disarm the timeout on `from`. Returns whether one was armed; a
    /// `false` return is accompanied by a warning.
    pub fn clear_timeout(&mut self, from: S) -> bool {
        if self.states[from.index()].timer.take().is_some() {
            true
        } else {
            warn!("state {} has no timeout to clear", self.state_ref(from));
            false
        }
    }

    /// Disarm every timeout.
    pub fn clear_timeouts(&mut self) {
        for info in &mut self.states {
            info.timer = None;
        }
    }

    /// Allow or ignore `event` while on `from`. Refused when the pair
    /// names an inner transition.
    pub fn allow_event(&mut self, from: S, event: E, allowed: bool) -> Result<(), ConfigError> {
        if self.inner_position(from, event).is_some() {
            return Err(ConfigError::InnerTransitionConflict {
                state: self.state_ref(from),
                event: self.event_ref(event),
            });
        }
        self.table.set_allowed(event.index(), from.index(), allowed);
        Ok(())
    }

    /// Allow every event on every state.
    pub fn allow_all_events(&mut self) {
        self.table.allow_all();
    }

    /// Run `callback` with `arg` each time `state` is entered.
    pub fn assign_callback<F>(&mut self, state: S, callback: F, arg: A)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let info = &mut self.states[state.index()];
        info.callback = Some(std::sync::Arc::new(callback));
        info.callback_arg = arg;
    }

    /// Run `callback` on entry of every state. Arguments are left as
    /// previously assigned.
    pub fn assign_global_callback<F>(&mut self, callback: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let callback: Callback<A> = std::sync::Arc::new(callback);
        for info in &mut self.states {
            info.callback = Some(callback.clone());
        }
    }

    /// Replace the callback argument of `state`.
    pub fn assign_callback_arg(&mut self, state: S, arg: A) {
        self.states[state.index()].callback_arg = arg;
    }

    /// Run `callback` whenever an event is delivered but not allowed on
    /// the current state.
    pub fn assign_ignored_event_callback<F>(&mut self, callback: F)
    where
        F: Fn(S, E) + Send + Sync + 'static,
    {
        self.ignored_callback = Some(std::sync::Arc::new(callback));
    }

    /// Override the display label of a state.
    pub fn set_state_label(&mut self, state: S, label: impl Into<String>) {
        self.labels.set_state(state.index(), label.into());
    }

    /// Override the display label of an event.
    pub fn set_event_label(&mut self, event: E, label: impl Into<String>) {
        self.labels.set_event(event.index(), label.into());
    }

    /// Override several state labels at once.
    pub fn set_state_labels(&mut self, labels: &[(S, &str)]) {
        for (state, label) in labels {
            self.set_state_label(*state, *label);
        }
    }

    /// Override several event labels at once.
    pub fn set_event_labels(&mut self, labels: &[(E, &str)]) {
        for (event, label) in labels {
            self.set_event_label(*event, *label);
        }
    }

    /// Unit used by the timeout operations that do not name one.
    pub fn set_default_timer_unit(&mut self, unit: DurationUnit) -> Result<(), ConfigError> {
        self.ensure_timers()?;
        self.default_unit = unit;
        Ok(())
    }

    /// String-typed variant of [`set_default_timer_unit`]; accepts exactly
    /// `"ms"`, `"sec"` and `"min"`.
    ///
    /// [`set_default_timer_unit`]: Self::set_default_timer_unit
    pub fn set_default_timer_unit_str(&mut self, unit: &str) -> Result<(), ConfigError> {
        self.set_default_timer_unit(unit.parse()?)
    }

    /// Copy the whole configuration from another machine of the same
    /// shape (identical cardinalities are guaranteed by the shared type
    /// parameters).
    pub fn copy_from(&mut self, other: &Self) -> Result<(), ConfigError> {
        if !self.timers_available && other.states.iter().any(|info| info.timer.is_some()) {
            return Err(ConfigError::TimerUnsupported);
        }
        self.table = other.table.clone();
        self.states = other.states.clone();
        self.labels = other.labels.clone();
        self.default_unit = other.default_unit;
        self.ignored_callback = other.ignored_callback.clone();
        Ok(())
    }

    // ---- observers ----

    /// Whether `state` is a pass-state.
    pub fn is_pass_state(&self, state: S) -> bool {
        self.states[state.index()].pass_to.is_some()
    }

    /// Target of the pass-transition on `state`, if any.
    pub fn pass_target(&self, state: S) -> Option<S> {
        self.states[state.index()].pass_to
    }

    /// Timeout armed on `state`, if any.
    pub fn timeout_of(&self, state: S) -> Option<(u64, DurationUnit)> {
        self.states[state.index()]
            .timer
            .map(|t| (t.duration, t.unit))
    }

    /// Inner transitions of `state`, in assignment order.
    pub fn inner_transitions(&self, state: S) -> &[InnerTransition<S, E>] {
        &self.states[state.index()].inner
    }

    /// Whether `event` is allowed while on `state`.
    pub fn is_event_allowed(&self, state: S, event: E) -> bool {
        self.table.is_allowed(event.index(), state.index())
    }

    /// Target of the external transition for `(state, event)`. Meaningful
    /// when the pair is allowed; otherwise the table default.
    pub fn next_state(&self, state: S, event: E) -> S {
        self.table.next_state(event.index(), state.index())
    }

    /// Current default timer unit.
    pub fn default_timer_unit(&self) -> DurationUnit {
        self.default_unit
    }

    /// Label store (states, events, and the two synthetic event entries).
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Render the transition matrix, the timeout and pass rows, and the
    /// per-state info block.
    pub fn print(&self, out: &mut impl io::Write) -> io::Result<()> {
        let width = self.labels.max_event_width().max(6);
        writeln!(out, "---------------------")?;
        write!(out, "{:>width$}  |", "STATES:")?;
        for s in 0..S::COUNT {
            write!(out, " {s:>3}")?;
        }
        writeln!(out)?;
        writeln!(out, "{}--|{}", "-".repeat(width), "-".repeat(4 * S::COUNT))?;
        for e in 0..E::COUNT {
            write!(out, "{:>width$} E|", self.labels.event(e))?;
            for s in 0..S::COUNT {
                if self.table.is_allowed(e, s) {
                    write!(out, " {:>3}", self.table.next_state(e, s).index())?;
                } else {
                    write!(out, "   .")?;
                }
            }
            writeln!(out)?;
        }
        write!(out, "{:>width$} T|", self.labels.event(E::COUNT))?;
        for s in 0..S::COUNT {
            match self.states[s].timer {
                Some(t) => write!(out, " {:>3}", t.next_state.index())?,
                None => write!(out, "   .")?,
            }
        }
        writeln!(out)?;
        write!(out, "{:>width$} A|", self.labels.event(E::COUNT + 1))?;
        for s in 0..S::COUNT {
            match self.states[s].pass_to {
                Some(t) => write!(out, " {:>3}", t.index())?,
                None => write!(out, "   .")?,
            }
        }
        writeln!(out)?;
        writeln!(out, "\nState info:")?;
        for s in 0..S::COUNT {
            write!(out, "{s}:{}| ", self.labels.state(s))?;
            if let Some(t) = self.states[s].timer {
                writeln!(
                    out,
                    "{} {} => {} ({})",
                    t.duration,
                    t.unit,
                    t.next_state.index(),
                    self.labels.state(t.next_state.index())
                )?;
            } else if let Some(t) = self.states[s].pass_to {
                writeln!(
                    out,
                    "AAT => {} ({})",
                    t.index(),
                    self.labels.state(t.index())
                )?;
            } else {
                writeln!(out, "-")?;
            }
        }
        writeln!(out, "---------------------")?;
        Ok(())
    }

    // ---- internals ----

    pub(crate) fn state_ref(&self, state: S) -> String {
        self.state_ref_idx(state.index())
    }

    pub(crate) fn state_ref_idx(&self, index: usize) -> String {
        format!("{} ({})", index, self.labels.state(index))
    }

    pub(crate) fn event_ref(&self, event: E) -> String {
        format!("{} ({})", event.index(), self.labels.event(event.index()))
    }

    fn ensure_timers(&self) -> Result<(), ConfigError> {
        if self.timers_available {
            Ok(())
        } else {
            Err(ConfigError::TimerUnsupported)
        }
    }

    fn ensure_not_pass_state(&self, from: S) -> Result<(), ConfigError> {
        if self.states[from.index()].pass_to.is_some() {
            Err(ConfigError::PassStateSource {
                state: self.state_ref(from),
            })
        } else {
            Ok(())
        }
    }

    fn inner_position(&self, from: S, event: E) -> Option<usize> {
        self.states[from.index()]
            .inner
            .iter()
            .position(|t| t.event == event)
    }
}
