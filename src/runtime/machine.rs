//! The machine runtime: lifecycle, event processing and action execution.

use crate::core::{
    run_checks, EventTag, MachineConfig, StateTag, ValidationReport,
};
use crate::dispatch::{EventDispatcher, Wakeup};
use crate::dot::{self, DotOptions};
use crate::error::{ConfigError, Error, Result, RuntimeError};
use crate::trace::{PrintFlags, RunLog};
use crate::LIB_NAME;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing::debug;

/// A finite state machine: configuration, current state and dispatcher.
///
/// The engine of the machine itself has two states. While *stopped*,
/// [`configure`](Self::configure) hands out the mutable configuration and
/// every `process_*` call is refused. [`start`](Self::start) validates the
/// configuration, freezes it and enters the initial state; from then on
/// the machine only moves through [`process_event`](Self::process_event),
/// [`process_timeout`](Self::process_timeout) and
/// [`process_inner_event`](Self::process_inner_event) — delivered either
/// by the embedded [`run`](Self::run) loop or by a host-owned loop calling
/// [`step`](Self::step) — until [`stop`](Self::stop).
///
/// # Example
///
/// ```rust
/// use signalbox::{state_tags, event_tags, Machine, VirtualClockDispatcher};
///
/// state_tags! {
///     enum Turnstile {
///         Locked,
///         Unlocked,
///     }
/// }
///
/// event_tags! {
///     enum Input {
///         Push,
///         Coin,
///     }
/// }
///
/// let mut fsm: Machine<Turnstile, Input, _> =
///     Machine::new(VirtualClockDispatcher::new()).unwrap();
/// {
///     let cfg = fsm.configure().unwrap();
///     cfg.assign_transition(Turnstile::Locked, Input::Coin, Turnstile::Unlocked)
///         .unwrap();
///     cfg.assign_transition(Turnstile::Unlocked, Input::Push, Turnstile::Locked)
///         .unwrap();
/// }
/// fsm.start().unwrap();
/// fsm.process_event(Input::Coin).unwrap();
/// assert_eq!(fsm.current_state(), Turnstile::Unlocked);
/// ```
pub struct Machine<
    S: StateTag,
    E: EventTag,
    D: EventDispatcher<E>,
    A: Clone + Default + Send + Sync + 'static = (),
> {
    config: MachineConfig<S, E, A>,
    dispatcher: D,
    current: S,
    is_running: bool,
    run_log: Option<RunLog>,
}

impl<S, E, D, A> Machine<S, E, D, A>
where
    S: StateTag,
    E: EventTag,
    D: EventDispatcher<E>,
    A: Clone + Default + Send + Sync + 'static,
{
    /// Build a stopped machine around `dispatcher`. Fails when the state
    /// domain has fewer than two states.
    pub fn new(dispatcher: D) -> Result<Self, ConfigError> {
        let initial = match S::from_index(0) {
            Some(initial) if S::COUNT >= 2 => initial,
            _ => return Err(ConfigError::TooFewStates { count: S::COUNT }),
        };
        Ok(Self {
            config: MachineConfig::new(initial, dispatcher.has_timers()),
            dispatcher,
            current: initial,
            is_running: false,
            run_log: None,
        })
    }

    // ---- configuration access ----

    /// Mutable configuration; refused while the machine is running.
    pub fn configure(&mut self) -> Result<&mut MachineConfig<S, E, A>, ConfigError> {
        if self.is_running {
            return Err(ConfigError::MachineRunning);
        }
        Ok(&mut self.config)
    }

    /// Shared view of the configuration.
    pub fn config(&self) -> &MachineConfig<S, E, A> {
        &self.config
    }

    /// Run the startup checks without starting.
    pub fn check(&self) -> Result<ValidationReport, ConfigError> {
        run_checks(&self.config)
    }

    // ---- lifecycle ----

    /// Validate the configuration, freeze it and enter the initial state:
    /// its counter is recorded, its action runs, its timer is armed.
    ///
    /// Returns the warnings the validator collected. Does not block; in
    /// embedded mode use [`run`](Self::run), otherwise deliver events
    /// yourself and drain pending wakeups with [`step`](Self::step).
    pub fn start(&mut self) -> Result<ValidationReport> {
        if self.is_running {
            return Err(RuntimeError::AlreadyRunning.into());
        }
        let report = run_checks(&self.config)?;
        self.is_running = true;
        debug!("starting in state {}", self.config.state_ref(self.current));
        if let Some(log) = &mut self.run_log {
            log.record_initial_entry();
        }
        self.run_action();
        Ok(report)
    }

    /// Cancel and tear down the dispatcher's timer, then mark the machine
    /// stopped.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running {
            return Err(RuntimeError::NotRunning.into());
        }
        debug!("stopping in state {}", self.config.state_ref(self.current));
        self.dispatcher.timer_cancel();
        self.dispatcher.timer_kill();
        self.is_running = false;
        Ok(())
    }

    /// [`start`](Self::start), then drain the dispatcher until it is
    /// exhausted or killed, then perform the [`stop`](Self::stop)
    /// housekeeping.
    pub fn run(&mut self) -> Result<ValidationReport> {
        let report = self.start()?;
        while let Some(wakeup) = self.dispatcher.next_wakeup() {
            self.dispatch(wakeup)?;
        }
        if self.is_running {
            self.stop()?;
        }
        Ok(report)
    }

    /// Dispatch at most one pending wakeup, returning it. `Ok(None)`
    /// means the dispatcher had nothing pending.
    pub fn step(&mut self) -> Result<Option<Wakeup<E>>> {
        match self.dispatcher.next_wakeup() {
            Some(wakeup) => {
                self.dispatch(wakeup)?;
                Ok(Some(wakeup))
            }
            None => Ok(None),
        }
    }

    fn dispatch(&mut self, wakeup: Wakeup<E>) -> Result<()> {
        match wakeup {
            Wakeup::External(event) => self.process_event(event),
            Wakeup::TimerExpired => self.process_timeout(),
            Wakeup::Signal => self.process_inner_event(),
        }
    }

    // ---- event processing ----

    /// Deliver an external event. Disallowed events bump the ignored
    /// counter and invoke the ignored-event callback; allowed events
    /// cancel the armed timer, switch state and run the new state's
    /// action.
    pub fn process_event(&mut self, event: E) -> Result<()> {
        if !self.is_running {
            return Err(RuntimeError::NotRunning.into());
        }
        debug!("processing event {}", self.config.event_ref(event));
        if !self.config.is_event_allowed(self.current, event) {
            debug!("event is ignored");
            if let Some(log) = &mut self.run_log {
                log.log_ignored(event.index());
            }
            if let Some(callback) = self.config.ignored_callback.clone() {
                callback(self.current, event);
            }
            return Ok(());
        }
        if self.config.timeout_of(self.current).is_some() {
            self.dispatcher.timer_cancel();
        }
        self.current = self.config.next_state(self.current, event);
        self.log_transition(event.index())?;
        self.run_action();
        Ok(())
    }

    /// Deliver the expiry of the armed timer. Fails when the current
    /// state carries no timeout: the timer should not have been running.
    pub fn process_timeout(&mut self) -> Result<()> {
        if !self.is_running {
            return Err(RuntimeError::NotRunning.into());
        }
        let Some(timer) = self.config.states[self.current.index()].timer else {
            return Err(RuntimeError::TimerNotArmed {
                state: self.config.state_ref(self.current),
            }
            .into());
        };
        debug!(
            "timeout after {} {} on state {}",
            timer.duration,
            timer.unit,
            self.config.state_ref(self.current)
        );
        self.current = timer.next_state;
        self.log_transition(E::COUNT)?;
        self.run_action();
        Ok(())
    }

    /// Deliver a raised signal: a pass-state moves to its fixed target,
    /// otherwise the first active inner transition fires and is disarmed.
    /// A stale signal — neither applies anymore — is a no-op.
    pub fn process_inner_event(&mut self) -> Result<()> {
        if !self.is_running {
            return Err(RuntimeError::NotRunning.into());
        }
        let info = &mut self.config.states[self.current.index()];
        let target = match info.pass_to {
            Some(target) => Some(target),
            None => info.inner.iter_mut().find(|t| t.active).map(|t| {
                t.active = false;
                t.dest
            }),
        };
        let Some(target) = target else {
            debug!("stale signal on state {}", self.config.state_ref(self.current));
            return Ok(());
        };
        if self.config.timeout_of(self.current).is_some() {
            self.dispatcher.timer_cancel();
        }
        self.current = target;
        self.log_transition(E::COUNT + 1)?;
        self.run_action();
        Ok(())
    }

    /// Arm every inner transition listening for `event`, across all
    /// states. When the current state carries one, the signal is raised so
    /// the dispatcher delivers it (and the timer is cancelled so the inner
    /// transition wins the race against a pending expiry). Fails when the
    /// event is wired to no inner transition at all.
    pub fn activate_inner_event(&mut self, event: E) -> Result<()> {
        let mut found = false;
        for info in &mut self.config.states {
            for t in &mut info.inner {
                if t.event == event {
                    t.active = true;
                    found = true;
                }
            }
        }
        if !found {
            return Err(RuntimeError::InnerEventNotWired {
                event: self.config.event_ref(event),
            }
            .into());
        }
        let carries_one = self.config.states[self.current.index()]
            .inner
            .iter()
            .any(|t| t.active && t.event == event);
        if carries_one {
            self.dispatcher.raise_signal();
            self.dispatcher.timer_cancel();
        }
        Ok(())
    }

    /// Entry actions for the (new) current state, in fixed order: arm the
    /// timer, run the callback, then raise the signal (and cancel the
    /// timer) when a pass-state or an active inner transition wants out.
    /// Arming before the callback keeps a slow callback from stretching
    /// the state's dwell time past its configured timeout.
    fn run_action(&mut self) {
        let idx = self.current.index();
        if let Some(timer) = self.config.states[idx].timer {
            self.dispatcher.timer_start(timer.timeout());
        }
        if let Some(callback) = self.config.states[idx].callback.clone() {
            let arg = self.config.states[idx].callback_arg.clone();
            callback(arg);
        }
        let info = &self.config.states[idx];
        if info.pass_to.is_some() || info.inner.iter().any(|t| t.active) {
            self.dispatcher.raise_signal();
            self.dispatcher.timer_cancel();
        }
    }

    fn log_transition(&mut self, event: usize) -> Result<()> {
        debug!(
            "switched to state {}",
            self.config.state_ref(self.current)
        );
        if let Some(log) = &mut self.run_log {
            log.log_transition(self.current.index(), event, &self.config.labels)?;
        }
        Ok(())
    }

    // ---- run log ----

    /// Turn on the run log (counters plus CSV history). A fresh log is
    /// created on first call, with the history going to the default file
    /// until redirected.
    pub fn enable_run_log(&mut self) {
        if self.run_log.is_none() {
            self.run_log = Some(RunLog::new(S::COUNT, E::COUNT));
        }
    }

    /// The run log, when enabled.
    pub fn run_log(&self) -> Option<&RunLog> {
        self.run_log.as_ref()
    }

    /// Mutable run log, e.g. to redirect the history sink.
    pub fn run_log_mut(&mut self) -> Option<&mut RunLog> {
        self.run_log.as_mut()
    }

    /// Dump the run log's selected sections; a no-op when logging is off.
    pub fn print_run_data(&self, out: &mut impl io::Write, flags: PrintFlags) -> io::Result<()> {
        match &self.run_log {
            Some(log) => log.print_data(out, flags, &self.config.labels),
            None => Ok(()),
        }
    }

    // ---- graph export ----

    /// Write the Graphviz description of the configuration.
    pub fn write_dot(&self, out: &mut impl io::Write, options: &DotOptions) -> io::Result<()> {
        dot::write_dot(&self.config, self.current, out, options)
    }

    /// Write the Graphviz description to a file.
    pub fn write_dot_file(&self, path: impl AsRef<Path>, options: &DotOptions) -> Result<()> {
        let file = File::create(path).map_err(RuntimeError::from)?;
        let mut writer = BufWriter::new(file);
        self.write_dot(&mut writer, options)
            .map_err(RuntimeError::from)?;
        Ok(())
    }

    // ---- observers ----

    /// The state the machine currently rests on.
    pub fn current_state(&self) -> S {
        self.current
    }

    /// Whether [`start`](Self::start) succeeded and [`stop`](Self::stop)
    /// has not run yet.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Number of states in the domain.
    pub fn state_count(&self) -> usize {
        S::COUNT
    }

    /// Number of external events in the domain.
    pub fn event_count(&self) -> usize {
        E::COUNT
    }

    /// Timeout armed on `state`, if any.
    pub fn timeout_of(&self, state: S) -> Option<(u64, crate::DurationUnit)> {
        self.config.timeout_of(state)
    }

    /// Display label of `state`.
    pub fn state_label(&self, state: S) -> &str {
        self.config.labels.state(state.index())
    }

    /// Display label of `event`.
    pub fn event_label(&self, event: E) -> &str {
        self.config.labels.event(event.index())
    }

    /// The dispatcher, e.g. to schedule events on a virtual clock.
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Mutable dispatcher access.
    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Human-readable summary of how this machine is set up.
    pub fn build_options(&self) -> String {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        format!(
            "{} {}\nruntime options:\n  timer support = {}\n  run log       = {}\n  default unit  = {}\n",
            LIB_NAME,
            env!("CARGO_PKG_VERSION"),
            yes_no(self.dispatcher.has_timers()),
            yes_no(self.run_log.is_some()),
            self.config.default_unit,
        )
    }
}
