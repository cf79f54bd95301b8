//! One-shot configuration checks, run at `start()`.
//!
//! Fatal violations abort startup with a [`ConfigError`]; anomalies are
//! collected into a [`ValidationReport`] and emitted on the diagnostic
//! stream with `tracing::warn!`, but do not prevent the machine from
//! starting.

use crate::core::config::MachineConfig;
use crate::core::ids::{EventTag, StateTag};
use crate::error::ConfigError;
use std::fmt;
use tracing::warn;

/// A non-fatal anomaly found by the startup checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A non-initial state no other state can reach.
    Unreachable { state: String },
    /// A state with no way out: no timeout, no pass-transition, and every
    /// event either disallowed or a self-loop.
    DeadEnd { state: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { state } => write!(f, "state {state} is unreachable"),
            Self::DeadEnd { state } => write!(f, "state {state} is a dead-end"),
        }
    }
}

/// Outcome of the startup checks when no fatal violation was found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    warnings: Vec<Warning>,
}

impl ValidationReport {
    /// All collected warnings, in emission order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// True when the configuration raised no warnings at all.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Run every check over `cfg`.
pub(crate) fn run_checks<S, E, A>(
    cfg: &MachineConfig<S, E, A>,
) -> Result<ValidationReport, ConfigError>
where
    S: StateTag,
    E: EventTag,
    A: Clone + Default + Send + Sync + 'static,
{
    for idx in 0..S::COUNT {
        let Some(state) = S::from_index(idx) else {
            continue;
        };
        let Some(target) = cfg.pass_target(state) else {
            continue;
        };
        if target == state {
            return Err(ConfigError::PassStateSelfLoop {
                state: cfg.state_ref(state),
            });
        }
        if cfg.is_pass_state(target) {
            return Err(ConfigError::PassStateChain {
                state: cfg.state_ref(state),
            });
        }
        if cfg.timeout_of(state).is_some() {
            return Err(ConfigError::PassStateTimeout {
                state: cfg.state_ref(state),
            });
        }
    }

    let mut report = ValidationReport::default();
    for idx in 1..S::COUNT {
        if !is_reachable(cfg, idx) {
            report.warnings.push(Warning::Unreachable {
                state: cfg.state_ref_idx(idx),
            });
        }
    }
    for idx in 0..S::COUNT {
        if is_dead_end(cfg, idx) {
            report.warnings.push(Warning::DeadEnd {
                state: cfg.state_ref_idx(idx),
            });
        }
    }
    for warning in &report.warnings {
        warn!("{warning}");
    }
    Ok(report)
}

/// A state is reachable when some *other* state targets it through an
/// allowed external transition, a timeout, a pass-transition or an inner
/// transition. State 0 is reachable by definition.
fn is_reachable<S, E, A>(cfg: &MachineConfig<S, E, A>, target: usize) -> bool
where
    S: StateTag,
    E: EventTag,
    A: Clone + Default + Send + Sync + 'static,
{
    for idx in 0..S::COUNT {
        if idx == target {
            continue;
        }
        let Some(from) = S::from_index(idx) else {
            continue;
        };
        for e in 0..E::COUNT {
            let Some(event) = E::from_index(e) else {
                continue;
            };
            if cfg.is_event_allowed(from, event) && cfg.next_state(from, event).index() == target {
                return true;
            }
        }
        if cfg.states[idx]
            .timer
            .is_some_and(|t| t.next_state.index() == target)
        {
            return true;
        }
        if cfg.pass_target(from).is_some_and(|t| t.index() == target) {
            return true;
        }
        if cfg
            .inner_transitions(from)
            .iter()
            .any(|t| t.dest.index() == target)
        {
            return true;
        }
    }
    false
}

/// A state is a dead-end when nothing leads out of it: no timeout, no
/// pass-transition, and every event disallowed or looping back.
fn is_dead_end<S, E, A>(cfg: &MachineConfig<S, E, A>, idx: usize) -> bool
where
    S: StateTag,
    E: EventTag,
    A: Clone + Default + Send + Sync + 'static,
{
    let Some(state) = S::from_index(idx) else {
        return false;
    };
    if cfg.timeout_of(state).is_some() || cfg.is_pass_state(state) {
        return false;
    }
    for e in 0..E::COUNT {
        let Some(event) = E::from_index(e) else {
            continue;
        };
        if cfg.is_event_allowed(state, event) && cfg.next_state(state, event) != state {
            return false;
        }
    }
    true
}
