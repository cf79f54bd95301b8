//! Graphviz export of a machine configuration.

use crate::{EventTag, StateTag};
use crate::core::MachineConfig;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Rendering options for [`Machine::write_dot`](crate::Machine::write_dot).
///
/// Everything defaults to `true`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotOptions {
    /// Shade the node of the current state.
    pub show_active_state: bool,
    /// Draw timeout edges (`TO:<duration><unit>`).
    pub show_timeouts: bool,
    /// Draw inner-transition edges (`IN:<event>`).
    pub show_inner_events: bool,
    /// Draw pass-state edges (`AAT`).
    pub show_aat: bool,
    /// Node labels from the state label store instead of `S<i>`.
    pub use_state_strings: bool,
    /// Edge labels from the event label store instead of `E<i>`.
    pub use_event_strings: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            show_active_state: true,
            show_timeouts: true,
            show_inner_events: true,
            show_aat: true,
            use_state_strings: true,
            use_event_strings: true,
        }
    }
}

pub(crate) fn write_dot<S, E, A, W>(
    cfg: &MachineConfig<S, E, A>,
    current: S,
    out: &mut W,
    options: &DotOptions,
) -> io::Result<()>
where
    S: StateTag,
    E: EventTag,
    A: Clone + Default + Send + Sync + 'static,
    W: Write,
{
    writeln!(out, "digraph G {{")?;
    writeln!(out, "rankdir=LR;")?;
    for idx in 0..S::COUNT {
        let label = if options.use_state_strings {
            cfg.labels().state(idx).to_string()
        } else {
            format!("S{idx}")
        };
        write!(out, "{idx} [label=\"{label}\"")?;
        if idx == 0 {
            write!(out, ",shape=\"doublecircle\"")?;
        }
        if options.show_active_state && idx == current.index() {
            write!(out, ",style=\"filled\",fillcolor=\"gray83\"")?;
        }
        writeln!(out, "];")?;
    }

    for e in 0..E::COUNT {
        let label = if options.use_event_strings {
            cfg.labels().event(e).to_string()
        } else {
            format!("E{e}")
        };
        for idx in 0..S::COUNT {
            let Some(from) = S::from_index(idx) else {
                continue;
            };
            if cfg.is_pass_state(from) {
                continue;
            }
            let Some(event) = E::from_index(e) else {
                continue;
            };
            if cfg.is_event_allowed(from, event) {
                let to = cfg.next_state(from, event).index();
                writeln!(out, "{idx} -> {to} [label=\"{label}\"];")?;
            }
        }
    }

    for idx in 0..S::COUNT {
        let Some(from) = S::from_index(idx) else {
            continue;
        };
        if options.show_aat {
            if let Some(to) = cfg.pass_target(from) {
                writeln!(out, "{idx} -> {} [label=\"AAT\"];", to.index())?;
            }
        }
        if options.show_timeouts {
            if let Some(t) = cfg.states[idx].timer {
                writeln!(
                    out,
                    "{idx} -> {} [label=\"TO:{}{}\"];",
                    t.next_state.index(),
                    t.duration,
                    t.unit
                )?;
            }
        }
        if options.show_inner_events {
            for inner in cfg.inner_transitions(from) {
                let label = if options.use_event_strings {
                    cfg.labels().event(inner.event.index()).to_string()
                } else {
                    format!("E{}", inner.event.index())
                };
                writeln!(out, "{idx} -> {} [label=\"IN:{label}\"];", inner.dest.index())?;
            }
        }
    }
    writeln!(out, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_tags, state_tags};

    state_tags! {
        enum St {
            Start,
            Wait,
            Done,
        }
    }

    event_tags! {
        enum Ev {
            Kick,
        }
    }

    fn config() -> MachineConfig<St, Ev, ()> {
        let mut cfg = MachineConfig::new(St::Start, true);
        cfg.assign_transition(St::Start, Ev::Kick, St::Wait).unwrap();
        cfg.assign_timeout_with_unit(St::Wait, 200, crate::DurationUnit::Ms, St::Done)
            .unwrap();
        cfg.assign_pass_transition(St::Done, St::Start).unwrap();
        cfg
    }

    #[test]
    fn graph_carries_every_edge_kind() {
        let cfg = config();
        let mut out = Vec::new();
        write_dot(&cfg, St::Start, &mut out, &DotOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("digraph G {\nrankdir=LR;\n"));
        assert!(text.contains("0 [label=\"Start\",shape=\"doublecircle\""));
        assert!(text.contains("0 -> 1 [label=\"Kick\"];"));
        assert!(text.contains("1 -> 2 [label=\"TO:200ms\"];"));
        assert!(text.contains("2 -> 0 [label=\"AAT\"];"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn pass_state_suppresses_external_edges() {
        let mut cfg = config();
        // wire an external row onto every state, including the pass-state
        cfg.assign_transition_always(Ev::Kick, St::Wait);
        let mut out = Vec::new();
        write_dot(&cfg, St::Start, &mut out, &DotOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("2 -> 1 [label=\"Kick\"];"));
    }

    #[test]
    fn index_labels_replace_strings_when_disabled() {
        let cfg = config();
        let options = DotOptions {
            use_state_strings: false,
            use_event_strings: false,
            ..DotOptions::default()
        };
        let mut out = Vec::new();
        write_dot(&cfg, St::Start, &mut out, &options).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[label=\"S0\""));
        assert!(text.contains("0 -> 1 [label=\"E0\"];"));
    }

    #[test]
    fn inner_edges_render_with_their_prefix() {
        let mut cfg: MachineConfig<St, Ev, ()> = MachineConfig::new(St::Start, true);
        cfg.assign_inner_transition(St::Wait, Ev::Kick, St::Done)
            .unwrap();
        let mut out = Vec::new();
        write_dot(&cfg, St::Start, &mut out, &DotOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1 -> 2 [label=\"IN:Kick\"];"));
    }

    #[test]
    fn current_state_is_shaded_only_when_requested() {
        let cfg = config();
        let mut out = Vec::new();
        write_dot(&cfg, St::Wait, &mut out, &DotOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1 [label=\"Wait\",style=\"filled\",fillcolor=\"gray83\"];"));

        let options = DotOptions {
            show_active_state: false,
            ..DotOptions::default()
        };
        let mut out = Vec::new();
        write_dot(&cfg, St::Wait, &mut out, &options).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("fillcolor"));
    }
}
