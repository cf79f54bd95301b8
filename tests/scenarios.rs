//! End-to-end scenarios exercising the engine through its public API:
//! the turnstile and traffic-light classics, global-timeout conflicts,
//! pass-state validation, reachability warnings, inner events and the
//! exported artifacts (CSV history, DOT graph).

use signalbox::{
    event_tags, state_tags, ConfigError, DotOptions, Error, EventTag, Machine, NoEvent,
    NullDispatcher, RuntimeError, StateTag, VirtualClockDispatcher, Wakeup, Warning,
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// In-memory sink shared between the test and the run log.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

mod turnstile {
    use super::*;

    state_tags! {
        enum Turnstile {
            Locked,
            Unlocked,
        }
    }

    event_tags! {
        enum Input {
            Push,
            Coin,
        }
    }

    #[test]
    fn coin_push_sequence_with_one_ignored_push() {
        let mut fsm: Machine<Turnstile, Input, _> =
            Machine::new(VirtualClockDispatcher::new()).unwrap();
        fsm.enable_run_log();
        fsm.run_log_mut().unwrap().disable_history_output();
        {
            let cfg = fsm.configure().unwrap();
            cfg.assign_transition(Turnstile::Locked, Input::Coin, Turnstile::Unlocked)
                .unwrap();
            cfg.assign_transition(Turnstile::Unlocked, Input::Push, Turnstile::Locked)
                .unwrap();
        }
        let report = fsm.start().unwrap();
        assert!(report.is_clean());
        assert_eq!(fsm.current_state(), Turnstile::Locked);

        let mut trace = vec![fsm.current_state()];
        for event in [Input::Coin, Input::Push, Input::Push, Input::Coin] {
            fsm.process_event(event).unwrap();
            trace.push(fsm.current_state());
        }
        assert_eq!(
            trace,
            [
                Turnstile::Locked,
                Turnstile::Unlocked,
                Turnstile::Locked,
                Turnstile::Locked,
                Turnstile::Unlocked,
            ]
        );

        let log = fsm.run_log().unwrap();
        // the third event, Push while Locked, was never wired
        assert_eq!(log.ignored(Input::Push.index()), 1);
        assert_eq!(log.ignored(Input::Coin.index()), 0);
        assert_eq!(log.event_fires(Input::Coin.index()), 2);
        assert_eq!(log.event_fires(Input::Push.index()), 1);
        assert_eq!(log.state_entries(Turnstile::Locked.index()), 2);
        assert_eq!(log.state_entries(Turnstile::Unlocked.index()), 2);
    }
}

mod traffic_light {
    use super::*;

    state_tags! {
        enum Light {
            Init,
            Red,
            Orange,
            Green,
        }
    }

    #[test]
    fn two_seconds_of_simulated_time() {
        let dispatcher = VirtualClockDispatcher::new().with_horizon_ms(2_000);
        let mut fsm: Machine<Light, NoEvent, _> = Machine::new(dispatcher).unwrap();
        fsm.enable_run_log();
        fsm.run_log_mut().unwrap().disable_history_output();
        {
            let cfg = fsm.configure().unwrap();
            cfg.set_default_timer_unit_str("ms").unwrap();
            cfg.assign_timeout(Light::Init, 200, Light::Red).unwrap();
            cfg.assign_timeout(Light::Red, 600, Light::Green).unwrap();
            cfg.assign_timeout(Light::Green, 600, Light::Orange).unwrap();
            cfg.assign_timeout(Light::Orange, 300, Light::Red).unwrap();
        }
        let report = fsm.run().unwrap();
        assert!(report.is_clean());

        // Init(0), Red(200), Green(800), Orange(1400), Red(1700); the next
        // expiry would land at 2300, past the horizon.
        assert_eq!(fsm.current_state(), Light::Red);
        assert_eq!(fsm.dispatcher().now_ms(), 1_700);

        let log = fsm.run_log().unwrap();
        let visited: Vec<usize> = log.records().iter().map(|r| r.state).collect();
        assert_eq!(
            visited,
            [
                Light::Red.index(),
                Light::Green.index(),
                Light::Orange.index(),
                Light::Red.index(),
            ]
        );
        // every move was a timeout: synthetic index NumEvents
        assert!(log.records().iter().all(|r| r.event == NoEvent::COUNT));
        assert_eq!(log.state_entries(Light::Init.index()), 1);
        assert_eq!(log.state_entries(Light::Red.index()), 2);
    }
}

mod validation {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
            S2,
            S3,
        }
    }

    event_tags! {
        enum Ev {
            E0,
        }
    }

    #[test]
    fn global_timeout_refuses_preassigned_states() {
        let mut fsm: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        let cfg = fsm.configure().unwrap();
        cfg.set_default_timer_unit_str("ms").unwrap();
        cfg.assign_timeout(St::S1, 100, St::S3).unwrap();
        let err = cfg.assign_global_timeout(500, St::S3).unwrap_err();
        match err {
            ConfigError::GlobalTimeoutConflict { state } => {
                assert!(state.starts_with("1 "));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn pass_state_chain_refuses_to_start() {
        let mut fsm: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        {
            let cfg = fsm.configure().unwrap();
            cfg.assign_pass_transition(St::S0, St::S1).unwrap();
            cfg.assign_pass_transition(St::S1, St::S2).unwrap();
        }
        let err = fsm.start().unwrap_err();
        match err {
            Error::Config(ConfigError::PassStateChain { state }) => {
                assert!(state.starts_with("0 "));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!fsm.is_running());
    }
}

mod reachability {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
            S2,
        }
    }

    event_tags! {
        enum Ev {
            E0,
        }
    }

    #[test]
    fn lone_transition_warns_about_the_orphan_state() {
        let mut fsm: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        fsm.configure()
            .unwrap()
            .assign_transition(St::S0, Ev::E0, St::S1)
            .unwrap();
        let report = fsm.start().unwrap();

        let unreachable_s2 = report
            .warnings()
            .iter()
            .filter(|w| matches!(w, Warning::Unreachable { state } if state.starts_with("2 ")))
            .count();
        let dead_end_s2 = report
            .warnings()
            .iter()
            .filter(|w| matches!(w, Warning::DeadEnd { state } if state.starts_with("2 ")))
            .count();
        assert_eq!(unreachable_s2, 1);
        assert_eq!(dead_end_s2, 1);
        // S2 is the only unreachable state
        assert_eq!(
            report
                .warnings()
                .iter()
                .filter(|w| matches!(w, Warning::Unreachable { .. }))
                .count(),
            1
        );
        assert!(fsm.is_running());
    }
}

mod inner_events {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
            S2,
        }
    }

    event_tags! {
        enum Ev {
            Inner,
            Other,
        }
    }

    fn wired_machine() -> Machine<St, Ev, VirtualClockDispatcher<Ev>> {
        let mut fsm: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        let cfg = fsm.configure().unwrap();
        cfg.assign_transition(St::S0, Ev::Other, St::S1).unwrap();
        cfg.assign_inner_transition(St::S1, Ev::Inner, St::S2)
            .unwrap();
        cfg.assign_transition(St::S2, Ev::Other, St::S0).unwrap();
        fsm
    }

    #[test]
    fn activated_inner_event_fires_through_the_signal_channel() {
        let mut fsm = wired_machine();
        fsm.enable_run_log();
        fsm.run_log_mut().unwrap().disable_history_output();
        fsm.dispatcher_mut().schedule_event(0, Ev::Other);

        let report = fsm.start().unwrap();
        assert!(report.is_clean());

        // host-driven loop: deliver the queued external event first
        assert_eq!(fsm.step().unwrap(), Some(Wakeup::External(Ev::Other)));
        assert_eq!(fsm.current_state(), St::S1);

        fsm.activate_inner_event(Ev::Inner).unwrap();
        assert!(fsm.config().inner_transitions(St::S1)[0].is_active());

        assert_eq!(fsm.step().unwrap(), Some(Wakeup::Signal));
        assert_eq!(fsm.current_state(), St::S2);
        // single-shot: the flag was consumed
        assert!(!fsm.config().inner_transitions(St::S1)[0].is_active());
        // logged under the synthetic inner-transition index
        assert_eq!(fsm.run_log().unwrap().event_fires(Ev::COUNT + 1), 1);
    }

    #[test]
    fn activation_while_elsewhere_waits_for_the_state() {
        let mut fsm = wired_machine();
        fsm.start().unwrap();
        // current is S0, the inner transition lives on S1: flags are set
        // but no signal is pending
        fsm.activate_inner_event(Ev::Inner).unwrap();
        assert_eq!(fsm.step().unwrap(), None);
        assert_eq!(fsm.current_state(), St::S0);

        // entering S1 notices the armed inner transition and raises
        fsm.process_event(Ev::Other).unwrap();
        assert_eq!(fsm.step().unwrap(), Some(Wakeup::Signal));
        assert_eq!(fsm.current_state(), St::S2);
    }

    #[test]
    fn pass_state_crosses_through_the_signal_channel() {
        let mut fsm: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        {
            let cfg = fsm.configure().unwrap();
            cfg.assign_transition(St::S0, Ev::Other, St::S1).unwrap();
            cfg.assign_pass_transition(St::S1, St::S2).unwrap();
            cfg.assign_transition(St::S2, Ev::Other, St::S0).unwrap();
        }
        fsm.start().unwrap();
        fsm.process_event(Ev::Other).unwrap();
        // the pass-state rests on S1 until the signal is drained
        assert_eq!(fsm.current_state(), St::S1);
        assert_eq!(fsm.step().unwrap(), Some(Wakeup::Signal));
        assert_eq!(fsm.current_state(), St::S2);
    }

    #[test]
    fn inner_transition_beats_a_pending_timeout() {
        let mut fsm = wired_machine();
        {
            let cfg = fsm.configure().unwrap();
            cfg.set_default_timer_unit_str("ms").unwrap();
            // S1 would fall back to S0 after 50ms
            cfg.assign_timeout(St::S1, 50, St::S0).unwrap();
        }
        fsm.dispatcher_mut().schedule_event(0, Ev::Other);
        fsm.start().unwrap();
        fsm.step().unwrap();
        assert_eq!(fsm.current_state(), St::S1);

        // activation cancels the armed timer before the signal lands
        fsm.activate_inner_event(Ev::Inner).unwrap();
        assert_eq!(fsm.step().unwrap(), Some(Wakeup::Signal));
        assert_eq!(fsm.current_state(), St::S2);
        assert_eq!(fsm.step().unwrap(), None);
    }
}

mod copy_config {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
            S2,
        }
    }

    event_tags! {
        enum Ev {
            E0,
            E1,
        }
    }

    #[test]
    fn copied_machine_matches_through_every_observer() {
        let mut src: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        {
            let cfg = src.configure().unwrap();
            cfg.assign_transition(St::S0, Ev::E0, St::S1).unwrap();
            cfg.assign_transition(St::S1, Ev::E1, St::S2).unwrap();
            cfg.set_default_timer_unit_str("ms").unwrap();
            cfg.assign_timeout(St::S1, 250, St::S2).unwrap();
            cfg.assign_pass_transition(St::S2, St::S0).unwrap();
            cfg.set_state_labels(&[(St::S0, "start"), (St::S1, "wait")]);
            cfg.set_event_labels(&[(Ev::E0, "go")]);
        }

        let mut dst: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::<Ev>::new()).unwrap();
        dst.configure().unwrap().copy_from(src.config()).unwrap();

        for s in (0..St::COUNT).filter_map(St::from_index) {
            for e in (0..Ev::COUNT).filter_map(Ev::from_index) {
                assert_eq!(
                    src.config().is_event_allowed(s, e),
                    dst.config().is_event_allowed(s, e)
                );
                assert_eq!(src.config().next_state(s, e), dst.config().next_state(s, e));
            }
            assert_eq!(src.config().timeout_of(s), dst.config().timeout_of(s));
            assert_eq!(src.config().pass_target(s), dst.config().pass_target(s));
            assert_eq!(
                src.config().inner_transitions(s).len(),
                dst.config().inner_transitions(s).len()
            );
        }
        assert_eq!(dst.state_label(St::S0), "start");
        assert_eq!(dst.event_label(Ev::E0), "go");
        assert_eq!(
            dst.config().default_timer_unit(),
            src.config().default_timer_unit()
        );
    }
}

mod exports {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
            S2,
        }
    }

    event_tags! {
        enum Ev {
            E0,
            E1,
        }
    }

    fn full_machine() -> Machine<St, Ev, VirtualClockDispatcher<Ev>> {
        let mut fsm: Machine<St, Ev, _> = Machine::new(VirtualClockDispatcher::new()).unwrap();
        let cfg = fsm.configure().unwrap();
        cfg.assign_transition(St::S0, Ev::E0, St::S1).unwrap();
        cfg.assign_inner_transition(St::S0, Ev::E1, St::S2).unwrap();
        cfg.set_default_timer_unit_str("ms").unwrap();
        cfg.assign_timeout(St::S1, 100, St::S2).unwrap();
        cfg.assign_pass_transition(St::S2, St::S0).unwrap();
        fsm
    }

    /// Parse `src -> dst [label="..."]` lines back into edge triples.
    fn parse_edges(dot: &str) -> Vec<(usize, usize, &'static str)> {
        let mut edges = Vec::new();
        for line in dot.lines() {
            let Some((ends, rest)) = line.split_once(" [label=\"") else {
                continue;
            };
            let Some((src, dst)) = ends.split_once(" -> ") else {
                continue;
            };
            let kind = if rest.starts_with("TO:") {
                "timeout"
            } else if rest.starts_with("AAT") {
                "aat"
            } else if rest.starts_with("IN:") {
                "inner"
            } else {
                "external"
            };
            edges.push((src.parse().unwrap(), dst.parse().unwrap(), kind));
        }
        edges.sort_unstable();
        edges
    }

    #[test]
    fn dot_edges_round_trip() {
        let fsm = full_machine();
        let mut out = Vec::new();
        fsm.write_dot(&mut out, &DotOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut expected = vec![
            (0, 1, "external"), // S0 --E0--> S1
            (0, 2, "external"), // the inner pair is also a wired transition
            (0, 2, "inner"),
            (1, 2, "timeout"),
            (2, 0, "aat"),
        ];
        expected.sort_unstable();
        assert_eq!(parse_edges(&text), expected);
    }

    #[test]
    fn dot_options_prune_edge_kinds() {
        let fsm = full_machine();
        let options = DotOptions {
            show_timeouts: false,
            show_inner_events: false,
            show_aat: false,
            ..DotOptions::default()
        };
        let mut out = Vec::new();
        fsm.write_dot(&mut out, &options).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(parse_edges(&text)
            .iter()
            .all(|(_, _, kind)| *kind == "external"));
    }

    #[test]
    fn csv_history_has_the_documented_shape() {
        let buf = SharedBuf::default();
        let mut fsm = full_machine();
        fsm.enable_run_log();
        fsm.run_log_mut()
            .unwrap()
            .set_history_writer(Box::new(buf.clone()));

        fsm.start().unwrap();
        fsm.process_event(Ev::E0).unwrap(); // S0 -> S1, arms the timer
        fsm.process_timeout().unwrap(); // S1 -> S2 via timeout
        fsm.step().unwrap(); // S2 -> S0 via the pass signal

        let text = buf.contents();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("# FSM run history:"));
        assert_eq!(
            lines.next(),
            Some("#time;event;event_string;state;state_string")
        );
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            let fields: Vec<&str> = row.split(';').collect();
            assert_eq!(fields.len(), 5);
            assert!(fields[0].parse::<f64>().unwrap() >= 0.0);
        }
        assert!(rows[0].ends_with(";0;E0;1;S1"));
        // timeout row uses the synthetic index and label
        assert!(rows[1].contains(";2;*Timeout*;2;S2"));
        // pass transition row uses the inner/AAT index and label
        assert!(rows[2].contains(";3;*AAT*;0;S0"));
    }

    #[test]
    fn run_data_dump_contains_all_sections() {
        let mut fsm = full_machine();
        fsm.enable_run_log();
        fsm.run_log_mut().unwrap().disable_history_output();
        fsm.start().unwrap();
        fsm.process_event(Ev::E0).unwrap();

        let mut out = Vec::new();
        fsm.print_run_data(&mut out, signalbox::PrintFlags::ALL)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# State counters:"));
        assert!(text.contains("# Event counters:"));
        assert!(text.contains("# Run history:"));
    }
}

mod null_dispatcher {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
        }
    }

    event_tags! {
        enum Ev {
            E0,
        }
    }

    #[test]
    fn embedded_run_ends_immediately_without_timers() {
        let mut fsm: Machine<St, Ev, NullDispatcher> = Machine::new(NullDispatcher::new()).unwrap();
        {
            let cfg = fsm.configure().unwrap();
            cfg.assign_transition(St::S0, Ev::E0, St::S1).unwrap();
            cfg.assign_transition(St::S1, Ev::E0, St::S0).unwrap();
        }
        fsm.run().unwrap();
        assert!(!fsm.is_running());
        assert_eq!(fsm.current_state(), St::S0);
    }

    #[test]
    fn external_loop_mode_still_processes_events() {
        let mut fsm: Machine<St, Ev, NullDispatcher> = Machine::new(NullDispatcher::new()).unwrap();
        {
            let cfg = fsm.configure().unwrap();
            cfg.assign_transition(St::S0, Ev::E0, St::S1).unwrap();
            cfg.assign_transition(St::S1, Ev::E0, St::S0).unwrap();
        }
        fsm.start().unwrap();
        fsm.process_event(Ev::E0).unwrap();
        assert_eq!(fsm.current_state(), St::S1);
        fsm.stop().unwrap();
    }
}

mod lifecycle {
    use super::*;

    state_tags! {
        enum St {
            S0,
            S1,
        }
    }

    #[test]
    fn stopping_twice_is_a_runtime_error() {
        let mut fsm: Machine<St, NoEvent, _> =
            Machine::new(VirtualClockDispatcher::<NoEvent>::new()).unwrap();
        {
            let cfg = fsm.configure().unwrap();
            cfg.set_default_timer_unit_str("ms").unwrap();
            cfg.assign_timeout(St::S0, 10, St::S1).unwrap();
            cfg.assign_timeout(St::S1, 10, St::S0).unwrap();
        }
        fsm.start().unwrap();
        fsm.stop().unwrap();
        assert!(matches!(
            fsm.stop(),
            Err(Error::Runtime(RuntimeError::NotRunning))
        ));
    }
}
