//! A deterministic dispatcher over simulated time.

use super::{EventDispatcher, Wakeup};
use std::collections::VecDeque;
use std::time::Duration;

/// Single-threaded dispatcher driven by a virtual millisecond clock.
///
/// External events are scheduled at absolute virtual times; the engine's
/// timer is a single one-shot deadline; raised signals are delivered
/// before anything timed. Time only advances inside
/// [`next_wakeup`](EventDispatcher::next_wakeup), jumping straight to the
/// next due instant, so runs are exactly reproducible.
///
/// Delivery order at the same instant: signal, then external event, then
/// timer expiry. Between an event and the timer due at different times,
/// the earlier one wins.
///
/// # Example
///
/// ```rust
/// use signalbox::{state_tags, Machine, NoEvent, VirtualClockDispatcher};
///
/// state_tags! {
///     enum Blink {
///         Off,
///         On,
///     }
/// }
///
/// let dispatcher = VirtualClockDispatcher::new().with_horizon_ms(1_000);
/// let mut fsm: Machine<Blink, NoEvent, _> = Machine::new(dispatcher).unwrap();
/// {
///     let cfg = fsm.configure().unwrap();
///     cfg.set_default_timer_unit_str("ms").unwrap();
///     cfg.assign_timeout(Blink::Off, 300, Blink::On).unwrap();
///     cfg.assign_timeout(Blink::On, 300, Blink::Off).unwrap();
/// }
/// fsm.run().unwrap();
/// // 0ms Off, 300ms On, 600ms Off, 900ms On; the horizon cuts the cycle.
/// assert_eq!(fsm.current_state(), Blink::On);
/// ```
#[derive(Debug)]
pub struct VirtualClockDispatcher<E> {
    now_ms: u64,
    horizon_ms: Option<u64>,
    deadline_ms: Option<u64>,
    events: VecDeque<(u64, E)>,
    signal_pending: bool,
    killed: bool,
}

impl<E> VirtualClockDispatcher<E> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            horizon_ms: None,
            deadline_ms: None,
            events: VecDeque::new(),
            signal_pending: false,
            killed: false,
        }
    }

    /// Stop delivering wakeups that would advance the clock past
    /// `horizon_ms`.
    pub fn with_horizon_ms(mut self, horizon_ms: u64) -> Self {
        self.horizon_ms = Some(horizon_ms);
        self
    }

    /// Schedule an external event at an absolute virtual time. Events at
    /// the same instant keep their scheduling order.
    pub fn schedule_event(&mut self, at_ms: u64, event: E) {
        let pos = self
            .events
            .iter()
            .position(|(t, _)| *t > at_ms)
            .unwrap_or(self.events.len());
        self.events.insert(pos, (at_ms, event));
    }

    /// Current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

impl<E> Default for VirtualClockDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventDispatcher<E> for VirtualClockDispatcher<E> {
    fn has_timers(&self) -> bool {
        true
    }

    fn timer_start(&mut self, timeout: Duration) {
        self.deadline_ms = Some(self.now_ms + timeout.as_millis() as u64);
    }

    fn timer_cancel(&mut self) {
        self.deadline_ms = None;
    }

    fn timer_kill(&mut self) {
        self.killed = true;
        self.deadline_ms = None;
        self.events.clear();
        self.signal_pending = false;
    }

    fn raise_signal(&mut self) {
        self.signal_pending = true;
    }

    fn next_wakeup(&mut self) -> Option<Wakeup<E>> {
        if self.killed {
            return None;
        }
        if self.signal_pending {
            self.signal_pending = false;
            return Some(Wakeup::Signal);
        }
        let event_due = self.events.front().map(|(t, _)| *t);
        let timer_due = self.deadline_ms;
        let due = match (event_due, timer_due) {
            (None, None) => return None,
            (Some(t), None) => t,
            (None, Some(t)) => t,
            (Some(e), Some(t)) => e.min(t),
        };
        if self.horizon_ms.is_some_and(|h| due > h) {
            return None;
        }
        self.now_ms = self.now_ms.max(due);
        // events win ties against the timer
        if event_due.is_some_and(|t| t == due) {
            let (_, event) = self.events.pop_front()?;
            Some(Wakeup::External(event))
        } else {
            self.deadline_ms = None;
            Some(Wakeup::TimerExpired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_preempts_timed_work() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new();
        d.schedule_event(10, 1);
        d.timer_start(Duration::from_millis(5));
        d.raise_signal();
        assert_eq!(d.next_wakeup(), Some(Wakeup::Signal));
        assert_eq!(d.next_wakeup(), Some(Wakeup::TimerExpired));
        assert_eq!(d.next_wakeup(), Some(Wakeup::External(1)));
        assert_eq!(d.next_wakeup(), None);
    }

    #[test]
    fn clock_jumps_to_the_due_instant() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new();
        d.schedule_event(250, 7);
        assert_eq!(d.next_wakeup(), Some(Wakeup::External(7)));
        assert_eq!(d.now_ms(), 250);
    }

    #[test]
    fn events_win_ties_against_the_timer() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new();
        d.schedule_event(5, 1);
        d.timer_start(Duration::from_millis(5));
        assert_eq!(d.next_wakeup(), Some(Wakeup::External(1)));
        assert_eq!(d.next_wakeup(), Some(Wakeup::TimerExpired));
    }

    #[test]
    fn cancel_disarms_the_deadline() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new();
        d.timer_start(Duration::from_millis(5));
        d.timer_cancel();
        assert_eq!(d.next_wakeup(), None);
        // cancelling again is a no-op
        d.timer_cancel();
    }

    #[test]
    fn horizon_cuts_delivery() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new().with_horizon_ms(100);
        d.schedule_event(50, 1);
        d.schedule_event(150, 2);
        assert_eq!(d.next_wakeup(), Some(Wakeup::External(1)));
        assert_eq!(d.next_wakeup(), None);
    }

    #[test]
    fn kill_drops_pending_work() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new();
        d.schedule_event(5, 1);
        d.raise_signal();
        d.timer_kill();
        assert_eq!(d.next_wakeup(), None);
    }

    #[test]
    fn same_instant_events_keep_scheduling_order() {
        let mut d: VirtualClockDispatcher<u8> = VirtualClockDispatcher::new();
        d.schedule_event(5, 1);
        d.schedule_event(5, 2);
        assert_eq!(d.next_wakeup(), Some(Wakeup::External(1)));
        assert_eq!(d.next_wakeup(), Some(Wakeup::External(2)));
    }
}
