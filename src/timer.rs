// src/timer.rs
//
// The phase/cycle state machine.
//
// Ticks measure real elapsed time against a monotonic clock, so the
// countdown stays correct however irregularly `tick()` is called. Time past
// the end of a phase carries into the next one.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::clock::Clock;
use crate::event::TimerEvent;
use crate::technique::{Phase, Technique};

/// Snapshot of a session's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub is_active: bool,
    pub is_paused: bool,
    /// Implies `!is_active`.
    pub is_complete: bool,
    pub phase_index: usize,
    pub phase_time_remaining: Duration,
    pub phase_total_time: Duration,
    /// 1-based.
    pub current_cycle: u32,
    pub total_cycles: u32,
}

impl SessionState {
    fn initial(technique: &Technique) -> Self {
        let first = technique.duration(Phase::Inhale);
        Self {
            is_active: false,
            is_paused: false,
            is_complete: false,
            phase_index: 0,
            phase_time_remaining: first,
            phase_total_time: first,
            current_cycle: 1,
            total_cycles: technique.total_cycles(),
        }
    }

    pub fn current_phase(&self) -> Phase {
        Phase::from_index(self.phase_index)
    }

    /// Fraction of the current phase already elapsed, in [0, 1].
    pub fn phase_progress(&self) -> f64 {
        if self.phase_total_time.is_zero() {
            return 0.0;
        }
        1.0 - self.phase_time_remaining.as_secs_f64() / self.phase_total_time.as_secs_f64()
    }
}

pub struct PhaseTimer<C> {
    technique: Technique,
    clock: C,
    state: SessionState,
    last_tick: Option<Duration>,
    completion_sent: bool,
    subscribers: Vec<mpsc::UnboundedSender<TimerEvent>>,
}

impl<C: Clock> PhaseTimer<C> {
    pub fn new(technique: Technique, clock: C) -> Self {
        Self {
            state: SessionState::initial(&technique),
            technique,
            clock,
            last_tick: None,
            completion_sent: false,
            subscribers: Vec::new(),
        }
    }

    pub fn technique(&self) -> &Technique {
        &self.technique
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True while ticks move the countdown.
    pub fn is_running(&self) -> bool {
        self.state.is_active && !self.state.is_paused && !self.state.is_complete
    }

    /// Receive every event from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TimerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: TimerEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Begin from cycle 1, phase 0. Restarts if already running.
    pub fn start(&mut self) {
        self.state = SessionState::initial(&self.technique);
        self.state.is_active = true;
        self.completion_sent = false;
        self.last_tick = Some(self.clock.now());

        debug!("session started: {} cycles", self.state.total_cycles);
        self.emit(TimerEvent::PhaseChanged {
            phase: Phase::Inhale,
            cycle: 1,
            initial: true,
        });
    }

    /// Freeze the countdown. Time since the last tick is counted first.
    /// Allowed while inactive.
    pub fn pause(&mut self) {
        self.tick();
        self.state.is_paused = true;
    }

    /// Unfreeze. Time spent paused is not counted.
    pub fn resume(&mut self) {
        self.state.is_paused = false;
        self.last_tick = Some(self.clock.now());
    }

    pub fn stop(&mut self) {
        self.reset();
    }

    /// Back to the shape the timer had when it was created.
    pub fn reset(&mut self) {
        self.state = SessionState::initial(&self.technique);
        self.last_tick = None;
        self.completion_sent = false;
    }

    /// Advance by the wall-clock time since the previous tick.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }

        let now = self.clock.now();
        let mut budget = now.saturating_sub(self.last_tick.unwrap_or(now));
        self.last_tick = Some(now);

        let cap = 4 * (self.state.total_cycles as usize + 1);
        let mut steps = 0;
        loop {
            if budget < self.state.phase_time_remaining {
                self.state.phase_time_remaining -= budget;
                break;
            }
            budget -= self.state.phase_time_remaining;
            self.state.phase_time_remaining = Duration::ZERO;

            if steps == cap {
                warn!("phase advance stopped after {} steps", cap);
                break;
            }
            steps += 1;
            if !self.advance() {
                break;
            }
        }
    }

    /// Enter the next phase. Returns false once the session completes.
    fn advance(&mut self) -> bool {
        let next = (self.state.phase_index + 1) % 4;
        if next == 0 {
            self.state.current_cycle += 1;
            if self.state.current_cycle > self.state.total_cycles {
                self.complete();
                return false;
            }
        }

        let phase = Phase::from_index(next);
        let duration = self.technique.duration(phase);
        self.state.phase_index = next;
        self.state.phase_total_time = duration;
        self.state.phase_time_remaining = duration;

        debug!("cycle {} phase {}", self.state.current_cycle, phase);
        self.emit(TimerEvent::PhaseChanged {
            phase,
            cycle: self.state.current_cycle,
            initial: false,
        });
        true
    }

    fn complete(&mut self) {
        self.state.is_active = false;
        self.state.is_complete = true;
        self.state.current_cycle = self.state.total_cycles;
        self.state.phase_time_remaining = Duration::ZERO;

        if !self.completion_sent {
            self.completion_sent = true;
            debug!("session complete");
            self.emit(TimerEvent::Completed {
                cycles: self.state.total_cycles,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn timer(durations: [f64; 4], cycles: u32) -> (PhaseTimer<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let technique = Technique::new(durations, cycles).unwrap();
        (PhaseTimer::new(technique, clock.clone()), clock)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn changed(phase: Phase, cycle: u32) -> TimerEvent {
        TimerEvent::PhaseChanged {
            phase,
            cycle,
            initial: false,
        }
    }

    fn run(timer: &mut PhaseTimer<ManualClock>, clock: &ManualClock, step: Duration, ticks: usize) {
        for _ in 0..ticks {
            clock.advance(step);
            timer.tick();
        }
    }

    #[test]
    fn initial_shape() {
        let (timer, _) = timer([4.0, 7.0, 8.0, 0.0], 4);
        let state = timer.state();
        assert!(!state.is_active && !state.is_paused && !state.is_complete);
        assert_eq!(state.current_phase(), Phase::Inhale);
        assert_eq!(state.phase_time_remaining, Duration::from_secs(4));
        assert_eq!(state.current_cycle, 1);
        assert_eq!(state.total_cycles, 4);
    }

    #[test]
    fn nothing_happens_before_start() {
        let (mut timer, clock) = timer([1.0, 1.0, 1.0, 1.0], 1);
        let mut rx = timer.subscribe();
        run(&mut timer, &clock, Duration::from_secs(1), 5);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(timer.state().phase_time_remaining, Duration::from_secs(1));
    }

    #[test]
    fn two_cycles_of_one_second_phases() {
        let (mut timer, clock) = timer([1.0, 1.0, 1.0, 1.0], 2);
        let mut rx = timer.subscribe();
        timer.start();
        run(&mut timer, &clock, Duration::from_millis(100), 85);

        let expected = vec![
            TimerEvent::PhaseChanged {
                phase: Phase::Inhale,
                cycle: 1,
                initial: true,
            },
            changed(Phase::HoldIn, 1),
            changed(Phase::Exhale, 1),
            changed(Phase::HoldOut, 1),
            changed(Phase::Inhale, 2),
            changed(Phase::HoldIn, 2),
            changed(Phase::Exhale, 2),
            changed(Phase::HoldOut, 2),
            TimerEvent::Completed { cycles: 2 },
        ];
        assert_eq!(drain(&mut rx), expected);

        let state = timer.state();
        assert!(state.is_complete && !state.is_active);
        assert_eq!(state.current_cycle, 2);
    }

    #[test]
    fn completes_at_the_right_moment() {
        let (mut timer, clock) = timer([1.0, 1.0, 1.0, 1.0], 2);
        timer.start();
        run(&mut timer, &clock, Duration::from_millis(100), 79);
        assert!(timer.state().is_active);
        run(&mut timer, &clock, Duration::from_millis(100), 1);
        assert!(timer.state().is_complete);
    }

    #[test]
    fn zero_duration_phases_are_skipped_in_order() {
        let (mut timer, clock) = timer([2.0, 0.0, 2.0, 0.0], 2);
        let mut rx = timer.subscribe();
        timer.start();
        drain(&mut rx);

        run(&mut timer, &clock, Duration::from_secs(2), 1);
        assert_eq!(
            drain(&mut rx),
            vec![changed(Phase::HoldIn, 1), changed(Phase::Exhale, 1)]
        );
        assert_eq!(timer.state().current_phase(), Phase::Exhale);
        assert_eq!(timer.state().phase_time_remaining, Duration::from_secs(2));

        run(&mut timer, &clock, Duration::from_secs(2), 1);
        assert_eq!(
            drain(&mut rx),
            vec![changed(Phase::HoldOut, 1), changed(Phase::Inhale, 2)]
        );
    }

    #[test]
    fn all_zero_holds_cycle_every_inhale() {
        let (mut timer, clock) = timer([1.0, 0.0, 0.0, 0.0], 3);
        timer.start();
        for expected_cycle in 2..=3 {
            run(&mut timer, &clock, Duration::from_secs(1), 1);
            assert_eq!(timer.state().current_cycle, expected_cycle);
            assert_eq!(timer.state().current_phase(), Phase::Inhale);
        }
        run(&mut timer, &clock, Duration::from_secs(1), 1);
        assert!(timer.state().is_complete);
        assert_eq!(timer.state().current_cycle, 3);
    }

    #[test]
    fn leading_zero_phase_is_skipped_on_first_tick() {
        let (mut timer, clock) = timer([0.0, 3.0, 0.0, 3.0], 1);
        let mut rx = timer.subscribe();
        timer.start();
        clock.advance(Duration::from_millis(10));
        timer.tick();

        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&changed(Phase::HoldIn, 1)));
        assert_eq!(
            timer.state().phase_time_remaining,
            Duration::from_millis(2_990)
        );
    }

    #[test]
    fn progress_stays_in_bounds() {
        let (mut timer, clock) = timer([3.0, 1.5, 2.0, 0.0], 2);
        timer.start();
        for _ in 0..200 {
            clock.advance(Duration::from_millis(70));
            timer.tick();
            let state = timer.state();
            let progress = state.phase_progress();
            assert!((0.0..=1.0).contains(&progress), "progress {progress}");
            assert!(state.phase_time_remaining <= state.phase_total_time);
        }
    }

    #[test]
    fn paused_time_is_not_counted() {
        let (mut timer, clock) = timer([4.0, 4.0, 4.0, 4.0], 1);
        timer.start();
        run(&mut timer, &clock, Duration::from_millis(500), 1);

        timer.pause();
        run(&mut timer, &clock, Duration::from_secs(10), 1);
        assert_eq!(timer.state().phase_time_remaining, Duration::from_millis(3_500));

        timer.resume();
        run(&mut timer, &clock, Duration::from_millis(400), 1);
        assert_eq!(timer.state().phase_time_remaining, Duration::from_millis(3_100));
        assert_eq!(timer.state().current_phase(), Phase::Inhale);
    }

    #[test]
    fn pause_counts_time_since_the_last_tick() {
        let (mut timer, clock) = timer([4.0, 4.0, 4.0, 4.0], 1);
        timer.start();
        for _ in 0..5 {
            clock.advance(Duration::from_millis(250));
            timer.pause();
            clock.advance(Duration::from_secs(10));
            timer.resume();
        }
        assert_eq!(timer.state().phase_time_remaining, Duration::from_millis(2_750));

        clock.advance(Duration::from_millis(250));
        timer.tick();
        assert_eq!(timer.state().phase_time_remaining, Duration::from_millis(2_500));
    }

    #[test]
    fn pause_can_cross_a_phase_boundary() {
        let (mut timer, clock) = timer([1.0, 1.0, 1.0, 1.0], 1);
        let mut rx = timer.subscribe();
        timer.start();
        drain(&mut rx);

        clock.advance(Duration::from_millis(1_200));
        timer.pause();
        assert_eq!(drain(&mut rx), vec![changed(Phase::HoldIn, 1)]);
        assert_eq!(timer.state().phase_time_remaining, Duration::from_millis(800));
        assert!(timer.state().is_paused);
    }

    #[test]
    fn pause_while_inactive_sets_the_flag() {
        let (mut timer, _) = timer([4.0, 4.0, 4.0, 4.0], 1);
        timer.pause();
        assert!(timer.state().is_paused);
        assert!(!timer.is_running());
    }

    #[test]
    fn late_tick_catches_up() {
        let (mut timer, clock) = timer([1.0, 1.0, 1.0, 1.0], 2);
        let mut rx = timer.subscribe();
        timer.start();
        drain(&mut rx);

        run(&mut timer, &clock, Duration::from_millis(2_500), 1);
        assert_eq!(
            drain(&mut rx),
            vec![changed(Phase::HoldIn, 1), changed(Phase::Exhale, 1)]
        );
        assert_eq!(timer.state().phase_time_remaining, Duration::from_millis(500));
    }

    #[test]
    fn completion_fires_once() {
        let (mut timer, clock) = timer([1.0, 0.0, 0.0, 0.0], 1);
        let mut rx = timer.subscribe();
        timer.start();
        run(&mut timer, &clock, Duration::from_secs(1), 5);

        let completions = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, TimerEvent::Completed { .. }))
            .count();
        assert_eq!(completions, 1);
        assert!(timer.state().is_complete);

        // A resume after completion does not revive the session.
        timer.resume();
        run(&mut timer, &clock, Duration::from_secs(1), 3);
        assert!(drain(&mut rx).is_empty());
        assert!(timer.state().is_complete);
    }

    #[test]
    fn start_while_active_restarts() {
        let (mut timer, clock) = timer([2.0, 2.0, 2.0, 2.0], 3);
        let mut rx = timer.subscribe();
        timer.start();
        run(&mut timer, &clock, Duration::from_secs(3), 1);
        assert_eq!(timer.state().current_phase(), Phase::HoldIn);
        drain(&mut rx);

        timer.start();
        assert_eq!(timer.state().current_phase(), Phase::Inhale);
        assert_eq!(timer.state().phase_time_remaining, Duration::from_secs(2));
        assert_eq!(
            drain(&mut rx),
            vec![TimerEvent::PhaseChanged {
                phase: Phase::Inhale,
                cycle: 1,
                initial: true
            }]
        );
    }

    #[test]
    fn stop_and_reset_return_to_initial_shape() {
        let (mut timer, clock) = timer([2.0, 2.0, 2.0, 2.0], 3);
        let initial = *timer.state();
        timer.start();
        run(&mut timer, &clock, Duration::from_secs(5), 1);
        timer.stop();
        assert_eq!(*timer.state(), initial);

        timer.start();
        timer.pause();
        timer.reset();
        assert_eq!(*timer.state(), initial);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let (mut timer, _) = timer([2.0, 2.0, 2.0, 2.0], 1);
        let rx = timer.subscribe();
        let mut kept = timer.subscribe();
        drop(rx);
        timer.start();
        assert_eq!(timer.subscribers.len(), 1);
        assert_eq!(drain(&mut kept).len(), 1);
    }
}
