//! The periodic trigger: a clock asked, on every poll, whether at least one
//! more period boundary has been crossed.

use crate::common::{Ticks, DEFAULT_TICK_HZ};
use crate::time::{Clock, TickSource};
use std::fmt;
use std::sync::Arc;

/// A clock with a firing cadence.
///
/// The trigger stores a configured schedule (period, repeat limit, and an
/// active window) that [`IntervalTrigger::start`] applies. Polling advances
/// the clock and reports "ready" at most once per period boundary crossed
/// since the previous poll; if several boundaries passed between polls the
/// fire count jumps accordingly, so callers can decide for themselves
/// whether to catch up or treat it as a single firing.
pub struct IntervalTrigger {
    clock: Clock,
    /// Configured period in ticks; 0 fires on every poll while running.
    period: Ticks,
    /// Configured window start, applied on `start`.
    offset: Ticks,
    /// Configured window length, applied on `start`; 0 = unbounded.
    duration: Ticks,
    /// 0 = unlimited; otherwise the trigger finishes after this many fires.
    fire_limit: u32,
    /// Tick frequency used to derive periods from rates.
    tick_hz: u64,
    /// Period in force for the current run (may be inherited from a parent).
    active_period: Ticks,
    fire_count: i64,
    /// Elapsed value observed by the most recent poll.
    last_elapsed: Ticks,
}

impl fmt::Debug for IntervalTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalTrigger")
            .field("clock", &self.clock)
            .field("period", &self.period)
            .field("fire_limit", &self.fire_limit)
            .field("fire_count", &self.fire_count)
            .finish()
    }
}

impl IntervalTrigger {
    /// Creates an unconfigured trigger over the given tick source.
    pub fn new(source: Arc<dyn TickSource>) -> Self {
        Self {
            clock: Clock::new(source),
            period: 0,
            offset: 0,
            duration: 0,
            fire_limit: 0,
            tick_hz: DEFAULT_TICK_HZ,
            active_period: 0,
            fire_count: 0,
            last_elapsed: 0,
        }
    }

    /// Sets the cadence: ticks between fires and how many fires are allowed
    /// (0 = unlimited).
    pub fn configure(&mut self, period: Ticks, repeat_limit: u32) {
        self.period = period;
        self.fire_limit = repeat_limit;
    }

    /// Configures a single firing after `after` ticks.
    pub fn one_shot(&mut self, after: Ticks) {
        self.configure(after, 1);
    }

    pub fn set_period(&mut self, period: Ticks) {
        self.period = period;
    }

    pub fn period(&self) -> Ticks {
        self.period
    }

    /// Derives the period from a rate in fires per second. A rate of 0 or
    /// below clears the period (fire on every poll).
    pub fn set_rate(&mut self, rate: f64) {
        if rate <= 0.0 {
            self.period = 0;
        } else {
            self.period = (self.tick_hz as f64 / rate) as Ticks;
        }
    }

    /// The configured cadence expressed as fires per second.
    pub fn rate(&self) -> f64 {
        if self.period <= 0 {
            0.0
        } else {
            self.tick_hz as f64 / self.period as f64
        }
    }

    /// Overrides the tick frequency used for rate conversions.
    pub fn set_tick_hz(&mut self, tick_hz: u64) {
        self.tick_hz = tick_hz;
    }

    pub fn set_repeat_limit(&mut self, repeat_limit: u32) {
        self.fire_limit = repeat_limit;
    }

    /// Sets the window applied by the next `start` (offset before the window
    /// opens, duration after which it closes; 0 = unbounded).
    pub fn set_window(&mut self, offset: Ticks, duration: Ticks) {
        self.offset = offset;
        self.duration = duration;
    }

    pub fn configured_offset(&self) -> Ticks {
        self.offset
    }

    pub fn configured_duration(&self) -> Ticks {
        self.duration
    }

    /// Starts the trigger with its configured schedule.
    pub fn start(&mut self) {
        self.start_with(self.period, self.offset, self.duration);
    }

    /// Starts the trigger for exactly `count` fires.
    pub fn start_for_count(&mut self, count: u32) {
        self.fire_limit = count;
        self.start();
    }

    /// Starts the trigger with an explicit schedule for this run only; the
    /// configured schedule is left untouched. Used by parent nodes to start
    /// children with inherited parameters.
    pub fn start_with(&mut self, period: Ticks, offset: Ticks, duration: Ticks) {
        self.active_period = period;
        self.fire_count = 0;
        self.last_elapsed = 0;
        self.clock.start_window(offset, duration);
    }

    /// Advances the clock and reports whether a new period boundary has been
    /// crossed since the previous poll.
    ///
    /// When a repeat limit is set and reached, the trigger marks itself
    /// finished and stops its clock; later polls return `false`.
    pub fn poll(&mut self) -> bool {
        if !self.clock.is_running() {
            // Keep the edge latching moving while paused or stopped.
            self.last_elapsed = self.clock.elapsed_ticks();
            return false;
        }
        let elapsed = self.clock.elapsed_ticks();
        self.last_elapsed = elapsed;
        let ready = if self.active_period <= 0 {
            self.fire_count += 1;
            true
        } else {
            let boundary = elapsed / self.active_period;
            if boundary > self.fire_count {
                self.fire_count = boundary;
                true
            } else {
                false
            }
        };
        if ready && self.fire_limit > 0 && self.fire_count >= self.fire_limit as i64 {
            // The elapsed query may already have closed the window on this
            // same poll; a second stop would re-latch and eat the edge.
            if self.clock.is_running() {
                self.clock.stop();
            }
        }
        ready
    }

    /// True once the repeat limit has been exhausted.
    pub fn has_finished(&self) -> bool {
        self.fire_limit > 0 && self.fire_count >= self.fire_limit as i64
    }

    /// Number of times the trigger has fired since it was started. Jumps by
    /// more than one when several periods elapse between polls.
    pub fn fire_count(&self) -> i64 {
        self.fire_count
    }

    /// The fire count under its frame-rate name.
    pub fn frame(&self) -> i64 {
        self.fire_count
    }

    /// The elapsed value observed by the most recent poll.
    pub fn last_elapsed(&self) -> Ticks {
        self.last_elapsed
    }

    /// Queries the clock directly and records the observation.
    pub fn elapsed(&mut self) -> Ticks {
        let elapsed = self.clock.elapsed_ticks();
        self.last_elapsed = elapsed;
        elapsed
    }

    /// Stops the clock and clears the run state; the configured schedule
    /// survives for the next `start`.
    pub fn reset(&mut self) {
        self.clock.stop();
        self.active_period = self.period;
        self.fire_count = 0;
        self.last_elapsed = 0;
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn play(&mut self) {
        self.clock.play();
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTickSource;

    fn trigger() -> (Arc<ManualTickSource>, IntervalTrigger) {
        let source = Arc::new(ManualTickSource::new());
        let trigger = IntervalTrigger::new(source.clone() as Arc<dyn TickSource>);
        (source, trigger)
    }

    #[test]
    fn fires_once_per_period_boundary() {
        let (source, mut trigger) = trigger();
        trigger.configure(100, 0);
        trigger.start();
        assert!(!trigger.poll());
        source.advance(50);
        assert!(!trigger.poll());
        source.advance(50);
        assert!(trigger.poll());
        assert_eq!(trigger.fire_count(), 1);
        source.advance(30);
        assert!(!trigger.poll());
        source.advance(80);
        assert!(trigger.poll());
        assert_eq!(trigger.fire_count(), 2);
    }

    #[test]
    fn slow_polling_reports_ready_once_with_a_count_jump() {
        let (source, mut trigger) = trigger();
        trigger.configure(100, 0);
        trigger.start();
        source.advance(450);
        assert!(trigger.poll());
        assert_eq!(trigger.fire_count(), 4);
        assert!(!trigger.poll());
    }

    #[test]
    fn repeat_limit_finishes_and_stops_the_clock() {
        let (source, mut trigger) = trigger();
        trigger.configure(100, 3);
        trigger.start();
        let mut fires = 0;
        for _ in 0..10 {
            source.advance(100);
            if trigger.poll() {
                fires += 1;
            }
        }
        assert_eq!(fires, 3);
        assert!(trigger.has_finished());
        assert!(trigger.clock().is_stopping());
        source.advance(100);
        assert!(!trigger.poll());
    }

    #[test]
    fn stop_edge_survives_limit_and_expiry_on_one_poll() {
        let (source, mut trigger) = trigger();
        trigger.configure(100, 5);
        trigger.set_window(0, 500);
        trigger.start();
        // Both the window and the final allowed fire land on this poll.
        source.advance(500);
        assert!(trigger.poll());
        assert!(trigger.has_finished());
        assert!(trigger.clock().is_stopping());
        assert!(trigger.clock().has_stopped());
        // The next query consumes the edge exactly once.
        assert_eq!(trigger.clock_mut().elapsed_ticks(), 0);
        assert!(!trigger.clock().has_stopped());
    }

    #[test]
    fn one_shot_fires_exactly_once() {
        let (source, mut trigger) = trigger();
        trigger.one_shot(250);
        trigger.start();
        source.advance(249);
        assert!(!trigger.poll());
        source.advance(1);
        assert!(trigger.poll());
        assert!(trigger.has_finished());
        source.advance(500);
        assert!(!trigger.poll());
    }

    #[test]
    fn rate_derives_period_from_tick_frequency() {
        let (_source, mut trigger) = trigger();
        trigger.set_rate(50.0);
        assert_eq!(trigger.period(), 20_000);
        assert!((trigger.rate() - 50.0).abs() < f64::EPSILON);
        trigger.set_tick_hz(1000);
        trigger.set_rate(50.0);
        assert_eq!(trigger.period(), 20);
    }

    #[test]
    fn zero_period_fires_on_every_poll_while_running() {
        let (source, mut trigger) = trigger();
        trigger.start();
        assert!(trigger.poll());
        source.advance(1);
        assert!(trigger.poll());
        trigger.stop();
        assert!(!trigger.poll());
    }

    #[test]
    fn paused_trigger_does_not_fire() {
        let (source, mut trigger) = trigger();
        trigger.configure(100, 0);
        trigger.start();
        source.advance(100);
        assert!(trigger.poll());
        trigger.pause();
        source.advance(500);
        assert!(!trigger.poll());
        trigger.play();
        source.advance(100);
        assert!(trigger.poll());
        assert_eq!(trigger.fire_count(), 2);
    }

    #[test]
    fn reset_clears_the_run_but_keeps_the_schedule() {
        let (source, mut trigger) = trigger();
        trigger.configure(100, 5);
        trigger.start();
        source.advance(200);
        assert!(trigger.poll());
        trigger.reset();
        assert_eq!(trigger.fire_count(), 0);
        assert_eq!(trigger.period(), 100);
        assert!(trigger.clock().is_stopping());
        trigger.start();
        source.advance(100);
        assert!(trigger.poll());
        assert_eq!(trigger.fire_count(), 1);
    }
}
