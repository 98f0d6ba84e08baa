//! The time model: a wrapping, fixed-width hardware tick widened into a
//! 64-bit elapsed-time value with start/stop/pause/resume semantics.
//!
//! A [`Clock`] does not own a thread and never blocks. It is advanced purely
//! by the owner calling [`Clock::elapsed_ticks`] (directly or through a
//! trigger poll); "waiting" is expressed as a future poll reading a larger
//! value. The only external dependency is a [`TickSource`], which must be
//! cheap and side-effect-free so it can be read on every poll.
//!
//! Wraparound is modeled explicitly as `raw tick + overflow count` rather
//! than relying on wrapping integer arithmetic: each poll compares the fresh
//! raw tick against the last one seen, and a backwards jump of more than half
//! the counter range is counted as one wrap. A wrap can only be missed if the
//! owner polls less often than one full wrap period; polling faster than that
//! is a stated precondition of the whole scheduler, not something the clock
//! can detect after the fact.

use crate::common::{Ticks, RAW_TICK_BITS, RAW_TICK_HALF, RAW_TICK_MAX};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// The raw time source: a monotonically-wrapping, fixed-width counter.
///
/// Implementations must be safe to call repeatedly and rapidly, and must
/// have no side effects beyond returning the current counter value.
pub trait TickSource: Send + Sync {
    /// The current value of the hardware counter.
    fn raw_tick(&self) -> u32;
}

/// A host tick source: microseconds since construction, truncated to the
/// raw counter width (so it genuinely wraps roughly every 71 minutes).
pub struct SystemTickSource {
    epoch: Instant,
}

impl SystemTickSource {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemTickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemTickSource {
    fn raw_tick(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }
}

/// A tick source advanced explicitly by the caller.
///
/// This is what the tests drive, and it is also useful for lockstep
/// simulations where the embedding program owns the notion of time.
#[derive(Default)]
pub struct ManualTickSource {
    tick: AtomicU32,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the counter to an absolute raw value.
    pub fn set(&self, tick: u32) {
        self.tick.store(tick, Ordering::Relaxed);
    }

    /// Advances the counter, wrapping at the counter width like hardware.
    pub fn advance(&self, ticks: u32) {
        self.tick.fetch_add(ticks, Ordering::Relaxed);
    }
}

impl TickSource for ManualTickSource {
    fn raw_tick(&self) -> u32 {
        self.tick.load(Ordering::Relaxed)
    }
}

/// The mutually exclusive states of a [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// No active window; elapsed time reads as 0.
    Stopped,
    /// Elapsed time advances on every poll.
    Running,
    /// Elapsed time is frozen at its value from the pause instant.
    Pausing,
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockState::Stopped => write!(f, "stopped"),
            ClockState::Running => write!(f, "running"),
            ClockState::Pausing => write!(f, "pausing"),
        }
    }
}

/// A callback fired at most once per observed state transition.
pub type EdgeCallback = Box<dyn FnMut() + Send>;

/// Converts the wrapping raw tick into a monotonically meaningful elapsed
/// value over an active window `[offset, offset + duration)`.
///
/// All operations are total over the documented state space: calling
/// `play`/`pause`/`retime` in states where they are no-ops is safe and
/// side-effect-free beyond what each method documents.
pub struct Clock {
    source: Arc<dyn TickSource>,
    state: ClockState,
    /// Edge latch: whether the previous elapsed query observed Running.
    prev_running: bool,
    last_raw: u32,
    last_wide: i64,
    origin: i64,
    overflow_count: u32,
    offset: Ticks,
    duration: Ticks,
    on_start: Option<EdgeCallback>,
    on_pause: Option<EdgeCallback>,
    on_stop: Option<EdgeCallback>,
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("state", &self.state)
            .field("origin", &self.origin)
            .field("offset", &self.offset)
            .field("duration", &self.duration)
            .field("overflow_count", &self.overflow_count)
            .finish()
    }
}

impl Clock {
    /// Creates a stopped clock over the given tick source.
    pub fn new(source: Arc<dyn TickSource>) -> Self {
        Self {
            source,
            state: ClockState::Stopped,
            prev_running: false,
            last_raw: 0,
            last_wide: 0,
            origin: 0,
            overflow_count: 0,
            offset: 0,
            duration: 0,
            on_start: None,
            on_pause: None,
            on_stop: None,
        }
    }

    /// Starts an unbounded window at the current tick.
    pub fn start(&mut self) {
        self.start_window(0, 0);
    }

    /// Starts a window that becomes active after `offset` ticks and closes
    /// itself `duration` ticks after the origin (0 = unbounded).
    ///
    /// Always resets the timing base, even if already running.
    pub fn start_window(&mut self, offset: Ticks, duration: Ticks) {
        self.prev_running = self.state == ClockState::Running;
        self.state = ClockState::Running;
        self.last_raw = self.source.raw_tick();
        self.last_wide = self.last_raw as i64;
        self.origin = self.last_wide;
        self.overflow_count = 0;
        self.offset = offset;
        self.duration = duration;
        trace!(origin = self.origin, offset, duration, "clock started");
    }

    /// Stops the clock and zeroes all timing state.
    pub fn stop(&mut self) {
        self.prev_running = self.state == ClockState::Running;
        self.state = ClockState::Stopped;
        self.last_raw = 0;
        self.last_wide = 0;
        self.origin = 0;
        self.overflow_count = 0;
        self.offset = 0;
        self.duration = 0;
    }

    /// Freezes the elapsed value. A no-op unless currently running.
    pub fn pause(&mut self) {
        if self.state != ClockState::Running {
            return;
        }
        // Settle the raw bookkeeping first; this may close the window.
        let _ = self.elapsed_ticks();
        if self.state == ClockState::Running {
            self.prev_running = true;
            self.state = ClockState::Pausing;
            trace!("clock paused");
        }
    }

    /// Resumes from a pause, compensating for the ticks that passed while
    /// paused so the elapsed value continues from where it froze. A no-op
    /// while running; behaves as [`Clock::restart`] while stopped.
    pub fn play(&mut self) {
        match self.state {
            ClockState::Pausing => {
                let curr = self.source.raw_tick();
                let diff = if curr >= self.last_raw {
                    (curr - self.last_raw) as i64
                } else {
                    // The counter wrapped while paused. Count the wrap so
                    // the widened tick stays ahead of the adjusted origin.
                    self.overflow_count += 1;
                    (RAW_TICK_MAX + 1) - (self.last_raw - curr) as i64
                };
                self.origin += diff;
                self.last_wide += diff;
                self.last_raw = curr;
                self.prev_running = false;
                self.state = ClockState::Running;
                trace!(paused_for = diff, "clock resumed");
            }
            ClockState::Running => {}
            ClockState::Stopped => self.restart(),
        }
    }

    /// Stops, then starts a fresh unbounded window. Any previous offset and
    /// duration are lost; callers wanting the same window again must keep
    /// those parameters themselves.
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Recomputes the timing base so the next elapsed query returns exactly
    /// `target`.
    ///
    /// While stopped this fabricates an origin from the current tick and
    /// leaves the clock pausing, frozen at `target` (a stopped clock always
    /// reads 0, so the state has to change for the target to be readable).
    /// While pausing it first absorbs the drift accumulated since the pause,
    /// then adjusts the offset; while running it adjusts the offset directly.
    pub fn retime(&mut self, target: Ticks) {
        match self.state {
            ClockState::Stopped => {
                self.last_raw = self.source.raw_tick();
                self.last_wide = self.last_raw as i64;
                self.origin = self.last_wide;
                self.overflow_count = 0;
                self.offset = target;
                self.prev_running = false;
                self.state = ClockState::Pausing;
            }
            ClockState::Pausing => {
                let frozen = self.last_wide - self.origin;
                let drift = self.elapsed_raw() - frozen;
                self.origin += drift;
                self.offset = target - frozen;
            }
            ClockState::Running => {
                let elapsed = self.elapsed_raw();
                self.offset = target - elapsed;
            }
        }
        trace!(target, state = %self.state, "clock retimed");
    }

    /// The primary query: elapsed ticks within the active window.
    ///
    /// Running: advances the wraparound bookkeeping and returns
    /// `(widened tick - origin) + offset`; if a nonzero duration has been
    /// met, the clock stops itself and the value clamped to the duration is
    /// returned. Pausing: returns the frozen value. Stopped: returns 0.
    ///
    /// This query is also what latches the edge flags and fires the edge
    /// callbacks, so owners must call it (directly or via a trigger poll) at
    /// least once per transition they want to observe.
    pub fn elapsed_ticks(&mut self) -> Ticks {
        match self.state {
            ClockState::Running => {
                if !self.prev_running {
                    if let Some(cb) = self.on_start.as_mut() {
                        cb();
                    }
                }
                self.prev_running = true;
                let t = self.elapsed_raw() + self.offset;
                if self.duration != 0 && t >= self.duration {
                    let expired = self.duration;
                    self.stop();
                    trace!(expired, "clock window closed");
                    return expired;
                }
                t
            }
            ClockState::Pausing => {
                if self.prev_running {
                    if let Some(cb) = self.on_pause.as_mut() {
                        cb();
                    }
                }
                self.prev_running = false;
                self.last_wide - self.origin + self.offset
            }
            ClockState::Stopped => {
                if self.prev_running {
                    if let Some(cb) = self.on_stop.as_mut() {
                        cb();
                    }
                }
                self.prev_running = false;
                0
            }
        }
    }

    /// Reads the raw counter, folds in wraparound, and returns the widened
    /// tick distance from the origin. Updates `last_raw`/`last_wide`.
    fn elapsed_raw(&mut self) -> i64 {
        let mut curr = self.source.raw_tick();
        if curr < self.last_raw {
            // Either the counter wrapped, or the first read raced a source
            // update. Re-read to tell the two apart.
            let again = self.source.raw_tick();
            if again < self.last_raw {
                if self.last_raw - again > RAW_TICK_HALF {
                    self.overflow_count += 1;
                }
            } else {
                curr = again;
            }
        }
        self.last_raw = curr;
        self.last_wide = (curr as i64) | ((self.overflow_count as i64) << RAW_TICK_BITS);
        self.last_wide - self.origin
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_pausing(&self) -> bool {
        self.state == ClockState::Pausing
    }

    pub fn is_stopping(&self) -> bool {
        self.state == ClockState::Stopped
    }

    /// True exactly once per stop-to-run transition, until the next elapsed
    /// query latches it away.
    pub fn has_started(&self) -> bool {
        self.is_running() && !self.prev_running
    }

    pub fn has_paused(&self) -> bool {
        self.is_pausing() && self.prev_running
    }

    pub fn has_stopped(&self) -> bool {
        self.is_stopping() && self.prev_running
    }

    pub fn origin(&self) -> i64 {
        self.origin
    }

    pub fn offset(&self) -> Ticks {
        self.offset
    }

    pub fn duration(&self) -> Ticks {
        self.duration
    }

    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    /// Ticks left in the active window, or 0 for an unbounded window.
    pub fn remaining(&mut self) -> Ticks {
        let duration = self.duration;
        if duration == 0 {
            return 0;
        }
        duration - self.elapsed_ticks()
    }

    /// Replaces the offset without touching the timing base.
    pub fn set_offset(&mut self, offset: Ticks) {
        self.offset = offset;
    }

    pub fn add_offset(&mut self, delta: Ticks) {
        self.offset += delta;
    }

    /// Registers a callback fired once per observed start transition.
    pub fn on_start(&mut self, cb: impl FnMut() + Send + 'static) {
        self.on_start = Some(Box::new(cb));
    }

    pub fn on_pause(&mut self, cb: impl FnMut() + Send + 'static) {
        self.on_pause = Some(Box::new(cb));
    }

    pub fn on_stop(&mut self, cb: impl FnMut() + Send + 'static) {
        self.on_stop = Some(Box::new(cb));
    }

    pub fn has_event_on_start(&self) -> bool {
        self.on_start.is_some()
    }

    pub fn has_event_on_pause(&self) -> bool {
        self.on_pause.is_some()
    }

    pub fn has_event_on_stop(&self) -> bool {
        self.on_stop.is_some()
    }

    pub fn remove_event_on_start(&mut self) {
        self.on_start = None;
    }

    pub fn remove_event_on_pause(&mut self) {
        self.on_pause = None;
    }

    pub fn remove_event_on_stop(&mut self) {
        self.on_stop = None;
    }
}
