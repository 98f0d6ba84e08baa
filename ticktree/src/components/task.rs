//! Task nodes: schedulable units with a trigger, a user-supplied body, and
//! an exclusively-owned tree of children combined under one composition mode.
//!
//! A node's own trigger decides *when* its `update` body runs; the
//! composition mode decides how its children's schedules relate to its own.
//! Children are plain owned values inside their parent, so the tree cannot
//! form cycles and needs no shared ownership; any outside reference is a
//! name or index lookup, never a second owner.

use crate::common::Ticks;
use crate::components::trigger::IntervalTrigger;
use crate::error::{ScheduleError, ScheduleResult};
use crate::time::{ClockState, TickSource};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-poll information handed to a task body's `update`.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    /// The owning node's name.
    pub name: &'a str,
    /// Elapsed ticks observed by the poll that triggered this update.
    pub elapsed: Ticks,
    /// How many times the node's trigger has fired since it started.
    pub frame: i64,
}

/// The behavior of a schedulable unit.
///
/// The scheduler core depends only on this trait, never on concrete task
/// types. All callbacks except `update` default to no-ops, mirroring how
/// most tasks only care about their periodic work:
///
/// - `begin` runs once when the node is attached to an owner.
/// - `enter`/`exit` run once per activation/deactivation edge.
/// - `update` runs on every ready poll while active.
/// - `idle` runs on every poll while inactive.
/// - `reset` clears whatever state the body accumulated at runtime.
pub trait Task: Send {
    fn begin(&mut self) {}
    fn enter(&mut self) {}
    fn update(&mut self, cx: &TaskContext<'_>);
    fn exit(&mut self) {}
    fn idle(&mut self) {}
    fn reset(&mut self) {}
}

/// A task body driven by a closure, for callers that don't need the full
/// trait surface.
pub struct FnTask {
    func: Option<Box<dyn FnMut(&TaskContext<'_>) + Send>>,
}

impl FnTask {
    pub fn new(func: impl FnMut(&TaskContext<'_>) + Send + 'static) -> Self {
        Self {
            func: Some(Box::new(func)),
        }
    }

    /// A body that does nothing; useful for nodes that exist only to
    /// schedule their children.
    pub fn empty() -> Self {
        Self { func: None }
    }

    pub fn set_update(&mut self, func: impl FnMut(&TaskContext<'_>) + Send + 'static) {
        self.func = Some(Box::new(func));
    }
}

impl Task for FnTask {
    fn update(&mut self, cx: &TaskContext<'_>) {
        if let Some(func) = self.func.as_mut() {
            func(cx);
        }
    }
}

/// How a node's children relate to the node's own schedule.
///
/// The mode is fixed by the first child-adding call and cannot be changed
/// to a different mode afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// No children yet; any mode may still be chosen.
    None,
    /// Children run the full one-poll protocol themselves, each on its own
    /// independently-configured schedule.
    Parallel,
    /// Children share the parent's activation window and are started in
    /// lockstep with the parent's elapsed-time base.
    Synchronized,
    /// Exactly one child is active at a time; the next starts when the
    /// current one stops.
    Sequential,
}

/// A schedulable node: trigger + body + children.
pub struct TaskNode {
    name: String,
    trigger: IntervalTrigger,
    body: Box<dyn Task>,
    auto_erase: bool,
    children: Vec<TaskNode>,
    mode: Composition,
    /// Index of the child being driven; only meaningful under Sequential.
    /// Equal to `children.len()` once the sequence has completed.
    active_child: usize,
    /// Own activation edge latch, independent of the clock's edge flags.
    prev_active: bool,
    /// Latched once a blocked sequential auto-advance has been reported;
    /// holds the rejection until `advance()` or the next activation clears it.
    advance_error: Option<ScheduleError>,
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("children", &self.children.len())
            .field("trigger", &self.trigger)
            .finish()
    }
}

impl TaskNode {
    /// Creates a detached node over the given tick source and body.
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn TickSource>,
        body: impl Task + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            trigger: IntervalTrigger::new(source),
            body: Box::new(body),
            auto_erase: false,
            children: Vec::new(),
            mode: Composition::None,
            active_child: 0,
            prev_active: false,
            advance_error: None,
        }
    }

    /// Runs the body's one-time setup. Invoked by the owner when the node is
    /// attached; never repeated.
    pub fn begin(&mut self) {
        self.body.begin();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_auto_erase(&mut self, auto_erase: bool) {
        self.auto_erase = auto_erase;
    }

    pub fn auto_erase(&self) -> bool {
        self.auto_erase
    }

    pub fn composition(&self) -> Composition {
        self.mode
    }

    pub fn trigger(&self) -> &IntervalTrigger {
        &self.trigger
    }

    pub fn trigger_mut(&mut self) -> &mut IntervalTrigger {
        &mut self.trigger
    }

    /// Ticks between the node's own updates.
    pub fn set_period(&mut self, period: Ticks) {
        self.trigger.set_period(period);
    }

    /// Update cadence expressed as a frame rate.
    pub fn set_rate(&mut self, rate: f64) {
        self.trigger.set_rate(rate);
    }

    /// Active window applied when the node starts (0 = unbounded).
    pub fn set_window(&mut self, offset: Ticks, duration: Ticks) {
        self.trigger.set_window(offset, duration);
    }

    // --- Child management ---------------------------------------------

    /// Adds a child that schedules itself independently of this node.
    pub fn add_parallel(&mut self, child: TaskNode) -> ScheduleResult<&mut TaskNode> {
        self.add_child(child, Composition::Parallel)
    }

    /// Adds a child that starts in lockstep with this node.
    pub fn add_synchronized(&mut self, child: TaskNode) -> ScheduleResult<&mut TaskNode> {
        self.add_child(child, Composition::Synchronized)
    }

    /// Adds a child to the end of this node's sequence.
    pub fn add_sequential(&mut self, child: TaskNode) -> ScheduleResult<&mut TaskNode> {
        self.add_child(child, Composition::Sequential)
    }

    fn add_child(&mut self, mut child: TaskNode, mode: Composition) -> ScheduleResult<&mut TaskNode> {
        if self.mode != Composition::None && self.mode != mode {
            return Err(ScheduleError::CompositionFixed {
                name: self.name.clone(),
                existing: self.mode,
            });
        }
        self.mode = mode;
        child.begin();
        self.children.push(child);
        let idx = self.children.len() - 1;
        Ok(&mut self.children[idx])
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[TaskNode] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&TaskNode> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut TaskNode> {
        self.children.get_mut(index)
    }

    /// First descendant with the given name: direct children are checked
    /// before any grandchildren, each level in insertion order.
    pub fn find_child(&mut self, name: &str) -> Option<&mut TaskNode> {
        for i in 0..self.children.len() {
            if self.children[i].name == name {
                return self.children.get_mut(i);
            }
        }
        for child in &mut self.children {
            if let Some(found) = child.find_child(name) {
                return Some(found);
            }
        }
        None
    }

    /// The sequential cursor. Equal to `child_count()` once the sequence
    /// has run to completion.
    pub fn active_child(&self) -> usize {
        self.active_child
    }

    /// True while sequential auto-advance is blocked on a child without a
    /// fixed duration.
    pub fn advance_blocked(&self) -> bool {
        self.advance_error.is_some()
    }

    /// The rejection recorded when auto-advance was last blocked, if any.
    /// Cleared by `advance()`, by the exit edge, and by `reset()`.
    pub fn advance_error(&self) -> Option<&ScheduleError> {
        self.advance_error.as_ref()
    }

    // --- State queries -------------------------------------------------

    pub fn state(&self) -> ClockState {
        self.trigger.clock().state()
    }

    /// Running or pausing; the node's activation window is open.
    pub fn is_active(&self) -> bool {
        !self.trigger.clock().is_stopping()
    }

    pub fn is_running(&self) -> bool {
        self.trigger.clock().is_running()
    }

    pub fn is_pausing(&self) -> bool {
        self.trigger.clock().is_pausing()
    }

    pub fn is_stopping(&self) -> bool {
        self.trigger.clock().is_stopping()
    }

    pub fn has_finished(&self) -> bool {
        self.trigger.has_finished()
    }

    /// Queries and records the node's elapsed ticks.
    pub fn elapsed(&mut self) -> Ticks {
        self.trigger.elapsed()
    }

    // --- Control -------------------------------------------------------

    /// Opens the node's activation window with its configured schedule.
    /// Children react on the next poll, via the enter edge.
    pub fn start(&mut self) {
        self.trigger.start();
    }

    /// Closes the window immediately for this node; children are shut down
    /// on the next poll, when the exit edge is observed.
    pub fn stop(&mut self) {
        self.trigger.stop();
    }

    /// Freezes this node's clock. Children are not cascaded: synchronized
    /// and sequential children stop being driven while the parent's window
    /// is frozen, and parallel children keep their own schedules.
    pub fn pause(&mut self) {
        self.trigger.pause();
    }

    pub fn play(&mut self) {
        self.trigger.play();
    }

    /// Stops and immediately reopens the window with the configured
    /// schedule.
    pub fn restart(&mut self) {
        self.trigger.stop();
        self.trigger.start();
    }

    /// Rebases the node's elapsed time to `target`.
    pub fn retime(&mut self, target: Ticks) {
        self.trigger.clock_mut().retime(target);
    }

    /// Clears accumulated runtime state, children first, then this node.
    /// Identity, composition mode and child membership are untouched.
    pub fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
        self.trigger.reset();
        self.body.reset();
        self.active_child = 0;
        self.prev_active = false;
        self.advance_error = None;
    }

    /// Manually advances a sequential composition to its next child.
    ///
    /// This is the required path when children have mixed fixed/unbounded
    /// durations. The next child starts fresh (elapsed base 0); no duration
    /// compensation is applied.
    pub fn advance(&mut self) -> ScheduleResult<()> {
        if self.mode != Composition::Sequential {
            return Err(ScheduleError::NotSequential(self.name.clone()));
        }
        let next = self.active_child + 1;
        if next >= self.children.len() {
            return Err(ScheduleError::IndexOutOfRange {
                name: self.name.clone(),
                index: next,
            });
        }
        if let Some(child) = self.children.get_mut(self.active_child) {
            child.halt();
        }
        self.active_child = next;
        self.start_child_at(next, 0);
        self.children[next].body.enter();
        self.advance_error = None;
        Ok(())
    }

    // --- The one-poll protocol ----------------------------------------

    /// Drives the node forward by one polling cycle.
    ///
    /// Called once per cycle by the owner; recursion into children happens
    /// within the same call stack, synchronously and without blocking.
    pub fn poll(&mut self) {
        let was_active = self.prev_active;
        let mut active = self.is_active();
        if active && !was_active {
            self.on_entered();
        }
        let seen_active = active || was_active;

        if active {
            if self.trigger.poll() {
                self.run_body_update();
            }
            match self.mode {
                Composition::None => {}
                Composition::Parallel => {
                    for child in &mut self.children {
                        child.poll();
                    }
                    let before = self.children.len();
                    self.children
                        .retain(|child| !(child.auto_erase && child.is_stopping()));
                    if self.children.len() != before {
                        debug!(
                            task = %self.name,
                            erased = before - self.children.len(),
                            "auto-erased stopped children"
                        );
                    }
                }
                Composition::Synchronized => {
                    for child in &mut self.children {
                        if child.trigger.poll() {
                            child.run_body_update();
                        }
                    }
                }
                Composition::Sequential => self.poll_sequential(),
            }
        } else {
            self.body.idle();
            if self.mode == Composition::Parallel {
                for child in &mut self.children {
                    child.cascade_idle();
                }
            }
        }

        active = self.is_active();
        if !active && seen_active {
            self.on_exited();
        }
        self.prev_active = active;
    }

    fn run_body_update(&mut self) {
        let cx = TaskContext {
            name: &self.name,
            elapsed: self.trigger.last_elapsed(),
            frame: self.trigger.fire_count(),
        };
        self.body.update(&cx);
    }

    fn on_entered(&mut self) {
        debug!(task = %self.name, "enter");
        self.body.enter();
        match self.mode {
            Composition::Synchronized => {
                let base = self.trigger.elapsed();
                for idx in 0..self.children.len() {
                    self.start_child_at(idx, base);
                    self.children[idx].body.enter();
                }
            }
            Composition::Sequential => {
                self.active_child = 0;
                self.advance_error = None;
                if !self.children.is_empty() {
                    let base = self.trigger.elapsed();
                    self.start_child_at(0, base);
                    self.children[0].body.enter();
                }
            }
            // Parallel children run their own previously-configured
            // schedules; nothing to start here.
            Composition::Parallel | Composition::None => {}
        }
    }

    fn poll_sequential(&mut self) {
        let idx = self.active_child;
        if idx >= self.children.len() {
            return;
        }
        if self.children[idx].trigger.poll() {
            self.children[idx].run_body_update();
        }
        if self.children[idx].is_stopping() && self.children[idx].prev_active {
            self.children[idx].body.exit();
            self.children[idx].prev_active = false;
            if idx + 1 == self.children.len() {
                self.active_child = self.children.len();
                return;
            }
            if let Some(unbounded) = self.unbounded_child() {
                if self.advance_error.is_none() {
                    let error = ScheduleError::UnboundedChild {
                        name: self.name.clone(),
                        child: self.children[unbounded].name.clone(),
                    };
                    warn!(task = %self.name, %error, "use advance() to continue the sequence");
                    self.advance_error = Some(error);
                }
                return;
            }
            let parent_elapsed = self.trigger.elapsed();
            let prior: Ticks = (0..=idx).map(|i| self.effective_schedule(i).2).sum();
            let base = (parent_elapsed - prior).max(0);
            self.active_child = idx + 1;
            self.start_child_at(idx + 1, base);
            self.children[idx + 1].body.enter();
        }
    }

    fn on_exited(&mut self) {
        debug!(task = %self.name, "exit");
        match self.mode {
            Composition::Parallel | Composition::Synchronized => {
                for child in &mut self.children {
                    child.halt();
                }
            }
            Composition::Sequential => {
                if let Some(child) = self.children.get_mut(self.active_child) {
                    child.halt();
                }
            }
            Composition::None => {}
        }
        self.body.exit();
        self.active_child = 0;
        self.advance_error = None;
    }

    /// Immediate shutdown used by exit-edge cascades: stop the clock, run
    /// the mode-specific child shutdown, and fire `exit` if the node had an
    /// open activation window.
    fn halt(&mut self) {
        let was_active = self.prev_active || self.is_active();
        self.trigger.stop();
        if was_active {
            self.on_exited();
        }
        self.prev_active = false;
    }

    fn cascade_idle(&mut self) {
        self.body.idle();
        if self.mode == Composition::Parallel {
            for child in &mut self.children {
                child.cascade_idle();
            }
        }
    }

    /// Starts `children[idx]` with its own configured schedule, inheriting
    /// any unset parameter from this node, and aligns its elapsed-time base
    /// to `base`.
    fn start_child_at(&mut self, idx: usize, base: Ticks) {
        let (period, offset, duration) = self.effective_schedule(idx);
        let child = &mut self.children[idx];
        child.trigger.start_with(period, offset + base, duration);
        child.prev_active = true;
    }

    /// Per-field schedule inheritance: the child's own period/offset/
    /// duration when set, the parent's configured value otherwise.
    fn effective_schedule(&self, idx: usize) -> (Ticks, Ticks, Ticks) {
        let child = self.children[idx].trigger();
        let parent = &self.trigger;
        let period = if child.period() != 0 {
            child.period()
        } else {
            parent.period()
        };
        let offset = if child.configured_offset() != 0 {
            child.configured_offset()
        } else {
            parent.configured_offset()
        };
        let duration = if child.configured_duration() != 0 {
            child.configured_duration()
        } else {
            parent.configured_duration()
        };
        (period, offset, duration)
    }

    /// The first child whose effective duration is unbounded, if any.
    /// Sequential auto-advance is only well-defined when this is `None`.
    fn unbounded_child(&self) -> Option<usize> {
        (0..self.children.len()).find(|&i| self.effective_schedule(i).2 == 0)
    }
}
