//! The registry: owns a flat collection of top-level task nodes and drives
//! them once per polling cycle.
//!
//! All nodes registered here share one tick source, so their clocks agree on
//! what "now" means. The registry is the usual embedding surface: programs
//! build a registry, spawn or add nodes, and call
//! [`Registry::poll_once`] from their main loop.

use crate::common::TaskKey;
use crate::components::task::{FnTask, TaskContext, TaskNode};
use crate::config::SchedulerConfig;
use crate::error::{ScheduleError, ScheduleResult};
use crate::time::TickSource;
use slotmap::SlotMap;
use std::sync::Arc;
use tracing::debug;

/// A keyed collection of task trees sharing one tick source.
pub struct Registry {
    source: Arc<dyn TickSource>,
    config: SchedulerConfig,
    tasks: SlotMap<TaskKey, TaskNode>,
    /// Insertion order; polling follows it deterministically.
    order: Vec<TaskKey>,
}

impl Registry {
    pub fn new(source: Arc<dyn TickSource>) -> Self {
        Self::with_config(source, SchedulerConfig::default())
    }

    pub fn with_config(source: Arc<dyn TickSource>, config: SchedulerConfig) -> Self {
        Self {
            source,
            config,
            tasks: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The shared tick source; hand clones of this to nodes built outside
    /// the registry.
    pub fn source(&self) -> Arc<dyn TickSource> {
        self.source.clone()
    }

    /// Attaches a node. Runs the body's one-time `begin` and returns the key
    /// for direct access later.
    pub fn add(&mut self, mut node: TaskNode) -> TaskKey {
        node.begin();
        let key = self.tasks.insert(node);
        self.order.push(key);
        key
    }

    /// Spawns a self-erasing node that fires `func` once after `after`
    /// ticks, started immediately.
    pub fn once(
        &mut self,
        name: impl Into<String>,
        after: i64,
        func: impl FnMut(&TaskContext<'_>) + Send + 'static,
    ) -> TaskKey {
        let mut node = TaskNode::new(name, self.source.clone(), FnTask::new(func));
        node.trigger_mut().one_shot(after);
        node.set_auto_erase(true);
        node.start();
        self.add(node)
    }

    /// Spawns a self-erasing node that fires `func` every `period` ticks,
    /// started immediately. A `repeat_limit` of 0 runs forever.
    pub fn interval(
        &mut self,
        name: impl Into<String>,
        period: i64,
        repeat_limit: u32,
        func: impl FnMut(&TaskContext<'_>) + Send + 'static,
    ) -> TaskKey {
        let mut node = TaskNode::new(name, self.source.clone(), FnTask::new(func));
        node.trigger_mut().configure(period, repeat_limit);
        node.set_auto_erase(true);
        node.start();
        self.add(node)
    }

    /// Spawns a self-erasing node firing `func` at `fps` frames per second,
    /// started immediately. The period is derived with the configured tick
    /// frequency.
    pub fn framerate(
        &mut self,
        name: impl Into<String>,
        fps: f64,
        func: impl FnMut(&TaskContext<'_>) + Send + 'static,
    ) -> TaskKey {
        let mut node = TaskNode::new(name, self.source.clone(), FnTask::new(func));
        node.trigger_mut().set_tick_hz(self.config.tick_hz);
        node.trigger_mut().set_rate(fps);
        node.set_auto_erase(true);
        node.start();
        self.add(node)
    }

    /// Drives every registered tree forward by one polling cycle, in
    /// insertion order, then prunes stopped nodes flagged for auto-erase.
    pub fn poll_once(&mut self) {
        for i in 0..self.order.len() {
            let key = self.order[i];
            if let Some(node) = self.tasks.get_mut(key) {
                node.poll();
            }
        }
        let tasks = &mut self.tasks;
        let before = self.order.len();
        self.order.retain(|&key| match tasks.get(key) {
            Some(node) => {
                if node.is_stopping() && node.auto_erase() {
                    let name = node.name().to_string();
                    tasks.remove(key);
                    debug!(task = %name, "auto-erased finished task");
                    false
                } else {
                    true
                }
            }
            None => false,
        });
        if self.order.len() != before {
            debug!(
                removed = before - self.order.len(),
                remaining = self.order.len(),
                "pruned registry"
            );
        }
    }

    /// Detaches a node; returns `false` if the key is stale.
    pub fn remove(&mut self, key: TaskKey) -> bool {
        if self.tasks.remove(key).is_some() {
            self.order.retain(|&k| k != key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The key of the first top-level node with the given name, if any.
    pub fn find_by_name(&self, name: &str) -> Option<TaskKey> {
        self.order
            .iter()
            .copied()
            .find(|&key| self.tasks.get(key).is_some_and(|node| node.name() == name))
    }

    /// The key of the node at the given registration position.
    pub fn find_by_index(&self, index: usize) -> Option<TaskKey> {
        self.order.get(index).copied()
    }

    pub fn get(&self, key: TaskKey) -> Option<&TaskNode> {
        self.tasks.get(key)
    }

    pub fn get_mut(&mut self, key: TaskKey) -> Option<&mut TaskNode> {
        self.tasks.get_mut(key)
    }

    /// Snapshot of the registered top-level nodes, in poll order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskKey, &TaskNode)> {
        self.order
            .iter()
            .filter_map(|&key| self.tasks.get(key).map(|node| (key, node)))
    }

    fn with_task<R>(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut TaskNode) -> R,
    ) -> ScheduleResult<R> {
        let key = self
            .find_by_name(name)
            .ok_or_else(|| ScheduleError::TaskNotFound(name.to_string()))?;
        let node = self
            .tasks
            .get_mut(key)
            .ok_or_else(|| ScheduleError::TaskNotFound(name.to_string()))?;
        Ok(op(node))
    }

    // --- Named pass-through control -----------------------------------

    pub fn start(&mut self, name: &str) -> ScheduleResult<()> {
        self.with_task(name, |node| node.start())
    }

    pub fn stop(&mut self, name: &str) -> ScheduleResult<()> {
        self.with_task(name, |node| node.stop())
    }

    pub fn pause(&mut self, name: &str) -> ScheduleResult<()> {
        self.with_task(name, |node| node.pause())
    }

    pub fn play(&mut self, name: &str) -> ScheduleResult<()> {
        self.with_task(name, |node| node.play())
    }

    pub fn restart(&mut self, name: &str) -> ScheduleResult<()> {
        self.with_task(name, |node| node.restart())
    }

    pub fn reset(&mut self, name: &str) -> ScheduleResult<()> {
        self.with_task(name, |node| node.reset())
    }

    pub fn retime(&mut self, name: &str, target: i64) -> ScheduleResult<()> {
        self.with_task(name, |node| node.retime(target))
    }

    pub fn start_all(&mut self) {
        for node in self.tasks.values_mut() {
            node.start();
        }
    }

    pub fn stop_all(&mut self) {
        for node in self.tasks.values_mut() {
            node.stop();
        }
    }

    pub fn pause_all(&mut self) {
        for node in self.tasks.values_mut() {
            node.pause();
        }
    }

    pub fn play_all(&mut self) {
        for node in self.tasks.values_mut() {
            node.play();
        }
    }

    pub fn retime_all(&mut self, target: i64) {
        for node in self.tasks.values_mut() {
            node.retime(target);
        }
    }

    pub fn reset_all(&mut self) {
        for node in self.tasks.values_mut() {
            node.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTickSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> (Arc<ManualTickSource>, Registry) {
        let source = Arc::new(ManualTickSource::new());
        let registry = Registry::new(source.clone() as Arc<dyn TickSource>);
        (source, registry)
    }

    #[test]
    fn once_fires_a_single_time_and_self_erases() {
        let (source, mut registry) = registry();
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        registry.once("later", 100, move |_cx| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(registry.len(), 1);

        registry.poll_once();
        assert_eq!(fired.load(Ordering::Relaxed), 0);
        source.advance(100);
        registry.poll_once();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
        // The fire stopped the node, so the same cycle pruned it.
        assert_eq!(registry.len(), 0);
        source.advance(500);
        registry.poll_once();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn interval_fires_on_every_boundary() {
        let (source, mut registry) = registry();
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        registry.interval("tick", 100, 0, move |_cx| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        for _ in 0..5 {
            source.advance(100);
            registry.poll_once();
        }
        assert_eq!(fired.load(Ordering::Relaxed), 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn framerate_uses_the_configured_tick_frequency() {
        let source = Arc::new(ManualTickSource::new());
        let config = SchedulerConfig {
            tick_hz: 1000,
            ..SchedulerConfig::default()
        };
        let mut registry =
            Registry::with_config(source.clone() as Arc<dyn TickSource>, config);
        let key = registry.framerate("frames", 50.0, |_cx| {});
        // 1000 Hz ticks at 50 fps is a 20-tick period.
        assert_eq!(registry.get(key).unwrap().trigger().period(), 20);
        source.advance(20);
        registry.poll_once();
        assert_eq!(registry.get(key).unwrap().trigger().fire_count(), 1);
    }

    #[test]
    fn named_control_reaches_the_right_node() {
        let (source, mut registry) = registry();
        registry.interval("worker", 100, 0, |_cx| {});
        registry.interval("other", 100, 0, |_cx| {});

        registry.pause("worker").unwrap();
        source.advance(100);
        registry.poll_once();
        let worker = registry.find_by_name("worker").unwrap();
        let other = registry.find_by_name("other").unwrap();
        assert!(registry.get(worker).unwrap().is_pausing());
        assert_eq!(registry.get(worker).unwrap().trigger().fire_count(), 0);
        assert_eq!(registry.get(other).unwrap().trigger().fire_count(), 1);

        registry.play("worker").unwrap();
        source.advance(100);
        registry.poll_once();
        assert_eq!(registry.get(worker).unwrap().trigger().fire_count(), 1);

        assert_eq!(
            registry.stop("missing"),
            Err(ScheduleError::TaskNotFound("missing".into()))
        );
    }

    #[test]
    fn remove_detaches_and_reports_stale_keys() {
        let (_source, mut registry) = registry();
        let key = registry.interval("worker", 100, 0, |_cx| {});
        assert!(registry.remove(key));
        assert!(!registry.remove(key));
        assert!(registry.is_empty());
    }

    #[test]
    fn polling_follows_insertion_order() {
        let (source, mut registry) = registry();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let log = log.clone();
            registry.interval(name, 100, 0, move |cx| {
                log.lock().unwrap().push(cx.name.to_string());
            });
        }
        source.advance(100);
        registry.poll_once();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
