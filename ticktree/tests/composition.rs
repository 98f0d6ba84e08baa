//! End-to-end scenarios driving whole task forests through a registry over
//! a manually-advanced tick source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ticktree::prelude::*;

fn registry() -> (Arc<ManualTickSource>, Registry) {
    let source = Arc::new(ManualTickSource::new());
    let registry = Registry::new(source.clone() as Arc<dyn TickSource>);
    (source, registry)
}

#[test]
fn bounded_node_updates_only_inside_its_window() {
    let (source, mut registry) = registry();
    let updates = Arc::new(AtomicUsize::new(0));
    let seen = updates.clone();
    let mut node = TaskNode::new(
        "bounded",
        registry.source(),
        FnTask::new(move |_cx| {
            seen.fetch_add(1, Ordering::Relaxed);
        }),
    );
    node.set_period(1000);
    node.set_window(0, 5000);
    node.start();
    let key = registry.add(node);

    for _ in 0..10 {
        source.advance(1000);
        registry.poll_once();
    }
    assert_eq!(updates.load(Ordering::Relaxed), 5);
    assert!(registry.get(key).unwrap().is_stopping());
    // The final observation was clamped at the window edge, never beyond.
    assert_eq!(registry.get(key).unwrap().trigger().last_elapsed(), 5000);
}

#[test]
fn sequential_pipeline_compensates_for_late_polls() {
    let (source, mut registry) = registry();
    let mut pipeline = TaskNode::new("pipeline", registry.source(), FnTask::empty());
    let mut first = TaskNode::new("first", registry.source(), FnTask::empty());
    first.set_window(0, 1000);
    let mut second = TaskNode::new("second", registry.source(), FnTask::empty());
    second.set_window(0, 2000);
    pipeline.add_sequential(first).unwrap();
    pipeline.add_sequential(second).unwrap();
    pipeline.start();
    let key = registry.add(pipeline);

    registry.poll_once();
    assert_eq!(registry.get(key).unwrap().active_child(), 0);

    // The poll arrives 500 ticks after the first child's window closed; the
    // second child starts as if it had been running since the handoff.
    source.advance(1500);
    registry.poll_once();
    let pipeline = registry.get_mut(key).unwrap();
    assert_eq!(pipeline.active_child(), 1);
    assert_eq!(pipeline.child_mut(1).unwrap().elapsed(), 500);

    source.advance(1500);
    registry.poll_once();
    let pipeline = registry.get(key).unwrap();
    assert_eq!(pipeline.active_child(), 2);
    assert!(pipeline.child(1).unwrap().is_stopping());
}

#[test]
fn synchronized_children_observe_identical_elapsed_time() {
    let (source, mut registry) = registry();
    let elapsed_log = Arc::new(Mutex::new(Vec::new()));
    let mut parent = TaskNode::new("lockstep", registry.source(), FnTask::empty());
    for name in ["left", "right"] {
        let log = elapsed_log.clone();
        parent
            .add_synchronized(TaskNode::new(
                name,
                registry.source(),
                FnTask::new(move |cx| log.lock().unwrap().push(cx.elapsed)),
            ))
            .unwrap();
    }
    parent.start();
    registry.add(parent);

    for step in [100u32, 350, 17, 1000] {
        source.advance(step);
        registry.poll_once();
    }
    let log = elapsed_log.lock().unwrap();
    // Every cycle pushed one observation per child; pairs must agree.
    assert_eq!(log.len() % 2, 0);
    for pair in log.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn parallel_subtrees_prune_only_flagged_children() {
    let (source, mut registry) = registry();
    let mut parent = TaskNode::new("forest", registry.source(), FnTask::empty());
    let mut fleeting = TaskNode::new("fleeting", registry.source(), FnTask::empty());
    fleeting.set_window(0, 300);
    fleeting.set_auto_erase(true);
    let mut keeper = TaskNode::new("keeper", registry.source(), FnTask::empty());
    keeper.set_window(0, 300);
    parent.add_parallel(fleeting).unwrap();
    parent.add_parallel(keeper).unwrap();
    parent.child_mut(0).unwrap().start();
    parent.child_mut(1).unwrap().start();
    parent.start();
    let key = registry.add(parent);

    registry.poll_once();
    source.advance(400);
    registry.poll_once();

    let parent = registry.get(key).unwrap();
    assert_eq!(parent.child_count(), 1);
    assert_eq!(parent.child(0).unwrap().name(), "keeper");
    assert!(parent.child(0).unwrap().is_stopping());
    // The parent itself is unbounded and still running.
    assert!(parent.is_running());
}

#[test]
fn pause_and_play_exclude_the_frozen_span_from_schedules() {
    let (source, mut registry) = registry();
    let fires = Arc::new(AtomicUsize::new(0));
    let seen = fires.clone();
    registry.interval("worker", 1000, 0, move |_cx| {
        seen.fetch_add(1, Ordering::Relaxed);
    });

    source.advance(1000);
    registry.poll_once();
    assert_eq!(fires.load(Ordering::Relaxed), 1);

    registry.pause("worker").unwrap();
    source.advance(10_000);
    registry.poll_once();
    assert_eq!(fires.load(Ordering::Relaxed), 1);

    registry.play("worker").unwrap();
    source.advance(1000);
    registry.poll_once();
    assert_eq!(fires.load(Ordering::Relaxed), 2);
}

#[test]
fn retime_rebases_a_running_schedule() {
    let (source, mut registry) = registry();
    let fires = Arc::new(AtomicUsize::new(0));
    let seen = fires.clone();
    registry.interval("worker", 1000, 0, move |_cx| {
        seen.fetch_add(1, Ordering::Relaxed);
    });
    source.advance(100);
    registry.poll_once();
    assert_eq!(fires.load(Ordering::Relaxed), 0);

    // Jump the task forward to 2500 elapsed ticks; the next poll catches up.
    registry.retime("worker", 2500).unwrap();
    registry.poll_once();
    let key = registry.find_by_name("worker").unwrap();
    assert_eq!(registry.get(key).unwrap().trigger().fire_count(), 2);
    assert_eq!(fires.load(Ordering::Relaxed), 1);
}

#[test]
fn reset_restores_a_composed_tree_for_a_second_run() {
    let (source, mut registry) = registry();
    let updates = Arc::new(AtomicUsize::new(0));
    let mut parent = TaskNode::new("tree", registry.source(), FnTask::empty());
    parent.set_window(0, 2000);
    let seen = updates.clone();
    parent
        .add_synchronized(TaskNode::new(
            "leaf",
            registry.source(),
            FnTask::new(move |_cx| {
                seen.fetch_add(1, Ordering::Relaxed);
            }),
        ))
        .unwrap();
    parent.start();
    let key = registry.add(parent);

    registry.poll_once();
    source.advance(2500);
    registry.poll_once();
    assert!(registry.get(key).unwrap().is_stopping());
    let first_run = updates.load(Ordering::Relaxed);
    assert!(first_run > 0);

    registry.reset("tree").unwrap();
    registry.start("tree").unwrap();
    registry.poll_once();
    source.advance(1000);
    registry.poll_once();
    assert!(registry.get(key).unwrap().is_running());
    assert!(updates.load(Ordering::Relaxed) > first_run);
}
