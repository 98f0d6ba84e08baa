use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use ticktree::prelude::*;
use tracing::info;

fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // 2. Load the scheduler configuration, falling back to defaults when no
    //    file or environment overrides are present.
    let config = load_config()?;
    info!(
        "{} v{} ({} Hz ticks)",
        ticktree::LIB_NAME,
        ticktree::VERSION,
        config.tick_hz
    );

    // 3. One tick source shared by every clock in the forest.
    let source: Arc<dyn TickSource> = Arc::new(SystemTickSource::new());
    let pacing = config.pacing.poll_interval();
    let mut registry = Registry::with_config(source.clone(), config);

    // 4. Register demo tasks: spawned one-liners plus a sequential pipeline.
    register_demo_tasks(&mut registry, source)?;

    // 5. Drive the registry until every task has finished and self-erased.
    loop {
        registry.poll_once();
        if registry.is_empty() {
            break;
        }
        if let Some(sleep) = pacing {
            std::thread::sleep(sleep);
        }
    }
    info!("all tasks finished");
    Ok(())
}

fn load_config() -> Result<SchedulerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("ticktree").required(false))
        .add_source(config::Environment::with_prefix("TICKTREE"))
        .build()?;
    Ok(settings.try_deserialize().unwrap_or_default())
}

/// Registers a handful of tasks exercising the spawn helpers and the
/// sequential composition mode.
fn register_demo_tasks(registry: &mut Registry, source: Arc<dyn TickSource>) -> Result<()> {
    let beats = Arc::new(AtomicU32::new(0));

    // --- A half-second heartbeat that runs six times ---
    let beats_clone = beats.clone();
    registry.interval("heartbeat", 500_000, 6, move |cx| {
        let count = beats_clone.fetch_add(1, Ordering::Relaxed) + 1;
        info!("[{}] beat {} at {} us", cx.name, count, cx.elapsed);
    });

    // --- A one-shot farewell after 3.5 seconds ---
    registry.once("farewell", 3_500_000, |cx| {
        info!("[{}] wrapping up", cx.name);
    });

    // --- A sequential pipeline: a fast warmup, then a slower steady phase ---
    let mut pipeline = TaskNode::new("pipeline", source.clone(), FnTask::empty());
    pipeline.set_window(0, 3_000_000);
    pipeline.set_auto_erase(true);

    let mut warmup = TaskNode::new(
        "warmup",
        source.clone(),
        FnTask::new(|cx| info!("[{}] frame {}", cx.name, cx.frame)),
    );
    warmup.set_period(200_000);
    warmup.set_window(0, 1_000_000);

    let mut steady = TaskNode::new(
        "steady",
        source,
        FnTask::new(|cx| info!("[{}] frame {}", cx.name, cx.frame)),
    );
    steady.set_period(500_000);
    steady.set_window(0, 2_000_000);

    pipeline.add_sequential(warmup)?;
    pipeline.add_sequential(steady)?;
    pipeline.start();
    registry.add(pipeline);

    Ok(())
}
