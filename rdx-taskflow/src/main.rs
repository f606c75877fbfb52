use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskflow::prelude::*;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load the configuration. A missing file just means defaults.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "taskflow.toml".to_string());
    let config = TaskflowConfig::load(&config_path)?;
    info!(
        "{} v{} starting with {:?} resolution",
        taskflow::ENGINE_NAME,
        taskflow::VERSION,
        config.resolution
    );

    // 3. Create the scheduler; the match clock starts now.
    let mut scheduler = Scheduler::with_config(&config).with_match_clock(MonotonicClock::new());

    // 4. Listen to the event stream.
    spawn_event_listener(&scheduler);

    // 5. Give the demo resources defaults and queue an autonomous routine.
    register_demo_routine(&mut scheduler)?;

    // 6. Drive the scheduler until Ctrl-C.
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
        }
        info!("Shutdown signal received.");
        shutdown_tx.send(()).ok();
    });

    SystemClock::new(config.resolution.clone())
        .drive(&mut scheduler, shutdown_rx)
        .await?;
    scheduler.remove_all()?;
    Ok(())
}

/// Logs every scheduler event except the per-tick heartbeat.
fn spawn_event_listener(scheduler: &Scheduler) {
    let mut event_rx = scheduler.subscribe_events();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(SchedulerEvent::TickCompleted { .. }) => {}
                Ok(event) => info!("[EVENT] => {:?}", event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("[EVENT] listener lagged, {} events skipped", missed)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn ensure_resource(scheduler: &mut Scheduler, name: &str) -> ResourceId {
    match scheduler.resource_by_name(name) {
        Some(id) => id,
        None => scheduler.add_resource(name),
    }
}

/// Registers a short routine that exercises parallel children, timeouts, waits, a
/// branch and a release.
fn register_demo_routine(scheduler: &mut Scheduler) -> Result<()> {
    let drivetrain = ensure_resource(scheduler, "drivetrain");
    let intake = ensure_resource(scheduler, "intake");

    scheduler.set_default(
        drivetrain,
        ContinuousTask::new(|| {})
            .requiring(drivetrain)
            .named("hold-position"),
    )?;
    scheduler.set_default(
        intake,
        ContinuousTask::new(|| {}).requiring(intake).named("intake-idle"),
    )?;

    let piece_loaded = Arc::new(AtomicBool::new(false));
    let intake_steps = Arc::new(AtomicU32::new(0));

    let loaded = piece_loaded.clone();
    let run_intake = ContinuousTask::new(move || {
        if intake_steps.fetch_add(1, Ordering::Relaxed) + 1 == 25 {
            info!("[AUTO] Piece detected");
            loaded.store(true, Ordering::Relaxed);
        }
    })
    .requiring(intake)
    .named("run-intake");

    let drive_forward = ContinuousTask::new(|| {})
        .requiring(drivetrain)
        .named("drive-forward");

    let loaded = piece_loaded.clone();
    let scored = piece_loaded.clone();
    let routine = TaskBuilder::named("demo-auto")
        .sequential(InstantTask::new(|| info!("[AUTO] Routine started")).named("announce"))
        .parallel_with_timeout(run_intake, Duration::from_secs(3))
        .sequential_with_timeout(drive_forward, Duration::from_secs(2))
        .wait_for_condition_with_timeout(
            move || loaded.load(Ordering::Relaxed),
            Duration::from_secs(2),
        )
        .if_then_else(
            move || scored.load(Ordering::Relaxed),
            InstantTask::new(|| info!("[AUTO] Piece loaded, scoring")).named("score"),
            InstantTask::new(|| info!("[AUTO] No piece, skipping the score")).named("skip"),
        )
        .wait_for_match_time(Duration::from_secs(8))
        .sequential(ReleaseTask::new(drivetrain))
        .sequential(InstantTask::new(|| info!("[AUTO] Routine complete")).named("done"))
        .build();
    scheduler.register(routine)?;
    Ok(())
}
