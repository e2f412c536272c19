//! Camera capture node: streams JPEG frames from one camera device and
//! switches the capture framerate between two presets on external signal.

use std::sync::Arc;

use argus::capture::{open_source, CaptureWorker};
use argus::control::{FramerateSwitch, Shutdown};
use argus::publish::Publisher;
use argus::Config;
use color_eyre::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argus=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Initializing...");

    // Load configuration: defaults, then argus.toml, then ARGUS_* env vars
    let config = load_config()?;
    argus::CONFIG.store(Arc::new(config.clone()));
    info!(
        "device={} resolution={}x{} fps_high={} fps_low={} profile={}",
        config.capture.device,
        config.capture.width,
        config.capture.height,
        config.capture.fps_high,
        config.capture.fps_low,
        config.calibration.profile,
    );

    let source = open_source(&config.capture)?;
    let publisher = Arc::new(Publisher::new());
    let framerate = Arc::new(FramerateSwitch::new(
        config.capture.fps_high,
        config.capture.fps_low,
    ));
    let shutdown = Arc::new(Shutdown::new());

    // Drain one subscription so frame flow is visible in the logs
    let rx = publisher.subscribe();
    tokio::spawn(async move {
        while let Ok(frame) = rx.recv_async().await {
            debug!(
                sequence = frame.sequence,
                bytes = frame.payload.len(),
                "frame received"
            );
        }
    });

    // The capture loop owns the hardware handle on its own thread
    let worker = CaptureWorker::new(
        source,
        Arc::clone(&publisher),
        Arc::clone(&framerate),
        Arc::clone(&shutdown),
        config.capture.frame_id.clone(),
    );
    let worker_handle = worker.spawn()?;

    // SIGUSR1 -> high preset, SIGUSR2 -> low preset, ctrl-c -> shutdown
    let mut switch_high = signal(SignalKind::user_defined1())?;
    let mut switch_low = signal(SignalKind::user_defined2())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                shutdown.request();
                break;
            }
            _ = switch_high.recv() => framerate.request_switch(true),
            _ = switch_low.recv() => framerate.request_switch(false),
        }
    }

    worker_handle
        .join()
        .map_err(|_| color_eyre::eyre::eyre!("capture thread panicked"))?;

    let (published, dropped) = publisher.stats();
    info!("Shut down. {published} frames published, {dropped} dropped");
    Ok(())
}

fn load_config() -> Result<Config> {
    let settings = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(config::File::with_name("argus").required(false))
        .add_source(config::Environment::with_prefix("ARGUS").separator("__"))
        .build()?;
    Ok(settings.try_deserialize()?)
}
