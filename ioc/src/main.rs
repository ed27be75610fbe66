mod driver;
mod host;
mod pool;
mod sink;
mod source;

use std::path::PathBuf;
use std::sync::Arc;

use nd_plugin_threshold::{Param, ThresholdError, ThresholdPlugin};
use nd_threshold_common::config::{Config, PluginConfig};
use nd_threshold_common::frame::FrameError;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use driver::FrameDriver;
use host::IocHost;
use pool::FramePool;
use source::FrameSource;

#[derive(Debug, thiserror::Error)]
pub enum IocError {
    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
    #[error("plugin error: {0}")]
    Plugin(#[from] ThresholdError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error on {0}: {1}")]
    Io(String, std::io::Error),
    #[error("unknown source mode {0}, expected 'ramp' or 'files'")]
    UnknownSourceMode(String),
    #[error("source mode 'files' requires source.dir")]
    MissingSourceDir,
    #[error("source has no frame at index {0}")]
    SourceExhausted(u64),
    #[error("frame {0} cannot be encoded as an image")]
    Encode(u64),
}

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let runtime = match build_runtime(&config.plugin) {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!(error = %e, "threshold IOC failed");
        std::process::exit(1);
    }
}

/// Worker threads and stack size come from the plugin's threading hints.
fn build_runtime(plugin: &PluginConfig) -> Result<tokio::runtime::Runtime, IocError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .enable_all()
        .worker_threads(plugin.max_threads.max(1))
        .thread_name(format!("{}-worker", plugin.port_name));
    if plugin.stack_size > 0 {
        builder.thread_stack_size(plugin.stack_size);
    }
    if plugin.priority != 0 {
        warn!(priority = plugin.priority, "thread priority is not applied by this host");
    }
    builder.build().map_err(IocError::Runtime)
}

async fn run(config: Config) -> Result<(), IocError> {
    info!(
        port = config.plugin.port_name,
        array_port = config.plugin.array_port,
        queue_size = config.plugin.queue_size,
        blocking = config.plugin.blocking_callbacks,
        max_buffers = config.plugin.max_buffers,
        max_memory = config.plugin.max_memory,
        source = config.source.mode,
        "starting threshold IOC"
    );

    let source = FrameSource::from_config(&config.source)?;

    let pool = Arc::new(FramePool::new(config.plugin.max_buffers, config.plugin.max_memory));
    let (downstream_tx, downstream_rx) = mpsc::unbounded_channel();
    let host = IocHost::new(
        Arc::clone(&pool),
        downstream_tx,
        config.plugin.blocking_callbacks,
    );
    let plugin = Arc::new(ThresholdPlugin::configure(config.plugin.clone(), host)?);

    let sink = tokio::spawn(sink::run_sink(
        downstream_rx,
        config.output.dir.clone(),
        Arc::clone(&pool),
    ));

    let (driver, worker) = FrameDriver::new(
        Arc::clone(&plugin),
        config.plugin.queue_size,
        config.plugin.blocking_callbacks,
    );
    let worker = worker.map(|w| tokio::spawn(w.run()));

    source::run_source(&source, &driver, config.source.fps).await;

    // Closing the queue lets the worker drain and exit.
    let mut stats = driver.stats();
    drop(driver);
    if let Some(worker) = worker {
        match worker.await {
            Ok(final_stats) => stats = final_stats,
            Err(e) => error!(error = %e, "frame queue worker panicked"),
        }
    }

    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        processed = stats.processed,
        failed = stats.failed,
        status = plugin.int_param(Param::Status),
        num_pix_thresh = plugin.int_param(Param::NumPixThresh),
        threshold = plugin.threshold(),
        published = ?plugin.host().published(),
        "frame processing finished"
    );

    // The sink finishes once the host, and with it the last sender, is gone.
    drop(plugin);
    match sink.await {
        Ok(written) => info!(
            written,
            outstanding_buffers = pool.usage().buffers,
            "threshold IOC stopped"
        ),
        Err(e) => error!(error = %e, "frame sink panicked"),
    }
    Ok(())
}
