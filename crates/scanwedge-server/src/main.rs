//! ScanWedge server entry point.
//!
//! Captures keyboard-wedge barcode scans on this machine and pushes each
//! completed scan, as JSON, to every connected WebSocket subscriber.
//!
//! # Usage
//!
//! ```text
//! scanwedge-server [OPTIONS]
//!
//! Options:
//!   --config <FILE>           Config file [default: platform config dir]
//!   --bind <IP>               Listener address
//!   --port <PORT>             Listener port
//!   --timeout-ms <MS>         Max gap between keys of one scan
//!   --min-length <N>          Shortest accepted barcode
//!   --max-length <N>          Longest accepted barcode
//!   --queue-capacity <N>      Frames buffered per subscriber
//!   --ping-period <SECS>      Ping interval
//!   --pong-wait <SECS>        Pong deadline
//!   --replay <FILE>           Replay one barcode per line instead of hooking the keyboard
//!   --no-hook                 Do not install the keyboard hook
//!   --write-config            Save the effective settings to the config file and exit
//! ```
//!
//! Every option can also be set with a `SCANWEDGE_*` environment variable
//! (e.g. `SCANWEDGE_PORT`).  Options given on the command line or in the
//! environment override the config file, which overrides built-in defaults.
//!
//! # Shutdown
//!
//! Ctrl+C clears the shared `running` flag.  The accept loop notices within
//! 200 ms, the capture pipeline is stopped, and the hub closes every
//! subscriber exactly once.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scanwedge_server::application::ScanPipeline;
use scanwedge_server::infrastructure::input_capture::{
    platform_source, KeyEventSource, ScriptedKeySource,
};
use scanwedge_server::infrastructure::storage::config::{
    config_file_path, load_config, save_config, AppConfig,
};
use scanwedge_server::infrastructure::{bind, serve, Hub};

/// Gap between replayed key presses, well inside the scan timeout.
const REPLAY_KEY_GAP_MS: u64 = 5;
/// Silence between replayed barcodes.
const REPLAY_PAUSE_MS: u64 = 1_000;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Keyboard-wedge barcode capture with WebSocket fan-out.
#[derive(Debug, Parser)]
#[command(
    name = "scanwedge-server",
    about = "Captures barcode scans and broadcasts them to WebSocket subscribers",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "SCANWEDGE_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket server to.
    #[arg(long, env = "SCANWEDGE_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "SCANWEDGE_PORT")]
    port: Option<u16>,

    /// Maximum gap between keys of one scan, in milliseconds.
    #[arg(long, env = "SCANWEDGE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Shortest accepted barcode, in characters.
    #[arg(long, env = "SCANWEDGE_MIN_LENGTH")]
    min_length: Option<usize>,

    /// Longest accepted barcode, in characters.
    #[arg(long, env = "SCANWEDGE_MAX_LENGTH")]
    max_length: Option<usize>,

    /// Frames buffered per subscriber before it is dropped.
    #[arg(long, env = "SCANWEDGE_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Ping interval in seconds.
    #[arg(long, env = "SCANWEDGE_PING_PERIOD")]
    ping_period: Option<u64>,

    /// Seconds to wait for a pong before dropping a subscriber.
    #[arg(long, env = "SCANWEDGE_PONG_WAIT")]
    pong_wait: Option<u64>,

    /// Replay barcodes from a file (one per line) instead of hooking the keyboard.
    #[arg(long, env = "SCANWEDGE_REPLAY")]
    replay: Option<PathBuf>,

    /// Do not install the keyboard hook.
    #[arg(long, env = "SCANWEDGE_NO_HOOK")]
    no_hook: bool,

    /// Save the effective settings to the config file and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Overlays the options that were given onto `file`.
    fn apply_to(&self, file: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            file.server.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            file.server.port = port;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            file.scanner.timeout_ms = timeout_ms;
        }
        if let Some(min_length) = self.min_length {
            file.scanner.min_length = min_length;
        }
        if let Some(max_length) = self.max_length {
            file.scanner.max_length = max_length;
        }
        if let Some(queue_capacity) = self.queue_capacity {
            file.websocket.queue_capacity = queue_capacity;
        }
        if let Some(ping_period) = self.ping_period {
            file.websocket.ping_period_secs = ping_period;
        }
        if let Some(pong_wait) = self.pong_wait {
            file.websocket.pong_wait_secs = pong_wait;
        }
        if self.no_hook {
            file.scanner.enable_hook = false;
        }
    }

    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no --config given and no platform config dir"),
        }
    }
}

/// Validates `file` and writes it to `path`.
fn write_effective_config(path: &Path, file: &AppConfig) -> anyhow::Result<()> {
    file.to_service_config().context("refusing to save invalid configuration")?;
    save_config(path, file)
        .with_context(|| format!("failed to write config to {}", path.display()))
}

/// Picks the key event source: a replay file, the OS hook, or nothing.
fn select_source(
    replay: Option<&PathBuf>,
    enable_hook: bool,
) -> anyhow::Result<Option<Box<dyn KeyEventSource>>> {
    if let Some(path) = replay {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        let source = ScriptedKeySource::from_lines(text.lines(), REPLAY_KEY_GAP_MS, REPLAY_PAUSE_MS)
            .paced();
        info!(path = %path.display(), keys = source.remaining(), "replaying scans from file");
        return Ok(Some(Box::new(source)));
    }

    if !enable_hook {
        info!("keyboard hook disabled; serving subscribers only");
        return Ok(None);
    }

    match platform_source() {
        Ok(source) => Ok(Some(source)),
        Err(e) => {
            warn!("keyboard capture unavailable: {e}; serving subscribers only");
            Ok(None)
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path()?;
    let mut file = load_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    cli.apply_to(&mut file);

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file.server.log_level)),
        )
        .init();

    if cli.write_config {
        write_effective_config(&config_path, &file)?;
        info!(path = %config_path.display(), "configuration written");
        return Ok(());
    }

    let config = file.to_service_config().context("invalid configuration")?;
    info!(
        bind = %config.bind_addr,
        config = %config_path.display(),
        "ScanWedge server starting"
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let hub = Hub::spawn(config.hub);
    let listener = bind(config.bind_addr).await?;

    // ── Capture pipeline ──────────────────────────────────────────────────────
    let pipeline_task = select_source(cli.replay.as_ref(), config.enable_hook)?.map(|mut source| {
        let pipeline = ScanPipeline::new(config.assembler, Arc::new(hub.clone()));
        tokio::spawn(async move {
            let report = pipeline.run(source.as_mut()).await;
            source.stop();
            report
        })
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    serve(listener, hub.clone(), config.session, running).await;

    if let Some(task) = pipeline_task {
        // Aborting drops the source, which unhooks the keyboard.
        task.abort();
        if let Ok(report) = task.await {
            info!(?report, "capture pipeline finished");
        }
    }

    match hub.shutdown().await {
        Ok(closed) => info!(closed, "all subscribers closed"),
        Err(e) => warn!("hub shutdown: {e}"),
    }

    info!("ScanWedge server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
