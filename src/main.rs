use clap::{Parser, Subcommand};
use serde_json::json;
use serial_iface::config::{Config, ConfigLoader};
use serial_iface::port::{
    select_with, AsyncSerialInterface, BackendKind, BlockingInterfaceWrapper, EventKind,
    SerialInterfaceExt,
};
use serial_iface::{logging, AppError, AppResult, PortError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "serial-iface",
    version,
    about = "Inspect serial ports through the native or virtual backend."
)]
struct Cli {
    /// Configuration file (overrides the standard search path).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend to use (overrides backend.kind).
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List addressable port names.
    List,
    /// Open a port, apply the configured line parameters and report its state.
    Probe {
        /// Port name or alias (defaults to serial.default_port).
        port: Option<String>,
    },
    /// Write TEXT, wait for it to come back, and report what was read.
    Loopback {
        /// Port name or alias (defaults to serial.default_port).
        port: Option<String>,
        /// Payload to send.
        text: String,
        /// Give up waiting after this many milliseconds.
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
    }

    logging::init(&config.logging, cli.verbose);
    debug!("Using {} backend", config.backend.kind);

    match cli.command {
        Command::List => list(&config),
        Command::Probe { port } => probe(&config, port).await,
        Command::Loopback {
            port,
            text,
            timeout_ms,
        } => loopback(&config, port, &text, Duration::from_millis(timeout_ms)).await,
    }
}

fn port_name(config: &Config, requested: Option<String>) -> AppResult<String> {
    requested
        .or_else(|| config.serial.default_port.clone())
        .map(|name| config.serial.resolve_port(&name))
        .ok_or(AppError::NoPortSpecified)
}

fn wrapper(config: &Config) -> BlockingInterfaceWrapper {
    BlockingInterfaceWrapper::from(select_with(
        config.backend.kind,
        &config.backend_options(),
    ))
}

fn list(config: &Config) -> AppResult<()> {
    let port = select_with(config.backend.kind, &config.backend_options());
    let names = port.list_port_names()?;
    println!("{}", serde_json::to_string_pretty(&names)?);
    Ok(())
}

async fn probe(config: &Config, requested: Option<String>) -> AppResult<()> {
    let name = port_name(config, requested)?;
    let port = wrapper(config);
    let params = config.serial.to_params();

    let sync = port.inner().clone();
    let handle = tokio::task::spawn_blocking({
        let name = name.clone();
        let exclusive = config.serial.exclusive;
        let params = params.clone();
        move || sync.open_configured(&name, exclusive, &params)
    })
    .await
    .map_err(|e| PortError::Io(std::io::Error::other(e)))??;
    info!("Probing {} ({})", name, handle);

    let lines = port.lines_status(handle).await;
    let counts = port.buffer_counts(handle).await;
    port.close(handle).await?;

    let report = json!({
        "port": name,
        "backend": config.backend.kind,
        "params": params,
        "lines": lines?,
        "buffers": counts?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn loopback(
    config: &Config,
    requested: Option<String>,
    text: &str,
    timeout: Duration,
) -> AppResult<()> {
    let name = port_name(config, requested)?;
    let port = wrapper(config);

    let handle = port.open(&name, config.serial.exclusive).await?;
    if let Err(e) = port.set_params(handle, config.serial.to_params()).await {
        let _ = port.close(handle).await;
        return Err(e.into());
    }

    let result = exchange(&port, handle, text, timeout).await;
    port.close(handle).await?;
    let (events, received) = result?;

    let report = json!({
        "port": name,
        "backend": config.backend.kind,
        "sent": text,
        "events": events,
        "received": String::from_utf8_lossy(&received),
        "received_len": received.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Write `text`, then collect events until data arrives or `timeout` elapses.
async fn exchange(
    port: &BlockingInterfaceWrapper,
    handle: serial_iface::PortHandle,
    text: &str,
    timeout: Duration,
) -> AppResult<(Vec<serial_iface::EventRecord>, Vec<u8>)> {
    port.write(handle, text.as_bytes()).await?;

    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let batch = port.wait_events_timeout(handle, remaining).await?;
        let data_ready = batch.iter().any(|e| e.kind == EventKind::RxChar);
        events.extend(batch);
        if data_ready {
            break;
        }
    }

    let sync = port.inner().clone();
    let received = tokio::task::spawn_blocking(move || sync.read_available(handle))
        .await
        .map_err(|e| PortError::Io(std::io::Error::other(e)))??;
    Ok((events, received))
}
