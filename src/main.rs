//! ipho-relay - forwards photobooth events to a display client.
//!
//! This is the main binary entry point. See the `ipho_relay` library for
//! the relay itself.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ipho_relay::{Config, Receiver, Relay};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "ipho-relay")]
#[command(version)]
#[command(about = "Relays photobooth events and photos to a display client")]
struct Cli {
    /// Write logs to this file instead of stderr (also: IPHO_LOG_FILE)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay, reading commands from FIFO
    Serve {
        /// Named pipe the photobooth writes commands into (created if missing)
        fifo: PathBuf,
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,
        /// Data channel port
        #[arg(long)]
        data_port: Option<u16>,
        /// Heartbeat channel port
        #[arg(long)]
        heartbeat_port: Option<u16>,
    },
    /// Connect to a relay as a display client and store delivered photos
    Receive {
        /// Relay host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Data channel port
        #[arg(long)]
        data_port: Option<u16>,
        /// Heartbeat channel port
        #[arg(long)]
        heartbeat_port: Option<u16>,
        /// Directory delivered photos are written to
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

fn init_logging(log_file: Option<PathBuf>) -> Result<()> {
    let log_path = log_file.or_else(|| std::env::var_os("IPHO_LOG_FILE").map(PathBuf::from));

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    if let Some(path) = log_path {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn spawn_signal_handler() -> Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("Received signal {signal}, shutting down");
                std::process::exit(0);
            }
        })
        .context("Failed to spawn signal-handler thread")?;
    Ok(())
}

fn serve(
    fifo: PathBuf,
    bind: Option<String>,
    data_port: Option<u16>,
    heartbeat_port: Option<u16>,
) -> Result<()> {
    let mut config = Config::load()?;
    config.fifo_path = Some(fifo);
    if let Some(bind) = bind {
        config.bind_address = bind;
    }
    if let Some(port) = data_port {
        config.data_port = port;
    }
    if let Some(port) = heartbeat_port {
        config.heartbeat_port = port;
    }

    spawn_signal_handler()?;
    log::info!("ipho-relay v{} starting", env!("CARGO_PKG_VERSION"));
    Relay::new(config)?.run()
}

fn receive(
    host: &str,
    data_port: Option<u16>,
    heartbeat_port: Option<u16>,
    out_dir: PathBuf,
) -> Result<()> {
    let config = Config::load()?;
    let ip = host
        .parse()
        .with_context(|| format!("Invalid relay host address: {host}"))?;
    let data_addr = SocketAddr::new(ip, data_port.unwrap_or(config.data_port));
    let heartbeat_addr = SocketAddr::new(ip, heartbeat_port.unwrap_or(config.heartbeat_port));

    spawn_signal_handler()?;
    Receiver::new(data_addr, heartbeat_addr, out_dir).run()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file)?;

    // Log panics before the default hook prints them
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {:?}", panic_info);
        default_hook(panic_info);
    }));

    match cli.command {
        Commands::Serve {
            fifo,
            bind,
            data_port,
            heartbeat_port,
        } => serve(fifo, bind, data_port, heartbeat_port)?,
        Commands::Receive {
            host,
            data_port,
            heartbeat_port,
            out_dir,
        } => receive(&host, data_port, heartbeat_port, out_dir)?,
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
