//! mtu1280 daemon binary
//!
//! Loads configuration, binds the netfilter queue and runs the enforcer
//! until Ctrl+C or SIGTERM.

use clap::Parser;
use mtu1280::{
    resolve_interface, Config, Enforcer, EnforcerError, FrameSink, MacAddr, NfQueue, NullSink,
    PacketSocket, ReplySynthesizer, Settings,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Answer oversized IPv6 packets with ICMPv6 Packet Too Big
#[derive(Parser, Debug)]
#[command(name = "mtu1280", version, about)]
struct Args {
    /// Interface the queued packets arrive on
    interface: Option<String>,

    /// NFQUEUE number (ip6tables -j NFQUEUE --queue-num N)
    queue: Option<u16>,

    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// MTU advertised in Packet Too Big replies
    #[arg(long)]
    mtu: Option<u16>,

    /// Build replies but do not send them
    #[arg(long)]
    no_transmit: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(interface) = &self.interface {
            config.interface = Some(interface.clone());
        }
        if let Some(queue) = self.queue {
            config.queue.num = Some(queue);
        }
        if let Some(mtu) = self.mtu {
            config.mtu = Some(mtu);
        }
        if self.no_transmit {
            config.link.transmit = Some(false);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("mtu1280 starting");

    // Load configuration
    let (mut config, loaded_paths) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    for path in &loaded_paths {
        info!(path = %path.display(), "Loaded config file");
    }

    args.apply(&mut config);
    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Resolve the interface
    let link = match resolve_interface(&settings.interface).await {
        Ok(link) => link,
        Err(e) => {
            error!("Failed to resolve interface {}: {}", settings.interface, e);
            std::process::exit(1);
        }
    };

    if let Some(link_mtu) = link.mtu {
        if settings.mtu.get() as u32 >= link_mtu {
            warn!(
                mtu = settings.mtu.get(),
                link_mtu,
                "Advertised MTU is not below the interface MTU, replies will not clamp anything"
            );
        }
    }

    let local_mac = settings.source_mac.or(link.mac).unwrap_or(MacAddr::ZERO);
    if local_mac.is_zero() {
        warn!(interface = %link.name, "No source MAC address, replies use a zero source");
    }

    info!("Interface:");
    info!("     name: {}", link.name);
    info!("    index: {}", link.index);
    info!("      mac: {}", local_mac);
    info!("  advertised MTU: {}", settings.mtu.get());

    // Bind the queue
    let queue = match NfQueue::open(settings.queue_num, settings.copy_range, settings.recv_timeout) {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to bind queue {}: {}", settings.queue_num, e);
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let synth = ReplySynthesizer::new(settings.mtu, local_mac);

    let worker = if settings.transmit {
        match PacketSocket::open() {
            Ok(sink) => spawn_enforcer(queue, sink, synth, link.index, &shutdown),
            Err(e) => {
                error!("Failed to open packet socket: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        warn!("Transmission disabled, replies are built but not sent");
        spawn_enforcer(queue, NullSink, synth, link.index, &shutdown)
    };

    info!(queue = settings.queue_num, "mtu1280 running, press Ctrl+C to exit");

    let result = wait_for_shutdown(worker, &shutdown, &settings).await;

    match result {
        Ok(()) => info!("mtu1280 shutdown complete"),
        Err(e) => {
            error!("Enforcer failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run the enforcer on the blocking pool.
fn spawn_enforcer<S: FrameSink + Send + 'static>(
    queue: NfQueue,
    sink: S,
    synth: ReplySynthesizer,
    ifindex: u32,
    shutdown: &Arc<AtomicBool>,
) -> JoinHandle<Result<(), EnforcerError>> {
    let shutdown = Arc::clone(shutdown);
    tokio::task::spawn_blocking(move || {
        let mut enforcer = Enforcer::new(queue, sink, synth, ifindex, shutdown);
        enforcer.run()
    })
}

/// Wait for a signal or for the enforcer to stop on its own.
async fn wait_for_shutdown(
    mut worker: JoinHandle<Result<(), EnforcerError>>,
    shutdown: &AtomicBool,
    settings: &Settings,
) -> Result<(), String> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| e.to_string())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
        _ = sigterm.recv() => info!("SIGTERM received"),
        joined = &mut worker => {
            return match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("enforcer task panicked: {}", e)),
            };
        }
    }

    info!(
        timeout_ms = settings.recv_timeout.as_millis() as u64,
        "mtu1280 shutting down"
    );
    shutdown.store(true, Ordering::Relaxed);

    match worker.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("enforcer task panicked: {}", e)),
    }
}
