use clap::Parser;
use log::{error, info};
use rlnc_mux::config::Config;
use rlnc_mux::transport::{LoopbackTunnel, TransportLoop};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Local UDP address to bind
    #[clap(long, default_value = "0.0.0.0:0")]
    local: String,

    /// Remote UDP address framed datagrams are exchanged with
    #[clap(long)]
    remote: Option<String>,

    /// Path to a TOML config file (spec.md §6 options)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                error!("failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        std::process::exit(1);
    }

    let socket = match tokio::net::UdpSocket::bind(&cli.local).await {
        Ok(s) => s,
        Err(e) => {
            error!("failed to bind {}: {e}", cli.local);
            std::process::exit(1);
        }
    };
    info!("bound local UDP socket on {}", cli.local);
    if let Some(remote) = &cli.remote {
        info!("will exchange framed datagrams with {remote}");
    }

    // No real tunnel device is wired up in this harness; a concrete
    // deployment replaces LoopbackTunnel with a TUN/TAP device.
    let (tunnel, _tx, _rx) = LoopbackTunnel::pair();
    let mut transport_loop = TransportLoop::new(tunnel, socket, &config);

    let mut tunnel_buf = vec![0u8; config.packet_length];
    let mut udp_buf = vec![0u8; config.packet_length + 64];
    loop {
        tokio::select! {
            res = transport_loop.run_once(&mut tunnel_buf, &mut udp_buf) => {
                if let Err(e) = res {
                    error!("transport loop iteration failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down on ctrl-c");
                break;
            }
        }
    }
}
