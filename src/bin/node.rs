//! noxious chat node
//!
//! Accepts signed introductions on `POST /` and keeps the resulting
//! contact registry in memory for the lifetime of the process.
//!
//! Usage:
//!   noxious-node [--addr 0.0.0.0:1111] [--priv-key PATH] [--pub-key PATH]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::Parser;
use noxious::contacts::ContactRegistry;
use noxious::crypto::{Identity, DEFAULT_KEY_BITS};
use noxious::server::{self, AppState};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// noxious chat node
#[derive(Parser)]
#[command(name = "noxious-node")]
#[command(about = "Chat node accepting signed peer introductions")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:1111")]
    addr: String,

    /// PEM private key used to sign this node's messages
    #[arg(long)]
    priv_key: Option<PathBuf>,

    /// PEM public key peers use to encrypt messages to this node
    #[arg(long)]
    pub_key: Option<PathBuf>,

    /// RSA key size used when no key pair exists yet
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    key_bits: usize,

    /// Seconds to let in-flight requests finish after Ctrl-C
    #[arg(long, default_value = "5")]
    shutdown_timeout: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn default_key_path(file: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".noxious")
        .join(file)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("noxious={level},noxious_node={level}")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let priv_key = args.priv_key.unwrap_or_else(|| default_key_path("privkey.pem"));
    let pub_key = args.pub_key.unwrap_or_else(|| default_key_path("pubkey.pem"));

    info!("Starting noxious node, listening on {}", args.addr);
    debug!(
        "start time: {:?}, listen: {}, privkey: {}, pubkey: {}",
        SystemTime::now(),
        args.addr,
        priv_key.display(),
        pub_key.display()
    );

    let identity = match Identity::load_or_generate(&priv_key, &pub_key, args.key_bits) {
        Ok((identity, true)) => {
            info!("Generated new key pair at {}", priv_key.display());
            identity
        }
        Ok((identity, false)) => identity,
        Err(e) => {
            error!("Failed to load key pair: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Node key fingerprint: {}", identity.public_key().fingerprint());

    let listener = match TcpListener::bind(&args.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", args.addr, e);
            return ExitCode::FAILURE;
        }
    };

    // One registry for the whole process
    let state = AppState::new(Arc::new(ContactRegistry::new()));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(server::serve(listener, state, async {
        let _ = stop_rx.await;
    }));

    tokio::select! {
        result = &mut server => {
            error!("Server stopped unexpectedly: {:?}", result);
            return ExitCode::FAILURE;
        }
        _ = shutdown_signal() => {}
    }

    info!("Shutting down, draining for up to {}s", args.shutdown_timeout);
    let _ = stop_tx.send(());

    match tokio::time::timeout(Duration::from_secs(args.shutdown_timeout), server).await {
        Ok(Ok(Ok(()))) => {
            info!("Ending noxious node");
            ExitCode::SUCCESS
        }
        Ok(Ok(Err(e))) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            error!("Server task failed: {}", e);
            ExitCode::FAILURE
        }
        Err(_) => {
            warn!("Drain timeout elapsed, abandoning in-flight requests");
            ExitCode::SUCCESS
        }
    }
}
