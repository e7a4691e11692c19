//! Bridge Peer Entrypoint
//!
//! Usage: bridge-peer [--max-request-time MS] [--max-sleep-ms MS]
//!
//! Serves the built-in service over newline-delimited JSON packets on
//! stdin/stdout until stdin closes. Logs go to stderr.

use std::process::ExitCode;
use std::time::Duration;

use bridge_peer::{serve_stdio, PeerServiceConfig};
use bridge_rpc::{MaxRequestTime, RpcConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bridge-peer")]
#[command(about = "Serve the reference bridge peer over stdin/stdout", version)]
struct Args {
    /// Timeout for requests the peer makes, in milliseconds or "infinite"
    #[arg(long)]
    max_request_time: Option<MaxRequestTime>,

    /// Longest `sleep` request the peer will honour, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    max_sleep_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    bridge_rpc::logging::init(&args.log);

    let mut rpc = RpcConfig::default();
    if let Some(limit) = args.max_request_time {
        rpc.max_request_time = limit;
    }
    let config = PeerServiceConfig {
        rpc,
        max_sleep: Duration::from_millis(args.max_sleep_ms),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = runtime.block_on(serve_stdio(config)) {
        eprintln!("Peer error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
