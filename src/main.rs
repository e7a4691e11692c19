//! Bridge CLI
//!
//! Entry point for the `bridge` command-line tool. Spawns a peer process,
//! speaks line-delimited JSON packets over its stdin/stdout, and prints
//! results as JSON.

use std::path::PathBuf;
use std::process::{self, Stdio};
use std::time::Duration;

use bridge_rpc::config::{overlay_at, ConfigError, EffectiveConfig, PeerConfig};
use bridge_rpc::{MaxRequestTime, RpcError, RpcInstance, RpcOptions, StreamTransport, TransportError};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Config file picked up when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "bridge.toml";

/// How long the peer gets to exit after its stdin closes.
const PEER_EXIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Call methods and send messages on a bridge RPC peer", version)]
struct Cli {
    /// Path to config file (default: bridge.toml when present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Request timeout in milliseconds, or "infinite"
    #[arg(long, global = true)]
    max_request_time: Option<MaxRequestTime>,

    /// Largest request id before the counter wraps to zero
    #[arg(long, global = true)]
    max_request_id: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a method on the peer and print its result
    Call {
        #[command(flatten)]
        peer: PeerArgs,

        /// Method name
        method: String,

        /// Params as JSON (default: null)
        params: Option<String>,
    },

    /// Send a fire-and-forget message to the peer
    Emit {
        #[command(flatten)]
        peer: PeerArgs,

        /// Message name
        name: String,

        /// Payload as JSON (default: null)
        payload: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct PeerArgs {
    /// Peer program to spawn (default: peer.program from config)
    #[arg(long)]
    exec: Option<String>,

    /// Extra arguments passed to the peer program
    #[arg(long = "exec-arg", allow_hyphen_values = true)]
    exec_args: Vec<String>,
}

/// CLI errors
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("invalid JSON argument: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to spawn peer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Rpc(#[from] RpcError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Rpc(e) => e.exit_code(),
            CliError::Transport(_) | CliError::Spawn { .. } => 20,
            CliError::Config(_) | CliError::Json(_) => 1,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let effective = match load_config(&cli) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let filter = effective.get_str("log.filter").unwrap_or("info").to_string();
    bridge_rpc::logging::init(&filter);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    let outcome = match cli.command {
        Commands::Call { peer, method, params } => {
            runtime.block_on(run_call(&effective, peer, &method, params.as_deref()))
        }
        Commands::Emit { peer, name, payload } => {
            runtime.block_on(run_emit(&effective, peer, &name, payload.as_deref()))
        }
        Commands::Config => print_json(&effective),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn load_config(cli: &Cli) -> Result<EffectiveConfig, ConfigError> {
    let path = cli
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()));

    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(ConfigError::IoError(format!("{} does not exist", path.display())));
        }
    }

    let mut overrides = Value::Object(Default::default());
    if let Some(limit) = cli.max_request_time {
        let value = serde_json::to_value(limit).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        overrides = bridge_rpc::config::deep_merge(overrides, overlay_at("rpc.max_request_time", value));
    }
    if let Some(max) = cli.max_request_id {
        overrides = bridge_rpc::config::deep_merge(overrides, overlay_at("rpc.max_request_id", max.into()));
    }
    let overrides = match &overrides {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(overrides),
    };

    EffectiveConfig::build(path.as_deref(), overrides)
}

fn parse_json(arg: Option<&str>) -> Result<Value, CliError> {
    match arg {
        Some(text) => Ok(serde_json::from_str(text)?),
        None => Ok(Value::Null),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A running peer process and the instance talking to it.
struct PeerSession {
    child: Child,
    transport: StreamTransport,
    rpc: RpcInstance,
}

impl PeerSession {
    fn start(effective: &EffectiveConfig, args: PeerArgs) -> Result<Self, CliError> {
        let rpc_config = effective.rpc_config()?;
        let mut peer: PeerConfig = effective.peer_config()?;
        if let Some(program) = args.exec {
            peer.program = program;
            peer.args.clear();
        }
        peer.args.extend(args.exec_args);

        debug!(program = %peer.program, args = ?peer.args, "spawning peer");
        let mut child = Command::new(&peer.program)
            .args(&peer.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CliError::Spawn {
                program: peer.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(CliError::Spawn {
                program: peer.program,
                source: std::io::Error::other("peer stdio was not captured"),
            });
        };

        let transport = StreamTransport::spawn(stdout, stdin)?;
        let rpc = RpcInstance::new(RpcOptions::from_config(&rpc_config).transport(transport.clone()));

        Ok(Self { child, transport, rpc })
    }

    /// Close the peer's stdin and give it a moment to exit.
    async fn finish(mut self) {
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "closing peer stdin failed");
        }
        match tokio::time::timeout(PEER_EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "peer exited"),
            Ok(Err(e)) => warn!(error = %e, "waiting for peer failed"),
            Err(_) => {
                warn!("peer did not exit after stdin closed; killing it");
                let _ = self.child.kill().await;
            }
        }
    }
}

async fn run_call(
    effective: &EffectiveConfig,
    peer: PeerArgs,
    method: &str,
    params: Option<&str>,
) -> Result<(), CliError> {
    let params = parse_json(params)?;
    let session = PeerSession::start(effective, peer)?;

    let result = session.rpc.request(method, params).await;
    session.finish().await;

    print_json(&result?)
}

async fn run_emit(
    effective: &EffectiveConfig,
    peer: PeerArgs,
    name: &str,
    payload: Option<&str>,
) -> Result<(), CliError> {
    let payload = parse_json(payload)?;
    let session = PeerSession::start(effective, peer)?;

    let sent = session.rpc.emit(name, payload);
    session.finish().await;

    sent.map_err(CliError::from)
}
