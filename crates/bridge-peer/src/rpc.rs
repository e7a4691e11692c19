//! Peer stdio loop
//!
//! Serves the built-in service over newline-delimited JSON until the host
//! closes the input stream.

use bridge_rpc::{RpcError, StreamTransport, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::config::PeerServiceConfig;
use crate::service::build_peer;

/// Peer errors
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("failed to build peer service: {0}")]
    Build(#[from] RpcError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Serve on this process's stdin/stdout.
pub async fn serve_stdio(config: PeerServiceConfig) -> Result<(), PeerError> {
    serve(tokio::io::stdin(), tokio::io::stdout(), config).await
}

/// Serve on an arbitrary stream pair, returning once `reader` hits EOF.
pub async fn serve<R, W>(reader: R, writer: W, config: PeerServiceConfig) -> Result<(), PeerError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let peer = build_peer(&config)?;
    let transport = StreamTransport::spawn(reader, writer)?;
    peer.set_transport(transport.clone());
    info!("peer ready");

    transport.closed().await;

    // In-flight handlers answer before the writer shuts down.
    peer.rpc().drain_handlers().await;
    transport.close().await?;
    info!("peer input closed; exiting");
    Ok(())
}
