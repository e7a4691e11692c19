//! Newline-delimited JSON over an async byte stream.
//!
//! Used for stdio pipes between a host and a child process, but works with
//! any `AsyncRead`/`AsyncWrite` pair. Two tasks are spawned:
//! - a reader that decodes one packet per line and feeds the router
//! - a writer that drains an unbounded queue, so `send` never blocks

use std::sync::Arc;

use bridge_protocol::{codec, Packet};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{Inbox, Transport, TransportError};
use crate::rpc::PacketRouter;

/// Stream-backed transport. Cheap to clone.
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    inbox: Arc<Inbox>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<Result<(), TransportError>>>>,
}

impl StreamTransport {
    /// Start the reader and writer tasks on the current Tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W) -> Result<Self, TransportError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let inbox = Arc::new(Inbox::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let reader_task = runtime.spawn(read_loop(reader, inbox.clone()));
        let writer_task = runtime.spawn(write_loop(writer, rx));

        Ok(Self {
            inner: Arc::new(StreamInner {
                inbox,
                outbound: Mutex::new(Some(tx)),
                reader: Mutex::new(Some(reader_task)),
                writer: Mutex::new(Some(writer_task)),
            }),
        })
    }

    /// Bind to this process's stdin/stdout.
    pub fn stdio() -> Result<Self, TransportError> {
        Self::spawn(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Stop accepting packets, flush everything queued, and shut the writer down.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.inner.outbound.lock().take();
        let writer = self.inner.writer.lock().take();
        match writer {
            Some(task) => task.await.map_err(|e| TransportError::Callback(e.to_string()))?,
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.outbound.lock().is_none()
    }

    /// Resolve once the peer closes its end of the read stream.
    pub async fn closed(&self) {
        let reader = self.inner.reader.lock().take();
        if let Some(task) = reader {
            if let Err(e) = task.await {
                warn!(error = %e, "stream reader task failed");
            }
        }
    }
}

impl Transport for StreamTransport {
    fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        let line = codec::encode_line(packet)?;
        let outbound = self.inner.outbound.lock();
        let tx = outbound.as_ref().ok_or(TransportError::Closed)?;
        tx.send(line).map_err(|_| TransportError::Closed)
    }

    fn register_handler(&self, router: PacketRouter) {
        self.inner.inbox.register(router);
    }

    fn unregister_handler(&self) {
        self.inner.inbox.unregister();
    }
}

async fn read_loop<R>(reader: R, inbox: Arc<Inbox>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                trace!(%line, "inbound line");
                match codec::decode_line(&line) {
                    Ok(value) => {
                        if let Err(e) = inbox.deliver(value) {
                            warn!(error = %e, "inbound packet rejected");
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping undecodable line"),
                }
            }
            Ok(None) => {
                debug!("inbound stream reached EOF");
                return;
            }
            Err(e) => {
                warn!(error = %e, "inbound stream failed");
                return;
            }
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
