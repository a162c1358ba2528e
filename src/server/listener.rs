use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::http::parser::ParseError;
use crate::http::request::Request;
use crate::http::response::{self, StatusCode};
use crate::http::writer::ResponseWriter;

/// Per-request callback.
///
/// Receives the parsed request and a writer bound to the same connection,
/// and is expected to drive the writer through a full legal write sequence
/// before returning. Blanket-implemented for async closures.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        writer: ResponseWriter<TcpStream>,
        request: Request,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(ResponseWriter<TcpStream>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn handle(
        &self,
        writer: ResponseWriter<TcpStream>,
        request: Request,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        self(writer, request)
    }
}

/// Handle to a running HTTP/1.1 server.
///
/// The accept loop runs in its own task; each accepted connection gets its
/// own task with exclusive ownership of its parser buffer and writer, so no
/// locking exists across connections. The `closed` flag is the only shared
/// synchronization point: it is set before the listener is released so the
/// accept loop can tell a shutdown apart from an unexpected accept failure.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Binds `addr` and starts accepting connections in a background task.
    pub async fn serve<H: Handler>(addr: &str, handler: H) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local_addr = listener.local_addr().context("no local address")?;
        info!("listening on {local_addr}");

        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(handler),
            Arc::clone(&closed),
            Arc::clone(&shutdown),
        ));

        Ok(Self {
            local_addr,
            closed,
            shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and releases the listening socket.
    ///
    /// In-flight connections are not cancelled; they run to their natural
    /// completion and close themselves.
    pub async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
        let _ = self.accept_task.await;
        info!("listener closed");
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,

            res = listener.accept() => {
                match res {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handler).await {
                                warn!(%peer, "connection error: {e:#}");
                            }
                        });
                    }
                    Err(e) => {
                        if closed.load(Ordering::SeqCst) {
                            break;
                        }
                        error!("accept error: {e}");
                    }
                }
            }
        }
    }
    // Dropping the listener here releases the port.
}

/// Drives one connection: parse the request to completion, then hand the
/// writer to the handler. A malformed request gets a bare 400 status line,
/// best effort, and the connection is closed without invoking the handler.
async fn handle_connection<H: Handler>(
    mut stream: TcpStream,
    handler: Arc<H>,
) -> anyhow::Result<()> {
    let request = match Request::from_stream(&mut stream).await {
        Ok(request) => request,
        Err(ParseError::Io(e)) => {
            return Err(anyhow::Error::new(e).context("reading request"));
        }
        Err(e) => {
            warn!("rejecting malformed request: {e}");
            let _ = response::write_status_line(&mut stream, StatusCode::BadRequest).await;
            return Ok(());
        }
    };

    let writer = ResponseWriter::new(stream);
    handler.handle(writer, request).await
}
