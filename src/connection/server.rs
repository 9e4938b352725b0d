//! WebSocket server
//!
//! Accepts clients on a TCP listener and runs a reader and a writer task
//! per socket. Readers hand inbound frames to the `ConnectionManager`;
//! writers forward whatever the tick queues for that client. If the
//! listener itself fails, the whole server is torn down and bound again.

use super::manager::ConnectionManager;
use crate::app::config::ServerSettings;
use crate::Result;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Wait between attempts to bind the listener
const REBIND_DELAY: Duration = Duration::from_secs(1);

/// Source of accepted TCP streams for `WebSocketServer::serve`
pub trait Acceptor: Send {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

pub struct WebSocketServer {
    settings: ServerSettings,
    manager: Arc<ConnectionManager>,
}

impl WebSocketServer {
    pub fn new(settings: ServerSettings, manager: Arc<ConnectionManager>) -> Self {
        Self { settings, manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.settings.socket_address();
        let listener = TcpListener::bind(&address).await?;
        info!(address = %listener.local_addr()?, "Listening for clients");
        Ok(listener)
    }

    /// Serve until `shutdown` flips to true, rebinding whenever the
    /// listener stops working
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.run_with(shutdown, || self.bind()).await
    }

    /// `run` with the listener produced by `bind`. A failure of the first
    /// bind is returned; later failures are retried.
    pub async fn run_with<L, F, Fut>(&self, mut shutdown: watch::Receiver<bool>, mut bind: F) -> Result<()>
    where
        L: Acceptor,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<L>>,
    {
        let mut initialised = false;

        while !*shutdown.borrow() {
            let listener = match bind().await {
                Ok(listener) => listener,
                Err(e) if initialised => {
                    warn!(error = %e, "Could not rebind listener, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(REBIND_DELAY) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
                Err(e) => return Err(e),
            };
            initialised = true;

            match self.serve(listener, &mut shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, "Listener stopped, reinitialising server");
                    self.manager.close_all();
                }
            }
        }

        self.manager.close_all();
        info!("Server stopped");
        Ok(())
    }

    /// Accept on one listener until shutdown or a listener failure
    pub async fn serve<L: Acceptor>(&self, mut listener: L, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let manager = Arc::clone(&self.manager);
                        let max_message_bytes = self.settings.max_message_bytes;
                        tokio::spawn(async move {
                            if let Err(e) = handle_socket(stream, peer, manager, max_message_bytes).await {
                                debug!(peer = %peer, error = %e, "Socket closed with error");
                            }
                        });
                    }
                    Err(e) if is_transient(&e) => {
                        debug!(error = %e, "Transient accept error");
                    }
                    Err(e) => return Err(e.into()),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

async fn handle_socket(
    stream: TcpStream,
    peer: SocketAddr,
    manager: Arc<ConnectionManager>,
    max_message_bytes: usize,
) -> Result<()> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(max_message_bytes);
    ws_config.max_frame_size = Some(max_message_bytes);

    let socket = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await?;
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = manager.add_connection(tx);
    debug!(client_id = %id, peer = %peer, "WebSocket upgraded");

    // Ends when the manager drops the sender or the socket stops taking writes
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut result = Ok(());
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => manager.on_message(id, &text),
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => debug!(client_id = %id, "Ignoring binary frame"),
            Ok(_) => {}
            Err(e) => {
                result = Err(e.into());
                break;
            }
        }
    }

    manager.remove_connection(id);
    if writer.await.is_err() {
        warn!(client_id = %id, "Writer task panicked");
    }
    result
}
