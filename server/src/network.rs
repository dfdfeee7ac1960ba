//! WebSocket accept loop and per-connection plumbing.
//!
//! Each connection gets a reader and a writer task. Reading and JSON
//! parsing happen in parallel across connections, but every resulting state
//! change is shipped to the session task as a [`SessionCommand`], so the
//! shared state stays single-writer.

use crate::session::SessionCommand;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, PlayerId};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

/// Bound listener, separated from the accept loop so callers (and tests)
/// can learn the local address before serving.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process ends, spawning one handler
    /// task per socket. Accept errors are transient; log and keep serving.
    pub async fn run(self, commands: mpsc::UnboundedSender<SessionCommand>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(stream, peer, commands.clone()));
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Drives one connection from WebSocket handshake to disconnect cleanup.
///
/// Socket errors and orderly closes end up on the same path: the reader
/// loop exits and a single Disconnect command is sent. The writer task
/// finishes on its own once the registry drops the outbound sender.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    commands: mpsc::UnboundedSender<SessionCommand>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket handshake failed with {}: {}", peer, e);
            return;
        }
    };
    debug!("websocket established with {}", peer);

    let (mut write, mut read) = ws_stream.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (ack, assigned) = oneshot::channel();

    if commands
        .send(SessionCommand::Connect { outbound, ack })
        .is_err()
    {
        return;
    }
    let id = match assigned.await {
        Ok(id) => id,
        Err(_) => return,
    };

    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if write.send(message).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch(&commands, id, text.as_bytes()),
            Ok(Message::Binary(bytes)) => dispatch(&commands, id, &bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong frames carry no application data
            Err(e) => {
                debug!("connection {} errored: {}", id, e);
                break;
            }
        }
    }

    let _ = commands.send(SessionCommand::Disconnect { id });
}

/// Parses one inbound frame and forwards it as a command. A malformed
/// payload is logged and dropped; the connection stays open.
fn dispatch(commands: &mpsc::UnboundedSender<SessionCommand>, id: PlayerId, payload: &[u8]) {
    let message = match serde_json::from_slice::<ClientMessage>(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!("dropping malformed message from {}: {}", id, e);
            return;
        }
    };

    let command = match message {
        ClientMessage::Player(update) => SessionCommand::PlayerUpdate { id, update },
        ClientMessage::Start(command) => SessionCommand::Start { id, command },
        ClientMessage::ScreenData(data) => SessionCommand::ScreenData { id, data },
        ClientMessage::ClearWorld(data) => SessionCommand::ClearWorld { id, data },
    };
    if commands.send(command).is_err() {
        debug!("session loop gone, dropping message from {}", id);
    }
}
