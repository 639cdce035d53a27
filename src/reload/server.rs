//! WebSocket dev server for change signals.

use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::DevServer;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Broadcast-only WebSocket server. Clients connect from the injected
/// browser snippet; every change signal goes to all of them.
pub struct WsServer {
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
    port: u16,
}

impl WsServer {
    /// Bind and start accepting on a background thread. Retries upward
    /// from `base_port` when the port is taken.
    pub fn start(base_port: u16) -> Result<Self> {
        let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;

        let clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>> = Arc::new(Mutex::new(Vec::new()));

        let acceptor_clients = Arc::clone(&clients);
        std::thread::spawn(move || {
            loop {
                if crate::core::is_shutdown() {
                    break;
                }
                match listener.accept() {
                    Ok((stream, addr)) => {
                        debug!("reload"; "client connected: {}", addr);
                        match tungstenite::accept(stream) {
                            Ok(ws) => acceptor_clients.lock().push(ws),
                            Err(e) => {
                                log!("reload"; "handshake failed: {}", e);
                            }
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(std::time::Duration::from_millis(100));
                    }
                    Err(e) => {
                        log!("reload"; "accept error: {}", e);
                        std::thread::sleep(std::time::Duration::from_millis(100));
                    }
                }
            }
        });

        Ok(Self { clients, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn broadcast(&self, msg: &Message) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            debug!("reload"; "no clients connected");
            return;
        }
        clients.retain_mut(|ws| match ws.send(msg.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
    }
}

impl DevServer for WsServer {
    fn mark_changed(&self, path: &Path) {
        let payload = serde_json::json!({
            "type": "update",
            "path": path.display().to_string(),
        })
        .to_string();
        self.broadcast(&Message::Text(payload.into()));
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(format!("127.0.0.1:{}", port)) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                return Ok((listener, port));
            }
            Err(e) => {
                last_error = Some(e);
            }
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind reload server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
