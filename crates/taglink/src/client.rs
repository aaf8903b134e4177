//! `UdpClient`: the connecting side of the protocol.
//!
//! Lifecycle: [`connect`](UdpClient::connect) opens the socket,
//! [`send_connection_info`](UdpClient::send_connection_info) asks the
//! server for an identity, and [`listen`](UdpClient::listen) starts the
//! receive loop that adopts the assigned id, answers pings, and forwards
//! user messages to the `message` hook. The same task that receives the
//! handshake ack is the one that stamps outbound headers, so no cross-task
//! race exists on the id; embedders sending from elsewhere should wait for
//! the `connected` hook first.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::{lookup_host, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use taglink_wire::{default_capacity, ConnectionInfo, Message, Tag, TagRegistration};

use crate::events::{ClientHooks, ConnectedEvent, DisconnectedEvent};
use crate::ClientError;

/// Client-side id before the server has assigned one.
pub const UNASSIGNED_ID: i16 = -1;

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No socket, or the session has ended.
    Disconnected,
    /// Socket open (or re-registration pending); not yet registered.
    Connecting,
    /// Socket open and usable for sends.
    Connected,
}

/// State shared between the handle and the receive loop task.
struct ClientShared {
    name: String,
    id: AtomicI16,
    state: Mutex<ClientState>,
    hooks: ClientHooks,
}

impl ClientShared {
    fn set_state(&self, state: ClientState) {
        *self.state.lock().expect("client state lock") = state;
    }
}

/// A tagged-message client over a connected UDP socket.
pub struct UdpClient {
    shared: Arc<ClientShared>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    cancel: CancellationToken,
}

impl UdpClient {
    /// Creates a disconnected client with the given name.
    ///
    /// Names are not unique: the server indexes every client registered
    /// under the same name and fans name-addressed sends out to all of
    /// them.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                name: name.into(),
                id: AtomicI16::new(UNASSIGNED_ID),
                state: Mutex::new(ClientState::Disconnected),
                hooks: ClientHooks::default(),
            }),
            socket: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// The client's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The server-assigned id, or [`UNASSIGNED_ID`] before registration.
    pub fn id(&self) -> i16 {
        self.shared.id.load(Ordering::SeqCst)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.shared.state.lock().expect("client state lock")
    }

    /// The lifecycle hooks. Connect handlers before calling
    /// [`listen`](Self::listen).
    pub fn hooks(&self) -> &ClientHooks {
        &self.shared.hooks
    }

    /// Resolves a host name and connects to the first address found.
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), ClientError> {
        let addr = lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses"))?;
        self.connect_addr(addr).await
    }

    /// Opens a datagram socket bound to the remote peer's address.
    ///
    /// This is transport-level only: the server learns about us on
    /// [`send_connection_info`](Self::send_connection_info).
    pub async fn connect_addr(&self, addr: SocketAddr) -> Result<(), ClientError> {
        self.shared.set_state(ClientState::Connecting);

        let local: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await.inspect_err(|_| {
            self.shared.set_state(ClientState::Disconnected);
        })?;
        socket.connect(addr).await.inspect_err(|_| {
            self.shared.set_state(ClientState::Disconnected);
        })?;

        tracing::info!(name = %self.shared.name, %addr, "socket connected");
        *self.socket.lock().expect("client socket lock") = Some(Arc::new(socket));
        self.shared.set_state(ClientState::Connected);
        Ok(())
    }

    /// Sends the handshake request: `ClientConnected` carrying this
    /// client's name, the placeholder id 0, and `success = false`.
    ///
    /// The server answers with a `ClientConnected` ack that the receive
    /// loop turns into an assigned id and a `connected` hook.
    pub async fn send_connection_info(&self) -> Result<usize, ClientError> {
        let socket = self.socket()?;
        let mut request = Message::outgoing(Tag::CLIENT_CONNECTED);
        request.writer().write_value(&ConnectionInfo {
            name: self.shared.name.clone(),
            id: 0,
            success: false,
        })?;
        stamp_assigned(&mut request, self.id());
        Ok(socket.send(request.bytes()).await?)
    }

    /// Advertises the tags this client subscribes to, under a user tag of
    /// the embedder's choosing.
    pub async fn register_tags(&self, tag: impl Into<Tag>, tags: &[u16]) -> Result<usize, ClientError> {
        let mut message = Message::outgoing(tag);
        message.writer().write_value(&TagRegistration {
            tags: tags.to_vec(),
        })?;
        self.send(&mut message).await
    }

    /// Spawns the receive loop.
    ///
    /// # Errors
    /// Returns [`ClientError::NotConnected`] if no socket is open.
    pub fn listen(&self) -> Result<JoinHandle<()>, ClientError> {
        let socket = self.socket()?;
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        Ok(tokio::spawn(listen_loop(socket, shared, cancel)))
    }

    /// Stamps the assigned id into the header and transmits the message.
    ///
    /// # Errors
    /// Returns [`ClientError::NotConnected`] unless the state is
    /// [`ClientState::Connected`] — in particular after the server
    /// answered `UnknownClient`, until re-registration succeeds.
    pub async fn send(&self, message: &mut Message) -> Result<usize, ClientError> {
        if self.state() != ClientState::Connected {
            return Err(ClientError::NotConnected);
        }
        let socket = self.socket()?;
        stamp_assigned(message, self.id());
        Ok(socket.send(message.bytes()).await?)
    }

    /// Ends the session: emits the local `disconnected` hook, sends a
    /// best-effort farewell, and cancels the receive loop.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.shared
            .hooks
            .disconnected
            .emit(&DisconnectedEvent { local: true });

        let id = self.id();
        let mut farewell = Message::outgoing(Tag::CLIENT_DISCONNECTED);
        farewell.writer().write_value(&ConnectionInfo {
            name: self.shared.name.clone(),
            id,
            success: true,
        })?;
        stamp_assigned(&mut farewell, id);

        if let Ok(socket) = self.socket() {
            if let Err(e) = socket.send(farewell.bytes()).await {
                tracing::debug!(error = %e, "farewell send failed");
            }
        }

        self.shared.set_state(ClientState::Disconnected);
        self.cancel.cancel();
        tracing::info!(name = %self.shared.name, "client disconnected");
        Ok(())
    }

    fn socket(&self) -> Result<Arc<UdpSocket>, ClientError> {
        self.socket
            .lock()
            .expect("client socket lock")
            .as_ref()
            .map(Arc::clone)
            .ok_or(ClientError::NotConnected)
    }
}

/// Stamps the header only once an id has been assigned; before that the
/// placeholder 0 stays, which is what the wire format promises.
fn stamp_assigned(message: &mut Message, id: i16) {
    if id >= 0 {
        message.stamp_sender(id);
    }
}

/// The receive loop: one iteration per datagram until cancelled.
async fn listen_loop(socket: Arc<UdpSocket>, shared: Arc<ClientShared>, cancel: CancellationToken) {
    let mut buf = vec![0u8; default_capacity()];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv(&mut buf) => received,
        };
        let len = match received {
            Ok(len) => len,
            Err(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!(error = %e, "receive failed, continuing");
                continue;
            }
        };
        let message = match Message::incoming(buf[..len].to_vec()) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "short datagram dropped");
                continue;
            }
        };
        handle_datagram(&socket, &shared, message).await;
    }
    tracing::debug!(name = %shared.name, "listen loop exited");
}

/// Reacts to one received message: reserved tags drive the session state
/// machine, everything else goes to the `message` hook.
async fn handle_datagram(socket: &UdpSocket, shared: &ClientShared, mut message: Message) {
    match message.tag() {
        Tag::CLIENT_CONNECTED => {
            let info: ConnectionInfo = message.reader().read_value();
            shared.id.store(info.id, Ordering::SeqCst);
            shared.set_state(ClientState::Connected);
            tracing::info!(id = info.id, "registered with server");
            shared.hooks.connected.emit(&ConnectedEvent { info });
        }
        Tag::CLIENT_DISCONNECTED => {
            let info: ConnectionInfo = message.reader().read_value();
            shared.set_state(ClientState::Disconnected);
            tracing::info!(local = info.success, "server closed the session");
            shared
                .hooks
                .disconnected
                .emit(&DisconnectedEvent { local: info.success });
        }
        Tag::PING => {
            let mut pong = Message::outgoing(Tag::PONG);
            stamp_assigned(&mut pong, shared.id.load(Ordering::SeqCst));
            if let Err(e) = socket.send(pong.bytes()).await {
                tracing::warn!(error = %e, "pong send failed");
            }
        }
        Tag::UNKNOWN_CLIENT => {
            // The server lost our record: stop sending until the embedder
            // re-registers via send_connection_info.
            shared.id.store(UNASSIGNED_ID, Ordering::SeqCst);
            shared.set_state(ClientState::Connecting);
            tracing::warn!("server does not know us, re-registration required");
            shared.hooks.server_unregistered.emit(&());
        }
        _ => {
            shared.hooks.message.emit(&message);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_is_unassigned_and_disconnected() {
        let client = UdpClient::new("alice");
        assert_eq!(client.name(), "alice");
        assert_eq!(client.id(), UNASSIGNED_ID);
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_without_socket_fails() {
        let client = UdpClient::new("alice");
        let mut message = Message::outgoing(42u16);
        assert!(matches!(
            client.send(&mut message).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_listen_without_socket_fails() {
        let client = UdpClient::new("alice");
        assert!(matches!(client.listen(), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_stamp_assigned_skips_unassigned() {
        let mut message = Message::outgoing(5u16);
        stamp_assigned(&mut message, UNASSIGNED_ID);
        assert_eq!(message.sender_id(), 0);
        stamp_assigned(&mut message, 9);
        assert_eq!(message.sender_id(), 9);
    }
}
