//! Lifecycle events and the hook sets that carry them.
//!
//! Clients and servers each own a fixed set of [`Signal`]s. Embedders
//! connect hooks before starting the listen loop; a typical embedder
//! forwards the `message` signal into a
//! [`Dispatcher`](taglink_dispatch::Dispatcher) and drains it from its own
//! loop.

use std::net::SocketAddr;

use taglink_dispatch::Signal;
use taglink_wire::{ConnectionInfo, Message};

// ---------------------------------------------------------------------------
// Client-side events
// ---------------------------------------------------------------------------

/// The server accepted this client's handshake.
#[derive(Debug, Clone)]
pub struct ConnectedEvent {
    /// The ack payload; `info.id` is the freshly assigned identity.
    pub info: ConnectionInfo,
}

/// The session ended, locally or by the server.
#[derive(Debug, Clone)]
pub struct DisconnectedEvent {
    /// `true` when this side initiated the disconnect, `false` when the
    /// server evicted us.
    pub local: bool,
}

/// Hooks a [`UdpClient`](crate::UdpClient) fires from its receive loop.
#[derive(Debug, Default)]
pub struct ClientHooks {
    /// Handshake ack processed; the client id is now assigned.
    pub connected: Signal<ConnectedEvent>,
    /// Session over (either side).
    pub disconnected: Signal<DisconnectedEvent>,
    /// The server answered `UnknownClient`: our id is not on its roster
    /// and we must re-register before sending again.
    pub server_unregistered: Signal<()>,
    /// A user-tagged message arrived; read cursor is at the payload.
    pub message: Signal<Message>,
}

// ---------------------------------------------------------------------------
// Server-side events
// ---------------------------------------------------------------------------

/// A handshake request arrived (fired before the record is created).
#[derive(Debug, Clone)]
pub struct ClientConnectedEvent {
    /// The submitted payload (`id` is the placeholder, not the
    /// assignment).
    pub info: ConnectionInfo,
    /// Where the request came from.
    pub endpoint: SocketAddr,
}

/// A client left the roster.
#[derive(Debug, Clone)]
pub struct ClientDisconnectedEvent {
    /// The departed client's identity.
    pub info: ConnectionInfo,
    /// `true` for a client-initiated goodbye, `false` for a heartbeat
    /// eviction.
    pub local: bool,
}

/// Hooks a [`UdpServer`](crate::UdpServer) fires from its receive loop and
/// heartbeat handlers.
#[derive(Debug, Default)]
pub struct ServerHooks {
    /// A handshake request was received.
    pub client_connected: Signal<ClientConnectedEvent>,
    /// A client disconnected or was evicted.
    pub client_disconnected: Signal<ClientDisconnectedEvent>,
    /// A user-tagged message arrived from a registered client.
    pub message: Signal<Message>,
}
