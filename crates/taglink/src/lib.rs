//! # taglink
//!
//! Tagged-message networking over UDP.
//!
//! Every datagram is one self-contained message: a six-byte header
//! carrying the sender's id and a 16-bit tag, then a binary payload. On
//! top of that sit a handshake that assigns client identities, a
//! ping/pong heartbeat that evicts silent peers, and a tag dispatcher
//! that routes user messages to subscribers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use taglink::prelude::*;
//!
//! # async fn run() -> Result<(), TaglinkError> {
//! let server = UdpServer::bind(9000).await.map_err(TaglinkError::Server)?;
//! let _ = server.listen();
//!
//! let client = UdpClient::new("alice");
//! client.connect("127.0.0.1", 9000).await.map_err(TaglinkError::Client)?;
//! let _ = client.listen().map_err(TaglinkError::Client)?;
//! client.send_connection_info().await.map_err(TaglinkError::Client)?;
//!
//! // Drive liveness from your own loop:
//! server.update(Duration::from_millis(16)).await;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod events;
mod server;

pub use client::{ClientState, UdpClient, UNASSIGNED_ID};
pub use error::{ClientError, ServerError, TaglinkError};
pub use events::{
    ClientConnectedEvent, ClientDisconnectedEvent, ClientHooks, ConnectedEvent,
    DisconnectedEvent, ServerHooks,
};
pub use server::UdpServer;

/// Re-exports everything an embedder needs.
///
/// ```rust
/// use taglink::prelude::*;
/// ```
pub mod prelude {
    // Meta-crate
    pub use crate::{
        ClientConnectedEvent, ClientDisconnectedEvent, ClientError, ClientHooks,
        ClientState, ConnectedEvent, DisconnectedEvent, ServerError, ServerHooks,
        TaglinkError, UdpClient, UdpServer, UNASSIGNED_ID,
    };

    // Wire types
    pub use taglink_wire::{
        default_capacity, set_default_capacity, BufferReader, BufferWriter,
        ConnectionInfo, Message, MessageBuffer, Tag, TagRegistration, WireError,
        WireSerialize, HEADER_LEN,
    };

    // Dispatch types
    pub use taglink_dispatch::{CallbackId, DispatchEvent, Dispatcher, HookId, Signal};

    // Heartbeat types
    pub use taglink_heartbeat::{Heartbeat, HeartbeatEvent, Phase};

    // Session types
    pub use taglink_session::{ClientRecord, Roster, SessionError, FIRST_CLIENT_ID};
}
