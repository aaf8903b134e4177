//! The server's per-client record.

use std::net::SocketAddr;

/// One accepted client, as the server sees it.
///
/// Created when a handshake is accepted, destroyed on graceful disconnect
/// or heartbeat eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// Server-assigned identity; unique within the roster.
    pub id: i16,

    /// Client-chosen name. Not unique — several concurrent clients may
    /// register under the same name, and name-addressed sends fan out to
    /// all of them.
    pub name: String,

    /// Where datagrams for this client go.
    pub endpoint: SocketAddr,

    /// Heartbeat flag: cleared when pings go out, set again by the
    /// client's pong. A record still `false` at the eviction deadline is
    /// reaped.
    pub alive: bool,
}
