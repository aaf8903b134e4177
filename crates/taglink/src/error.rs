//! Error types for the client, the server, and the unified facade.

use taglink_session::SessionError;
use taglink_wire::WireError;

/// Errors a [`UdpClient`](crate::UdpClient) operation can report.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The operation needs a connected, registered client.
    /// Wait for the `connected` hook before sending user messages.
    #[error("client is not connected")]
    NotConnected,

    /// Framing or payload encoding failed.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The datagram socket failed.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a [`UdpServer`](crate::UdpServer) operation can report.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The addressed client id is not on the roster.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Framing or payload encoding failed.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The datagram socket failed.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `taglink` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TaglinkError {
    /// A client-side error (connect, send, disconnect).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A server-side error (bind, send, roster lookup).
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A wire-level error (framing, codec).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A session-level error (roster membership).
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_error() {
        let err = WireError::StringTooLong { len: 70_000 };
        let top: TaglinkError = err.into();
        assert!(matches!(top, TaglinkError::Wire(_)));
        assert!(top.to_string().contains("70000"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::UnknownClient(9);
        let top: TaglinkError = err.into();
        assert!(matches!(top, TaglinkError::Session(_)));
    }

    #[test]
    fn test_from_client_error() {
        let top: TaglinkError = ClientError::NotConnected.into();
        assert!(matches!(top, TaglinkError::Client(_)));
        assert_eq!(top.to_string(), "client is not connected");
    }

    #[test]
    fn test_from_server_error() {
        let err = ServerError::Session(SessionError::UnknownClient(3));
        let top: TaglinkError = err.into();
        assert!(top.to_string().contains("3"));
    }
}
