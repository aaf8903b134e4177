//! Error types for the session layer.

/// Errors that can occur during roster management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No record exists for the given client id. This is what a server
    /// answers with an `UnknownClient` message on the wire.
    #[error("no client registered under id {0}")]
    UnknownClient(i16),
}
