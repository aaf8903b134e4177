//! Client identity tracking for taglink servers.
//!
//! This crate owns the server's view of who is connected:
//!
//! 1. **Identity** — the [`ClientRecord`] (id, name, endpoint, liveness)
//! 2. **Membership** — the [`Roster`] with its id and name indexes
//! 3. **Allocation** — monotonic id assignment, never below
//!    [`FIRST_CLIENT_ID`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← admits on handshake, evicts on silence
//!     ↕
//! Session (this crate)   ← who is connected, under which id and name
//!     ↕
//! Wire (below)   ← the ids and names travel in ConnectionInfo payloads
//! ```

mod error;
mod record;
mod roster;

pub use error::SessionError;
pub use record::ClientRecord;
pub use roster::{Roster, FIRST_CLIENT_ID};
