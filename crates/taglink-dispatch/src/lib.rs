//! Message routing for taglink.
//!
//! Two delivery mechanisms live here:
//!
//! - [`Dispatcher`] — routes received messages to subscribers by tag, with
//!   a staging queue drained one event per [`Dispatcher::tick`] so the
//!   embedder controls delivery pacing.
//! - [`Signal`] — a multicast callback set for lifecycle events
//!   (connected, disconnected, and so on) owned by clients and servers.
//!
//! Both are internally synchronized and invoke callbacks on snapshots
//! taken under their lock, so callbacks may re-enter freely and a
//! panicking callback never starves its siblings.

mod dispatcher;
mod signal;

pub use dispatcher::{CallbackId, DispatchEvent, Dispatcher};
pub use signal::{HookId, Signal};
