//! Two-phase liveness timer for taglink servers.
//!
//! A full liveness cycle is two consecutive windows. During the **pong
//! window** the server waits for clients to answer the previous round of
//! pings; when it closes, it is time to mark everyone suspect and send a
//! fresh ping. During the **ping window** the pings are in flight; when it
//! closes, clients that never answered must be evicted.
//!
//! The timer is pure: it owns no clock and does no I/O. The embedder
//! advances it with [`Heartbeat::update`] from its own schedule (a game
//! loop, a tokio interval) and reacts to the returned event before the
//! next update — so a slow reaction delays the next window rather than
//! overlapping it.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     interval.tick().await;
//!     match heartbeat.update(interval.period()) {
//!         Some(HeartbeatEvent::PongWindowEnded) => server.send_pings().await,
//!         Some(HeartbeatEvent::PingWindowEnded) => server.evict_silent().await,
//!         None => {}
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::trace;

/// Default length of both windows.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Which window the timer is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for pongs from the previous ping round.
    AwaitingPong,
    /// Pings are out; waiting for the eviction deadline.
    AwaitingPing,
}

/// Fired when a window closes. At most one event per [`Heartbeat::update`]
/// call — a `dt` spanning several windows still closes only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// The pong window closed: mark clients suspect and send pings.
    PongWindowEnded,
    /// The ping window closed: evict clients that stayed silent.
    PingWindowEnded,
}

/// The two-window liveness state machine.
///
/// Starts in [`Phase::AwaitingPong`] with the full pong window remaining.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pong_window: Duration,
    ping_window: Duration,
    remaining: Duration,
    phase: Phase,
}

impl Heartbeat {
    /// Creates a timer with explicit window lengths.
    pub fn new(pong_window: Duration, ping_window: Duration) -> Self {
        Self {
            pong_window,
            ping_window,
            remaining: pong_window,
            phase: Phase::AwaitingPong,
        }
    }

    /// Advances the timer by `dt`.
    ///
    /// Returns the event for the window that closed, if one did. Windows
    /// do not coalesce: the remainder of an oversized `dt` is discarded
    /// and the next window starts at its full length.
    pub fn update(&mut self, dt: Duration) -> Option<HeartbeatEvent> {
        self.remaining = self.remaining.saturating_sub(dt);
        if !self.remaining.is_zero() {
            return None;
        }
        let event = match self.phase {
            Phase::AwaitingPong => {
                self.phase = Phase::AwaitingPing;
                self.remaining = self.ping_window;
                HeartbeatEvent::PongWindowEnded
            }
            Phase::AwaitingPing => {
                self.phase = Phase::AwaitingPong;
                self.remaining = self.pong_window;
                HeartbeatEvent::PingWindowEnded
            }
        };
        trace!(?event, phase = ?self.phase, "heartbeat window closed");
        Some(event)
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Time left in the current window.
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// The configured pong window.
    pub fn pong_window(&self) -> Duration {
        self.pong_window
    }

    /// The configured ping window.
    pub fn ping_window(&self) -> Duration {
        self.ping_window
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_WINDOW)
    }
}
