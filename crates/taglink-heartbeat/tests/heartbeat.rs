//! Integration tests for the two-phase liveness timer.
//!
//! The timer is pure — no clocks, no sleeps — so every test drives it with
//! explicit `update(dt)` calls and asserts the exact event sequence.

use std::time::Duration;

use taglink_heartbeat::{Heartbeat, HeartbeatEvent, Phase};

// =========================================================================
// Helpers
// =========================================================================

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn asymmetric() -> Heartbeat {
    Heartbeat::new(millis(100), millis(40))
}

// =========================================================================
// Initial state
// =========================================================================

#[test]
fn test_starts_awaiting_pong_with_full_window() {
    let hb = asymmetric();
    assert_eq!(hb.phase(), Phase::AwaitingPong);
    assert_eq!(hb.remaining(), millis(100));
}

#[test]
fn test_default_windows_are_five_seconds() {
    let hb = Heartbeat::default();
    assert_eq!(hb.pong_window(), Duration::from_secs(5));
    assert_eq!(hb.ping_window(), Duration::from_secs(5));
}

// =========================================================================
// Window transitions
// =========================================================================

#[test]
fn test_pong_window_close_fires_once_and_flips_phase() {
    let mut hb = asymmetric();
    assert_eq!(hb.update(millis(100)), Some(HeartbeatEvent::PongWindowEnded));
    assert_eq!(hb.phase(), Phase::AwaitingPing);
    assert_eq!(hb.remaining(), millis(40));
}

#[test]
fn test_ping_window_close_fires_once_and_flips_back() {
    let mut hb = asymmetric();
    hb.update(millis(100));
    assert_eq!(hb.update(millis(40)), Some(HeartbeatEvent::PingWindowEnded));
    assert_eq!(hb.phase(), Phase::AwaitingPong);
    assert_eq!(hb.remaining(), millis(100));
}

#[test]
fn test_partial_updates_accumulate() {
    let mut hb = asymmetric();
    assert_eq!(hb.update(millis(60)), None);
    assert_eq!(hb.remaining(), millis(40));
    assert_eq!(hb.update(millis(39)), None);
    assert_eq!(hb.update(millis(1)), Some(HeartbeatEvent::PongWindowEnded));
}

#[test]
fn test_full_cycle_alternates_events() {
    let mut hb = Heartbeat::new(millis(10), millis(10));
    let mut events = Vec::new();
    for _ in 0..6 {
        if let Some(event) = hb.update(millis(10)) {
            events.push(event);
        }
    }
    assert_eq!(
        events,
        vec![
            HeartbeatEvent::PongWindowEnded,
            HeartbeatEvent::PingWindowEnded,
            HeartbeatEvent::PongWindowEnded,
            HeartbeatEvent::PingWindowEnded,
            HeartbeatEvent::PongWindowEnded,
            HeartbeatEvent::PingWindowEnded,
        ]
    );
}

// =========================================================================
// No coalescing
// =========================================================================

#[test]
fn test_oversized_dt_closes_only_one_window() {
    let mut hb = asymmetric();
    // Ten full cycles worth of time still yields a single transition.
    assert_eq!(hb.update(millis(1400)), Some(HeartbeatEvent::PongWindowEnded));
    assert_eq!(hb.phase(), Phase::AwaitingPing);
    // The leftover is discarded: the ping window starts at full length.
    assert_eq!(hb.remaining(), millis(40));
}

#[test]
fn test_no_event_while_window_open() {
    let mut hb = asymmetric();
    assert_eq!(hb.update(millis(99)), None);
    assert_eq!(hb.phase(), Phase::AwaitingPong);
}

#[test]
fn test_zero_dt_is_a_no_op() {
    let mut hb = asymmetric();
    assert_eq!(hb.update(Duration::ZERO), None);
    assert_eq!(hb.remaining(), millis(100));
}
