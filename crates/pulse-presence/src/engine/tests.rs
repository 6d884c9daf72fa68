use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, timeout, Instant};

use super::*;
use crate::clock::ManualClock;
use crate::hub::LocalHub;
use crate::sink::{PresenceEvent, SinkRegistry, Subscription};
use crate::transport::ChannelTransport;
use pulse_common::ParticipantId;

fn id(name: &str) -> ParticipantId {
    ParticipantId::from(name)
}

fn joined(name: &str) -> PresenceEvent {
    PresenceEvent::Joined {
        identity: id(name),
    }
}

fn left(name: &str) -> PresenceEvent {
    PresenceEvent::Left {
        identity: id(name),
    }
}

fn config(interval_ms: u64, stale_ms: u64) -> EngineConfig {
    EngineConfig {
        announce_interval: Duration::from_millis(interval_ms),
        stale_threshold_ms: stale_ms,
        channel: "presence".into(),
        track_self: false,
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[test]
fn first_announcement_joins_repeat_does_not() {
    let mut tracker = PresenceTracker::new(id("me"), &config(1000, 3000));
    assert_eq!(tracker.on_announcement(&id("alice"), 0), Some(joined("alice")));
    assert_eq!(tracker.on_announcement(&id("alice"), 500), None);
}

#[test]
fn silent_participant_leaves_only_after_threshold() {
    let mut tracker = PresenceTracker::new(id("me"), &config(1000, 3000));
    tracker.on_announcement(&id("alice"), 0);
    tracker.on_announcement(&id("alice"), 500);

    for now in [1000, 2000, 3000, 3500] {
        assert!(tracker.sweep(now).is_empty(), "evicted too early at {now}");
    }
    assert_eq!(tracker.sweep(4000), vec![left("alice")]);
    assert!(tracker.store().is_empty());
}

#[test]
fn refreshed_participant_survives_sweep() {
    let mut tracker = PresenceTracker::new(id("me"), &config(1000, 3000));
    tracker.on_announcement(&id("bob"), 100);
    tracker.on_announcement(&id("bob"), 200);
    assert!(tracker.sweep(250).is_empty());
    assert!(tracker.store().contains("bob"));
}

#[test]
fn announcement_just_before_sweep_prevents_eviction() {
    let mut tracker = PresenceTracker::new(id("me"), &config(1000, 3000));
    tracker.on_announcement(&id("carol"), 2999);
    assert!(tracker.sweep(3000).is_empty());
    assert_eq!(tracker.store().last_seen("carol"), Some(2999));
}

#[test]
fn fresh_tracker_never_reports_unknown_departures() {
    let mut tracker = PresenceTracker::new(id("me"), &config(1000, 3000));
    assert!(tracker.sweep(1_000_000).is_empty());
}

#[test]
fn self_announcements_follow_track_self() {
    let mut cfg = config(1000, 3000);
    cfg.track_self = true;
    let mut tracker = PresenceTracker::new(id("me"), &cfg);
    assert_eq!(tracker.on_announcement(&id("me"), 0), Some(joined("me")));

    cfg.track_self = false;
    let mut tracker = PresenceTracker::new(id("me"), &cfg);
    assert_eq!(tracker.on_announcement(&id("me"), 0), None);
    assert!(tracker.store().is_empty());
}

#[test]
fn self_announcement_carries_local_identity() {
    let tracker = PresenceTracker::new(id("me"), &config(1000, 3000));
    assert_eq!(tracker.self_announcement().user, id("me"));
    assert_eq!(tracker.local(), &id("me"));
}

#[test]
fn config_requires_threshold_above_interval() {
    assert!(config(1000, 3000).validate().is_ok());
    assert!(matches!(
        config(1000, 1000).validate(),
        Err(EngineError::InvalidConfig(_))
    ));
    assert!(matches!(
        config(0, 1000).validate(),
        Err(EngineError::InvalidConfig(_))
    ));
    let mut cfg = config(1000, 3000);
    cfg.channel.clear();
    assert!(cfg.validate().is_err());
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Harness {
    hub: LocalHub,
    engine: PresenceEngine,
    events: Subscription,
    started: Instant,
}

fn harness() -> Harness {
    let hub = LocalHub::new();
    let sinks = Arc::new(SinkRegistry::new());
    let events = sinks.subscribe();
    let transport: Arc<dyn ChannelTransport> = Arc::new(hub.clone());
    let engine = PresenceEngine::new(transport, sinks);
    Harness {
        hub,
        engine,
        events,
        started: Instant::now(),
    }
}

async fn no_event_within(events: &mut Subscription, ms: u64) -> bool {
    timeout(Duration::from_millis(ms), events.recv()).await.is_err()
}

#[tokio::test(start_paused = true)]
async fn join_then_leave_after_threshold() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();

    h.engine.on_announcement(id("alice"), h.engine.now());
    assert_eq!(h.events.recv().await, Some(joined("alice")));

    sleep(Duration::from_millis(500)).await;
    h.engine.on_announcement(id("alice"), h.engine.now());

    // Ticks at 1000..4000 are sweeps; last heard at 500, gone once silence > 3000.
    assert_eq!(h.events.recv().await, Some(left("alice")));
    assert_eq!(h.started.elapsed(), Duration::from_millis(4000));

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn tick_boundary_uses_strict_comparison() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();

    h.engine.on_announcement(id("alice"), 0);
    assert_eq!(h.events.recv().await, Some(joined("alice")));

    // Elapsed is exactly 3000 at the third tick, so alice survives it.
    assert_eq!(h.events.recv().await, Some(left("alice")));
    assert_eq!(h.started.elapsed(), Duration::from_millis(4000));
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn late_announcement_defers_eviction() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();

    h.engine.on_announcement(id("carol"), 0);
    assert_eq!(h.events.recv().await, Some(joined("carol")));

    sleep(Duration::from_millis(2999)).await;
    h.engine.on_announcement(id("carol"), h.engine.now());

    assert_eq!(h.events.recv().await, Some(left("carol")));
    assert_eq!(h.started.elapsed(), Duration::from_millis(6000));
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn sweeps_read_the_injected_clock() {
    let sinks = Arc::new(SinkRegistry::new());
    let mut events = sinks.subscribe();
    let clock = Arc::new(ManualClock::new(0));
    let transport: Arc<dyn ChannelTransport> = Arc::new(LocalHub::new());
    let mut engine = PresenceEngine::with_clock(transport, sinks, clock.clone());
    engine.start(id("me"), config(1000, 3000)).unwrap();
    let started = Instant::now();

    engine.on_announcement(id("alice"), 0);
    assert_eq!(events.recv().await, Some(joined("alice")));

    // The tick at 1000 sees exactly 3000 of silence; the one at 2000 sees 4000.
    clock.set(3000);
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(engine.now(), 3000);
    clock.set(4000);

    assert_eq!(events.recv().await, Some(left("alice")));
    assert_eq!(started.elapsed(), Duration::from_millis(2000));
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn busy_presence_channel_does_not_hold_off_sweeps() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();
    h.engine.on_announcement(id("alice"), 0);
    assert_eq!(h.events.recv().await, Some(joined("alice")));

    // Refill the presence queue faster than one scheduler turn drains it.
    let hub = h.hub.clone();
    let flood = tokio::spawn(async move {
        loop {
            for _ in 0..300 {
                let _ = hub.publish("presence", json!({ "user": "bob" }));
            }
            tokio::task::yield_now().await;
        }
    });

    // The runtime never idles now, so time only moves when pushed.
    tokio::time::advance(Duration::from_millis(4000)).await;
    loop {
        match h.events.recv().await {
            Some(event) if event == left("alice") => break,
            Some(event) => assert_eq!(event, joined("bob")),
            None => panic!("event stream closed"),
        }
    }

    flood.abort();
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn first_announcement_is_one_interval_after_start() {
    let mut h = harness();
    let mut wire = h.hub.subscribe("presence");
    h.engine.start(id("me"), config(1000, 3000)).unwrap();

    assert!(timeout(Duration::from_millis(999), wire.recv()).await.is_err());
    assert_eq!(wire.recv().await, Some(json!({ "user": "me" })));
    assert_eq!(h.started.elapsed(), Duration::from_millis(1000));

    assert_eq!(wire.recv().await, Some(json!({ "user": "me" })));
    assert_eq!(h.started.elapsed(), Duration::from_millis(2000));
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn inbound_announcements_come_from_the_presence_channel() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();

    h.hub.publish("presence", json!({ "nickname": "bob" })).unwrap();
    h.hub.publish("presence", json!({ "user": "" })).unwrap();
    h.hub.publish("messages", json!({ "user": "eve" })).unwrap();
    h.hub.publish("presence", json!({ "user": "bob", "lat": "1.5" })).unwrap();

    assert_eq!(h.events.recv().await, Some(joined("bob")));
    assert_eq!(h.engine.roster().await, vec![id("bob")]);
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn own_announcements_join_when_tracking_self() {
    let mut h = harness();
    let mut cfg = config(1000, 3000);
    cfg.track_self = true;
    h.engine.start(id("me"), cfg).unwrap();

    assert_eq!(h.events.recv().await, Some(joined("me")));
    assert_eq!(h.started.elapsed(), Duration::from_millis(1000));
    assert!(no_event_within(&mut h.events, 10_000).await);
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn disconnected_transport_does_not_stop_sweeps() {
    let mut h = harness();
    let mut wire = h.hub.subscribe("presence");
    h.hub.set_connected(false);
    h.engine.start(id("me"), config(1000, 3000)).unwrap();

    h.engine.on_announcement(id("alice"), 0);
    assert_eq!(h.events.recv().await, Some(joined("alice")));
    assert_eq!(h.events.recv().await, Some(left("alice")));
    assert_eq!(h.started.elapsed(), Duration::from_millis(4000));
    assert!(wire.try_recv().is_err());

    // Announcements resume on the next tick after reconnecting.
    h.hub.set_connected(true);
    assert_eq!(wire.recv().await, Some(json!({ "user": "me" })));
    assert_eq!(h.started.elapsed(), Duration::from_millis(5000));
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn nothing_is_emitted_after_stop_returns() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();
    h.engine.on_announcement(id("alice"), 0);
    assert_eq!(h.events.recv().await, Some(joined("alice")));

    h.engine.stop().await;
    assert!(!h.engine.is_running());

    h.engine.on_announcement(id("bob"), h.engine.now());
    h.hub.publish("presence", json!({ "user": "carol" })).unwrap();
    assert!(no_event_within(&mut h.events, 10_000).await);

    // The roster is left as the run ended.
    assert_eq!(h.engine.roster().await, vec![id("alice")]);
    assert!(h.engine.last_roster().contains("alice"));
}

#[tokio::test(start_paused = true)]
async fn restart_begins_with_empty_roster() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();
    h.engine.on_announcement(id("alice"), 0);
    assert_eq!(h.events.recv().await, Some(joined("alice")));
    h.engine.stop().await;

    h.engine.start(id("me"), config(1000, 3000)).unwrap();
    assert!(h.engine.roster().await.is_empty());
    assert!(no_event_within(&mut h.events, 20_000).await);

    // alice is rediscovered through her next announcement.
    h.engine.on_announcement(id("alice"), h.engine.now());
    assert_eq!(h.events.recv().await, Some(joined("alice")));
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected() {
    let mut h = harness();
    h.engine.start(id("me"), config(1000, 3000)).unwrap();
    assert_eq!(
        h.engine.start(id("me"), config(1000, 3000)),
        Err(EngineError::AlreadyRunning)
    );
    assert_eq!(h.engine.local(), Some(&id("me")));
    h.engine.stop().await;
    assert_eq!(h.engine.local(), None);
}

#[tokio::test]
async fn invalid_config_does_not_start() {
    let mut h = harness();
    let result = h.engine.start(id("me"), config(1000, 500));
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    assert!(!h.engine.is_running());
}

#[tokio::test]
async fn stop_when_stopped_is_a_no_op() {
    let mut h = harness();
    h.engine.stop().await;
    h.engine.on_announcement(id("alice"), 0);
    assert!(h.engine.roster().await.is_empty());
}
