//! Contract Test: Startup Binding
//!
//! Constraints verified:
//! - A successful startup attaches exactly once, at device index 1
//! - An attach on the last allowed attempt still counts as bound
//! - One attempt reads identity, candidates and the instance once
//! - An instance already holding a candidate is left alone
//! - Startup never returns an error, even when every attempt fails
//! - Periodic passes are armed at the unbound interval whatever startup did

mod common;

use common::*;
use enibind_core::cloud::CloudCall;
use enibind_core::{BinderConfig, BinderEvent, BinderPhase, SECONDARY_DEVICE_INDEX};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn startup_attaches_best_candidate_once() {
    let cloud = cloud_with_pool("i-1", &[4, 5]);
    let (binder, mut rx, _registry) = binder_for("i-1", &cloud, &[5, 4]);

    binder.start().await;

    // Candidate order wins over interface id order
    assert_eq!(
        cloud.attach_calls(),
        vec![("eni-5".to_string(), "i-1".to_string(), SECONDARY_DEVICE_INDEX)]
    );
    assert_eq!(cloud.holder_of(candidate_ip(5)), Some("i-1".to_string()));
    assert_eq!(cloud.holder_of(candidate_ip(4)), None);

    let status = binder.status();
    assert_eq!(status.phase, BinderPhase::Bound);
    assert_eq!(status.bound_address, Some(candidate_ip(5)));

    let events = drain(&mut rx);
    assert!(events.contains(&BinderEvent::StartupCompleted {
        bound: true,
        attempts: 1
    }));

    binder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn startup_when_already_bound_does_not_attach() {
    let cloud = cloud_with_pool("i-1", &[4]);
    pre_attach(&cloud, "eni-4", "i-1").await;
    cloud.clear_calls();

    let (binder, mut rx, _registry) = binder_for("i-1", &cloud, &[4]);
    binder.start().await;

    assert!(cloud.attach_calls().is_empty());
    assert!(cloud.detach_calls().is_empty());
    assert!(drain(&mut rx).contains(&BinderEvent::StartupCompleted {
        bound: true,
        attempts: 1
    }));

    binder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn startup_exhaustion_returns_and_arms_unbound_schedule() {
    let cloud = cloud_with_pool("i-1", &[4]);
    cloud.fail_queries(true);
    let (binder, mut rx, _registry) = binder_for("i-1", &cloud, &[4]);

    let started_at = tokio::time::Instant::now();
    binder.start().await;

    // Three failed attempts, a one second sleep between each
    assert_eq!(started_at.elapsed(), Duration::from_secs(2));
    assert!(cloud.attach_calls().is_empty());

    let events = drain(&mut rx);
    assert!(events.contains(&BinderEvent::StartupCompleted {
        bound: false,
        attempts: 3
    }));
    assert!(events.contains(&BinderEvent::ScheduleArmed {
        first_delay: Duration::from_secs(60)
    }));

    // No pass before the unbound interval elapses
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(drain(&mut rx).is_empty());

    // Provider is back: the first pass binds
    cloud.fail_queries(false);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, BinderEvent::Attached { .. })));
    assert_eq!(cloud.holder_of(candidate_ip(4)), Some("i-1".to_string()));

    binder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn startup_with_no_free_interface_does_not_sleep() {
    let cloud = cloud_with_pool("i-1", &[]);
    let (binder, mut rx, _registry) = binder_for("i-1", &cloud, &[4]);

    let started_at = tokio::time::Instant::now();
    binder.start().await;

    assert_eq!(started_at.elapsed(), Duration::ZERO);
    let events = drain(&mut rx);
    let misses = events
        .iter()
        .filter(|e| matches!(e, BinderEvent::NoInterfaceAvailable { .. }))
        .count();
    assert_eq!(misses, 3);
    assert!(events.contains(&BinderEvent::StartupCompleted {
        bound: false,
        attempts: 3
    }));

    let journal = cloud.calls();
    assert!(!journal.iter().any(|c| matches!(c, CloudCall::Attach { .. })));

    binder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_a_no_op() {
    let cloud = cloud_with_pool("i-1", &[4]);
    let (binder, mut rx, _registry) = binder_for("i-1", &cloud, &[4]);

    binder.start().await;
    binder.start().await;

    let armed = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, BinderEvent::ScheduleArmed { .. }))
        .count();
    assert_eq!(armed, 1);
    assert_eq!(cloud.attach_calls().len(), 1);

    binder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_attempt_startup_reports_bound() {
    let cloud = cloud_with_pool("i-1", &[4]);
    let urls = ScriptedUrls::default().with_zone(ZONE, vec![candidate_url(4)]);
    let config = BinderConfig {
        bind_rebind_retries: 1,
        ..test_config()
    };
    let (binder, mut rx) = make_binder_with(
        config,
        "i-1",
        Arc::new(urls),
        Arc::new(cloud.clone()),
        Arc::new(RecordingRegistry::default()),
    );

    binder.start().await;

    assert_eq!(cloud.holder_of(candidate_ip(4)), Some("i-1".to_string()));
    assert_eq!(binder.status().phase, BinderPhase::Bound);

    let events = drain(&mut rx);
    assert!(events.contains(&BinderEvent::StartupCompleted {
        bound: true,
        attempts: 1
    }));

    binder.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn startup_attempt_describes_instance_once() {
    let cloud = cloud_with_pool("i-1", &[4]);
    cloud.clear_calls();
    let urls = Arc::new(ScriptedUrls::default().with_zone(ZONE, vec![candidate_url(4)]));
    let (binder, _rx) = make_binder(
        "i-1",
        urls.clone(),
        Arc::new(cloud.clone()),
        Arc::new(RecordingRegistry::default()),
    );

    binder.start().await;

    let describes = cloud
        .calls()
        .iter()
        .filter(|c| matches!(c, CloudCall::DescribeInstance { .. }))
        .count();
    assert_eq!(describes, 1);
    assert_eq!(urls.call_count(), 1);
    assert_eq!(cloud.attach_calls().len(), 1);

    binder.shutdown().await;
}
