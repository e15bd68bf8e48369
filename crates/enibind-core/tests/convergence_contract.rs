//! Contract Test: Convergence Without a Lock
//!
//! Constraints verified:
//! - Two instances racing for one interface end with exactly one holder
//! - The loser keeps trying and takes over once the holder shuts down
//! - Instances with the same view pick the same interface

mod common;

use common::*;
use enibind_core::{BinderEvent, BinderPhase};
use std::sync::Arc;
use std::time::Duration;

fn shared_cloud() -> enibind_core::InMemoryEc2 {
    let cloud = cloud_with_pool("i-1", &[4]);
    cloud.add_instance("i-2", SUBNET);
    cloud.add_interface(primary_interface("i-2", 201));
    cloud
}

#[tokio::test(start_paused = true)]
async fn racing_instances_converge_to_one_holder() {
    let cloud = shared_cloud();
    let racing = YieldingEc2 {
        inner: cloud.clone(),
    };

    let urls = || Arc::new(ScriptedUrls::default().with_zone(ZONE, vec![candidate_url(4)]));
    let (a, _rx_a) = make_binder(
        "i-1",
        urls(),
        Arc::new(racing.clone()),
        Arc::new(RecordingRegistry::default()),
    );
    let (b, _rx_b) = make_binder(
        "i-2",
        urls(),
        Arc::new(racing),
        Arc::new(RecordingRegistry::default()),
    );

    tokio::join!(a.start(), b.start());

    // Both saw the interface free and both tried; the provider let one win
    let attempts = cloud.attach_calls();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|(iface, _, _)| iface == "eni-4"));

    let holder = cloud.holder_of(candidate_ip(4)).expect("one instance holds the address");
    let phases = [a.status().phase, b.status().phase];
    assert_eq!(phases.iter().filter(|p| **p == BinderPhase::Bound).count(), 1);

    let (winner, loser) = if holder == "i-1" { (&a, &b) } else { (&b, &a) };
    assert!(winner.already_bound().await.unwrap());
    assert!(!loser.already_bound().await.unwrap());

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn loser_takes_over_after_holder_shuts_down() {
    let cloud = shared_cloud();
    let (holder, _rx_holder, _) = binder_for("i-1", &cloud, &[4]);
    let (standby, mut rx_standby, _) = binder_for("i-2", &cloud, &[4]);

    holder.start().await;
    standby.start().await;
    assert_eq!(cloud.holder_of(candidate_ip(4)), Some("i-1".to_string()));
    assert_eq!(standby.status().phase, BinderPhase::Unbound);
    drain(&mut rx_standby);

    holder.shutdown().await;
    assert_eq!(cloud.holder_of(candidate_ip(4)), None);

    // The standby's next unbound pass picks the address up
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(cloud.holder_of(candidate_ip(4)), Some("i-2".to_string()));
    assert!(
        drain(&mut rx_standby)
            .iter()
            .any(|e| matches!(e, BinderEvent::Attached { interface_id, .. } if interface_id == "eni-4"))
    );

    standby.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn same_view_same_choice() {
    let cloud = shared_cloud();
    cloud.add_interface(enibind_core::types::NetworkInterfaceHandle::available(
        "eni-5",
        candidate_ip(5),
        SUBNET,
    ));
    let (a, _rx_a, _) = binder_for("i-1", &cloud, &[5, 4]);
    let (b, _rx_b, _) = binder_for("i-2", &cloud, &[5, 4]);

    // Each instance, given the full pool, prefers the same interface
    a.bind().await.unwrap();
    let first_choice = cloud.attach_calls()[0].0.clone();
    a.unbind().await.unwrap();

    b.bind().await.unwrap();
    assert_eq!(cloud.attach_calls()[1].0, first_choice);
    assert_eq!(first_choice, "eni-5");
}
