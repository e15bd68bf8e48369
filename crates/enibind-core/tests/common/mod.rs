//! Test doubles and common utilities for binder contract tests
//!
//! The cloud is always the real `InMemoryEc2` so attach/detach semantics are
//! shared with production embedding; only the collaborators around it are
//! doubled here.

#![allow(dead_code)]

use async_trait::async_trait;
use enibind_core::cloud::InMemoryEc2;
use enibind_core::config::BinderConfig;
use enibind_core::error::{Error, Result};
use enibind_core::traits::{
    Ec2Api, InterfaceFilter, PeerRegistry, ServiceUrlSource, StaticIdentity,
};
use enibind_core::types::{
    Attachment, InstanceDescription, InterfaceStatus, NetworkInterfaceHandle,
};
use enibind_core::{BinderEvent, EniBinder};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const ZONE: &str = "us-east-1a";
pub const SUBNET: &str = "subnet-a";

pub fn candidate_ip(last_octet: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 1, last_octet)
}

pub fn candidate_url(last_octet: u8) -> String {
    format!("http://ip-10-0-1-{}.ec2.internal:8080/eureka/v2/", last_octet)
}

/// Service URLs fixed per zone; unknown zones yield an empty list
#[derive(Default)]
pub struct ScriptedUrls {
    urls: HashMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedUrls {
    pub fn with_zone(mut self, zone: &str, urls: Vec<String>) -> Self {
        self.urls.insert(zone.to_string(), urls);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceUrlSource for ScriptedUrls {
    async fn service_urls_for_zone(&self, zone: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.get(zone).cloned().unwrap_or_default())
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Peer registry recording the recovery sequence
#[derive(Default)]
pub struct RecordingRegistry {
    calls: Mutex<Vec<String>>,
    synced: usize,
}

impl RecordingRegistry {
    pub fn syncing(count: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            synced: count,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerRegistry for RecordingRegistry {
    async fn clear_registry(&self) -> Result<()> {
        self.calls.lock().unwrap().push("clear".to_string());
        Ok(())
    }

    async fn sync_up(&self) -> Result<usize> {
        self.calls.lock().unwrap().push("sync".to_string());
        Ok(self.synced)
    }

    async fn open_for_traffic(&self, count: usize) -> Result<()> {
        self.calls.lock().unwrap().push(format!("open:{}", count));
        Ok(())
    }
}

/// Cloud wrapper that yields after every describe
///
/// Lets two binders on one runtime both observe the same snapshot before
/// either of them attaches.
#[derive(Clone)]
pub struct YieldingEc2 {
    pub inner: InMemoryEc2,
}

#[async_trait]
impl Ec2Api for YieldingEc2 {
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceDescription>> {
        let result = self.inner.describe_instance(instance_id).await;
        tokio::task::yield_now().await;
        result
    }

    async fn describe_network_interfaces(
        &self,
        filter: &InterfaceFilter,
    ) -> Result<Vec<NetworkInterfaceHandle>> {
        let result = self.inner.describe_network_interfaces(filter).await;
        tokio::task::yield_now().await;
        result
    }

    async fn attach_network_interface(
        &self,
        interface_id: &str,
        instance_id: &str,
        device_index: u32,
    ) -> Result<String> {
        self.inner
            .attach_network_interface(interface_id, instance_id, device_index)
            .await
    }

    async fn detach_network_interface(&self, attachment_id: &str) -> Result<()> {
        self.inner.detach_network_interface(attachment_id).await
    }

    fn backend_name(&self) -> &'static str {
        "yielding"
    }
}

/// Cloud with one instance in `SUBNET`, its primary interface attached at
/// slot 0, and one available interface per candidate octet
pub fn cloud_with_pool(instance_id: &str, octets: &[u8]) -> InMemoryEc2 {
    let cloud = InMemoryEc2::new();
    cloud.add_instance(instance_id, SUBNET);
    cloud.add_interface(primary_interface(instance_id, 200));
    for octet in octets {
        cloud.add_interface(NetworkInterfaceHandle::available(
            format!("eni-{}", octet),
            candidate_ip(*octet),
            SUBNET,
        ));
    }
    cloud
}

/// Primary interface of an instance (never a candidate)
pub fn primary_interface(instance_id: &str, last_octet: u8) -> NetworkInterfaceHandle {
    NetworkInterfaceHandle {
        interface_id: format!("eni-primary-{}", instance_id),
        private_ip: Some(Ipv4Addr::new(10, 0, 9, last_octet)),
        status: InterfaceStatus::InUse,
        attachment: Some(Attachment {
            attachment_id: format!("eni-attach-primary-{}", instance_id),
            instance_id: instance_id.to_string(),
            device_index: 0,
        }),
        subnet_id: SUBNET.to_string(),
    }
}

/// Attach outside any binder, as another actor would
pub async fn pre_attach(cloud: &InMemoryEc2, interface_id: &str, instance_id: &str) -> String {
    cloud
        .attach_network_interface(interface_id, instance_id, 1)
        .await
        .expect("pre-attach succeeds")
}

pub fn test_config() -> BinderConfig {
    BinderConfig {
        bind_rebind_retries: 3,
        binding_retry_interval_ms: 300_000,
        binding_retry_interval_when_unbound_ms: 60_000,
        retry_sleep_ms: 1_000,
        discovery: enibind_core::DiscoveryConfig::default()
            .with_service_urls(ZONE, &["http://unused.example.net/"]),
        ..BinderConfig::default()
    }
}

/// Binder wired to the given collaborators
pub fn make_binder(
    instance_id: &str,
    urls: Arc<dyn ServiceUrlSource>,
    ec2: Arc<dyn Ec2Api>,
    registry: Arc<dyn PeerRegistry>,
) -> (EniBinder, mpsc::Receiver<BinderEvent>) {
    make_binder_with(test_config(), instance_id, urls, ec2, registry)
}

pub fn make_binder_with(
    config: BinderConfig,
    instance_id: &str,
    urls: Arc<dyn ServiceUrlSource>,
    ec2: Arc<dyn Ec2Api>,
    registry: Arc<dyn PeerRegistry>,
) -> (EniBinder, mpsc::Receiver<BinderEvent>) {
    EniBinder::new(
        config,
        urls,
        Arc::new(StaticIdentity::new(instance_id, ZONE)),
        ec2,
        registry,
    )
    .expect("binder construction succeeds")
}

/// Binder for `instance_id` over `cloud`, candidates ordered as `octets`
pub fn binder_for(
    instance_id: &str,
    cloud: &InMemoryEc2,
    octets: &[u8],
) -> (EniBinder, mpsc::Receiver<BinderEvent>, Arc<RecordingRegistry>) {
    let urls = ScriptedUrls::default()
        .with_zone(ZONE, octets.iter().map(|o| candidate_url(*o)).collect());
    let registry = Arc::new(RecordingRegistry::syncing(5));
    let (binder, rx) = make_binder(
        instance_id,
        Arc::new(urls),
        Arc::new(cloud.clone()),
        registry.clone(),
    );
    (binder, rx, registry)
}

/// Every event currently buffered
pub fn drain(rx: &mut mpsc::Receiver<BinderEvent>) -> Vec<BinderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn position_of(events: &[BinderEvent], pred: impl Fn(&BinderEvent) -> bool) -> Option<usize> {
    events.iter().position(pred)
}

pub fn assert_error_kind(err: &Error, provider: bool) {
    assert_eq!(err.is_provider_error(), provider, "unexpected error kind: {}", err);
}
