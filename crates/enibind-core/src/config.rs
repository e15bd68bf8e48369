//! Configuration types for the ENI binder
//!
//! This module defines all configuration structures used throughout the crate.
//! Every field has a default so a partial JSON document (or an empty one) is a
//! valid starting point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Key used for service URLs that apply to any zone without its own entry
pub const DEFAULT_ZONE: &str = "defaultZone";

/// Main binder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinderConfig {
    /// Which binding strategy the host process selected
    #[serde(default)]
    pub binding_strategy: BindingStrategy,

    /// Attempts for the startup bind and the shutdown unbind
    #[serde(default = "default_bind_rebind_retries")]
    pub bind_rebind_retries: usize,

    /// Periodic re-check interval while bound (milliseconds)
    #[serde(default = "default_binding_retry_interval_ms")]
    pub binding_retry_interval_ms: u64,

    /// Periodic re-check interval while unbound (milliseconds)
    #[serde(default = "default_binding_retry_interval_when_unbound_ms")]
    pub binding_retry_interval_when_unbound_ms: u64,

    /// Fixed sleep between startup/shutdown attempts (milliseconds)
    #[serde(default = "default_retry_sleep_ms")]
    pub retry_sleep_ms: u64,

    /// Capacity of the binder event channel
    ///
    /// When full, events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Candidate discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Cloud account settings
    #[serde(default)]
    pub aws: AwsConfig,
}

impl BinderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            binding_strategy: BindingStrategy::default(),
            bind_rebind_retries: default_bind_rebind_retries(),
            binding_retry_interval_ms: default_binding_retry_interval_ms(),
            binding_retry_interval_when_unbound_ms: default_binding_retry_interval_when_unbound_ms(),
            retry_sleep_ms: default_retry_sleep_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            discovery: DiscoveryConfig::default(),
            aws: AwsConfig::default(),
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.binding_strategy != BindingStrategy::Eni {
            return Err(crate::Error::config(format!(
                "Binding strategy '{}' is not handled by the ENI binder",
                self.binding_strategy
            )));
        }

        if self.binding_retry_interval_ms == 0 {
            return Err(crate::Error::config("Binding retry interval must be > 0"));
        }

        if self.binding_retry_interval_when_unbound_ms == 0 {
            return Err(crate::Error::config(
                "Binding retry interval when unbound must be > 0",
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.discovery.validate()?;
        self.aws.validate()?;

        Ok(())
    }

    pub fn bound_interval(&self) -> Duration {
        Duration::from_millis(self.binding_retry_interval_ms)
    }

    pub fn unbound_interval(&self) -> Duration {
        Duration::from_millis(self.binding_retry_interval_when_unbound_ms)
    }

    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Address binding strategy selected by the host process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrategy {
    /// Elastic IP association
    Eip,
    /// DNS record ownership
    Route53,
    /// Secondary network interface attachment
    #[default]
    Eni,
}

impl fmt::Display for BindingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingStrategy::Eip => "eip",
            BindingStrategy::Route53 => "route53",
            BindingStrategy::Eni => "eni",
        };
        f.write_str(name)
    }
}

impl FromStr for BindingStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eip" => Ok(BindingStrategy::Eip),
            "route53" => Ok(BindingStrategy::Route53),
            "eni" => Ok(BindingStrategy::Eni),
            other => Err(crate::Error::config(format!(
                "Unknown binding strategy '{}'. Valid: eip, route53, eni",
                other
            ))),
        }
    }
}

/// Candidate discovery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Use the DNS TXT chain instead of static service URLs
    #[serde(default)]
    pub should_use_dns_for_fetching_service_urls: bool,

    /// Static service URLs per zone, in priority order
    ///
    /// The [`DEFAULT_ZONE`] entry applies to zones without their own list.
    /// Entries may hold comma-separated URLs.
    #[serde(default)]
    pub service_urls: BTreeMap<String, Vec<String>>,

    /// DNS TXT discovery settings
    #[serde(default)]
    pub dns: Option<DnsDiscoveryConfig>,
}

impl DiscoveryConfig {
    /// Add a zone's static URLs (comma-separated lists are split)
    pub fn with_service_urls(mut self, zone: impl Into<String>, urls: &[&str]) -> Self {
        let urls = urls
            .iter()
            .flat_map(|u| u.split(','))
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        self.service_urls.insert(zone.into(), urls);
        self
    }

    /// Validate the discovery configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.should_use_dns_for_fetching_service_urls {
            match self.dns {
                Some(ref dns) if !dns.domain.trim().is_empty() => Ok(()),
                _ => Err(crate::Error::config(
                    "DNS discovery enabled but no DNS domain configured",
                )),
            }
        } else if self.service_urls.values().all(Vec::is_empty) {
            Err(crate::Error::config(
                "Static discovery selected but no service URLs configured",
            ))
        } else {
            Ok(())
        }
    }
}

/// DNS TXT discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsDiscoveryConfig {
    /// Domain holding the `txt.<region>.<domain>` records
    pub domain: String,

    /// Port placed in generated service URLs
    #[serde(default = "default_service_port")]
    pub port: u16,

    /// Path context placed in generated service URLs
    #[serde(default = "default_service_context")]
    pub context: String,
}

impl DnsDiscoveryConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            port: default_service_port(),
            context: default_service_context(),
        }
    }
}

/// Cloud account configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Access key id (optional; instance profile otherwise)
    #[serde(default)]
    pub access_id: Option<String>,

    /// Secret access key
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Region; derived from the availability zone when absent
    #[serde(default)]
    pub region: Option<String>,
}

// Custom Debug implementation that hides the secret key
impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("access_id", &self.access_id)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .field("region", &self.region)
            .finish()
    }
}

impl AwsConfig {
    /// Validate the account configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let has_id = self.access_id.as_deref().is_some_and(|s| !s.is_empty());
        let has_secret = self.secret_key.as_deref().is_some_and(|s| !s.is_empty());

        if has_id != has_secret {
            return Err(crate::Error::config(
                "AWS access id and secret key must be set together",
            ));
        }

        Ok(())
    }

    /// Credentials the cloud client should be built with
    pub fn credentials(&self) -> AwsCredentials {
        match (self.access_id.as_deref(), self.secret_key.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                AwsCredentials::Static {
                    access_key_id: id.to_string(),
                    secret_access_key: secret.to_string(),
                }
            }
            _ => AwsCredentials::InstanceProfile,
        }
    }

    /// Region for API calls made from `availability_zone`
    ///
    /// A configured region wins (trimmed, lowercased). Otherwise the zone's
    /// trailing letter is dropped: `us-east-1a` → `us-east-1`.
    pub fn region_for_zone(&self, availability_zone: &str) -> String {
        region_for_zone(self.region.as_deref(), availability_zone)
    }
}

/// Configured region if set, else the zone without its trailing letter
pub fn region_for_zone(configured: Option<&str>, availability_zone: &str) -> String {
    if let Some(region) = configured.map(str::trim)
        && !region.is_empty()
    {
        return region.to_lowercase();
    }

    let zone = availability_zone.trim();
    match zone.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => zone[..zone.len() - 1].to_string(),
        _ => zone.to_string(),
    }
}

/// Resolved credential source for the cloud client
#[derive(Clone, PartialEq, Eq)]
pub enum AwsCredentials {
    /// Explicit key pair
    Static {
        access_key_id: String,
        secret_access_key: String,
    },
    /// Ambient instance-profile credentials
    InstanceProfile,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AwsCredentials::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<REDACTED>")
                .finish(),
            AwsCredentials::InstanceProfile => f.write_str("InstanceProfile"),
        }
    }
}

fn default_bind_rebind_retries() -> usize {
    3
}

fn default_binding_retry_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_binding_retry_interval_when_unbound_ms() -> u64 {
    60 * 1000
}

fn default_retry_sleep_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_service_port() -> u16 {
    8080
}

fn default_service_context() -> String {
    "eureka/v2".to_string()
}
