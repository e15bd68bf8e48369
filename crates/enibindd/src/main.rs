// # enibindd - ENI Binder Daemon
//
// Thin integration layer around `enibind-core`:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the binder's collaborators
// 4. Starting the binder, then shutting it down on SIGTERM/SIGINT
//
// All binding logic, retries and scheduling live in `enibind-core`.
//
// ## Configuration
//
// ### Identity
// - `ENIBIND_INSTANCE_ID`, `ENIBIND_AVAILABILITY_ZONE`: fixed identity (both or neither)
// - `ENIBIND_IMDS_URL`: metadata endpoint when no fixed identity is given
//
// ### Discovery
// - `ENIBIND_SERVICE_URLS`: `zone=url,url;zone=url`; entries without a zone go to `defaultZone`
// - `ENIBIND_USE_DNS`: `true` to discover through DNS TXT records
// - `ENIBIND_DNS_DOMAIN`, `ENIBIND_DNS_PORT`, `ENIBIND_DNS_CONTEXT`: DNS discovery settings
// - `ENIBIND_DOH_ENDPOINT`: DNS-over-HTTPS resolver for TXT lookups (required with DNS;
//   it must see the zone holding the discovery records)
//
// ### Cloud
// - `ENIBIND_CLOUD_BACKEND`: `simulated` (in-process cloud seeded with the candidate pool)
// - `ENIBIND_SUBNET_ID`: subnet of the simulated instance and pool
// - `ENIBIND_REGION`, `ENIBIND_ACCESS_ID`, `ENIBIND_SECRET_KEY`: account settings
//
// ### Binder
// - `ENIBIND_BINDING_STRATEGY`: `eni` (the only strategy this binder serves)
// - `ENIBIND_BIND_RETRIES`: startup/shutdown attempts
// - `ENIBIND_BOUND_INTERVAL_MS`, `ENIBIND_UNBOUND_INTERVAL_MS`: pass intervals
// - `ENIBIND_RETRY_SLEEP_MS`: sleep between failed attempts
// - `ENIBIND_SHUTDOWN_TIMEOUT_SECS`: upper bound on the shutdown unbind
// - `ENIBIND_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export ENIBIND_INSTANCE_ID=i-0abc123
// export ENIBIND_AVAILABILITY_ZONE=us-east-1a
// export ENIBIND_SERVICE_URLS="us-east-1a=http://ip-10-0-1-4.ec2.internal:8080/eureka/v2/"
//
// enibindd
// ```

use anyhow::{Context, Result};
use enibind_core::cloud::InMemoryEc2;
use enibind_core::config::{
    AwsConfig, AwsCredentials, BinderConfig, BindingStrategy, DEFAULT_ZONE, DiscoveryConfig,
    DnsDiscoveryConfig,
};
use enibind_core::traits::{
    InstanceIdentityProvider, NoopPeerRegistry, ServiceUrlSource, StaticIdentity, TxtResolver,
};
use enibind_core::types::NetworkInterfaceHandle;
use enibind_core::{BinderEvent, CandidateResolver, EniBinder};
use std::collections::BTreeMap;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum BinderExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<BinderExitCode> for ExitCode {
    fn from(code: BinderExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    instance_id: Option<String>,
    availability_zone: Option<String>,
    imds_url: Option<String>,
    service_urls: BTreeMap<String, Vec<String>>,
    use_dns: bool,
    dns_domain: Option<String>,
    dns_port: Option<u16>,
    dns_context: Option<String>,
    doh_endpoint: Option<String>,
    cloud_backend: String,
    subnet_id: String,
    region: Option<String>,
    access_id: Option<String>,
    secret_key: Option<String>,
    binding_strategy: Option<BindingStrategy>,
    bind_retries: Option<usize>,
    bound_interval_ms: Option<u64>,
    unbound_interval_ms: Option<u64>,
    retry_sleep_ms: Option<u64>,
    shutdown_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            instance_id: var("ENIBIND_INSTANCE_ID"),
            availability_zone: var("ENIBIND_AVAILABILITY_ZONE"),
            imds_url: var("ENIBIND_IMDS_URL"),
            service_urls: parse_service_urls(&var("ENIBIND_SERVICE_URLS").unwrap_or_default()),
            use_dns: parse_opt::<bool>("ENIBIND_USE_DNS", var("ENIBIND_USE_DNS"))?.unwrap_or(false),
            dns_domain: var("ENIBIND_DNS_DOMAIN"),
            dns_port: parse_opt("ENIBIND_DNS_PORT", var("ENIBIND_DNS_PORT"))?,
            dns_context: var("ENIBIND_DNS_CONTEXT"),
            doh_endpoint: var("ENIBIND_DOH_ENDPOINT"),
            cloud_backend: var("ENIBIND_CLOUD_BACKEND").unwrap_or_else(|| "simulated".to_string()),
            subnet_id: var("ENIBIND_SUBNET_ID").unwrap_or_else(|| "subnet-simulated".to_string()),
            region: var("ENIBIND_REGION"),
            access_id: var("ENIBIND_ACCESS_ID"),
            secret_key: var("ENIBIND_SECRET_KEY"),
            binding_strategy: parse_opt(
                "ENIBIND_BINDING_STRATEGY",
                var("ENIBIND_BINDING_STRATEGY"),
            )?,
            bind_retries: parse_opt("ENIBIND_BIND_RETRIES", var("ENIBIND_BIND_RETRIES"))?,
            bound_interval_ms: parse_opt("ENIBIND_BOUND_INTERVAL_MS", var("ENIBIND_BOUND_INTERVAL_MS"))?,
            unbound_interval_ms: parse_opt(
                "ENIBIND_UNBOUND_INTERVAL_MS",
                var("ENIBIND_UNBOUND_INTERVAL_MS"),
            )?,
            retry_sleep_ms: parse_opt("ENIBIND_RETRY_SLEEP_MS", var("ENIBIND_RETRY_SLEEP_MS"))?,
            shutdown_timeout_secs: parse_opt(
                "ENIBIND_SHUTDOWN_TIMEOUT_SECS",
                var("ENIBIND_SHUTDOWN_TIMEOUT_SECS"),
            )?
            .unwrap_or(30),
            log_level: var("ENIBIND_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the daemon-level settings
    ///
    /// Binder settings are validated again by `BinderConfig::validate()`.
    fn validate(&self) -> Result<()> {
        if self.instance_id.is_some() != self.availability_zone.is_some() {
            anyhow::bail!(
                "ENIBIND_INSTANCE_ID and ENIBIND_AVAILABILITY_ZONE must be set together"
            );
        }

        if self.instance_id.is_none() && !cfg!(feature = "http") {
            anyhow::bail!(
                "ENIBIND_INSTANCE_ID is required when built without the metadata client"
            );
        }

        if self.use_dns && !cfg!(feature = "http") {
            anyhow::bail!("ENIBIND_USE_DNS requires the DNS-over-HTTPS resolver (http feature)");
        }

        if self.use_dns && self.doh_endpoint.is_none() {
            anyhow::bail!(
                "ENIBIND_USE_DNS requires ENIBIND_DOH_ENDPOINT, a resolver that can see \
                the discovery records"
            );
        }

        match self.cloud_backend.as_str() {
            "simulated" => {}
            "ec2" => anyhow::bail!(
                "ENIBIND_CLOUD_BACKEND 'ec2' needs a cloud client supplied by the embedding \
                application; the daemon ships only the simulated backend"
            ),
            other => anyhow::bail!(
                "ENIBIND_CLOUD_BACKEND '{}' is not supported. Supported backends: simulated",
                other
            ),
        }

        if let Some(retries) = self.bind_retries
            && !(1..=10).contains(&retries)
        {
            anyhow::bail!("ENIBIND_BIND_RETRIES must be between 1 and 10. Got: {}", retries);
        }

        if let Some(sleep) = self.retry_sleep_ms
            && !(100..=60_000).contains(&sleep)
        {
            anyhow::bail!(
                "ENIBIND_RETRY_SLEEP_MS must be between 100 and 60000. Got: {}",
                sleep
            );
        }

        if !(1..=600).contains(&self.shutdown_timeout_secs) {
            anyhow::bail!(
                "ENIBIND_SHUTDOWN_TIMEOUT_SECS must be between 1 and 600. Got: {}",
                self.shutdown_timeout_secs
            );
        }

        self.log_level()?;
        Ok(())
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ENIBIND_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Core binder configuration derived from the environment
    fn binder_config(&self) -> Result<BinderConfig> {
        let mut config = BinderConfig::new();

        if let Some(strategy) = self.binding_strategy {
            config.binding_strategy = strategy;
        }
        if let Some(retries) = self.bind_retries {
            config.bind_rebind_retries = retries;
        }
        if let Some(ms) = self.bound_interval_ms {
            config.binding_retry_interval_ms = ms;
        }
        if let Some(ms) = self.unbound_interval_ms {
            config.binding_retry_interval_when_unbound_ms = ms;
        }
        if let Some(ms) = self.retry_sleep_ms {
            config.retry_sleep_ms = ms;
        }

        config.discovery = DiscoveryConfig {
            should_use_dns_for_fetching_service_urls: self.use_dns,
            service_urls: self.service_urls.clone(),
            dns: self.dns_domain.as_ref().map(|domain| {
                let mut dns = DnsDiscoveryConfig::new(domain.clone());
                if let Some(port) = self.dns_port {
                    dns.port = port;
                }
                if let Some(context) = &self.dns_context {
                    dns.context = context.clone();
                }
                dns
            }),
        };

        config.aws = AwsConfig {
            access_id: self.access_id.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
        };

        config.validate().context("Invalid binder configuration")?;
        Ok(config)
    }
}

fn parse_opt<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, v, e))
        })
        .transpose()
}

/// Parse `zone=url,url;zone=url`; entries without `zone=` go to `defaultZone`
fn parse_service_urls(raw: &str) -> BTreeMap<String, Vec<String>> {
    let mut urls: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        // `=` only separates a zone when it comes before any URL scheme
        let (zone, list) = match entry.split_once('=') {
            Some((zone, list)) if !zone.contains("://") => (zone.trim(), list),
            _ => (DEFAULT_ZONE, entry),
        };

        urls.entry(zone.to_string()).or_default().extend(
            list.split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from),
        );
    }

    urls
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return BinderExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return BinderExitCode::ConfigError.into();
    }

    let binder_config = match config.binder_config() {
        Ok(binder_config) => binder_config,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return BinderExitCode::ConfigError.into();
        }
    };

    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return BinderExitCode::ConfigError.into();
    }

    info!("Starting enibindd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BinderExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, binder_config).await {
            error!("Daemon error: {:#}", e);
            BinderExitCode::RuntimeError
        } else {
            BinderExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config, binder_config: BinderConfig) -> Result<()> {
    let identity = build_identity(&config)?;

    let resolver = build_txt_resolver(&config);
    let discovery =
        enibind_core::discovery::from_config(&binder_config.discovery, config.region.clone(), resolver)
            .context("Failed to build service URL discovery")?;
    info!(source = discovery.source_name(), "Service URL discovery ready");

    let cloud = simulated_cloud(&config, &binder_config.aws, identity.as_ref(), &discovery).await;
    warn!("Using the simulated cloud backend: no provider calls are made");

    let (binder, events) = EniBinder::new(
        binder_config,
        discovery,
        identity,
        Arc::new(cloud),
        Arc::new(NoopPeerRegistry),
    )
    .context("Failed to create binder")?;

    let event_logger = tokio::spawn(log_events(events));

    binder.start().await;
    info!(status = ?binder.status(), "Binder started");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(timeout, binder.shutdown()).await.is_err() {
        anyhow::bail!("Shutdown did not finish within {:?}", timeout);
    }

    drop(binder);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    info!("Daemon stopped");
    Ok(())
}

fn build_identity(config: &Config) -> Result<Arc<dyn InstanceIdentityProvider>> {
    if let (Some(instance_id), Some(zone)) = (&config.instance_id, &config.availability_zone) {
        info!("Using fixed instance identity");
        return Ok(Arc::new(StaticIdentity::new(instance_id.clone(), zone.clone())));
    }

    metadata_identity(config)
}

#[cfg(feature = "http")]
fn metadata_identity(config: &Config) -> Result<Arc<dyn InstanceIdentityProvider>> {
    let provider = match &config.imds_url {
        Some(url) => enibind_http::ImdsIdentityProvider::with_base_url(url.clone()),
        None => enibind_http::ImdsIdentityProvider::new(),
    };
    info!("Using instance metadata service for identity");
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "http"))]
fn metadata_identity(_config: &Config) -> Result<Arc<dyn InstanceIdentityProvider>> {
    anyhow::bail!("No instance identity configured")
}

#[cfg(feature = "http")]
fn build_txt_resolver(config: &Config) -> Option<Arc<dyn TxtResolver>> {
    if !config.use_dns {
        return None;
    }

    // Validation guarantees an endpoint; without one discovery setup reports it
    let endpoint = config.doh_endpoint.clone()?;
    Some(Arc::new(enibind_http::DohTxtResolver::new(endpoint)))
}

#[cfg(not(feature = "http"))]
fn build_txt_resolver(_config: &Config) -> Option<Arc<dyn TxtResolver>> {
    None
}

/// In-process cloud holding this instance and one free interface per
/// candidate address of its zone
///
/// Identity and candidate failures leave the cloud partly seeded. They are
/// not fatal here: the binder's own attempts and passes report them.
async fn simulated_cloud(
    config: &Config,
    aws: &AwsConfig,
    identity: &dyn InstanceIdentityProvider,
    discovery: &Arc<dyn ServiceUrlSource>,
) -> InMemoryEc2 {
    let cloud = InMemoryEc2::new();

    let metadata = match identity.metadata().await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(error = %e, "Instance metadata unavailable, simulated cloud left empty");
            return cloud;
        }
    };
    let zone = metadata.availability_zone.as_str();

    let credentials = aws.credentials();
    info!(
        instance_id = %metadata.instance_id,
        zone,
        region = %aws.region_for_zone(zone),
        credentials = ?credentials,
        "Cloud account resolved"
    );
    if matches!(credentials, AwsCredentials::Static { .. }) {
        warn!("Static credentials are configured but the simulated backend never uses them");
    }

    cloud.add_instance(metadata.instance_id.as_str(), config.subnet_id.clone());

    match CandidateResolver::new(discovery.clone())
        .resolve_candidates(zone)
        .await
    {
        Ok(candidates) => {
            for (n, ip) in candidates.ips().into_iter().enumerate() {
                cloud.add_interface(NetworkInterfaceHandle::available(
                    format!("eni-sim-{}", n + 1),
                    ip,
                    config.subnet_id.clone(),
                ));
            }
            info!(
                subnet_id = %config.subnet_id,
                interfaces = candidates.len(),
                "Simulated cloud seeded"
            );
        }
        Err(e) => {
            warn!(error = %e, zone, "Candidate pool unavailable, simulated cloud has no interfaces");
        }
    }

    cloud
}

async fn log_events(mut events: tokio::sync::mpsc::Receiver<BinderEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "Binder event");
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
