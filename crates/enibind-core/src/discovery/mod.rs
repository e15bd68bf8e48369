// # Service URL Discovery
//
// Implementations of `ServiceUrlSource` and the selection between them.
// Which one runs is decided once, from
// `DiscoveryConfig::should_use_dns_for_fetching_service_urls`.

pub mod dns_txt;
pub mod static_urls;

pub use dns_txt::DnsTxtServiceUrls;
pub use static_urls::StaticServiceUrls;

use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::traits::{ServiceUrlSource, TxtResolver};

/// Build the discovery source selected by configuration
///
/// # Parameters
///
/// - `config`: discovery settings
/// - `region`: explicit region for the DNS chain (derived from zone if `None`)
/// - `resolver`: TXT resolver, required when DNS discovery is selected
pub fn from_config(
    config: &DiscoveryConfig,
    region: Option<String>,
    resolver: Option<Arc<dyn TxtResolver>>,
) -> Result<Arc<dyn ServiceUrlSource>> {
    if !config.should_use_dns_for_fetching_service_urls {
        return Ok(Arc::new(StaticServiceUrls::new(config.service_urls.clone())));
    }

    let settings = config
        .dns
        .clone()
        .ok_or_else(|| Error::config("DNS discovery enabled but no DNS settings configured"))?;
    let resolver = resolver
        .ok_or_else(|| Error::config("DNS discovery enabled but no TXT resolver supplied"))?;

    Ok(Arc::new(DnsTxtServiceUrls::new(resolver, settings, region)))
}
