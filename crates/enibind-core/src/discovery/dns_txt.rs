// # DNS TXT Service URLs
//
// Two-level TXT chain:
//
// ```text
// txt.us-east-1.eureka.example.net   = "us-east-1a.eureka.example.net" "us-east-1b.eureka.example.net"
// txt.us-east-1a.eureka.example.net  = "ip-172-31-1-10.ec2.internal" "ip-172-31-1-11.ec2.internal"
// ```
//
// The region record lists one DNS name per zone; the name whose first label is
// the local zone is followed to the record listing that zone's hosts. Each
// host becomes `http://<host>:<port>/<context>/`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{DnsDiscoveryConfig, region_for_zone};
use crate::traits::{ServiceUrlSource, TxtResolver};

/// Service URLs discovered through DNS TXT records
pub struct DnsTxtServiceUrls {
    resolver: Arc<dyn TxtResolver>,
    settings: DnsDiscoveryConfig,
    /// Explicit region; derived from the zone when `None`
    region: Option<String>,
}

impl DnsTxtServiceUrls {
    pub fn new(
        resolver: Arc<dyn TxtResolver>,
        settings: DnsDiscoveryConfig,
        region: Option<String>,
    ) -> Self {
        Self {
            resolver,
            settings,
            region,
        }
    }

    /// TXT values split into whitespace-separated tokens, quotes removed
    async fn txt_tokens(&self, name: &str) -> Result<Vec<String>, crate::Error> {
        let records = self.resolver.lookup_txt(name).await?;
        Ok(records
            .iter()
            .flat_map(|record| record.split_whitespace())
            .map(|token| token.trim_matches('"').to_string())
            .filter(|token| !token.is_empty())
            .collect())
    }

    fn service_url(&self, host: &str) -> String {
        let context = self.settings.context.trim_matches('/');
        if context.is_empty() {
            format!("http://{}:{}/", host, self.settings.port)
        } else {
            format!("http://{}:{}/{}/", host, self.settings.port, context)
        }
    }
}

#[async_trait]
impl ServiceUrlSource for DnsTxtServiceUrls {
    async fn service_urls_for_zone(&self, zone: &str) -> Result<Vec<String>, crate::Error> {
        let region = region_for_zone(self.region.as_deref(), zone);
        let region_record = format!("txt.{}.{}", region, self.settings.domain.trim_matches('.'));

        let zone_names = self.txt_tokens(&region_record).await?;
        debug!(record = %region_record, zones = ?zone_names, "Resolved zone records");

        let mut urls = Vec::new();
        for zone_name in zone_names.iter().filter(|name| {
            name.split('.')
                .next()
                .is_some_and(|label| label.eq_ignore_ascii_case(zone))
        }) {
            let zone_record = format!("txt.{}", zone_name.trim_end_matches('.'));
            let hosts = self.txt_tokens(&zone_record).await?;
            debug!(record = %zone_record, hosts = ?hosts, "Resolved zone hosts");

            urls.extend(hosts.iter().map(|host| self.service_url(host)));
        }

        Ok(urls)
    }

    fn source_name(&self) -> &'static str {
        "dns"
    }
}
