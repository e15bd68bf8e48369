// # Static Service URLs
//
// Per-zone URL lists taken straight from configuration. A zone without its own
// list falls back to the `defaultZone` entry.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::DEFAULT_ZONE;
use crate::traits::ServiceUrlSource;

/// Service URLs configured per zone
#[derive(Debug, Clone, Default)]
pub struct StaticServiceUrls {
    urls: BTreeMap<String, Vec<String>>,
}

impl StaticServiceUrls {
    pub fn new(urls: BTreeMap<String, Vec<String>>) -> Self {
        Self { urls }
    }

    /// URLs for `zone`, comma-separated entries split, blanks dropped
    fn lookup(&self, zone: &str) -> Vec<String> {
        let split = |entries: &Vec<String>| -> Vec<String> {
            entries
                .iter()
                .flat_map(|entry| entry.split(','))
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect()
        };

        match self.urls.get(zone).map(split) {
            Some(urls) if !urls.is_empty() => urls,
            _ => self.urls.get(DEFAULT_ZONE).map(split).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ServiceUrlSource for StaticServiceUrls {
    async fn service_urls_for_zone(&self, zone: &str) -> Result<Vec<String>, crate::Error> {
        Ok(self.lookup(zone))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> StaticServiceUrls {
        let mut urls = BTreeMap::new();
        urls.insert(
            "us-east-1a".to_string(),
            vec!["http://10.0.1.4:8080/eureka/v2/,http://10.0.1.5:8080/eureka/v2/".to_string()],
        );
        urls.insert("us-east-1b".to_string(), Vec::new());
        urls.insert(
            DEFAULT_ZONE.to_string(),
            vec!["http://10.0.9.9:8080/eureka/v2/".to_string()],
        );
        StaticServiceUrls::new(urls)
    }

    #[tokio::test]
    async fn test_zone_specific_urls() {
        let urls = source().service_urls_for_zone("us-east-1a").await.unwrap();
        assert_eq!(
            urls,
            vec!["http://10.0.1.4:8080/eureka/v2/", "http://10.0.1.5:8080/eureka/v2/"]
        );
    }

    #[tokio::test]
    async fn test_default_zone_fallback() {
        let source = source();
        for zone in ["us-east-1b", "us-east-1c"] {
            let urls = source.service_urls_for_zone(zone).await.unwrap();
            assert_eq!(urls, vec!["http://10.0.9.9:8080/eureka/v2/"], "zone {}", zone);
        }
    }

    #[tokio::test]
    async fn test_unknown_zone_without_default_is_empty() {
        let source = StaticServiceUrls::default();
        assert!(source.service_urls_for_zone("us-east-1a").await.unwrap().is_empty());
    }
}
