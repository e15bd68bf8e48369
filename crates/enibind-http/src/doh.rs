// # DNS-over-HTTPS TXT Resolver
//
// TXT lookups through a resolver's JSON API (`application/dns-json`).
//
// ## Response Shape
//
// ```json
// {"Status":0,"Answer":[{"name":"txt.us-east-1a.example.net","type":16,"data":"\"a\" \"b\""}]}
// ```
//
// Each answer's character-strings are unquoted and returned joined by a
// space, one entry per TXT record, in answer order.
//
// The discovery records usually live in a VPC-private zone, so the endpoint
// has to be a resolver that can see it. There is no public default.

use async_trait::async_trait;
use enibind_core::traits::TxtResolver;
use enibind_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

const TXT_RECORD_TYPE: u16 = 16;
const RCODE_NOERROR: u32 = 0;
const RCODE_NXDOMAIN: u32 = 3;

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,

    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,

    data: String,
}

/// TXT resolver over DNS-over-HTTPS
pub struct DohTxtResolver {
    endpoint: String,
    client: reqwest::Client,
}

impl DohTxtResolver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }

    fn query_url(&self, name: &str) -> String {
        format!("{}?name={}&type=TXT", self.endpoint, name.trim_end_matches('.'))
    }
}

#[async_trait]
impl TxtResolver for DohTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.query_url(name))
            .header("Accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| Error::http(format!("TXT lookup for {} failed: {}", name, e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "TXT lookup for {} returned {}",
                name,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read TXT response for {}: {}", name, e)))?;

        let records = parse_txt_response(name, &body)?;
        tracing::debug!(name, records = records.len(), "Resolved TXT records");
        Ok(records)
    }
}

/// Extract TXT records from a JSON API response body
pub fn parse_txt_response(name: &str, body: &str) -> Result<Vec<String>> {
    let response: DohResponse = serde_json::from_str(body)?;

    match response.status {
        RCODE_NOERROR => {}
        RCODE_NXDOMAIN => {
            return Err(Error::discovery(format!("No DNS record for {}", name)));
        }
        rcode => {
            return Err(Error::discovery(format!(
                "DNS lookup for {} failed with rcode {}",
                name, rcode
            )));
        }
    }

    Ok(response
        .answer
        .iter()
        .filter(|answer| answer.record_type == TXT_RECORD_TYPE)
        .map(|answer| character_strings(&answer.data).join(" "))
        .collect())
}

/// Split TXT data into its character-strings
///
/// Quoted strings may contain spaces and `\"` escapes; unquoted data is
/// split on whitespace.
fn character_strings(data: &str) -> Vec<String> {
    let mut strings = Vec::new();
    let mut chars = data.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut current = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    }
                    '"' => break,
                    other => current.push(other),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                current.push(c);
                chars.next();
            }
        }
        strings.push(current);
    }

    strings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_strings() {
        let body = r#"{"Status":0,"Answer":[
            {"name":"txt.us-east-1a.example.net","type":16,"TTL":60,"data":"\"ip-10-0-1-4.ec2.internal\" \"ip-10-0-1-5.ec2.internal\""}
        ]}"#;

        let records = parse_txt_response("txt.us-east-1a.example.net", body).unwrap();
        assert_eq!(records, vec!["ip-10-0-1-4.ec2.internal ip-10-0-1-5.ec2.internal"]);
    }

    #[test]
    fn test_parse_keeps_answer_order_and_skips_other_types() {
        let body = r#"{"Status":0,"Answer":[
            {"name":"alias.example.net","type":5,"data":"txt.example.net."},
            {"name":"txt.example.net","type":16,"data":"\"b\""},
            {"name":"txt.example.net","type":16,"data":"a"}
        ]}"#;

        let records = parse_txt_response("alias.example.net", body).unwrap();
        assert_eq!(records, vec!["b", "a"]);
    }

    #[test]
    fn test_parse_nxdomain() {
        let err = parse_txt_response("txt.nowhere.example.net", r#"{"Status":3}"#).unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[test]
    fn test_parse_no_answer_is_empty() {
        let records = parse_txt_response("txt.example.net", r#"{"Status":0}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_txt_response("txt.example.net", "not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_character_strings_escapes() {
        assert_eq!(
            character_strings(r#""a b" "c\"d" e"#),
            vec!["a b".to_string(), "c\"d".to_string(), "e".to_string()]
        );
    }

    #[test]
    fn test_query_url() {
        let resolver = DohTxtResolver::new("https://dns.example.net/dns-query");
        assert_eq!(
            resolver.query_url("txt.us-east-1.example.net."),
            "https://dns.example.net/dns-query?name=txt.us-east-1.example.net&type=TXT"
        );
    }
}
