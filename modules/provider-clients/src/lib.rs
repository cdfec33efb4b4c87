pub mod error;

pub use error::{ProviderError, Result};

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

const HIBP_BASE_URL: &str = "https://haveibeenpwned.com/api/v3";
const BREACHDIRECTORY_URL: &str = "https://breachdirectory.p.rapidapi.com/";
const BREACHDIRECTORY_HOST: &str = "breachdirectory.p.rapidapi.com";
const CRTSH_URL: &str = "https://crt.sh/";
const HUNTER_BASE_URL: &str = "https://api.hunter.io/v2";
const WAYBACK_CDX_URL: &str = "https://web.archive.org/cdx/search/cdx";
const SHODAN_BASE_URL: &str = "https://api.shodan.io";
const VIRUSTOTAL_BASE_URL: &str = "https://www.virustotal.com/api/v3";
const DOH_RESOLVE_URL: &str = "https://dns.google/resolve";
const RDAP_BASE_URL: &str = "https://rdap.org";

const USER_AGENT: &str = concat!("exposure-scout/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an `Api` error message.
const MAX_ERROR_BODY: usize = 300;

/// Unwrap an optional API key or fail with `MissingCredential`.
pub fn require_key<'a>(key: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    match key {
        Some(k) if !k.trim().is_empty() => Ok(k),
        _ => Err(ProviderError::MissingCredential(name)),
    }
}

/// One HTTP client shared by every provider. Methods return the provider's
/// JSON untouched; interpretation happens downstream.
#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { client }
    }

    async fn fetch_json(&self, request: RequestBuilder) -> Result<Value> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }
        let bytes = resp.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// HaveIBeenPwned breached-account lookup. A 404 means "not pwned" and
    /// comes back as an empty list.
    pub async fn hibp_breached_account(&self, api_key: &str, email: &str) -> Result<Value> {
        let mut url = Url::parse(HIBP_BASE_URL)?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Parse("HIBP base URL cannot take a path".into()))?
            .push("breachedaccount")
            .push(email);

        let request = self
            .client
            .get(url)
            .header("hibp-api-key", api_key)
            .query(&[("truncateResponse", "false")]);

        match self.fetch_json(request).await {
            Err(ProviderError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                tracing::debug!(email, "HIBP reports no breaches");
                Ok(Value::Array(Vec::new()))
            }
            other => other,
        }
    }

    /// BreachDirectory (RapidAPI) lookup for an email, username or hash.
    pub async fn breachdirectory_lookup(&self, api_key: &str, term: &str) -> Result<Value> {
        let request = self
            .client
            .get(BREACHDIRECTORY_URL)
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", BREACHDIRECTORY_HOST)
            .query(&[("func", "auto"), ("term", term)]);
        self.fetch_json(request).await
    }

    /// Certificate transparency entries for `domain` and its subdomains.
    pub async fn crtsh_certificates(&self, domain: &str) -> Result<Value> {
        let pattern = format!("%.{domain}");
        let request = self
            .client
            .get(CRTSH_URL)
            .query(&[("q", pattern.as_str()), ("output", "json")]);
        self.fetch_json(request).await
    }

    /// Hunter.io domain search: public email addresses for a domain.
    pub async fn hunter_domain_search(&self, api_key: &str, domain: &str, limit: u32) -> Result<Value> {
        let limit = limit.to_string();
        let request = self
            .client
            .get(format!("{HUNTER_BASE_URL}/domain-search"))
            .query(&[("domain", domain), ("limit", limit.as_str()), ("api_key", api_key)]);
        self.fetch_json(request).await
    }

    /// Wayback Machine CDX listing. The first row is the column header.
    pub async fn wayback_snapshots(&self, domain: &str, limit: u32) -> Result<Value> {
        let limit = limit.to_string();
        let request = self.client.get(WAYBACK_CDX_URL).query(&[
            ("url", domain),
            ("output", "json"),
            ("limit", limit.as_str()),
        ]);
        self.fetch_json(request).await
    }

    /// Resolve a hostname to an IP through Shodan's DNS endpoint.
    pub async fn shodan_resolve(&self, api_key: &str, domain: &str) -> Result<Option<String>> {
        let request = self
            .client
            .get(format!("{SHODAN_BASE_URL}/dns/resolve"))
            .query(&[("hostnames", domain), ("key", api_key)]);
        let body = self.fetch_json(request).await?;
        Ok(body
            .get(domain)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Shodan host record (open ports, banners, vulns) for an IP.
    pub async fn shodan_host(&self, api_key: &str, ip: &str) -> Result<Value> {
        let request = self
            .client
            .get(format!("{SHODAN_BASE_URL}/shodan/host/{ip}"))
            .query(&[("key", api_key)]);
        self.fetch_json(request).await
    }

    /// DNS-over-HTTPS lookup of one record type (JSON API). The answer
    /// section comes back as `Answer: [{name, type, TTL, data}]`; a domain
    /// with no records of the type has no `Answer` at all.
    pub async fn dns_records(&self, domain: &str, record_type: &str) -> Result<Value> {
        let request = self
            .client
            .get(DOH_RESOLVE_URL)
            .header("Accept", "application/dns-json")
            .query(&[("name", domain), ("type", record_type)]);
        self.fetch_json(request).await
    }

    /// RDAP registration data for a domain through the rdap.org bootstrap
    /// redirector. An unregistered domain, or a TLD without an RDAP
    /// service, comes back as `Null`.
    pub async fn rdap_domain(&self, domain: &str) -> Result<Value> {
        let mut url = Url::parse(RDAP_BASE_URL)?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Parse("RDAP base URL cannot take a path".into()))?
            .push("domain")
            .push(domain);

        let request = self
            .client
            .get(url)
            .header("Accept", "application/rdap+json");

        match self.fetch_json(request).await {
            Err(ProviderError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                tracing::debug!(domain, "No RDAP record");
                Ok(Value::Null)
            }
            other => other,
        }
    }

    /// VirusTotal v3 domain report.
    pub async fn virustotal_domain(&self, api_key: &str, domain: &str) -> Result<Value> {
        let request = self
            .client
            .get(format!("{VIRUSTOTAL_BASE_URL}/domains/{domain}"))
            .header("x-apikey", api_key);
        self.fetch_json(request).await
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_or_missing_keys_are_missing_credentials() {
        assert!(matches!(
            require_key(None, "HIBP_API_KEY"),
            Err(ProviderError::MissingCredential("HIBP_API_KEY"))
        ));
        assert!(require_key(Some("  "), "HIBP_API_KEY").is_err());
        assert_eq!(require_key(Some("abc"), "HIBP_API_KEY").unwrap(), "abc");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(1_000);
        let short = truncate(&body, 10);
        assert_eq!(short, format!("{}...", "x".repeat(10)));
        assert_eq!(truncate("ok", 10), "ok");
    }
}
