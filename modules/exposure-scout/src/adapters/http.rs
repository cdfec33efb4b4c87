use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use exposure_common::{Config, EntityType, Finding, SourceError, SourceErrorKind, SourceId};
use provider_clients::{require_key, ProviderClient, ProviderError};

use super::classify;
use crate::normalize::domain::DNS_TYPES;
use crate::traits::SourceAdapter;

const HUNTER_LIMIT: u32 = 50;

/// Adapter for the REST providers. Holds its own credential, passed in from
/// `Config`; nothing is read from the process environment here.
pub struct HttpAdapter {
    source: SourceId,
    client: ProviderClient,
    api_key: Option<String>,
    wayback_limit: u32,
}

impl HttpAdapter {
    pub fn new(source: SourceId, client: ProviderClient, api_key: Option<String>) -> Self {
        Self {
            source,
            client,
            api_key,
            wayback_limit: 500,
        }
    }

    /// `None` for sources that are not HTTP providers.
    pub fn from_config(source: SourceId, client: ProviderClient, config: &Config) -> Option<Self> {
        let api_key = match source {
            SourceId::Hibp => config.hibp_api_key.clone(),
            SourceId::BreachDirectory => config.breachdirectory_api_key.clone(),
            SourceId::Hunter => config.hunter_api_key.clone(),
            SourceId::Shodan => config.shodan_api_key.clone(),
            SourceId::VirusTotal => config.virustotal_api_key.clone(),
            SourceId::CrtSh | SourceId::Wayback | SourceId::Dns | SourceId::Whois => None,
            SourceId::Sherlock | SourceId::Maigret | SourceId::Holehe | SourceId::TheHarvester => {
                return None
            }
        };
        let mut adapter = Self::new(source, client, api_key);
        adapter.wayback_limit = config.tuning.wayback_limit;
        Some(adapter)
    }

    fn key(&self, name: &'static str) -> provider_clients::Result<&str> {
        require_key(self.api_key.as_deref(), name)
    }

    async fn fetch(&self, entity_key: &str) -> provider_clients::Result<Value> {
        match self.source {
            SourceId::Hibp => {
                let key = self.key("HIBP_API_KEY")?;
                self.client.hibp_breached_account(key, entity_key).await
            }
            SourceId::BreachDirectory => {
                let key = self.key("BREACHDIRECTORY_API_KEY")?;
                self.client.breachdirectory_lookup(key, entity_key).await
            }
            SourceId::CrtSh => self.client.crtsh_certificates(entity_key).await,
            SourceId::Hunter => {
                let key = self.key("HUNTER_API_KEY")?;
                self.client
                    .hunter_domain_search(key, entity_key, HUNTER_LIMIT)
                    .await
            }
            SourceId::Wayback => {
                self.client
                    .wayback_snapshots(entity_key, self.wayback_limit)
                    .await
            }
            SourceId::Shodan => self.shodan(entity_key).await,
            SourceId::VirusTotal => {
                let key = self.key("VT_API_KEY")?;
                self.client.virustotal_domain(key, entity_key).await
            }
            SourceId::Dns => self.dns(entity_key).await,
            SourceId::Whois => self.client.rdap_domain(entity_key).await,
            other => Err(ProviderError::Parse(format!("{other} is not an HTTP provider"))),
        }
    }

    /// One resolver query per record type, keyed by type. A failed type is
    /// left out; the source fails only when every type does.
    async fn dns(&self, domain: &str) -> provider_clients::Result<Value> {
        let mut answers = serde_json::Map::new();
        let mut first_error = None;
        for (record_type, _) in DNS_TYPES {
            match self.client.dns_records(domain, record_type).await {
                Ok(answer) => {
                    answers.insert(record_type.to_string(), answer);
                }
                Err(e) => {
                    debug!(domain, record_type, error = %e, "DNS query failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) if answers.is_empty() => Err(e),
            _ => Ok(Value::Object(answers)),
        }
    }

    /// Resolve, then look the address up. A domain that does not resolve, or
    /// an address Shodan has never seen, is an empty result.
    async fn shodan(&self, domain: &str) -> provider_clients::Result<Value> {
        let key = self.key("SHODAN_API_KEY")?;
        let Some(ip) = self.client.shodan_resolve(key, domain).await? else {
            debug!(domain, "Shodan could not resolve domain");
            return Ok(Value::Null);
        };
        match self.client.shodan_host(key, &ip).await {
            Err(ProviderError::Api { status: 404, .. }) => Ok(json!({ "ip_str": ip })),
            other => other,
        }
    }
}

#[async_trait]
impl SourceAdapter for HttpAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    async fn query(&self, entity_type: EntityType, entity_key: &str) -> Result<Finding, SourceError> {
        if !self.supports(entity_type) {
            return Err(SourceError::new(
                self.source,
                SourceErrorKind::Unavailable,
                format!("{} does not handle {entity_type} lookups", self.source),
            ));
        }
        let started = Instant::now();
        match self.fetch(entity_key).await {
            Ok(payload) => {
                debug!(
                    source = %self.source,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Provider responded"
                );
                Ok(Finding::success(self.source, entity_type, entity_key, payload))
            }
            Err(e) => Err(classify(self.source, &e)),
        }
    }
}
