//! Source payloads to canonical records.
//!
//! One mapping per `(source, entity type)` pair. A payload whose shape a
//! mapping does not recognize yields no records and a logged anomaly; it never
//! fails the run.

pub(crate) mod domain;
mod email;
pub(crate) mod fields;
mod username;

use thiserror::Error;
use tracing::warn;

use exposure_common::{EntityType, Finding, NormalizedRecord, SourceId};

/// A payload the mapping could not interpret.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct Anomaly(String);

impl Anomaly {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub(crate) type MapResult = Result<Vec<NormalizedRecord>, Anomaly>;

/// Records for one finding. Failed findings have none; anomalies are logged
/// and dropped.
pub fn normalize(finding: &Finding) -> Vec<NormalizedRecord> {
    match try_normalize(finding) {
        Ok(records) => records,
        Err(anomaly) => {
            warn!(
                source = %finding.source_id,
                entity_key = %finding.entity_key,
                reason = %anomaly,
                "Unrecognized payload, skipped"
            );
            Vec::new()
        }
    }
}

/// Like `normalize`, but hands the anomaly back instead of logging it.
pub fn try_normalize(finding: &Finding) -> MapResult {
    if !finding.is_success() {
        return Ok(Vec::new());
    }
    match (finding.source_id, finding.entity_type) {
        (SourceId::Sherlock, EntityType::Username) => username::sherlock(finding),
        (SourceId::Maigret, EntityType::Username) => username::maigret(finding),
        (SourceId::Hibp, EntityType::Email) => email::hibp(finding),
        (SourceId::BreachDirectory, EntityType::Email) => email::breachdirectory(finding),
        (SourceId::Holehe, EntityType::Email) => email::holehe(finding),
        (SourceId::CrtSh, EntityType::Domain) => domain::crtsh(finding),
        (SourceId::Hunter, EntityType::Domain) => domain::hunter(finding),
        (SourceId::TheHarvester, EntityType::Domain) => domain::theharvester(finding),
        (SourceId::Wayback, EntityType::Domain) => domain::wayback(finding),
        (SourceId::Shodan, EntityType::Domain) => domain::shodan(finding),
        (SourceId::VirusTotal, EntityType::Domain) => domain::virustotal(finding),
        (SourceId::Dns, EntityType::Domain) => domain::dns(finding),
        (SourceId::Whois, EntityType::Domain) => domain::whois(finding),
        (source, entity_type) => Err(Anomaly::new(format!(
            "no mapping for {source} on a {entity_type}"
        ))),
    }
}
