use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ExposureError;

/// Sentinel used for attribute values a provider did not supply.
pub const UNKNOWN: &str = "unknown";

// --- Entity ---

/// The kind of identifier under investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Username,
    Email,
    Domain,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Username, EntityType::Email, EntityType::Domain];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Username => "username",
            EntityType::Email => "email",
            EntityType::Domain => "domain",
        }
    }

    /// Trim and sanity-check a raw key for this entity type. Domains are
    /// lower-cased; usernames and emails keep their case.
    ///
    /// Keys end up as command-line arguments to external tools and in report
    /// file names, so option-like keys and path separators are rejected.
    pub fn validate_key(&self, raw: &str) -> Result<String, ExposureError> {
        let key = raw.trim();
        let invalid = || ExposureError::InvalidEntityKey {
            entity_type: *self,
            key: raw.to_string(),
        };
        if key.is_empty()
            || key.chars().any(|c| c.is_whitespace() || c.is_control())
            || key.starts_with('-')
            || key.contains(['/', '\\'])
            || key.contains("..")
        {
            return Err(invalid());
        }

        match self {
            EntityType::Username => Ok(key.to_string()),
            EntityType::Email => match key.split_once('@') {
                Some((local, domain))
                    if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
                {
                    Ok(key.to_string())
                }
                _ => Err(invalid()),
            },
            EntityType::Domain => {
                let domain = key.trim_end_matches('.').to_lowercase();
                let valid = domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.contains('@');
                if valid {
                    Ok(domain)
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ExposureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "username" | "user" => Ok(EntityType::Username),
            "email" | "mail" => Ok(EntityType::Email),
            "domain" => Ok(EntityType::Domain),
            other => Err(ExposureError::UnknownEntityType(other.to_string())),
        }
    }
}

// --- Sources ---

/// Every provider the scout knows how to query. Each belongs to exactly one
/// entity type, so the per-type adapter sets never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Sherlock,
    Maigret,
    Hibp,
    BreachDirectory,
    Holehe,
    CrtSh,
    Hunter,
    TheHarvester,
    Wayback,
    Shodan,
    VirusTotal,
    Dns,
    Whois,
}

impl SourceId {
    pub const ALL: [SourceId; 13] = [
        SourceId::Sherlock,
        SourceId::Maigret,
        SourceId::Hibp,
        SourceId::BreachDirectory,
        SourceId::Holehe,
        SourceId::CrtSh,
        SourceId::Hunter,
        SourceId::TheHarvester,
        SourceId::Wayback,
        SourceId::Shodan,
        SourceId::VirusTotal,
        SourceId::Dns,
        SourceId::Whois,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Sherlock => "sherlock",
            SourceId::Maigret => "maigret",
            SourceId::Hibp => "hibp",
            SourceId::BreachDirectory => "breachdirectory",
            SourceId::Holehe => "holehe",
            SourceId::CrtSh => "crtsh",
            SourceId::Hunter => "hunter",
            SourceId::TheHarvester => "theharvester",
            SourceId::Wayback => "wayback",
            SourceId::Shodan => "shodan",
            SourceId::VirusTotal => "virustotal",
            SourceId::Dns => "dns",
            SourceId::Whois => "whois",
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            SourceId::Sherlock | SourceId::Maigret => EntityType::Username,
            SourceId::Hibp | SourceId::BreachDirectory | SourceId::Holehe => EntityType::Email,
            SourceId::CrtSh
            | SourceId::Hunter
            | SourceId::TheHarvester
            | SourceId::Wayback
            | SourceId::Shodan
            | SourceId::VirusTotal
            | SourceId::Dns
            | SourceId::Whois => EntityType::Domain,
        }
    }

    /// Baseline confidence in a single observation from this provider.
    pub fn base_confidence(&self) -> f32 {
        match self {
            SourceId::Hibp | SourceId::Dns => 0.95,
            SourceId::CrtSh | SourceId::Wayback | SourceId::Shodan | SourceId::Whois => 0.9,
            SourceId::Maigret | SourceId::VirusTotal => 0.8,
            SourceId::Sherlock | SourceId::BreachDirectory => 0.7,
            SourceId::Holehe | SourceId::TheHarvester => 0.6,
            SourceId::Hunter => 0.5,
        }
    }

    pub fn for_entity(entity_type: EntityType) -> Vec<SourceId> {
        Self::ALL
            .into_iter()
            .filter(|s| s.entity_type() == entity_type)
            .collect()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Findings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Success,
    Error,
    Timeout,
}

/// Raw output of one source for one entity. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub source_id: SourceId,
    pub entity_key: String,
    pub entity_type: EntityType,
    pub status: FindingStatus,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl Finding {
    pub fn success(
        source_id: SourceId,
        entity_type: EntityType,
        entity_key: &str,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source_id,
            entity_key: entity_key.to_string(),
            entity_type,
            status: FindingStatus::Success,
            payload,
            fetched_at: Utc::now(),
        }
    }

    /// A placeholder finding for a source that errored or timed out.
    pub fn failed(
        source_id: SourceId,
        entity_type: EntityType,
        entity_key: &str,
        kind: SourceErrorKind,
    ) -> Self {
        let status = match kind {
            SourceErrorKind::Timeout => FindingStatus::Timeout,
            _ => FindingStatus::Error,
        };
        Self {
            source_id,
            entity_key: entity_key.to_string(),
            entity_type,
            status,
            payload: serde_json::Value::Null,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FindingStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    AuthMissing,
    MalformedResponse,
    Timeout,
}

impl SourceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceErrorKind::Unavailable => "unavailable",
            SourceErrorKind::RateLimited => "rate_limited",
            SourceErrorKind::AuthMissing => "auth_missing",
            SourceErrorKind::MalformedResponse => "malformed_response",
            SourceErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source failure captured as data. Never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{source_id} {kind}: {message}")]
pub struct SourceError {
    pub source_id: SourceId,
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(source_id: SourceId, kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            source_id,
            kind,
            message: message.into(),
        }
    }
}

// --- Normalized records ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    ProfileMatch,
    Breach,
    ServiceAccount,
    Subdomain,
    Dns,
    EmailAddress,
    ServiceExposure,
    Vulnerability,
    Snapshot,
    AvVerdict,
    Registration,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::ProfileMatch => "profile_match",
            RecordType::Breach => "breach",
            RecordType::ServiceAccount => "service_account",
            RecordType::Subdomain => "subdomain",
            RecordType::Dns => "dns",
            RecordType::EmailAddress => "email_address",
            RecordType::ServiceExposure => "service_exposure",
            RecordType::Vulnerability => "vulnerability",
            RecordType::Snapshot => "snapshot",
            RecordType::AvVerdict => "av_verdict",
            RecordType::Registration => "registration",
        }
    }

    /// Section heading used in reports.
    pub fn title(&self) -> &'static str {
        match self {
            RecordType::ProfileMatch => "Profiles",
            RecordType::Breach => "Breaches",
            RecordType::ServiceAccount => "Registered services",
            RecordType::Subdomain => "Subdomains",
            RecordType::Dns => "DNS records",
            RecordType::EmailAddress => "Email addresses",
            RecordType::ServiceExposure => "Exposed services",
            RecordType::Vulnerability => "Known vulnerabilities",
            RecordType::Snapshot => "Archived snapshots",
            RecordType::AvVerdict => "Antivirus verdicts",
            RecordType::Registration => "Registration (WHOIS)",
        }
    }

    /// Name of the report summary metric counting this record type.
    pub fn summary_metric(&self) -> &'static str {
        match self {
            RecordType::ProfileMatch => "profiles_found",
            RecordType::Breach => "breaches_found",
            RecordType::ServiceAccount => "services_found",
            RecordType::Subdomain => "subdomains_found",
            RecordType::Dns => "dns_records_found",
            RecordType::EmailAddress => "emails_found",
            RecordType::ServiceExposure => "exposed_services_found",
            RecordType::Vulnerability => "vulnerabilities_found",
            RecordType::Snapshot => "snapshots_found",
            RecordType::AvVerdict => "av_detections_found",
            RecordType::Registration => "registrations_found",
        }
    }

    /// Attributes that together identify a logical item of this type.
    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            RecordType::ProfileMatch => &["url"],
            RecordType::Breach => &["breach_source", "fingerprint"],
            RecordType::ServiceAccount => &["domain"],
            RecordType::Subdomain => &["hostname"],
            RecordType::Dns => &["record", "value"],
            RecordType::EmailAddress => &["address"],
            RecordType::ServiceExposure => &["ip", "port"],
            RecordType::Vulnerability => &["cve"],
            RecordType::Snapshot => &["timestamp", "original"],
            RecordType::AvVerdict => &["engine"],
            RecordType::Registration => &["domain"],
        }
    }

    /// Record types a report for `entity_type` always accounts for.
    pub fn relevant_for(entity_type: EntityType) -> &'static [RecordType] {
        match entity_type {
            EntityType::Username => &[RecordType::ProfileMatch],
            EntityType::Email => &[RecordType::Breach, RecordType::ServiceAccount],
            EntityType::Domain => &[
                RecordType::Registration,
                RecordType::Subdomain,
                RecordType::Dns,
                RecordType::EmailAddress,
                RecordType::ServiceExposure,
                RecordType::Vulnerability,
                RecordType::Snapshot,
                RecordType::AvVerdict,
            ],
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value. `Unknown` is the explicit "provider did not say"
/// sentinel and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Unknown,
}

static UNKNOWN_ATTR: AttrValue = AttrValue::Unknown;

impl AttrValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN) {
            AttrValue::Unknown
        } else {
            AttrValue::Text(trimmed.to_string())
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AttrValue::Unknown)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Render for equality keys. Unknown and blank values have no key form.
    pub fn key_part(&self) -> Option<String> {
        match self {
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Int(n) => Some(n.to_string()),
            AttrValue::Text(s) if !s.is_empty() && s != UNKNOWN => Some(s.clone()),
            AttrValue::Text(_) | AttrValue::Unknown => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(n) => write!(f, "{n}"),
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Unknown => f.write_str(UNKNOWN),
        }
    }
}

/// One canonical observation from one source. Attributes are flat so the
/// merger needs no per-source schema knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub entity_key: String,
    pub record_type: RecordType,
    pub attributes: BTreeMap<String, AttrValue>,
    pub source_id: SourceId,
    pub confidence: f32,
}

impl NormalizedRecord {
    pub fn new(entity_key: &str, record_type: RecordType, source_id: SourceId) -> Self {
        Self {
            entity_key: entity_key.to_string(),
            record_type,
            attributes: BTreeMap::new(),
            source_id,
            confidence: source_id.base_confidence(),
        }
    }

    pub fn with(mut self, name: &str, value: AttrValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Attribute lookup; absent attributes read as `Unknown`.
    pub fn attr(&self, name: &str) -> &AttrValue {
        self.attributes.get(name).unwrap_or(&UNKNOWN_ATTR)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.attr(name).as_str()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.attr(name).as_i64()
    }

    /// True only when the attribute is a known `true`.
    pub fn flag(&self, name: &str) -> bool {
        self.attr(name).as_bool().unwrap_or(false)
    }

    /// Type-specific equality key, or `None` when any component is missing.
    /// Records without a key are never merged with anything.
    pub fn equality_key(&self) -> Option<String> {
        let parts = self
            .record_type
            .key_fields()
            .iter()
            .map(|field| self.attr(field).key_part())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("\u{1f}"))
    }
}

// --- Merged entity ---

/// One logical item after dedup, with every source that reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub record: NormalizedRecord,
    pub sources: BTreeSet<SourceId>,
}

impl MergedRecord {
    pub fn record_type(&self) -> RecordType {
        self.record.record_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedEntity {
    pub entity_key: String,
    pub entity_type: EntityType,
    pub records: Vec<MergedRecord>,
    pub provenance: BTreeSet<SourceId>,
}

impl MergedEntity {
    pub fn empty(entity_type: EntityType, entity_key: &str) -> Self {
        Self {
            entity_key: entity_key.to_string(),
            entity_type,
            records: Vec::new(),
            provenance: BTreeSet::new(),
        }
    }

    pub fn records_of(&self, record_type: RecordType) -> impl Iterator<Item = &MergedRecord> {
        self.records
            .iter()
            .filter(move |r| r.record_type() == record_type)
    }

    /// Number of logical items of a type. Every total shown anywhere is
    /// computed here.
    pub fn count_of(&self, record_type: RecordType) -> usize {
        self.records_of(record_type).count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
