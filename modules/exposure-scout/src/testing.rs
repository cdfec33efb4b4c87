// Test doubles for the analysis pipeline.
//
// - MockAdapter (SourceAdapter): canned payload, canned failure, optional delay
// - Record builders for the common record types
// - canonical(): order-free view of a merged entity for comparisons

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use exposure_common::{
    AttrValue, EntityType, Finding, MergedEntity, MergedRecord, NormalizedRecord, RecordType,
    SourceError, SourceErrorKind, SourceId,
};

use crate::traits::SourceAdapter;

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

enum Reply {
    Payload(Value),
    Failure(SourceErrorKind),
}

/// Adapter with a scripted reply. Builder pattern: `.returns()`, `.fails()`,
/// `.delayed()`. Without a reply it fails with `unavailable`.
pub struct MockAdapter {
    source: SourceId,
    reply: Reply,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            reply: Reply::Failure(SourceErrorKind::Unavailable),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returns(mut self, payload: Value) -> Self {
        self.reply = Reply::Payload(payload);
        self
    }

    pub fn fails(mut self, kind: SourceErrorKind) -> Self {
        self.reply = Reply::Failure(kind);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    async fn query(
        &self,
        entity_type: EntityType,
        entity_key: &str,
    ) -> Result<Finding, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Reply::Payload(payload) => Ok(Finding::success(
                self.source,
                entity_type,
                entity_key,
                payload.clone(),
            )),
            Reply::Failure(kind) => Err(SourceError::new(
                self.source,
                *kind,
                format!("MockAdapter: scripted {kind}"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Record helpers
// ---------------------------------------------------------------------------

pub fn profile(entity_key: &str, source: SourceId, url: &str) -> NormalizedRecord {
    NormalizedRecord::new(entity_key, RecordType::ProfileMatch, source)
        .with("url", AttrValue::text(url))
}

pub fn breach(entity_key: &str, source: SourceId, name: &str) -> NormalizedRecord {
    NormalizedRecord::new(entity_key, RecordType::Breach, source)
        .with("breach_source", AttrValue::text(name))
        .with("fingerprint", AttrValue::text(name.to_lowercase()))
}

pub fn subdomain(entity_key: &str, source: SourceId, hostname: &str) -> NormalizedRecord {
    NormalizedRecord::new(entity_key, RecordType::Subdomain, source)
        .with("hostname", AttrValue::text(hostname))
}

pub fn service(entity_key: &str, source: SourceId, ip: &str, port: i64) -> NormalizedRecord {
    NormalizedRecord::new(entity_key, RecordType::ServiceExposure, source)
        .with("ip", AttrValue::text(ip))
        .with("port", AttrValue::Int(port))
}

/// Records sorted by type, then attributes, then sources. Two merges of the
/// same input in different orders have equal canonical views.
pub fn canonical(entity: &MergedEntity) -> Vec<MergedRecord> {
    let mut records = entity.records.clone();
    records.sort_by(|a, b| {
        a.record
            .record_type
            .cmp(&b.record.record_type)
            .then_with(|| a.record.attributes.cmp(&b.record.attributes))
            .then_with(|| a.sources.cmp(&b.sources))
    });
    records
}
