// Seams of the analysis pipeline.
//
// SourceAdapter: one external provider (HTTP API or local CLI tool) behind a
//   single async query. Failures come back as SourceError values, never panics.
// RankLookup: popularity rank of a domain, used by rank-based scoring.
//
// Tests swap in MockAdapter and in-memory rank lists; no network, no binaries.

use async_trait::async_trait;

use exposure_common::{EntityType, Finding, SourceError, SourceId};

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Whether this adapter can answer for `entity_type`.
    fn supports(&self, entity_type: EntityType) -> bool {
        self.source_id().entity_type() == entity_type
    }

    /// Query the provider once. A success carries the provider payload
    /// untouched; every failure is classified into a `SourceError`.
    async fn query(&self, entity_type: EntityType, entity_key: &str)
        -> Result<Finding, SourceError>;
}

/// Popularity rank of a site, lower is more popular. `None` when unlisted.
pub trait RankLookup: Send + Sync {
    fn rank(&self, identifier: &str) -> Option<u64>;
}
