use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use exposure_common::{Config, EntityType, ExposureError, Report, SourceErrorKind};

use crate::adapters::build_adapters;
use crate::coordinator::QueryCoordinator;
use crate::merger::merge;
use crate::normalize::try_normalize;
use crate::recommendations::{Catalog, RecommendationSelector};
use crate::report::assemble;
use crate::scoring::{score, RankList};
use crate::traits::{RankLookup, SourceAdapter};

/// Counters for one analysis run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub sources_attempted: u32,
    pub sources_succeeded: u32,
    pub sources_failed: u32,
    pub sources_timed_out: u32,
    pub payload_anomalies: u32,
    pub records_normalized: u32,
    pub records_merged: u32,
    pub assessments: u32,
    pub recommendations: u32,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Exposure Run Complete ===")?;
        writeln!(f, "Sources attempted:  {}", self.sources_attempted)?;
        writeln!(f, "Sources succeeded:  {}", self.sources_succeeded)?;
        writeln!(f, "Sources failed:     {}", self.sources_failed)?;
        writeln!(f, "Sources timed out:  {}", self.sources_timed_out)?;
        writeln!(f, "Payload anomalies:  {}", self.payload_anomalies)?;
        writeln!(f, "Records normalized: {}", self.records_normalized)?;
        writeln!(f, "Records merged:     {}", self.records_merged)?;
        writeln!(f, "Assessments:        {}", self.assessments)?;
        writeln!(f, "Recommendations:    {}", self.recommendations)?;
        writeln!(f, "Elapsed:            {}ms", self.elapsed_ms)?;
        Ok(())
    }
}

/// Coordinator, normalizer, merger, scorer, selector and assembler wired
/// together behind `analyze`.
#[derive(TypedBuilder)]
pub struct Pipeline {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    coordinator: QueryCoordinator,
    #[builder(default = Arc::new(RankList::default()) as Arc<dyn RankLookup>)]
    rank_lookup: Arc<dyn RankLookup>,
    #[builder(default)]
    catalog: Catalog,
    #[builder(default = 2)]
    recommendations_per_assessment: usize,
    /// Fixed seed for reproducible recommendation picks; random when unset.
    #[builder(default)]
    recommendation_seed: Option<u64>,
}

impl Pipeline {
    /// Production wiring: real adapters, the configured rank list and
    /// catalog.
    pub fn from_config(config: &Config) -> Result<Self, ExposureError> {
        let tuning = &config.tuning;
        let rank_lookup: Arc<dyn RankLookup> = match &tuning.rank_list_path {
            Some(path) => Arc::new(RankList::load(path)),
            None => Arc::new(RankList::default()),
        };
        let catalog = match &tuning.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::builtin(),
        };

        Ok(Pipeline::builder()
            .adapters(build_adapters(config))
            .coordinator(QueryCoordinator::from_tuning(tuning))
            .rank_lookup(rank_lookup)
            .catalog(catalog)
            .recommendations_per_assessment(tuning.recommendations_per_assessment)
            .recommendation_seed(tuning.recommendation_seed)
            .build())
    }

    pub async fn analyze(&self, entity_type: EntityType, entity_key: &str) -> Result<Report, ExposureError> {
        let (report, _) = self.analyze_with_stats(entity_type, entity_key).await?;
        Ok(report)
    }

    /// Full run. The only errors are an invalid entity key; every source
    /// failure ends up inside the report.
    pub async fn analyze_with_stats(
        &self,
        entity_type: EntityType,
        entity_key: &str,
    ) -> Result<(Report, RunStats), ExposureError> {
        let key = entity_type.validate_key(entity_key)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("analysis", %run_id, %entity_type, entity_key = key.as_str());
        Ok(self.run(entity_type, &key).instrument(span).await)
    }

    async fn run(&self, entity_type: EntityType, key: &str) -> (Report, RunStats) {
        let started = Instant::now();
        let mut stats = RunStats::default();
        info!("Analysis starting");

        let aggregate = self.coordinator.run(entity_type, key, &self.adapters).await;
        stats.sources_attempted = aggregate.attempted.len() as u32;
        stats.sources_succeeded = aggregate.succeeded() as u32;
        stats.sources_failed = aggregate.errors.len() as u32;
        stats.sources_timed_out = aggregate
            .errors
            .iter()
            .filter(|e| e.kind == SourceErrorKind::Timeout)
            .count() as u32;

        let mut records = Vec::new();
        for finding in &aggregate.findings {
            match try_normalize(finding) {
                Ok(found) => records.extend(found),
                Err(anomaly) => {
                    stats.payload_anomalies += 1;
                    warn!(
                        source = %finding.source_id,
                        reason = %anomaly,
                        "Unrecognized payload, skipped"
                    );
                }
            }
        }
        stats.records_normalized = records.len() as u32;

        let merged = merge(entity_type, key, records);
        stats.records_merged = merged.records.len() as u32;

        let assessments = score(&merged, self.rank_lookup.as_ref());
        stats.assessments = assessments.len() as u32;

        let mut selector = match self.recommendation_seed {
            Some(seed) => RecommendationSelector::seeded(seed, self.recommendations_per_assessment),
            None => RecommendationSelector::from_os_rng(self.recommendations_per_assessment),
        };
        let recommendations: Vec<_> = assessments
            .iter()
            .flat_map(|a| selector.select(a, &self.catalog))
            .collect();
        stats.recommendations = recommendations.len() as u32;

        let report = assemble(entity_type, key, &merged, &assessments, &recommendations, &aggregate);

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!("{stats}");
        (report, stats)
    }
}
