use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use exposure_common::{
    EntityType, Finding, SourceError, SourceErrorKind, SourceId, TuningConfig,
};

use crate::traits::SourceAdapter;

/// Everything one fan-out produced. `findings` holds successes only; each
/// failed or timed-out source shows up once in `errors` and once, as a
/// placeholder, in `failed`.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub findings: Vec<Finding>,
    pub failed: Vec<Finding>,
    pub errors: Vec<SourceError>,
    /// Sources the run selected for the entity type, in adapter order.
    pub attempted: Vec<SourceId>,
}

impl AggregateResult {
    pub fn succeeded(&self) -> usize {
        self.findings.len()
    }

    pub fn all_failed(&self) -> bool {
        self.findings.is_empty() && !self.attempted.is_empty()
    }
}

/// Fans a query out to every adapter that supports the entity type, with a
/// concurrency cap, a per-source timeout and a hard deadline for the run.
#[derive(Debug, Clone)]
pub struct QueryCoordinator {
    per_source_timeout: Duration,
    run_deadline: Duration,
    max_in_flight: usize,
}

impl QueryCoordinator {
    pub fn new(per_source_timeout: Duration, run_deadline: Duration, max_in_flight: usize) -> Self {
        Self {
            per_source_timeout,
            run_deadline,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn from_tuning(tuning: &TuningConfig) -> Self {
        Self::new(
            tuning.per_source_timeout(),
            tuning.run_deadline(),
            tuning.max_in_flight,
        )
    }

    /// Query every supporting adapter. Never fails: a source that errors or
    /// exceeds its timeout becomes a `SourceError`, and sources still running
    /// at the run deadline are abandoned and reported as timeouts.
    pub async fn run(
        &self,
        entity_type: EntityType,
        entity_key: &str,
        adapters: &[Arc<dyn SourceAdapter>],
    ) -> AggregateResult {
        let selected: Vec<Arc<dyn SourceAdapter>> = adapters
            .iter()
            .filter(|a| a.supports(entity_type))
            .cloned()
            .collect();

        let mut result = AggregateResult {
            attempted: selected.iter().map(|a| a.source_id()).collect(),
            ..Default::default()
        };
        if selected.is_empty() {
            warn!(%entity_type, "No adapters support this entity type");
            return result;
        }

        info!(
            %entity_type,
            sources = selected.len(),
            max_in_flight = self.max_in_flight,
            "Querying sources"
        );

        let per_source_timeout = self.per_source_timeout;
        let deadline = tokio::time::Instant::now() + self.run_deadline;

        let queries = selected.into_iter().enumerate().map(|(slot, adapter)| async move {
            let source = adapter.source_id();
            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(per_source_timeout, adapter.query(entity_type, entity_key))
                    .await
                {
                    Ok(Ok(finding)) if finding.is_success() => Ok(finding),
                    Ok(Ok(finding)) => Err(SourceError::new(
                        source,
                        SourceErrorKind::MalformedResponse,
                        format!("adapter returned a {:?} finding as success", finding.status),
                    )),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(SourceError::new(
                        source,
                        SourceErrorKind::Timeout,
                        format!("no response within {}s", per_source_timeout.as_secs_f32()),
                    )),
                };
            (slot, source, started.elapsed(), outcome)
        });
        let mut outcomes = stream::iter(queries).buffer_unordered(self.max_in_flight);

        let mut completed = vec![false; result.attempted.len()];
        loop {
            match tokio::time::timeout_at(deadline, outcomes.next()).await {
                Ok(Some((slot, source, elapsed, outcome))) => {
                    completed[slot] = true;
                    match outcome {
                        Ok(finding) => {
                            info!(%source, elapsed_ms = elapsed.as_millis() as u64, "Source returned");
                            result.findings.push(finding);
                        }
                        Err(e) => {
                            warn!(
                                %source,
                                kind = %e.kind,
                                elapsed_ms = elapsed.as_millis() as u64,
                                error = %e.message,
                                "Source failed"
                            );
                            result.push_failure(entity_type, entity_key, e);
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        deadline_secs = self.run_deadline.as_secs(),
                        "Run deadline reached, abandoning outstanding sources"
                    );
                    break;
                }
            }
        }
        // Dropping the stream cancels whatever is still in flight.
        drop(outcomes);

        let abandoned: Vec<SourceId> = result
            .attempted
            .iter()
            .zip(&completed)
            .filter(|(_, done)| !**done)
            .map(|(source, _)| *source)
            .collect();
        for source in abandoned {
            result.push_failure(
                entity_type,
                entity_key,
                SourceError::new(source, SourceErrorKind::Timeout, "abandoned at run deadline"),
            );
        }

        result.errors.sort_by_key(|e| e.source_id);
        result.failed.sort_by_key(|f| f.source_id);
        result
    }
}

impl AggregateResult {
    fn push_failure(&mut self, entity_type: EntityType, entity_key: &str, error: SourceError) {
        self.failed.push(Finding::failed(
            error.source_id,
            entity_type,
            entity_key,
            error.kind,
        ));
        self.errors.push(error);
    }
}
