pub mod adapters;
pub mod coordinator;
pub mod merger;
pub mod normalize;
pub mod pipeline;
pub mod recommendations;
pub mod report;
pub mod scoring;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use coordinator::{AggregateResult, QueryCoordinator};
pub use pipeline::{Pipeline, RunStats};
pub use traits::{RankLookup, SourceAdapter};
