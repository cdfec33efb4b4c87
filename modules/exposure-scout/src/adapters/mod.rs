//! Concrete source adapters and the registry that builds them from config.

pub mod http;
pub mod process;

use std::sync::Arc;

use provider_clients::{ProviderClient, ProviderError};
use tracing::info;

use exposure_common::{Config, SourceError, SourceErrorKind, SourceId};

use crate::traits::SourceAdapter;

pub use http::HttpAdapter;
pub use process::ProcessAdapter;

/// One adapter per known source. Sources without credentials are still
/// built; they report `auth_missing` when queried.
pub fn build_adapters(config: &Config) -> Vec<Arc<dyn SourceAdapter>> {
    let client = ProviderClient::new(config.tuning.per_source_timeout());
    let adapters: Vec<Arc<dyn SourceAdapter>> = SourceId::ALL
        .into_iter()
        .filter_map(|source| -> Option<Arc<dyn SourceAdapter>> {
            if let Some(adapter) = HttpAdapter::from_config(source, client.clone(), config) {
                return Some(Arc::new(adapter));
            }
            ProcessAdapter::from_config(source, config).map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
        })
        .collect();

    info!(count = adapters.len(), "Source adapters registered");
    adapters
}

/// Map a provider failure onto the source error taxonomy.
pub fn classify(source: SourceId, err: &ProviderError) -> SourceError {
    let kind = match err {
        ProviderError::MissingCredential(_) => SourceErrorKind::AuthMissing,
        ProviderError::Timeout(_) => SourceErrorKind::Timeout,
        ProviderError::Parse(_) => SourceErrorKind::MalformedResponse,
        ProviderError::Network(_) => SourceErrorKind::Unavailable,
        ProviderError::Api { status, .. } => match status {
            401 | 403 => SourceErrorKind::AuthMissing,
            429 => SourceErrorKind::RateLimited,
            _ => SourceErrorKind::Unavailable,
        },
    };
    SourceError::new(source, kind, err.to_string())
}
