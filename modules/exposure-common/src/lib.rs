pub mod types;
pub mod risk;
pub mod report;
pub mod config;
pub mod error;

pub use types::*;
pub use risk::*;
pub use report::*;
pub use config::{Config, TuningConfig};
pub use error::ExposureError;
