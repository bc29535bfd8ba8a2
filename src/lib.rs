pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod model;
pub mod output;
pub mod resolution;
pub mod resolver;
pub mod scanner;

pub use aggregator::{AggregationOutcome, Aggregator, AggregatorOptions};
pub use cache::ResolutionCache;
pub use config::Config;
pub use error::ScanError;
pub use model::{DependencyArtifact, EvidenceStore, Observation, ScanReport, VersionLocation};
pub use resolver::{normalize, ResolutionMode};
pub use scanner::Scanner;
