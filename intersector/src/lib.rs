//! Intersects RNA-seq differential expression with ChIP-seq peak annotation.

pub mod analysis;
pub mod annotation_tools;
pub mod cli;
pub mod config;
pub mod data_handling;
pub mod errors;
pub mod helper_functions;
pub mod models;
pub mod pipeline;
pub mod report;

pub use annotation_tools::{CancellationToken, HomerAnnotator, PeakAnnotator};
pub use config::{Genome, HeaderMode, IntersectConfig, Thresholds};
pub use errors::{AnnotationError, IntersectError};
pub use pipeline::{Pipeline, PipelineReport};
