//! External peak-annotation tools.
//!
//! The pipeline only sees [`PeakAnnotator`]: a request goes in, and either the path
//! of a finished annotation table or a typed [`AnnotationError`] comes back.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Genome;
use crate::errors::AnnotationError;

pub mod homer_integration;

pub use homer_integration::HomerAnnotator;

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRequest {
    pub peak_file: PathBuf,
    pub genome: Genome,
    /// Where the annotation table must end up.
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationOutput {
    pub table_path: PathBuf,
    /// Whatever the tool printed on stderr; HOMER logs progress there.
    pub diagnostics: String,
}

pub trait PeakAnnotator {
    fn name(&self) -> &str;

    fn annotate(
        &self,
        request: &AnnotationRequest,
        cancel: &CancellationToken,
    ) -> Result<AnnotationOutput, AnnotationError>;
}

/// Shared flag a caller flips to abort a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
