use std::fs::File;
use std::path::PathBuf;

use tracing::{error, info};

use crate::analysis::classification::{classify_and_persist, Classification};
use crate::analysis::intersection::{intersect, Intersections};
use crate::annotation_tools::{AnnotationRequest, CancellationToken, PeakAnnotator};
use crate::config::IntersectConfig;
use crate::data_handling::annotation_table::AnnotationTable;
use crate::data_handling::expression_table::{ExpressionTable, LoaderOptions};
use crate::errors::{AnnotationError, IntersectError, Result};
use crate::helper_functions::remove_artifact;
use crate::report::{emit_report, ReportOutcome};

pub const NORMALIZED_DEG_FILE: &str = "new_deg_file.tsv";
pub const ANNOTATION_FILE: &str = "annotated_bound_genes.txt";
pub const RUN_CONFIG_FILE: &str = "run_config.json";

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub classification: Classification,
    pub intersections: Intersections,
    pub bound_genes: usize,
    pub outputs: ReportOutcome,
}

pub struct Pipeline<A: PeakAnnotator> {
    config: IntersectConfig,
    annotator: A,
}

impl<A: PeakAnnotator> Pipeline<A> {
    pub fn new(config: IntersectConfig, annotator: A) -> Self {
        Self { config, annotator }
    }

    fn out_path(&self, name: &str) -> PathBuf {
        self.config.settings.output_dir.join(name)
    }

    /// Load, annotate, classify, intersect, report. Intermediates are removed only
    /// after every stage succeeded; an aborted run leaves them for inspection.
    pub fn run(&self, cancel: &CancellationToken) -> Result<PipelineReport> {
        let cfg = &self.config;
        let settings = &cfg.settings;
        cfg.validate()?;
        if !cfg.peak_file.exists() {
            return Err(IntersectError::MissingInput(cfg.peak_file.clone()));
        }
        std::fs::create_dir_all(&settings.output_dir)?;
        info!("Starting ChIP/RNA intersection in {}", settings.output_dir.display());

        // 1) expression table
        let table = ExpressionTable::load(
            &cfg.deg_file,
            &LoaderOptions {
                has_header: settings.deg_has_header,
            },
        )?;
        let normalized_path = self.out_path(NORMALIZED_DEG_FILE);
        table.write_normalized(&normalized_path)?;

        // 2) peak annotation
        if cancel.is_cancelled() {
            return Err(AnnotationError::Cancelled.into());
        }
        info!("Annotating {} with {}", cfg.peak_file.display(), self.annotator.name());
        let request = AnnotationRequest {
            peak_file: cfg.peak_file.clone(),
            genome: cfg.genome,
            output_path: self.out_path(ANNOTATION_FILE),
        };
        let annotation = self.annotator.annotate(&request, cancel).map_err(|e| {
            error!("Peak annotation step failed: {}", e);
            e
        })?;
        let peaks = AnnotationTable::read(&annotation.table_path, settings.annotation_header)?;
        let bound = peaks.bound_genes();
        info!("{} bound genes from {} peaks", bound.len(), peaks.len());

        // 3) classification
        let classification = classify_and_persist(&table, &settings.thresholds, &settings.output_dir)?;

        // 4) intersection
        let intersections = intersect(&classification, &bound);

        // 5) report
        let outputs = emit_report(&settings.output_dir, &classification, &bound, &intersections)?;
        self.write_run_config()?;

        if settings.keep_intermediates {
            info!(
                "Keeping {} and {}",
                normalized_path.display(),
                annotation.table_path.display()
            );
        } else {
            remove_artifact(&normalized_path);
            remove_artifact(&annotation.table_path);
        }

        info!("Intersection complete");
        Ok(PipelineReport {
            classification,
            intersections,
            bound_genes: bound.len(),
            outputs,
        })
    }

    fn write_run_config(&self) -> Result<()> {
        let path = self.out_path(RUN_CONFIG_FILE);
        serde_json::to_writer_pretty(File::create(&path)?, &self.config)?;
        Ok(())
    }
}
