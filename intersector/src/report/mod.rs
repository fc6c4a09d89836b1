//! Output files of one run. Text goes to disk before any chart is attempted, and a
//! chart that fails to render is logged and skipped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::classification::Classification;
use crate::analysis::intersection::Intersections;
use crate::config::Thresholds;
use crate::errors::Result;
use crate::helper_functions::write_lines;
use crate::models::{Fraction, GeneSet};

pub mod bar_graph;
pub mod venn_diagram;

use bar_graph::draw_bar_graph;
use venn_diagram::{draw_venn_diagram, VennCounts};

pub const UP_BOUND_FILE: &str = "upregulated_bound_genes.txt";
pub const DOWN_BOUND_FILE: &str = "downregulated_bound_genes.txt";
pub const SUMMARY_FILE: &str = "intersect_summary.txt";
pub const SUMMARY_JSON_FILE: &str = "intersect_summary.json";
pub const VENN_FILE: &str = "venn_diagram.png";
pub const BAR_FILE: &str = "bar_graph.png";

const RULE_WIDTH: usize = 117;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub thresholds: Thresholds,
    pub total_genes: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub bound_universe: usize,
    pub upregulated_bound: usize,
    pub downregulated_bound: usize,
    pub fraction_upregulated_bound: Fraction,
    pub fraction_downregulated_bound: Fraction,
    pub venn: VennCounts,
}

impl SummaryReport {
    pub fn new(classification: &Classification, bound: &GeneSet, intersections: &Intersections) -> Self {
        Self {
            thresholds: classification.thresholds,
            total_genes: classification.total_genes,
            upregulated: intersections.upregulated.total_class_genes,
            downregulated: intersections.downregulated.total_class_genes,
            bound_universe: bound.len(),
            upregulated_bound: intersections.upregulated.bound_count,
            downregulated_bound: intersections.downregulated.bound_count,
            fraction_upregulated_bound: intersections.upregulated.fraction_bound,
            fraction_downregulated_bound: intersections.downregulated.fraction_bound,
            venn: VennCounts::from_sets(&classification.up_genes, &classification.down_genes, bound),
        }
    }

    pub fn to_text(&self) -> String {
        let rule = "_".repeat(RULE_WIDTH);
        format!(
            "{rule}\n\
             Number of upregulated genes: {}\n\
             Number of downregulated genes: {}\n\n\n\
             Number of upregulated genes bound by TF: {}\n\
             Number of downregulated genes bound by TF: {}\n\n\n\
             Fraction upregulated genes bound by TF: {}\n\
             Fraction downregulated genes bound by TF: {}\n\
             {rule}\n",
            self.upregulated,
            self.downregulated,
            self.upregulated_bound,
            self.downregulated_bound,
            self.fraction_upregulated_bound,
            self.fraction_downregulated_bound,
        )
    }
}

/// What the emitter managed to write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportOutcome {
    pub written: Vec<PathBuf>,
    pub chart_failures: Vec<String>,
}

pub fn write_text_outputs(out_dir: &Path, intersections: &Intersections, summary: &SummaryReport) -> Result<Vec<PathBuf>> {
    let up_path = out_dir.join(UP_BOUND_FILE);
    write_lines(&up_path, intersections.upregulated.bound_genes.iter())?;
    let down_path = out_dir.join(DOWN_BOUND_FILE);
    write_lines(&down_path, intersections.downregulated.bound_genes.iter())?;

    let summary_path = out_dir.join(SUMMARY_FILE);
    std::fs::write(&summary_path, summary.to_text())?;

    let json_path = out_dir.join(SUMMARY_JSON_FILE);
    let mut json = BufWriter::new(File::create(&json_path)?);
    serde_json::to_writer_pretty(&mut json, summary)?;
    writeln!(json)?;
    json.flush()?;

    Ok(vec![up_path, down_path, summary_path, json_path])
}

pub fn emit_report(
    out_dir: &Path,
    classification: &Classification,
    bound: &GeneSet,
    intersections: &Intersections,
) -> Result<ReportOutcome> {
    let summary = SummaryReport::new(classification, bound, intersections);
    let mut outcome = ReportOutcome {
        written: write_text_outputs(out_dir, intersections, &summary)?,
        chart_failures: Vec::new(),
    };
    info!("Summary written to {}", out_dir.join(SUMMARY_FILE).display());

    let venn_path = out_dir.join(VENN_FILE);
    match draw_venn_diagram(&venn_path, &summary.venn) {
        Ok(()) => outcome.written.push(venn_path),
        Err(e) => {
            warn!("Skipping {}: {}", VENN_FILE, e);
            outcome.chart_failures.push(e.to_string());
        }
    }

    let bar_path = out_dir.join(BAR_FILE);
    let fractions = [
        intersections.upregulated.fraction_bound,
        intersections.downregulated.fraction_bound,
    ];
    match draw_bar_graph(&bar_path, fractions) {
        Ok(()) => outcome.written.push(bar_path),
        Err(e) => {
            warn!("Skipping {}: {}", BAR_FILE, e);
            outcome.chart_failures.push(e.to_string());
        }
    }

    Ok(outcome)
}
