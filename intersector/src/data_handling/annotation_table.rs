// Reader for annotatePeaks.pl output.
//
// Header row: `PeakID (cmd=...)  Chr  Start  End  Strand  Peak Score  Focus Ratio/Region Size
// Annotation  Detailed Annotation  Distance to TSS  Nearest PromoterID  Entrez ID
// Nearest Unigene  Nearest Refseq  Nearest Ensembl  Gene Name  Gene Alias  Gene Description
// Gene Type`. Without the header the same layout is assumed by position.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info, warn};

use crate::config::HeaderMode;
use crate::errors::{IntersectError, Result};
use crate::models::{AnnotatedPeakRecord, GeneSet};

pub const PEAK_ID_COLUMN: usize = 0;
pub const DISTANCE_COLUMN: usize = 9;
pub const GENE_NAME_COLUMN: usize = 15;

pub const GENE_NAME_HEADER: &str = "Gene Name";
pub const DISTANCE_HEADER: &str = "Distance to TSS";
const PEAK_ID_HEADER_PREFIX: &str = "PeakID";

/// Where the fields of interest sit in one particular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationSchema {
    pub has_header: bool,
    pub peak_id: usize,
    pub distance: Option<usize>,
    pub gene_name: usize,
}

impl AnnotationSchema {
    pub const POSITIONAL: AnnotationSchema = AnnotationSchema {
        has_header: false,
        peak_id: PEAK_ID_COLUMN,
        distance: Some(DISTANCE_COLUMN),
        gene_name: GENE_NAME_COLUMN,
    };

    fn from_header(header: &StringRecord) -> Option<Self> {
        let find = |name: &str| header.iter().position(|f| f.trim() == name);
        Some(AnnotationSchema {
            has_header: true,
            peak_id: PEAK_ID_COLUMN,
            distance: find(DISTANCE_HEADER),
            gene_name: find(GENE_NAME_HEADER)?,
        })
    }
}

pub fn looks_like_header(first: &StringRecord) -> bool {
    first
        .get(0)
        .map_or(false, |f| f.trim_start().starts_with(PEAK_ID_HEADER_PREFIX))
        || first.iter().any(|f| f.trim() == GENE_NAME_HEADER)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTable {
    pub schema: AnnotationSchema,
    pub peaks: Vec<AnnotatedPeakRecord>,
}

impl AnnotationTable {
    pub fn read(path: &Path, mode: HeaderMode) -> Result<Self> {
        if !path.exists() {
            return Err(IntersectError::MissingInput(path.to_path_buf()));
        }
        info!("Reading peak annotation from {}", path.display());

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(File::open(path)?);

        let mut records = reader.records();
        let first = match records.next() {
            Some(row) => row?,
            None => {
                warn!("Annotation table {} is empty; no genes are bound", path.display());
                return Ok(AnnotationTable {
                    schema: AnnotationSchema::POSITIONAL,
                    peaks: Vec::new(),
                });
            }
        };

        let schema = resolve_schema(path, &first, mode)?;
        debug!("Annotation schema for {}: {:?}", path.display(), schema);

        let mut peaks = Vec::new();
        if !schema.has_header {
            peaks.push(to_peak(path, 1, &first, &schema)?);
        }
        for (i, row) in records.enumerate() {
            let row = row?;
            if row.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            peaks.push(to_peak(path, i + 2, &row, &schema)?);
        }

        info!("Read {} annotated peaks", peaks.len());
        Ok(AnnotationTable { schema, peaks })
    }

    /// Genes with at least one peak assigned to them.
    pub fn bound_genes(&self) -> GeneSet {
        GeneSet::from_peaks(&self.peaks)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

fn schema_error(path: &Path, reason: impl Into<String>) -> IntersectError {
    IntersectError::AnnotationSchema {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

/// Decides header presence once and refuses to guess when the file disagrees with
/// what the caller declared.
fn resolve_schema(path: &Path, first: &StringRecord, mode: HeaderMode) -> Result<AnnotationSchema> {
    let detected = looks_like_header(first);
    match (mode, detected) {
        (HeaderMode::Absent, true) => Err(schema_error(
            path,
            "declared headerless but the first row is a header",
        )),
        (HeaderMode::Present, false) => Err(schema_error(
            path,
            format!("declared with header but no `{GENE_NAME_HEADER}` column was found"),
        )),
        (_, true) => AnnotationSchema::from_header(first).ok_or_else(|| {
            schema_error(path, format!("header has no `{GENE_NAME_HEADER}` column"))
        }),
        (_, false) => Ok(AnnotationSchema::POSITIONAL),
    }
}

fn to_peak(path: &Path, line: usize, row: &StringRecord, schema: &AnnotationSchema) -> Result<AnnotatedPeakRecord> {
    let gene = row.get(schema.gene_name).ok_or_else(|| {
        schema_error(
            path,
            format!(
                "line {line} has {} fields; gene name expected in column {}",
                row.len(),
                schema.gene_name
            ),
        )
    })?;

    let distance_to_tss = schema
        .distance
        .and_then(|i| row.get(i))
        .and_then(|d| d.trim().parse::<i64>().ok());

    let other_fields = row
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != schema.peak_id && *i != schema.gene_name && Some(*i) != schema.distance)
        .map(|(_, f)| f.to_string())
        .collect();

    Ok(AnnotatedPeakRecord {
        peak_id: row.get(schema.peak_id).unwrap_or("").trim().to_string(),
        nearest_gene_name: gene.trim().to_string(),
        distance_to_tss,
        other_fields,
    })
}
