// Appends the annotated nearest gene to each row of a called-peak BED/narrowPeak
// file, joined on the peak name (BED column 4). The output may name the input file;
// rows go to a temp file beside it that replaces the output only once complete.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::data_handling::annotation_table::AnnotationTable;
use crate::errors::{IntersectError, Result};

const BED_NAME_COLUMN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BedAnnotationStats {
    pub peaks: usize,
    pub annotated: usize,
    /// Annotation rows whose peak id never appeared in the BED file.
    pub orphan_annotations: usize,
}

fn is_bed_metadata(first_field: &str) -> bool {
    first_field.starts_with('#') || first_field.starts_with("track") || first_field.starts_with("browser")
}

pub fn annotate_bed(bed_path: &Path, annotation: &AnnotationTable, output: &Path) -> Result<BedAnnotationStats> {
    if !bed_path.exists() {
        return Err(IntersectError::MissingInput(bed_path.to_path_buf()));
    }

    let genes: HashMap<&str, &str> = annotation
        .peaks
        .iter()
        .map(|p| (p.peak_id.as_str(), p.nearest_gene_name.as_str()))
        .collect();

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(File::open(bed_path)?);
    let out_dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(out_dir)?;
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(staged.as_file_mut());

    let mut stats = BedAnnotationStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        if row.get(0).map_or(true, is_bed_metadata) {
            continue;
        }
        let name = row.get(BED_NAME_COLUMN).ok_or_else(|| IntersectError::Malformed {
            path: bed_path.to_path_buf(),
            row: i + 1,
            reason: format!("BED row has {} fields; peak name expected in column 4", row.len()),
        })?;

        stats.peaks += 1;
        let gene = genes.get(name).copied().unwrap_or("");
        if genes.contains_key(name) {
            seen.insert(name.to_string());
        }
        if !gene.is_empty() {
            stats.annotated += 1;
        }

        let mut out: Vec<&str> = row.iter().collect();
        out.push(gene);
        writer.write_record(&out)?;
    }
    writer.flush()?;
    drop(writer);
    staged.persist(output).map_err(|e| e.error)?;

    stats.orphan_annotations = genes.keys().filter(|id| !seen.contains(**id)).count();
    if stats.orphan_annotations > 0 {
        warn!(
            "{} annotated peaks are not present in {}",
            stats.orphan_annotations,
            bed_path.display()
        );
    }
    info!(
        "Annotated {}/{} peaks; wrote {}",
        stats.annotated,
        stats.peaks,
        output.display()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeaderMode;
    use crate::data_handling::annotation_table::tests::homer_output;
    use crate::data_handling::annotation_table::AnnotationSchema;

    #[test]
    fn appends_gene_name_by_peak_id() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("peaks.narrowPeak");
        std::fs::write(
            &bed,
            "track name=peaks\n\
             chr1\t100\t600\tpeak_1\t50\t.\t4.2\t8.1\t6.0\t250\n\
             chr2\t900\t1200\tpeak_2\t30\t.\t2.1\t5.0\t3.3\t120\n",
        )
        .unwrap();
        let anno = dir.path().join("anno.txt");
        std::fs::write(&anno, homer_output(&[("peak_1", "Myc"), ("peak_9", "Sox2")], true)).unwrap();
        let table = AnnotationTable::read(&anno, HeaderMode::Auto).unwrap();

        let out = dir.path().join("annotated.bed");
        let stats = annotate_bed(&bed, &table, &out).unwrap();
        assert_eq!(stats, BedAnnotationStats { peaks: 2, annotated: 1, orphan_annotations: 1 });

        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\t250\tMyc"));
        assert_eq!(lines[1].split('\t').count(), 11);
        assert!(lines[1].ends_with("\t120\t"));
    }

    #[test]
    fn rows_without_a_name_column_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("peaks.bed");
        std::fs::write(&bed, "chr1\t100\t600\n").unwrap();
        let table = AnnotationTable { schema: AnnotationSchema::POSITIONAL, peaks: vec![] };
        let err = annotate_bed(&bed, &table, &dir.path().join("out.bed")).unwrap_err();
        assert!(matches!(err, IntersectError::Malformed { row: 1, .. }));
    }

    #[test]
    fn annotating_in_place_rewrites_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("peaks.narrowPeak");
        std::fs::write(&bed, "chr1\t100\t600\tpeak_1\t50\t.\t4.2\t8.1\t6.0\t250\n").unwrap();
        let anno = dir.path().join("anno.txt");
        std::fs::write(&anno, homer_output(&[("peak_1", "Myc")], true)).unwrap();
        let table = AnnotationTable::read(&anno, HeaderMode::Auto).unwrap();

        let stats = annotate_bed(&bed, &table, &bed).unwrap();
        assert_eq!(stats, BedAnnotationStats { peaks: 1, annotated: 1, orphan_annotations: 0 });
        assert_eq!(
            std::fs::read_to_string(&bed).unwrap(),
            "chr1\t100\t600\tpeak_1\t50\t.\t4.2\t8.1\t6.0\t250\tMyc\n"
        );
        // only the annotated file is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn failed_annotation_leaves_existing_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("peaks.bed");
        std::fs::write(&bed, "chr1\t100\t600\n").unwrap();
        let out = dir.path().join("out.bed");
        std::fs::write(&out, "previous\n").unwrap();
        let table = AnnotationTable { schema: AnnotationSchema::POSITIONAL, peaks: vec![] };

        assert!(annotate_bed(&bed, &table, &out).is_err());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "previous\n");
    }
}
