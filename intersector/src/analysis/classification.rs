use std::path::Path;

use tracing::info;

use crate::config::Thresholds;
use crate::data_handling::expression_table::{records_to_dataframe, ExpressionTable};
use crate::errors::Result;
use crate::helper_functions::dataframe_to_tsv;
use crate::models::{ExpressionClass, GeneExpressionRecord, GeneSet};

pub const UPREGULATED_FILE: &str = "upregulated_genes.txt";
pub const DOWNREGULATED_FILE: &str = "downregulated_genes.txt";

/// Strict on both sides: a gene sitting exactly on a threshold is unclassified,
/// and so is any gene with a missing statistic.
pub fn classify_record(record: &GeneExpressionRecord, thresholds: &Thresholds) -> ExpressionClass {
    let significant = record.p_value < thresholds.p_value;
    if significant && record.log2_fold_change > thresholds.log2_fold_change {
        ExpressionClass::Upregulated
    } else if significant && record.log2_fold_change < -thresholds.log2_fold_change {
        ExpressionClass::Downregulated
    } else {
        ExpressionClass::Unclassified
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub thresholds: Thresholds,
    pub upregulated: Vec<GeneExpressionRecord>,
    pub downregulated: Vec<GeneExpressionRecord>,
    pub up_genes: GeneSet,
    pub down_genes: GeneSet,
    pub unclassified: usize,
    pub total_genes: usize,
}

impl Classification {
    pub fn genes(&self, class: ExpressionClass) -> Option<&GeneSet> {
        match class {
            ExpressionClass::Upregulated => Some(&self.up_genes),
            ExpressionClass::Downregulated => Some(&self.down_genes),
            ExpressionClass::Unclassified => None,
        }
    }

    /// Writes each class as `gene\tlog2fc\tpval`, in input order.
    pub fn persist(&self, out_dir: &Path) -> Result<()> {
        for (records, name) in [
            (&self.upregulated, UPREGULATED_FILE),
            (&self.downregulated, DOWNREGULATED_FILE),
        ] {
            let mut df = records_to_dataframe(records)?;
            dataframe_to_tsv(&mut df, &out_dir.join(name), true)?;
        }
        Ok(())
    }
}

pub fn classify(table: &ExpressionTable, thresholds: &Thresholds) -> Classification {
    let mut upregulated = Vec::new();
    let mut downregulated = Vec::new();
    let mut unclassified = 0;

    for record in table.records() {
        match classify_record(record, thresholds) {
            ExpressionClass::Upregulated => upregulated.push(record.clone()),
            ExpressionClass::Downregulated => downregulated.push(record.clone()),
            ExpressionClass::Unclassified => unclassified += 1,
        }
    }

    let up_genes: GeneSet = upregulated.iter().map(|r| r.gene_id.as_str()).collect();
    let down_genes: GeneSet = downregulated.iter().map(|r| r.gene_id.as_str()).collect();

    info!(
        "Classified {} genes at |log2FC| > {} and p < {}: {} up, {} down, {} unclassified",
        table.len(),
        thresholds.log2_fold_change,
        thresholds.p_value,
        up_genes.len(),
        down_genes.len(),
        unclassified
    );

    Classification {
        thresholds: *thresholds,
        upregulated,
        downregulated,
        up_genes,
        down_genes,
        unclassified,
        total_genes: table.len(),
    }
}

/// Classifies and writes both class files before handing the result back.
pub fn classify_and_persist(table: &ExpressionTable, thresholds: &Thresholds, out_dir: &Path) -> Result<Classification> {
    let classification = classify(table, thresholds);
    classification.persist(out_dir)?;
    info!("Wrote {} and {} to {}", UPREGULATED_FILE, DOWNREGULATED_FILE, out_dir.display());
    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(gene: &str, lfc: f64, p: f64) -> GeneExpressionRecord {
        GeneExpressionRecord {
            gene_id: gene.to_string(),
            log2_fold_change: lfc,
            p_value: p,
        }
    }

    fn example_table() -> ExpressionTable {
        vec![rec("G1", 1.2, 0.01), rec("G2", -0.9, 0.02), rec("G3", 0.1, 0.5)]
            .into_iter()
            .collect()
    }

    #[test]
    fn splits_example_into_up_down_and_unclassified() {
        let c = classify(&example_table(), &Thresholds::default());
        assert_eq!(c.up_genes.iter().collect::<Vec<_>>(), vec!["G1"]);
        assert_eq!(c.down_genes.iter().collect::<Vec<_>>(), vec!["G2"]);
        assert_eq!(c.unclassified, 1);
        assert_eq!(c.total_genes, 3);
    }

    #[test]
    fn thresholds_are_strict() {
        let t = Thresholds { log2_fold_change: 1.0, p_value: 0.05 };
        assert_eq!(classify_record(&rec("a", 1.0, 0.01), &t), ExpressionClass::Unclassified);
        assert_eq!(classify_record(&rec("b", -1.0, 0.01), &t), ExpressionClass::Unclassified);
        assert_eq!(classify_record(&rec("c", 2.0, 0.05), &t), ExpressionClass::Unclassified);
        assert_eq!(classify_record(&rec("d", 2.0, 0.049), &t), ExpressionClass::Upregulated);
        assert_eq!(classify_record(&rec("e", -2.0, 0.049), &t), ExpressionClass::Downregulated);
    }

    #[test]
    fn missing_statistics_are_unclassified() {
        let t = Thresholds::default();
        assert_eq!(classify_record(&rec("a", f64::NAN, 0.001), &t), ExpressionClass::Unclassified);
        assert_eq!(classify_record(&rec("b", 3.0, f64::NAN), &t), ExpressionClass::Unclassified);
    }

    #[test]
    fn classes_stay_disjoint_across_thresholds() {
        let table: ExpressionTable = (0..200)
            .map(|i| {
                let lfc = (i as f64 - 100.0) / 25.0;
                let p = ((i * 37) % 100) as f64 / 100.0;
                rec(&format!("g{i}"), lfc, p)
            })
            .collect();
        for lfc in [0.0, 0.585, 1.0, 2.5] {
            for p in [0.01, 0.05, 0.5, 1.0] {
                let t = Thresholds { log2_fold_change: lfc, p_value: p };
                let c = classify(&table, &t);
                assert!(c.up_genes.is_disjoint(&c.down_genes));
                assert_eq!(c.up_genes.len() + c.down_genes.len() + c.unclassified, c.total_genes);
                for r in &c.upregulated {
                    assert!(r.log2_fold_change > lfc && r.p_value < p);
                }
                for r in &c.downregulated {
                    assert!(r.log2_fold_change < -lfc && r.p_value < p);
                }
            }
        }
    }

    #[test]
    fn persisted_class_files_have_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let c = classify_and_persist(&example_table(), &Thresholds::default(), dir.path()).unwrap();
        assert_eq!(c.up_genes.len(), 1);

        let up = std::fs::read_to_string(dir.path().join(UPREGULATED_FILE)).unwrap();
        let lines: Vec<&str> = up.lines().collect();
        assert_eq!(lines[0], "gene\tlog2fc\tpval");
        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields[0], "G1");
        assert_eq!(fields[1].parse::<f64>().unwrap(), 1.2);
        assert_eq!(fields[2].parse::<f64>().unwrap(), 0.01);

        let down = std::fs::read_to_string(dir.path().join(DOWNREGULATED_FILE)).unwrap();
        assert_eq!(down.lines().count(), 2);
    }
}
