use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

/// One row of a differential-expression table.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneExpressionRecord {
    pub gene_id: String,
    pub log2_fold_change: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionClass {
    Upregulated,
    Downregulated,
    Unclassified,
}

impl fmt::Display for ExpressionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpressionClass::Upregulated => "upregulated",
            ExpressionClass::Downregulated => "downregulated",
            ExpressionClass::Unclassified => "unclassified",
        };
        write!(f, "{s}")
    }
}

/// One row of the peak annotation output. `nearest_gene_name` is empty when the
/// annotator could not assign a gene.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPeakRecord {
    pub peak_id: String,
    pub nearest_gene_name: String,
    pub distance_to_tss: Option<i64>,
    pub other_fields: Vec<String>,
}

/// Deduplicated gene identifiers. Ordered so every file written from a set is
/// byte-identical between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneSet(BTreeSet<String>);

impl GeneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gene: impl Into<String>) -> bool {
        self.0.insert(gene.into())
    }

    pub fn contains(&self, gene: &str) -> bool {
        self.0.contains(gene)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn intersection(&self, other: &GeneSet) -> GeneSet {
        GeneSet(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn is_subset(&self, other: &GeneSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_disjoint(&self, other: &GeneSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// Projects annotated peaks onto their nearest gene, skipping unassigned peaks.
    pub fn from_peaks<'a>(peaks: impl IntoIterator<Item = &'a AnnotatedPeakRecord>) -> Self {
        peaks
            .into_iter()
            .map(|p| p.nearest_gene_name.trim())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for GeneSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        GeneSet(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for GeneSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Share of a class that is bound. `Undefined` marks an empty class; it is never
/// collapsed to zero or NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fraction {
    Defined(f64),
    Undefined,
}

impl Fraction {
    pub fn of(count: usize, total: usize) -> Self {
        if total == 0 {
            Fraction::Undefined
        } else {
            Fraction::Defined(count as f64 / total as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Fraction::Defined(v) => Some(*v),
            Fraction::Undefined => None,
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fraction::Defined(v) => write!(f, "{v:.4}"),
            Fraction::Undefined => write!(f, "undefined"),
        }
    }
}

impl Serialize for Fraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Fraction::Defined(v) => serializer.serialize_f64(*v),
            Fraction::Undefined => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionResult {
    pub class: ExpressionClass,
    pub bound_genes: GeneSet,
    pub total_class_genes: usize,
    pub bound_count: usize,
    pub fraction_bound: Fraction,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(id: &str, gene: &str) -> AnnotatedPeakRecord {
        AnnotatedPeakRecord {
            peak_id: id.to_string(),
            nearest_gene_name: gene.to_string(),
            distance_to_tss: None,
            other_fields: Vec::new(),
        }
    }

    #[test]
    fn gene_set_from_peaks_skips_blank_names_and_dedups() {
        let peaks = vec![peak("p1", "Myc"), peak("p2", ""), peak("p3", "Myc"), peak("p4", " Sox2 ")];
        let set = GeneSet::from_peaks(&peaks);
        assert_eq!(set.len(), 2);
        assert!(set.contains("Myc"));
        assert!(set.contains("Sox2"));
    }

    #[test]
    fn fraction_of_empty_class_is_undefined() {
        assert_eq!(Fraction::of(0, 0), Fraction::Undefined);
        assert_eq!(Fraction::of(0, 0).to_string(), "undefined");
        assert_eq!(Fraction::of(1, 4), Fraction::Defined(0.25));
        assert_eq!(Fraction::of(1, 1).to_string(), "1.0000");
    }

    #[test]
    fn undefined_fraction_serializes_as_null() {
        let json = serde_json::to_string(&vec![Fraction::Undefined, Fraction::Defined(0.5)]).unwrap();
        assert_eq!(json, "[null,0.5]");
    }
}
