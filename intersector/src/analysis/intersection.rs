use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::classification::Classification;
use crate::models::{ExpressionClass, Fraction, GeneSet, IntersectionResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intersections {
    pub upregulated: IntersectionResult,
    pub downregulated: IntersectionResult,
}

pub fn intersect_class(class: ExpressionClass, class_genes: &GeneSet, bound: &GeneSet) -> IntersectionResult {
    let bound_genes = class_genes.intersection(bound);
    let bound_count = bound_genes.len();
    let total_class_genes = class_genes.len();
    let fraction_bound = Fraction::of(bound_count, total_class_genes);

    match fraction_bound {
        Fraction::Undefined => warn!("No {class} genes; fraction bound is undefined"),
        Fraction::Defined(f) => info!("{bound_count}/{total_class_genes} {class} genes bound ({f:.4})"),
    }

    IntersectionResult {
        class,
        bound_genes,
        total_class_genes,
        bound_count,
        fraction_bound,
    }
}

pub fn intersect(classification: &Classification, bound: &GeneSet) -> Intersections {
    let empty = GeneSet::default();
    let run = |class| intersect_class(class, classification.genes(class).unwrap_or(&empty), bound);
    Intersections {
        upregulated: run(ExpressionClass::Upregulated),
        downregulated: run(ExpressionClass::Downregulated),
    }
}
