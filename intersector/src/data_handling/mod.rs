pub mod annotation_table;
pub mod expression_table;
pub mod peak_bed;
