pub mod classification;
pub mod intersection;
