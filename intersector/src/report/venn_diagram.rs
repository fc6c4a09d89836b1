//! Three-set overlap diagram of up-, down-regulated and bound genes.

use std::path::Path;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::Serialize;
use tracing::info;

use crate::errors::{IntersectError, Result};
use crate::models::GeneSet;

pub const VENN_LABELS: [&str; 3] = ["Up_Genes", "Down_Genes", "Bound_Genes"];

/// Sizes of the seven regions of a three-set Venn diagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VennCounts {
    pub only_a: usize,
    pub only_b: usize,
    pub only_c: usize,
    pub a_b: usize,
    pub a_c: usize,
    pub b_c: usize,
    pub a_b_c: usize,
}

impl VennCounts {
    pub fn from_sets(a: &GeneSet, b: &GeneSet, c: &GeneSet) -> Self {
        let mut counts = VennCounts::default();
        let mut tally = |in_a: bool, in_b: bool, in_c: bool| match (in_a, in_b, in_c) {
            (true, false, false) => counts.only_a += 1,
            (false, true, false) => counts.only_b += 1,
            (false, false, true) => counts.only_c += 1,
            (true, true, false) => counts.a_b += 1,
            (true, false, true) => counts.a_c += 1,
            (false, true, true) => counts.b_c += 1,
            (true, true, true) => counts.a_b_c += 1,
            (false, false, false) => {}
        };

        for g in a.iter() {
            tally(true, b.contains(g), c.contains(g));
        }
        for g in b.iter().filter(|g| !a.contains(g)) {
            tally(false, true, c.contains(g));
        }
        counts.only_c += c.iter().filter(|g| !a.contains(g) && !b.contains(g)).count();
        counts
    }
}

fn chart_error(e: impl std::fmt::Display) -> IntersectError {
    IntersectError::Chart {
        chart: "venn diagram".into(),
        reason: e.to_string(),
    }
}

pub fn draw_venn_diagram(output_path: &Path, counts: &VennCounts) -> Result<()> {
    let palette = [RGBColor(200, 40, 40), RGBColor(40, 90, 200), RGBColor(40, 160, 70)];
    let centres = [(300, 300), (500, 300), (400, 470)];
    let radius = 190;

    let label_font = TextStyle::from(("sans-serif", 26).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    let count_font = TextStyle::from(("sans-serif", 22).into_font()).pos(Pos::new(HPos::Center, VPos::Center));

    let root = BitMapBackend::new(output_path, (800, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    for (centre, colour) in centres.iter().zip(palette.iter()) {
        root.draw(&Circle::new(*centre, radius, colour.mix(0.25).filled()))
            .map_err(chart_error)?;
        root.draw(&Circle::new(*centre, radius, colour.stroke_width(2)))
            .map_err(chart_error)?;
    }

    let label_positions = [(170, 90), (630, 90), (400, 700)];
    for (label, pos) in VENN_LABELS.iter().zip(label_positions) {
        root.draw(&Text::new(label.to_string(), pos, label_font.clone()))
            .map_err(chart_error)?;
    }

    let regions = [
        (counts.only_a, (220, 250)),
        (counts.only_b, (580, 250)),
        (counts.only_c, (400, 580)),
        (counts.a_b, (400, 230)),
        (counts.a_c, (300, 430)),
        (counts.b_c, (500, 430)),
        (counts.a_b_c, (400, 360)),
    ];
    for (count, pos) in regions {
        root.draw(&Text::new(count.to_string(), pos, count_font.clone()))
            .map_err(chart_error)?;
    }

    root.present().map_err(chart_error)?;
    info!("Venn diagram saved to: {}", output_path.display());
    Ok(())
}
