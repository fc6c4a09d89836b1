use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::errors::{IntersectError, Result};
use crate::models::Fraction;

pub const BAR_TITLE: &str = "RNA-seq Differential Genes vs ChIP-seq Peaks";
pub const BAR_Y_LABEL: &str = "% DEGs bound by TF";
pub const BAR_LABELS: [&str; 2] = ["Up Genes", "Down Genes"];

const MAROON: RGBColor = RGBColor(128, 0, 0);

fn chart_error(e: impl std::fmt::Display) -> IntersectError {
    IntersectError::Chart {
        chart: "bar graph".into(),
        reason: e.to_string(),
    }
}

/// Percentage of each class that is bound; an undefined fraction gets no bar and
/// an `undefined` label instead.
pub fn draw_bar_graph(output_path: &Path, fractions: [Fraction; 2]) -> Result<()> {
    let root = BitMapBackend::new(output_path, (800, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(BAR_TITLE, ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..2u32).into_segmented(), 0f64..105f64)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(BAR_Y_LABEL)
        .axis_desc_style(("sans-serif", 22))
        .label_style(("sans-serif", 18))
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                BAR_LABELS.get(*i as usize).map(|s| s.to_string()).unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(fractions.iter().enumerate().filter_map(|(i, f)| {
            let i = i as u32;
            f.value().map(|v| {
                let mut bar = Rectangle::new(
                    [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), v * 100.0)],
                    MAROON.filled(),
                );
                bar.set_margin(0, 0, 60, 60);
                bar
            })
        }))
        .map_err(chart_error)?;

    let value_font = ("sans-serif", 20).into_font();
    chart
        .draw_series(fractions.iter().enumerate().map(|(i, f)| {
            let (text, height) = match f.value() {
                Some(v) => (format!("{:.1}%", v * 100.0), v * 100.0 + 2.0),
                None => ("undefined".to_string(), 2.0),
            };
            Text::new(text, (SegmentValue::CenterOf(i as u32), height), value_font.clone())
        }))
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    info!("Bar graph saved to: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(fractions: [Fraction; 2]) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar_graph.png");
        match draw_bar_graph(&path, fractions) {
            Ok(()) => assert!(path.exists()),
            Err(e) => assert!(matches!(e, IntersectError::Chart { .. }), "{e:?}"),
        }
    }

    #[test]
    fn undefined_fraction_is_labelled_not_drawn() {
        render([Fraction::Defined(1.0), Fraction::Undefined]);
    }

    #[test]
    fn both_fractions_undefined() {
        render([Fraction::Undefined, Fraction::Undefined]);
    }

    #[test]
    fn zero_and_partial_fractions() {
        render([Fraction::Defined(0.0), Fraction::Defined(0.375)]);
    }
}
