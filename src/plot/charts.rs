//! SVG charts rendered with Plotters.
//!
//! Each function returns a standalone `<svg>` document as a string, ready to be
//! inlined into an HTML page.

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{Arm, Camera};
use crate::error::AppError;
use crate::report::NskySummary;

pub const QUALITY_TITLE: &str = "Model Quality vs. Number of Fibers";
pub const STD_TITLE: &str = "Standard deviation across realizations";

const NSKY_LABEL: &str = "Number of Sky Fibers Used in Model";
const QUALITY_LABEL: &str = "Q for non-model fibers";
const STD_LABEL: &str = "Standard deviation";

pub const CAMERA_CHART_SIZE: (u32, u32) = (350, 350);
pub const SPECTRA_CHART_SIZE: (u32, u32) = (400, 350);

/// Per-arm color and y-axis scale of the quality chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraStyle {
    pub color: RGBColor,
    /// Upper y bound used while every value stays below it.
    pub scale_min: f64,
    /// Upper y bound once any value reaches `scale_min`.
    pub scale_max: f64,
}

impl CameraStyle {
    pub const fn for_arm(arm: Arm) -> Self {
        match arm {
            Arm::B => Self {
                color: BLUE,
                scale_min: 50.0,
                scale_max: 200.0,
            },
            Arm::R => Self {
                color: RED,
                scale_min: 50.0,
                scale_max: 250.0,
            },
            Arm::Z => Self {
                color: BLACK,
                scale_min: 50.0,
                scale_max: 250.0,
            },
        }
    }

    /// Top of the quality chart for the given realization values.
    pub fn quality_top(&self, values: impl IntoIterator<Item = f64>) -> f64 {
        let max = values.into_iter().fold(f64::NEG_INFINITY, f64::max);
        if max >= self.scale_min { self.scale_max } else { self.scale_min }
    }
}

/// Top of the standard-deviation chart.
pub fn std_top(values: impl IntoIterator<Item = f64>) -> f64 {
    1.05 * values.into_iter().fold(2.5, f64::max)
}

fn draw_error(e: impl std::fmt::Display) -> AppError {
    AppError::internal(format!("Chart rendering failed: {e}"))
}

fn render_svg<F>(size: (u32, u32), draw: F) -> Result<String, AppError>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), AppError>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;
        draw(&root)?;
        root.present().map_err(draw_error)?;
    }
    Ok(svg)
}

fn nsky_axis_max(summaries: &[NskySummary]) -> f64 {
    let max = summaries.iter().map(|s| s.nsky).max().unwrap_or(1) as f64;
    max * 1.05 + 1.0
}

/// Per-realization mean RMS against nsky, with the mean across realizations as a line.
pub fn quality_chart(camera: Camera, summaries: &[NskySummary]) -> Result<String, AppError> {
    let style = CameraStyle::for_arm(camera.arm());
    let top = style.quality_top(summaries.iter().flat_map(|s| s.per_realization.iter().copied()));
    let x_max = nsky_axis_max(summaries);

    render_svg(CAMERA_CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(QUALITY_TITLE, ("sans-serif", 14))
            .margin(8)
            .x_label_area_size(32)
            .y_label_area_size(40)
            .build_cartesian_2d(0.0..x_max, 0.0..top)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .x_desc(NSKY_LABEL)
            .y_desc(QUALITY_LABEL)
            .label_style(("sans-serif", 10))
            .draw()
            .map_err(draw_error)?;

        let points = style.color.mix(0.65).filled();
        chart
            .draw_series(summaries.iter().flat_map(|s| {
                s.per_realization
                    .iter()
                    .map(move |&v| Circle::new((s.nsky as f64, v), 3, points))
            }))
            .map_err(draw_error)?;

        chart
            .draw_series(LineSeries::new(
                summaries.iter().filter_map(|s| s.mean.map(|m| (s.nsky as f64, m))),
                style.color.stroke_width(2),
            ))
            .map_err(draw_error)?;
        Ok(())
    })
}

/// Spread of the per-realization values at each nsky.
pub fn std_chart(camera: Camera, summaries: &[NskySummary]) -> Result<String, AppError> {
    let style = CameraStyle::for_arm(camera.arm());
    let top = std_top(summaries.iter().filter_map(|s| s.std));
    let x_max = nsky_axis_max(summaries);

    render_svg(CAMERA_CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(STD_TITLE, ("sans-serif", 14))
            .margin(8)
            .x_label_area_size(32)
            .y_label_area_size(40)
            .build_cartesian_2d(0.0..x_max, 0.0..top)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .x_desc(NSKY_LABEL)
            .y_desc(STD_LABEL)
            .label_style(("sans-serif", 10))
            .draw()
            .map_err(draw_error)?;

        let points = style.color.mix(0.65).filled();
        chart
            .draw_series(
                summaries
                    .iter()
                    .filter_map(|s| s.std.map(|v| Circle::new((s.nsky as f64, v), 3, points))),
            )
            .map_err(draw_error)?;
        Ok(())
    })
}

/// Overlay of fiber spectra, one translucent line per fiber.
pub fn spectra_chart(title: &str, camera: Camera, spectra: &[Vec<(f64, f64)>]) -> Result<String, AppError> {
    let style = CameraStyle::for_arm(camera.arm());
    let (x_range, y_range) = spectra_bounds(spectra);

    render_svg(SPECTRA_CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 14))
            .margin(8)
            .x_label_area_size(32)
            .y_label_area_size(48)
            .build_cartesian_2d(x_range, y_range)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .x_desc("Wavelength")
            .y_desc("Flux")
            .label_style(("sans-serif", 10))
            .draw()
            .map_err(draw_error)?;

        let line = style.color.mix(0.5);
        for fiber in spectra {
            chart
                .draw_series(LineSeries::new(fiber.iter().copied(), line))
                .map_err(draw_error)?;
        }
        Ok(())
    })
}

fn spectra_bounds(spectra: &[Vec<(f64, f64)>]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(w, f) in spectra.iter().flatten() {
        if !(w.is_finite() && f.is_finite()) {
            continue;
        }
        x = (x.0.min(w), x.1.max(w));
        y = (y.0.min(f), y.1.max(f));
    }

    if !(x.0 < x.1) {
        x = if x.0.is_finite() { (x.0 - 1.0, x.0 + 1.0) } else { (0.0, 1.0) };
    }
    if !(y.0 < y.1) {
        y = if y.0.is_finite() { (y.0 - 1.0, y.0 + 1.0) } else { (0.0, 1.0) };
    }
    let pad = 0.05 * (y.1 - y.0);
    (x.0..x.1, (y.0 - pad)..(y.1 + pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summaries() -> Vec<NskySummary> {
        vec![
            NskySummary {
                nsky: 5,
                per_realization: vec![30.0, 34.0],
                mean: Some(32.0),
                std: Some(2.0),
            },
            NskySummary {
                nsky: 10,
                per_realization: vec![],
                mean: None,
                std: None,
            },
        ]
    }

    #[test]
    fn quality_scale_switches_on_the_arm_threshold() {
        let r = CameraStyle::for_arm(Arm::R);
        assert_eq!(r.quality_top([10.0, 49.9]), 50.0);
        assert_eq!(r.quality_top([10.0, 50.0]), 250.0);
        assert_eq!(CameraStyle::for_arm(Arm::B).quality_top([120.0]), 200.0);
        assert_eq!(r.quality_top(std::iter::empty()), 50.0);
    }

    #[test]
    fn std_scale_has_a_floor() {
        assert!((std_top([0.5, 1.0]) - 2.625).abs() < 1e-12);
        assert!((std_top([10.0]) - 10.5).abs() < 1e-12);
    }

    #[test]
    fn charts_render_to_svg_with_titles() {
        let camera: Camera = "z1".parse().unwrap();
        let quality = quality_chart(camera, &summaries()).unwrap();
        assert!(quality.contains("<svg"));
        assert!(quality.contains(QUALITY_TITLE));
        assert!(std_chart(camera, &summaries()).unwrap().contains(STD_TITLE));

        let spectra = vec![vec![(5600.0, 1.0), (5700.0, 2.0)], vec![(5600.0, -1.0), (5700.0, 0.5)]];
        let svg = spectra_chart("S-Frame z1", camera, &spectra).unwrap();
        assert!(svg.contains("S-Frame z1"));
    }

    #[test]
    fn bounds_survive_flat_or_empty_data() {
        let (x, y) = spectra_bounds(&[]);
        assert!(x.start < x.end && y.start < y.end);
        let (x, y) = spectra_bounds(&[vec![(6000.0, 3.0)]]);
        assert_eq!(x, 5999.0..6001.0);
        assert!(y.start < 3.0 && y.end > 3.0);
    }
}
