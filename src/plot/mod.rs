//! HTML reports: residual quality per camera and raw vs. subtracted spectra.

use crate::domain::{Camera, ExposureId, Frame, Night, ObjType, ResidualResults};
use crate::error::AppError;
use crate::report::summarize_camera;

pub mod charts;
pub mod html;

pub use charts::*;
pub use html::*;

/// One row per camera: quality chart and standard-deviation chart.
pub fn camera_plots_page(
    night: Night,
    expid: ExposureId,
    cameras: &[Camera],
    results: &ResidualResults,
) -> Result<HtmlPage, AppError> {
    let mut page = HtmlPage::new(format!("Sky subtraction quality {night} {}", expid.padded()));
    for &camera in cameras {
        let by_nsky = results
            .camera(camera)
            .ok_or_else(|| AppError::data(format!("No results for camera {camera}.")))?;
        let summaries = summarize_camera(by_nsky);
        page.push_row(vec![quality_chart(camera, &summaries)?, std_chart(camera, &summaries)?]);
    }
    Ok(page)
}

/// TARGET fiber spectra restricted to the camera's wavelength window.
pub fn target_spectra(frame: &Frame, camera: Camera) -> Result<Vec<Vec<(f64, f64)>>, AppError> {
    let window = camera.wave_window();
    let pixels = window.indices(&frame.wave);
    if pixels.is_empty() {
        return Err(AppError::data(format!(
            "Wavelength window ({}, {}) selects no pixels for {camera}.",
            window.min, window.max
        )));
    }
    Ok(frame
        .labels()
        .indices(ObjType::Target)
        .into_iter()
        .map(|i| pixels.iter().map(|&j| (frame.wave[j], frame.flux[(i, j)])).collect())
        .collect())
}

/// Raw generated frame next to its sky-subtracted counterpart.
pub fn sky_plots_page(
    night: Night,
    expid: ExposureId,
    camera: Camera,
    frame: &Frame,
    sframe: &Frame,
) -> Result<HtmlPage, AppError> {
    let raw = spectra_chart(&format!("Frame {camera}"), camera, &target_spectra(frame, camera)?)?;
    let subtracted = spectra_chart(&format!("S-Frame {camera}"), camera, &target_spectra(sframe, camera)?)?;

    let mut page = HtmlPage::new(format!("Sky spectra {camera} {night} {}", expid.padded()));
    page.push_row(vec![raw, subtracted]);
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticExposure;
    use crate::domain::{CameraResults, FiberLabels, RealizationStats, RepResults};

    #[test]
    fn camera_page_has_one_row_per_camera() {
        let mut results = ResidualResults::default();
        for cam in ["r3", "b3"] {
            let mut reps = RepResults::new();
            reps.insert(
                0,
                RealizationStats {
                    fiber_rms: vec![12.0],
                    integrated_flux: vec![3.0],
                },
            );
            let mut by_nsky = CameraResults::new();
            by_nsky.insert(10, reps);
            results.cameras.insert(cam.parse().unwrap(), by_nsky);
        }
        let cameras: Vec<Camera> = vec!["r3".parse().unwrap(), "b3".parse().unwrap()];
        let page = camera_plots_page("20200315".parse().unwrap(), ExposureId::new(55654), &cameras, &results).unwrap();

        assert_eq!(page.rows.len(), 2);
        assert!(page.rows[0][0].contains(QUALITY_TITLE));
        assert!(page.rows[1][1].contains(STD_TITLE));

        let missing = camera_plots_page(
            "20200315".parse().unwrap(),
            ExposureId::new(55654),
            &["z3".parse().unwrap()],
            &results,
        );
        assert!(missing.is_err());
    }

    #[test]
    fn sky_page_shows_target_fibers_in_the_window() {
        let products = SyntheticExposure {
            nfiber: 6,
            ..SyntheticExposure::default()
        }
        .generate(9)
        .unwrap();
        let labels = FiberLabels::new(vec![
            ObjType::Target,
            ObjType::Sky,
            ObjType::Target,
            ObjType::Bad,
            ObjType::Target,
            ObjType::Sky,
        ]);
        let frame = products.frame.with_labels(&labels).unwrap();
        let camera: Camera = "r3".parse().unwrap();

        let spectra = target_spectra(&frame, camera).unwrap();
        assert_eq!(spectra.len(), 3);
        assert!(spectra[0].iter().all(|&(w, _)| w > 5500.0 && w < 8000.0));

        let page = sky_plots_page("20200315".parse().unwrap(), ExposureId::new(7), camera, &frame, &frame).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert!(page.rows[0][0].contains("Frame r3"));
        assert!(page.rows[0][1].contains("S-Frame r3"));
    }
}
