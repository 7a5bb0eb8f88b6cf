//! Calibration steps applied to frames: fiberflat correction and sky subtraction.
//!
//! Both steps are behind the `Calibrator` trait so the selection and subtraction
//! code never depends on a particular implementation. They return new frames; the
//! input is never modified.

use crate::domain::{Fiberflat, Frame, SkyModel, check_shape};
use crate::error::AppError;

pub trait Calibrator {
    /// Divide out per-fiber throughput, propagating fiberflat variance into `ivar`.
    fn apply_fiberflat(&self, frame: &Frame, fiberflat: &Fiberflat) -> Result<Frame, AppError>;

    /// Subtract the per-fiber sky model, combining variances.
    fn subtract_sky(&self, frame: &Frame, sky: &SkyModel) -> Result<Frame, AppError>;
}

/// Element-wise calibration on the frame's native grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCalibrator;

impl Calibrator for StandardCalibrator {
    fn apply_fiberflat(&self, frame: &Frame, fiberflat: &Fiberflat) -> Result<Frame, AppError> {
        check_shape("fiberflat", &fiberflat.fiberflat, frame.nfiber(), frame.nwave())?;
        check_shape("fiberflat ivar", &fiberflat.ivar, frame.nfiber(), frame.nwave())?;

        let mut out = frame.clone();
        for i in 0..frame.nfiber() {
            for j in 0..frame.nwave() {
                let ff = fiberflat.fiberflat[(i, j)];
                let ff_ivar = fiberflat.ivar[(i, j)];
                let ivar = frame.ivar[(i, j)];

                if ff <= 0.0 {
                    out.flux[(i, j)] = 0.0;
                    out.ivar[(i, j)] = 0.0;
                    continue;
                }

                let flux = frame.flux[(i, j)];
                out.flux[(i, j)] = flux / ff;
                // Variance of F/ff uses the undivided flux F.
                out.ivar[(i, j)] = if ivar > 0.0 && ff_ivar > 0.0 {
                    let var = 1.0 / (ivar * ff * ff) + flux * flux / (ff_ivar * ff.powi(4));
                    1.0 / var
                } else {
                    0.0
                };
            }
        }
        Ok(out)
    }

    fn subtract_sky(&self, frame: &Frame, sky: &SkyModel) -> Result<Frame, AppError> {
        check_shape("sky flux", &sky.flux, frame.nfiber(), frame.nwave())?;
        check_shape("sky ivar", &sky.ivar, frame.nfiber(), frame.nwave())?;

        let mut out = frame.clone();
        out.flux -= &sky.flux;
        out.ivar.zip_apply(&sky.ivar, |ivar, sky_ivar| {
            *ivar = if *ivar > 0.0 && sky_ivar > 0.0 {
                1.0 / (1.0 / *ivar + 1.0 / sky_ivar)
            } else {
                0.0
            };
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FiberRecord, Header, ObjType};
    use nalgebra::DMatrix;

    fn frame(flux: &[f64], ivar: &[f64]) -> Frame {
        let fibermap = vec![
            FiberRecord { fiber: 0, objtype: ObjType::Target },
            FiberRecord { fiber: 1, objtype: ObjType::Target },
        ];
        Frame::new(
            vec![5000.0, 5001.0],
            DMatrix::from_row_slice(2, 2, flux),
            DMatrix::from_row_slice(2, 2, ivar),
            fibermap,
            Header::new(),
        )
        .unwrap()
    }

    #[test]
    fn fiberflat_divides_and_masks() {
        let f = frame(&[10.0, 20.0, 30.0, 40.0], &[1.0, 1.0, 1.0, 0.0]);
        let ff = Fiberflat::new(
            vec![5000.0, 5001.0],
            DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.5, 1.0]),
            DMatrix::from_element(2, 2, f64::INFINITY),
            Header::new(),
        )
        .unwrap();

        let out = StandardCalibrator.apply_fiberflat(&f, &ff).unwrap();
        assert_eq!(out.flux[(0, 0)], 5.0);
        assert_eq!(out.flux[(0, 1)], 0.0);
        assert_eq!(out.ivar[(0, 1)], 0.0);
        assert_eq!(out.flux[(1, 0)], 60.0);
        // Infinite fiberflat ivar: only the frame variance scales.
        assert!((out.ivar[(0, 0)] - 4.0).abs() < 1e-12);
        assert_eq!(out.ivar[(1, 1)], 0.0);
        // Input untouched.
        assert_eq!(f.flux[(0, 0)], 10.0);
    }

    #[test]
    fn fiberflat_variance_uses_undivided_flux() {
        let f = frame(&[10.0, 4.0, 1.0, 1.0], &[1.0, 4.0, 1.0, 1.0]);
        let ff = Fiberflat::new(
            vec![5000.0, 5001.0],
            DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 1.0, 1.0]),
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 1.0, 0.0]),
            Header::new(),
        )
        .unwrap();

        let out = StandardCalibrator.apply_fiberflat(&f, &ff).unwrap();
        assert_eq!(out.flux[(0, 0)], 5.0);
        // 1/(1*4) + 100/(1*16) = 6.5
        assert!((out.ivar[(0, 0)] - 1.0 / 6.5).abs() < 1e-12);
        // 1/(4*0.25) + 16/(2*0.0625) = 129
        assert!((out.ivar[(0, 1)] - 1.0 / 129.0).abs() < 1e-12);
        // Zero fiberflat ivar masks the pixel.
        assert_eq!(out.ivar[(1, 1)], 0.0);
        assert_eq!(out.ivar[(1, 0)], 0.5);
    }

    #[test]
    fn sky_subtraction_combines_variance() {
        let f = frame(&[10.0, 20.0, 30.0, 40.0], &[1.0, 1.0, 0.0, 1.0]);
        let sky = SkyModel::new(
            vec![5000.0, 5001.0],
            DMatrix::from_row_slice(2, 2, &[9.0, 21.0, 30.0, 0.0]),
            DMatrix::from_element(2, 2, 1.0),
            Header::new(),
        )
        .unwrap();

        let out = StandardCalibrator.subtract_sky(&f, &sky).unwrap();
        assert_eq!(out.flux[(0, 0)], 1.0);
        assert_eq!(out.flux[(0, 1)], -1.0);
        assert_eq!(out.ivar[(0, 0)], 0.5);
        assert_eq!(out.ivar[(1, 0)], 0.0);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let f = frame(&[1.0; 4], &[1.0; 4]);
        let sky = SkyModel::new(
            vec![5000.0],
            DMatrix::zeros(2, 1),
            DMatrix::zeros(2, 1),
            Header::new(),
        )
        .unwrap();
        let err = StandardCalibrator.subtract_sky(&f, &sky).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }
}
