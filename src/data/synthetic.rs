//! Seeded synthetic exposures.
//!
//! Produces a frame + fiberflat pair that looks like a commissioning exposure:
//! a shared sky spectrum with emission lines, per-fiber throughput variations,
//! a handful of bright "objects", a few dead fibers and Gaussian noise.
//! Used by tests and for exercising the pipeline without instrument data.

use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::calib::Calibrator;
use crate::domain::{Arm, Camera, FiberRecord, Fiberflat, Frame, Header, ObjType, SkyModel};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct SyntheticExposure {
    pub camera: Camera,
    pub nfiber: usize,
    pub nwave: usize,
    pub wave_min: f64,
    pub wave_max: f64,
    /// Continuum sky level (counts per pixel).
    pub sky_level: f64,
    /// Relative throughput scatter between fibers.
    pub throughput_sigma: f64,
    /// Fraction of fibers landing on a bright object.
    pub object_fraction: f64,
    /// Fraction of fibers with zero signal.
    pub dead_fraction: f64,
    pub read_noise: f64,
}

impl Default for SyntheticExposure {
    fn default() -> Self {
        Self {
            camera: Camera::new_unchecked(Arm::R, 3),
            nfiber: 120,
            nwave: 400,
            wave_min: 5600.0,
            wave_max: 7900.0,
            sky_level: 100.0,
            throughput_sigma: 0.05,
            object_fraction: 0.1,
            dead_fraction: 0.03,
            read_noise: 3.0,
        }
    }
}

/// Generated products.
#[derive(Debug, Clone)]
pub struct SyntheticProducts {
    pub frame: Frame,
    pub fiberflat: Fiberflat,
    /// Noise-free sky spectrum shared by every fiber (before throughput).
    pub sky_spectrum: Vec<f64>,
}

impl SyntheticExposure {
    pub fn generate(&self, seed: u64) -> Result<SyntheticProducts, AppError> {
        if self.nfiber == 0 || self.nwave < 2 {
            return Err(AppError::usage("Synthetic exposure needs >= 1 fiber and >= 2 wavelengths."));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).map_err(|e| AppError::internal(format!("Noise distribution error: {e}")))?;

        let step = (self.wave_max - self.wave_min) / (self.nwave - 1) as f64;
        let wave: Vec<f64> = (0..self.nwave).map(|j| self.wave_min + step * j as f64).collect();
        let sky_spectrum: Vec<f64> = wave.iter().map(|&w| self.sky_level * (1.0 + sky_lines(w))).collect();

        let mut flux = DMatrix::zeros(self.nfiber, self.nwave);
        let mut ivar = DMatrix::zeros(self.nfiber, self.nwave);
        let mut flat = DMatrix::zeros(self.nfiber, self.nwave);
        let flat_ivar = DMatrix::from_element(self.nfiber, self.nwave, 1.0e6);
        let mut fibermap = Vec::with_capacity(self.nfiber);

        for i in 0..self.nfiber {
            let throughput = (1.0 + self.throughput_sigma * noise.sample(&mut rng)).max(0.1);
            let roll: f64 = rng.gen_range(0.0..1.0);
            let dead = roll < self.dead_fraction;
            let object = !dead && roll < self.dead_fraction + self.object_fraction;
            let object_level = if object { self.sky_level * rng.gen_range(2.0..10.0) } else { 0.0 };

            for j in 0..self.nwave {
                flat[(i, j)] = throughput;
                if dead {
                    continue;
                }
                let signal = throughput * (sky_spectrum[j] + object_level);
                let sigma = (signal.max(0.0) + self.read_noise * self.read_noise).sqrt();
                flux[(i, j)] = signal + sigma * noise.sample(&mut rng);
                ivar[(i, j)] = 1.0 / (sigma * sigma);
            }

            fibermap.push(FiberRecord {
                fiber: i as i32,
                objtype: ObjType::Unassigned,
            });
        }

        let header = Header::new()
            .with("CAMERA", self.camera.to_string())
            .with("SPECGRPH", self.camera.spectrograph().to_string());

        Ok(SyntheticProducts {
            frame: Frame::new(wave.clone(), flux, ivar, fibermap, header.clone())?,
            fiberflat: Fiberflat::new(wave, flat, flat_ivar, header)?,
            sky_spectrum,
        })
    }
}

/// A few Gaussian emission lines on top of the continuum (relative units).
fn sky_lines(wave: f64) -> f64 {
    const LINES: [(f64, f64); 4] = [(5577.3, 8.0), (6300.3, 3.0), (6863.9, 2.0), (7340.9, 4.0)];
    LINES
        .iter()
        .map(|&(center, amp)| {
            let d = (wave - center) / 2.5;
            amp * (-0.5 * d * d).exp()
        })
        .sum()
}

/// Sky model from the mean fiberflat-corrected spectrum of the frame's `SKY` fibers.
///
/// Stands in for the external sky tool when exercising the pipeline offline.
pub fn mean_sky_model(frame: &Frame, fiberflat: &Fiberflat, calibrator: &dyn Calibrator) -> Result<SkyModel, AppError> {
    let calibrated = calibrator.apply_fiberflat(frame, fiberflat)?;
    let sky_fibers = frame.labels().indices(ObjType::Sky);
    if sky_fibers.is_empty() {
        return Err(AppError::data("Frame has no SKY fibers to build a sky model from."));
    }

    let mut mean = vec![0.0; frame.nwave()];
    for &i in &sky_fibers {
        for (j, m) in mean.iter_mut().enumerate() {
            *m += calibrated.flux[(i, j)];
        }
    }
    for m in &mut mean {
        *m /= sky_fibers.len() as f64;
    }

    // The model is in calibrated units; every fiber shares it.
    let flux = DMatrix::from_fn(frame.nfiber(), frame.nwave(), |_, j| mean[j]);
    let ivar = DMatrix::from_element(frame.nfiber(), frame.nwave(), 1.0e6);
    SkyModel::new(frame.wave.clone(), flux, ivar, frame.header.clone())
}
