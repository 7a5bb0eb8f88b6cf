//! Sky-fiber selection.
//!
//! Early commissioning exposures point the telescope at random sky and assume most
//! fibers land on blank sky. Fibers whose fiberflat-corrected total flux sits inside
//! a percentile band are treated as usable; a random subset of those becomes the
//! `SKY` reference set, the rest stay `TGT`, and fibers outside the band are `BAD`.

use rand::Rng;
use rand::seq::index;
use rayon::prelude::*;

use crate::calib::Calibrator;
use crate::domain::{FiberLabels, Fiberflat, Frame, ObjType};
use crate::error::AppError;
use crate::math::percentile;

/// Lower percentile of summed flux accepted as sky-like.
pub const FLUX_PERCENTILE_LO: f64 = 5.0;
/// Upper percentile of summed flux accepted as sky-like.
pub const FLUX_PERCENTILE_HI: f64 = 85.0;

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SkySelection {
    pub labels: FiberLabels,
    /// Number of fibers inside the eligible band.
    pub eligible: usize,
    /// `(lo, hi)` summed-flux percentile band.
    pub flux_band: (f64, f64),
}

/// Per-fiber totals across wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct FiberTotals {
    pub sum_flux: Vec<f64>,
    pub sum_ivar: Vec<f64>,
}

impl FiberTotals {
    pub fn from_frame(frame: &Frame) -> Self {
        let sum_flux = (0..frame.nfiber())
            .into_par_iter()
            .map(|i| frame.flux.row(i).sum())
            .collect();
        let sum_ivar = (0..frame.nfiber())
            .into_par_iter()
            .map(|i| frame.ivar.row(i).sum())
            .collect();
        Self { sum_flux, sum_ivar }
    }
}

/// Pick `nsky` sky fibers from `frame` after applying `fiberflat` to a working copy.
pub fn select_sky_fibers<R: Rng + ?Sized>(
    frame: &Frame,
    fiberflat: &Fiberflat,
    calibrator: &dyn Calibrator,
    nsky: usize,
    rng: &mut R,
) -> Result<SkySelection, AppError> {
    let calibrated = calibrator.apply_fiberflat(frame, fiberflat)?;
    classify_fibers(&FiberTotals::from_frame(&calibrated), nsky, rng)
}

/// Classify fibers from their totals.
///
/// Eligible fibers satisfy `lo < sum_flux < hi`, `sum_flux > 0` and `sum_ivar > 0`,
/// where `(lo, hi)` are the 5th/85th percentiles of `sum_flux`.
pub fn classify_fibers<R: Rng + ?Sized>(
    totals: &FiberTotals,
    nsky: usize,
    rng: &mut R,
) -> Result<SkySelection, AppError> {
    let n = totals.sum_flux.len();
    if totals.sum_ivar.len() != n {
        return Err(AppError::data(format!(
            "Flux totals ({n}) and ivar totals ({}) differ in length.",
            totals.sum_ivar.len()
        )));
    }
    if nsky == 0 {
        return Err(AppError::usage("Requested sky-fiber count must be >= 1."));
    }

    let lo = percentile(&totals.sum_flux, FLUX_PERCENTILE_LO)
        .ok_or_else(|| AppError::data("Cannot compute flux percentiles (no fibers or non-finite flux)."))?;
    let hi = percentile(&totals.sum_flux, FLUX_PERCENTILE_HI)
        .ok_or_else(|| AppError::data("Cannot compute flux percentiles (no fibers or non-finite flux)."))?;

    let eligible: Vec<usize> = (0..n)
        .filter(|&i| {
            let f = totals.sum_flux[i];
            lo < f && f < hi && f > 0.0 && totals.sum_ivar[i] > 0.0
        })
        .collect();

    if eligible.len() < nsky {
        return Err(AppError::data(format!(
            "Only {} fibers fall inside the sky flux band ({lo:.3}, {hi:.3}); cannot pick {nsky} sky fibers.",
            eligible.len()
        )));
    }

    let mut labels = vec![ObjType::Bad; n];
    for &i in &eligible {
        labels[i] = ObjType::Target;
    }
    for pick in index::sample(rng, eligible.len(), nsky).iter() {
        labels[eligible[pick]] = ObjType::Sky;
    }

    Ok(SkySelection {
        labels: FiberLabels::new(labels),
        eligible: eligible.len(),
        flux_band: (lo, hi),
    })
}
