//! Shared domain types.
//!
//! Identifiers (`Camera`, `Night`, `ExposureId`) are validated on construction so
//! everything downstream, file naming in particular, can treat them as trusted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Spectrograph arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arm {
    B,
    R,
    Z,
}

impl Arm {
    pub fn letter(self) -> char {
        match self {
            Arm::B => 'b',
            Arm::R => 'r',
            Arm::Z => 'z',
        }
    }

    /// Wavelength window (Å, exclusive) used for residual statistics.
    pub fn wave_window(self) -> WaveWindow {
        match self {
            Arm::B => WaveWindow::new(5000.0, 6000.0),
            Arm::R => WaveWindow::new(5500.0, 8000.0),
            Arm::Z => WaveWindow::new(7500.0, 9900.0),
        }
    }
}

/// A camera: arm + spectrograph number, written `r3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Camera {
    arm: Arm,
    spectrograph: u8,
}

impl Camera {
    pub(crate) const fn new_unchecked(arm: Arm, spectrograph: u8) -> Self {
        Self { arm, spectrograph }
    }

    pub fn arm(&self) -> Arm {
        self.arm
    }

    pub fn spectrograph(&self) -> u8 {
        self.spectrograph
    }

    pub fn wave_window(&self) -> WaveWindow {
        self.arm.wave_window()
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.arm.letter(), self.spectrograph)
    }
}

impl FromStr for Camera {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let mut chars = lower.chars();
        let arm = match chars.next() {
            Some('b') => Arm::B,
            Some('r') => Arm::R,
            Some('z') => Arm::Z,
            _ => return Err(format!("invalid camera '{s}': expected b/r/z followed by 0-9")),
        };
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| format!("invalid camera '{s}': expected b/r/z followed by 0-9"))?;
        if chars.next().is_some() {
            return Err(format!("invalid camera '{s}': expected b/r/z followed by 0-9"));
        }
        Ok(Camera {
            arm,
            spectrograph: digit as u8,
        })
    }
}

impl TryFrom<String> for Camera {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Camera> for String {
    fn from(value: Camera) -> Self {
        value.to_string()
    }
}

/// Observing night, `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Night(NaiveDate);

impl fmt::Display for Night {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl FromStr for Night {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid night '{s}': expected YYYYMMDD"));
        }
        NaiveDate::parse_from_str(s, "%Y%m%d")
            .map(Night)
            .map_err(|e| format!("invalid night '{s}': {e}"))
    }
}

/// Exposure id (unpadded on the command line, 8-digit padded in file names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExposureId(u32);

impl ExposureId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn padded(&self) -> String {
        format!("{:08}", self.0)
    }
}

impl fmt::Display for ExposureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExposureId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ExposureId)
            .map_err(|e| format!("invalid exposure id '{s}': {e}"))
    }
}

/// Wavelength window with exclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveWindow {
    pub min: f64,
    pub max: f64,
}

impl WaveWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, wave: f64) -> bool {
        self.min < wave && wave < self.max
    }

    /// Indices of `wave` falling inside the window.
    pub fn indices(&self, wave: &[f64]) -> Vec<usize> {
        wave.iter()
            .enumerate()
            .filter(|(_, w)| self.contains(**w))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Fibermap object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjType {
    Target,
    Sky,
    Bad,
    /// Anything else found in an input fibermap (`NON`, blank, ...).
    Unassigned,
}

impl ObjType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjType::Target => "TGT",
            ObjType::Sky => "SKY",
            ObjType::Bad => "BAD",
            ObjType::Unassigned => "NON",
        }
    }

    /// Lenient mapping used when reading fibermaps.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "TGT" => ObjType::Target,
            "SKY" => ObjType::Sky,
            "BAD" => ObjType::Bad,
            _ => ObjType::Unassigned,
        }
    }
}

/// One fibermap row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiberRecord {
    pub fiber: i32,
    pub objtype: ObjType,
}

/// Immutable per-fiber classification produced by sky-fiber selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiberLabels(Vec<ObjType>);

impl FiberLabels {
    pub fn new(labels: Vec<ObjType>) -> Self {
        Self(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, fiber: usize) -> Option<ObjType> {
        self.0.get(fiber).copied()
    }

    pub fn as_slice(&self) -> &[ObjType] {
        &self.0
    }

    pub fn count(&self, kind: ObjType) -> usize {
        self.0.iter().filter(|&&t| t == kind).count()
    }

    pub fn indices(&self, kind: ObjType) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == kind)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Primary-header cards kept alongside frame-like products.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: BTreeMap<String, String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.cards.insert(key.to_ascii_uppercase(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.cards.get(&key.to_ascii_uppercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A per-exposure, per-camera spectral frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub wave: Vec<f64>,
    /// `nfiber x nwave`.
    pub flux: DMatrix<f64>,
    /// `nfiber x nwave`.
    pub ivar: DMatrix<f64>,
    pub fibermap: Vec<FiberRecord>,
    pub header: Header,
}

impl Frame {
    pub fn new(
        wave: Vec<f64>,
        flux: DMatrix<f64>,
        ivar: DMatrix<f64>,
        fibermap: Vec<FiberRecord>,
        header: Header,
    ) -> Result<Self, AppError> {
        check_shape("frame flux", &flux, fibermap.len(), wave.len())?;
        check_shape("frame ivar", &ivar, fibermap.len(), wave.len())?;
        Ok(Self {
            wave,
            flux,
            ivar,
            fibermap,
            header,
        })
    }

    pub fn nfiber(&self) -> usize {
        self.fibermap.len()
    }

    pub fn nwave(&self) -> usize {
        self.wave.len()
    }

    pub fn labels(&self) -> FiberLabels {
        FiberLabels::new(self.fibermap.iter().map(|r| r.objtype).collect())
    }

    /// A new frame carrying `labels` in its fibermap.
    pub fn with_labels(&self, labels: &FiberLabels) -> Result<Frame, AppError> {
        if labels.len() != self.nfiber() {
            return Err(AppError::data(format!(
                "Label count {} does not match fiber count {}.",
                labels.len(),
                self.nfiber()
            )));
        }
        let fibermap = self
            .fibermap
            .iter()
            .zip(labels.as_slice())
            .map(|(rec, &objtype)| FiberRecord {
                fiber: rec.fiber,
                objtype,
            })
            .collect();
        Ok(Frame {
            fibermap,
            ..self.clone()
        })
    }
}

/// Fiber throughput calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Fiberflat {
    pub wave: Vec<f64>,
    pub fiberflat: DMatrix<f64>,
    pub ivar: DMatrix<f64>,
    pub header: Header,
}

impl Fiberflat {
    pub fn new(
        wave: Vec<f64>,
        fiberflat: DMatrix<f64>,
        ivar: DMatrix<f64>,
        header: Header,
    ) -> Result<Self, AppError> {
        let nfiber = fiberflat.nrows();
        check_shape("fiberflat", &fiberflat, nfiber, wave.len())?;
        check_shape("fiberflat ivar", &ivar, nfiber, wave.len())?;
        Ok(Self {
            wave,
            fiberflat,
            ivar,
            header,
        })
    }
}

/// Per-fiber sky background model.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyModel {
    pub wave: Vec<f64>,
    pub flux: DMatrix<f64>,
    pub ivar: DMatrix<f64>,
    pub header: Header,
}

impl SkyModel {
    pub fn new(wave: Vec<f64>, flux: DMatrix<f64>, ivar: DMatrix<f64>, header: Header) -> Result<Self, AppError> {
        let nfiber = flux.nrows();
        check_shape("sky flux", &flux, nfiber, wave.len())?;
        check_shape("sky ivar", &ivar, nfiber, wave.len())?;
        Ok(Self {
            wave,
            flux,
            ivar,
            header,
        })
    }
}

pub(crate) fn check_shape(what: &str, m: &DMatrix<f64>, nrows: usize, ncols: usize) -> Result<(), AppError> {
    if m.nrows() != nrows || m.ncols() != ncols {
        return Err(AppError::data(format!(
            "{what} has shape {}x{}, expected {nrows}x{ncols}.",
            m.nrows(),
            m.ncols()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_parses_and_displays() {
        let cam: Camera = "R3".parse().unwrap();
        assert_eq!(cam.arm(), Arm::R);
        assert_eq!(cam.spectrograph(), 3);
        assert_eq!(cam.to_string(), "r3");

        assert!("x3".parse::<Camera>().is_err());
        assert!("r".parse::<Camera>().is_err());
        assert!("r10".parse::<Camera>().is_err());
    }

    #[test]
    fn night_requires_real_date() {
        let night: Night = "20200315".parse().unwrap();
        assert_eq!(night.to_string(), "20200315");
        assert!("20201345".parse::<Night>().is_err());
        assert!("2020031".parse::<Night>().is_err());
    }

    #[test]
    fn exposure_id_pads_to_eight_digits() {
        let expid: ExposureId = "12345".parse().unwrap();
        assert_eq!(expid.padded(), "00012345");
        assert_eq!(expid.to_string(), "12345");
    }

    #[test]
    fn wave_window_bounds_are_exclusive() {
        let w = Arm::R.wave_window();
        let idx = w.indices(&[5500.0, 5500.5, 7999.0, 8000.0]);
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn objtype_reads_leniently() {
        assert_eq!(ObjType::from_label("TGT"), ObjType::Target);
        assert_eq!(ObjType::from_label("SKY "), ObjType::Sky);
        assert_eq!(ObjType::from_label(""), ObjType::Unassigned);
        assert_eq!(ObjType::Bad.as_str(), "BAD");
    }

    #[test]
    fn with_labels_builds_new_frame() {
        let fibermap = (0..3)
            .map(|i| FiberRecord {
                fiber: i,
                objtype: ObjType::Unassigned,
            })
            .collect();
        let frame = Frame::new(
            vec![1.0, 2.0],
            DMatrix::zeros(3, 2),
            DMatrix::zeros(3, 2),
            fibermap,
            Header::new(),
        )
        .unwrap();
        let labels = FiberLabels::new(vec![ObjType::Sky, ObjType::Target, ObjType::Bad]);
        let relabelled = frame.with_labels(&labels).unwrap();

        assert_eq!(relabelled.labels(), labels);
        assert_eq!(frame.labels().count(ObjType::Unassigned), 3);
        assert!(frame.with_labels(&FiberLabels::new(vec![ObjType::Sky])).is_err());
    }

    #[test]
    fn frame_rejects_mismatched_shapes() {
        let err = Frame::new(vec![1.0], DMatrix::zeros(2, 2), DMatrix::zeros(2, 1), vec![], Header::new());
        assert!(err.is_err());
    }

    #[test]
    fn camera_serializes_as_string() {
        let cam: Camera = "z1".parse().unwrap();
        assert_eq!(serde_json::to_string(&cam).unwrap(), "\"z1\"");
        let back: Camera = serde_json::from_str("\"b7\"").unwrap();
        assert_eq!(back.to_string(), "b7");
    }
}
