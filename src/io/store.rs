//! Storage seam for spectral products.
//!
//! The pipeline never touches the on-disk format directly; it goes through a
//! `FrameStore`. The FITS implementation lives in `io::fits` (feature `fits`), and
//! `io::memory` provides an in-process store.

use std::path::Path;

use crate::domain::{FiberLabels, Fiberflat, Frame, Header, SkyModel};
use crate::error::AppError;

pub trait FrameStore {
    /// Primary-header cards of a product file.
    fn read_header(&self, path: &Path) -> Result<Header, AppError>;

    fn read_frame(&self, path: &Path) -> Result<Frame, AppError>;

    /// Copy the frame at `source` to `path`, replacing only its fibermap object types.
    ///
    /// Everything else in the source product (extra HDUs, fibermap columns, header
    /// cards) is carried through untouched.
    fn write_relabelled_frame(&self, source: &Path, path: &Path, labels: &FiberLabels) -> Result<(), AppError>;

    /// Copy the frame at `source` to `path`, replacing its flux and ivar with `frame`'s.
    fn write_subtracted_frame(&self, source: &Path, path: &Path, frame: &Frame) -> Result<(), AppError>;

    fn read_fiberflat(&self, path: &Path) -> Result<Fiberflat, AppError>;

    fn read_sky(&self, path: &Path) -> Result<SkyModel, AppError>;

    fn write_sky(&self, path: &Path, sky: &SkyModel) -> Result<(), AppError>;

    fn exists(&self, path: &Path) -> bool;
}

/// Read a frame if the file exists.
///
/// A missing file is `Ok(None)`; a present but unreadable file is an error.
pub fn read_frame_if_present(store: &dyn FrameStore, path: &Path) -> Result<Option<Frame>, AppError> {
    if !store.exists(path) {
        return Ok(None);
    }
    store.read_frame(path).map(Some)
}
