//! Where pipeline inputs live.
//!
//! Input frames come from a spectroscopic reduction tree:
//!
//! ```text
//! $DESI_SPECTRO_REDUX/$SPECPROD/exposures/{night}/{expid:08}/frame-{camera}-{expid:08}.fits
//! ```
//!
//! The fiberflat used for a frame is recorded in the frame header (`FIBERFLT`) and
//! resolved against `$DESI_SPECTRO_CALIB` when relative.

use std::path::{Path, PathBuf};

use crate::domain::{Camera, ExposureId, Header, Night};
use crate::error::AppError;
use crate::io::naming::redux_file_name;

pub const DEFAULT_REDUX_ROOT: &str = "/project/projectdirs/desi/spectro/redux";
pub const DEFAULT_SPECPROD: &str = "daily";

/// Header card naming the fiberflat file.
pub const FIBERFLAT_CARD: &str = "FIBERFLT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduxLayout {
    pub redux_root: PathBuf,
    pub specprod: String,
    pub calib_root: Option<PathBuf>,
}

impl ReduxLayout {
    /// Resolve the layout from the environment (`app::run` loads `.env` first).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            redux_root: non_empty("DESI_SPECTRO_REDUX")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REDUX_ROOT)),
            specprod: non_empty("SPECPROD").unwrap_or_else(|| DEFAULT_SPECPROD.to_string()),
            calib_root: non_empty("DESI_SPECTRO_CALIB").map(PathBuf::from),
        }
    }

    pub fn exposure_dir(&self, night: Night, expid: ExposureId) -> PathBuf {
        self.redux_root
            .join(&self.specprod)
            .join("exposures")
            .join(night.to_string())
            .join(expid.padded())
    }

    /// Calibrated frame produced by the nightly pipeline.
    pub fn frame_path(&self, night: Night, expid: ExposureId, camera: Camera) -> PathBuf {
        self.exposure_dir(night, expid).join(redux_file_name("frame", camera, expid))
    }

    /// Locate the fiberflat recorded in a frame header.
    pub fn find_fiberflat(&self, header: &Header) -> Result<PathBuf, AppError> {
        self.find_fiberflat_with(header, |key| std::env::var(key).ok())
    }

    pub fn find_fiberflat_with(
        &self,
        header: &Header,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, AppError> {
        let raw = header.get(FIBERFLAT_CARD).map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
            AppError::usage(format!(
                "Frame header has no {FIBERFLAT_CARD} card; cannot locate the fiberflat."
            ))
        })?;

        let (raw, calib_relative) = match raw.strip_prefix("SPCALIB:") {
            Some(rest) => (rest.trim_start_matches('/'), true),
            None => (raw, false),
        };
        let expanded = PathBuf::from(expand_vars(raw, &lookup)?);

        if expanded.is_absolute() && !calib_relative {
            return Ok(expanded);
        }
        match &self.calib_root {
            Some(root) => Ok(root.join(expanded)),
            None => Err(AppError::usage(format!(
                "Fiberflat '{}' is relative but DESI_SPECTRO_CALIB is not set.",
                expanded.display()
            ))),
        }
    }
}

/// Expand `$VAR` and `${VAR}` references.
///
/// Unknown variables are an error rather than being left in place.
pub fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String, AppError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        let braced = matches!(chars.peek(), Some('{'));
        if braced {
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if !closed {
                return Err(AppError::usage(format!("Unterminated '${{' in '{input}'.")));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
        }

        if name.is_empty() {
            out.push('$');
            if braced {
                out.push_str("{}");
            }
            continue;
        }
        let value = lookup(&name)
            .ok_or_else(|| AppError::usage(format!("Environment variable '{name}' referenced in '{input}' is not set.")))?;
        out.push_str(&value);
    }

    Ok(out)
}

/// Expand environment references in a directory argument.
pub fn expand_dir(dir: &Path) -> Result<PathBuf, AppError> {
    let raw = dir.to_string_lossy();
    if !raw.contains('$') {
        return Ok(dir.to_path_buf());
    }
    expand_vars(&raw, |key| std::env::var(key).ok()).map(PathBuf::from)
}
