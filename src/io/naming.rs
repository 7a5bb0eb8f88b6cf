//! File naming conventions for generated artifacts and reports.
//!
//! All names are pure functions of validated identifiers.

use std::path::{Path, PathBuf};

use crate::domain::{ArtifactKey, Camera, ExposureId, Night};

/// Kinds of per-realization artifacts written to the base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Relabelled input frame.
    Frame,
    /// Sky model computed from the relabelled frame.
    Sky,
    /// Fiberflat-corrected, sky-subtracted frame.
    SFrame,
}

impl ArtifactKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Frame => "frame",
            ArtifactKind::Sky => "sky",
            ArtifactKind::SFrame => "sframe",
        }
    }
}

/// `{kind}-{camera}-{expid:08}-{nsky}-{rep}.fits`
pub fn artifact_file_name(kind: ArtifactKind, key: &ArtifactKey) -> String {
    format!(
        "{}-{}-{}-{}-{}.fits",
        kind.prefix(),
        key.camera,
        key.expid.padded(),
        key.nsky,
        key.rep
    )
}

pub fn artifact_path(dir: &Path, kind: ArtifactKind, key: &ArtifactKey) -> PathBuf {
    dir.join(artifact_file_name(kind, key))
}

/// Pipeline product name in the redux tree: `{prefix}-{camera}-{expid:08}.fits`.
pub fn redux_file_name(prefix: &str, camera: Camera, expid: ExposureId) -> String {
    format!("{prefix}-{camera}-{}.fits", expid.padded())
}

/// `data-{night}-{expid:08}.json`
pub fn results_file_name(night: Night, expid: ExposureId) -> String {
    format!("data-{night}-{}.json", expid.padded())
}

/// `cam_plots-{night}-{expid:08}.html`
pub fn camera_plots_file_name(night: Night, expid: ExposureId) -> String {
    format!("cam_plots-{night}-{}.html", expid.padded())
}

/// `sky_plots-{night}-{expid:08}.html`
pub fn sky_plots_file_name(night: Night, expid: ExposureId) -> String {
    format!("sky_plots-{night}-{}.html", expid.padded())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ArtifactKey {
        ArtifactKey {
            camera: "r3".parse().unwrap(),
            expid: ExposureId::new(12345),
            nsky: 10,
            rep: 0,
        }
    }

    #[test]
    fn artifact_names_encode_key() {
        let k = key();
        assert_eq!(artifact_file_name(ArtifactKind::Frame, &k), "frame-r3-00012345-10-0.fits");
        assert_eq!(artifact_file_name(ArtifactKind::Sky, &k), "sky-r3-00012345-10-0.fits");
        assert_eq!(artifact_file_name(ArtifactKind::SFrame, &k), "sframe-r3-00012345-10-0.fits");
        assert_eq!(
            artifact_path(Path::new("/data/out"), ArtifactKind::Sky, &k),
            PathBuf::from("/data/out/sky-r3-00012345-10-0.fits")
        );
    }

    #[test]
    fn report_names_encode_night_and_expid() {
        let night: Night = "20200315".parse().unwrap();
        let expid = ExposureId::new(55654);
        assert_eq!(results_file_name(night, expid), "data-20200315-00055654.json");
        assert_eq!(camera_plots_file_name(night, expid), "cam_plots-20200315-00055654.html");
        assert_eq!(sky_plots_file_name(night, expid), "sky_plots-20200315-00055654.html");
        assert_eq!(redux_file_name("frame", key().camera, expid), "frame-r3-00055654.fits");
    }
}
