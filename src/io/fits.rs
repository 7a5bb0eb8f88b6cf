//! FITS-backed `FrameStore` (feature `fits`, via cfitsio).
//!
//! HDUs read:
//! - frame: `FLUX`, `IVAR` (`nfiber x nwave`), `WAVELENGTH`, `FIBERMAP` table
//! - fiberflat: `FIBERFLAT`, `IVAR`, `WAVELENGTH`
//! - sky: `SKY`, `IVAR`, `WAVELENGTH`
//!
//! Only the primary-header cards listed in `HEADER_CARDS` are read into `Header`.
//! Generated frames and sframes are written as edited copies of their source file,
//! so `MASK`, `RESOLUTION`, the full fibermap and the full header survive for the
//! sky-model tool.

use std::path::Path;

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use nalgebra::DMatrix;

use crate::domain::{FiberLabels, FiberRecord, Fiberflat, Frame, Header, ObjType, SkyModel};
use crate::error::AppError;
use crate::io::store::FrameStore;

pub const HEADER_CARDS: [&str; 7] = ["CAMERA", "NIGHT", "EXPID", "FIBERFLT", "SPECGRPH", "DATE-OBS", "EXPTIME"];

#[derive(Debug, Clone, Copy, Default)]
pub struct FitsStore;

fn open(path: &Path) -> Result<FitsFile, AppError> {
    FitsFile::open(path).map_err(|e| AppError::io("open FITS file", path, e))
}

fn edit(path: &Path) -> Result<FitsFile, AppError> {
    FitsFile::edit(path).map_err(|e| AppError::io("open FITS file for editing", path, e))
}

fn create_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AppError::io("create directory", parent, e))?;
    }
    Ok(())
}

/// Byte-for-byte copy of `source`, the starting point of every derived frame.
fn copy_product(source: &Path, path: &Path) -> Result<(), AppError> {
    create_parent(path)?;
    std::fs::copy(source, path).map_err(|e| AppError::io(&format!("copy '{}' to", source.display()), path, e))?;
    Ok(())
}

fn create(path: &Path) -> Result<FitsFile, AppError> {
    create_parent(path)?;
    FitsFile::create(path)
        .overwrite()
        .open()
        .map_err(|e| AppError::io("create FITS file", path, e))
}

fn read_header_cards(fptr: &mut FitsFile, path: &Path) -> Result<Header, AppError> {
    let hdu = fptr
        .primary_hdu()
        .map_err(|e| AppError::io("read primary header of", path, e))?;
    let mut header = Header::new();
    for key in HEADER_CARDS {
        if let Ok(v) = hdu.read_key::<String>(fptr, key) {
            header.set(key, v);
        } else if let Ok(v) = hdu.read_key::<i64>(fptr, key) {
            header.set(key, v.to_string());
        } else if let Ok(v) = hdu.read_key::<f64>(fptr, key) {
            header.set(key, v.to_string());
        }
    }
    Ok(header)
}

fn write_header_cards(fptr: &mut FitsFile, path: &Path, header: &Header) -> Result<(), AppError> {
    let hdu = fptr
        .primary_hdu()
        .map_err(|e| AppError::io("write primary header of", path, e))?;
    for (key, value) in header.iter() {
        hdu.write_key(fptr, key, value.to_string())
            .map_err(|e| AppError::io(&format!("write {key} card to"), path, e))?;
    }
    Ok(())
}

fn read_vector(fptr: &mut FitsFile, path: &Path, extname: &str) -> Result<Vec<f64>, AppError> {
    let hdu = fptr
        .hdu(extname)
        .map_err(|e| AppError::io(&format!("find {extname} HDU in"), path, e))?;
    hdu.read_image(fptr)
        .map_err(|e| AppError::io(&format!("read {extname} from"), path, e))
}

fn image_shape(hdu: &FitsHdu, path: &Path, extname: &str) -> Result<(usize, usize), AppError> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => Ok((shape[0], shape[1])),
        _ => Err(AppError::data(format!(
            "{extname} in '{}' is not a 2-D image.",
            path.display()
        ))),
    }
}

fn read_matrix(fptr: &mut FitsFile, path: &Path, extname: &str) -> Result<DMatrix<f64>, AppError> {
    let hdu = fptr
        .hdu(extname)
        .map_err(|e| AppError::io(&format!("find {extname} HDU in"), path, e))?;
    let (nrows, ncols) = image_shape(&hdu, path, extname)?;
    let data: Vec<f64> = hdu
        .read_image(fptr)
        .map_err(|e| AppError::io(&format!("read {extname} from"), path, e))?;
    if data.len() != nrows * ncols {
        return Err(AppError::data(format!(
            "{extname} in '{}' has {} values, expected {nrows}x{ncols}.",
            path.display(),
            data.len()
        )));
    }
    // FITS images are row-major with the fiber index as the slow axis.
    Ok(DMatrix::from_row_slice(nrows, ncols, &data))
}

fn write_vector(fptr: &mut FitsFile, path: &Path, extname: &str, data: &[f64]) -> Result<(), AppError> {
    let desc = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[data.len()],
    };
    let hdu = fptr
        .create_image(extname.to_string(), &desc)
        .map_err(|e| AppError::io(&format!("create {extname} HDU in"), path, e))?;
    hdu.write_image(fptr, data)
        .map_err(|e| AppError::io(&format!("write {extname} to"), path, e))
}

fn write_matrix(fptr: &mut FitsFile, path: &Path, extname: &str, m: &DMatrix<f64>) -> Result<(), AppError> {
    let desc = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[m.nrows(), m.ncols()],
    };
    let hdu = fptr
        .create_image(extname.to_string(), &desc)
        .map_err(|e| AppError::io(&format!("create {extname} HDU in"), path, e))?;
    // nalgebra storage is column-major; the transpose's storage is our row-major layout.
    let row_major = m.transpose();
    hdu.write_image(fptr, row_major.as_slice())
        .map_err(|e| AppError::io(&format!("write {extname} to"), path, e))
}

/// Replace the pixels of an existing 2-D image HDU, keeping its header and type.
fn overwrite_matrix(fptr: &mut FitsFile, path: &Path, extname: &str, m: &DMatrix<f64>) -> Result<(), AppError> {
    let hdu = fptr
        .hdu(extname)
        .map_err(|e| AppError::io(&format!("find {extname} HDU in"), path, e))?;
    let shape = image_shape(&hdu, path, extname)?;
    if shape != (m.nrows(), m.ncols()) {
        return Err(AppError::data(format!(
            "{extname} in '{}' is {}x{}, cannot store {}x{}.",
            path.display(),
            shape.0,
            shape.1,
            m.nrows(),
            m.ncols()
        )));
    }
    let row_major = m.transpose();
    hdu.write_image(fptr, row_major.as_slice())
        .map_err(|e| AppError::io(&format!("write {extname} to"), path, e))
}

fn read_objtypes(fptr: &mut FitsFile, path: &Path) -> Result<Vec<String>, AppError> {
    let hdu = fptr
        .hdu("FIBERMAP")
        .map_err(|e| AppError::io("find FIBERMAP HDU in", path, e))?;
    hdu.read_col(fptr, "OBJTYPE")
        .map_err(|e| AppError::io("read FIBERMAP.OBJTYPE from", path, e))
}

fn read_fibermap(fptr: &mut FitsFile, path: &Path, nfiber: usize) -> Result<Vec<FiberRecord>, AppError> {
    let objtype = read_objtypes(fptr, path)?;
    let hdu = fptr
        .hdu("FIBERMAP")
        .map_err(|e| AppError::io("find FIBERMAP HDU in", path, e))?;
    let fiber: Vec<i32> = match hdu.read_col::<i32>(fptr, "FIBER") {
        Ok(v) => v,
        Err(_) => (0..objtype.len() as i32).collect(),
    };
    if objtype.len() != nfiber || fiber.len() != nfiber {
        return Err(AppError::data(format!(
            "FIBERMAP in '{}' has {} rows, expected {nfiber}.",
            path.display(),
            objtype.len()
        )));
    }
    Ok(fiber
        .into_iter()
        .zip(objtype)
        .map(|(fiber, label)| FiberRecord {
            fiber,
            objtype: ObjType::from_label(&label),
        })
        .collect())
}

impl FrameStore for FitsStore {
    fn read_header(&self, path: &Path) -> Result<Header, AppError> {
        let mut fptr = open(path)?;
        read_header_cards(&mut fptr, path)
    }

    fn read_frame(&self, path: &Path) -> Result<Frame, AppError> {
        let mut fptr = open(path)?;
        let header = read_header_cards(&mut fptr, path)?;
        let flux = read_matrix(&mut fptr, path, "FLUX")?;
        let ivar = read_matrix(&mut fptr, path, "IVAR")?;
        let wave = read_vector(&mut fptr, path, "WAVELENGTH")?;
        let fibermap = read_fibermap(&mut fptr, path, flux.nrows())?;
        Frame::new(wave, flux, ivar, fibermap, header)
    }

    fn write_relabelled_frame(&self, source: &Path, path: &Path, labels: &FiberLabels) -> Result<(), AppError> {
        let nrows = read_objtypes(&mut open(source)?, source)?.len();
        if nrows != labels.len() {
            return Err(AppError::data(format!(
                "Label count {} does not match the {nrows} FIBERMAP rows of '{}'.",
                labels.len(),
                source.display()
            )));
        }

        copy_product(source, path)?;
        let mut fptr = edit(path)?;
        let hdu = fptr
            .hdu("FIBERMAP")
            .map_err(|e| AppError::io("find FIBERMAP HDU in", path, e))?;
        let objtype: Vec<String> = labels.as_slice().iter().map(|t| t.as_str().to_string()).collect();
        hdu.write_col(&mut fptr, "OBJTYPE", &objtype)
            .map_err(|e| AppError::io("write FIBERMAP.OBJTYPE to", path, e))?;
        Ok(())
    }

    fn write_subtracted_frame(&self, source: &Path, path: &Path, frame: &Frame) -> Result<(), AppError> {
        copy_product(source, path)?;
        let mut fptr = edit(path)?;
        let written = overwrite_matrix(&mut fptr, path, "FLUX", &frame.flux)
            .and_then(|()| overwrite_matrix(&mut fptr, path, "IVAR", &frame.ivar));
        if written.is_err() {
            drop(fptr);
            // No partial sframe is left behind.
            let _ = std::fs::remove_file(path);
        }
        written
    }

    fn read_fiberflat(&self, path: &Path) -> Result<Fiberflat, AppError> {
        let mut fptr = open(path)?;
        let header = read_header_cards(&mut fptr, path)?;
        let fiberflat = read_matrix(&mut fptr, path, "FIBERFLAT")?;
        let ivar = read_matrix(&mut fptr, path, "IVAR")?;
        let wave = read_vector(&mut fptr, path, "WAVELENGTH")?;
        Fiberflat::new(wave, fiberflat, ivar, header)
    }

    fn read_sky(&self, path: &Path) -> Result<SkyModel, AppError> {
        let mut fptr = open(path)?;
        let header = read_header_cards(&mut fptr, path)?;
        let flux = read_matrix(&mut fptr, path, "SKY")?;
        let ivar = read_matrix(&mut fptr, path, "IVAR")?;
        let wave = read_vector(&mut fptr, path, "WAVELENGTH")?;
        SkyModel::new(wave, flux, ivar, header)
    }

    fn write_sky(&self, path: &Path, sky: &SkyModel) -> Result<(), AppError> {
        let mut fptr = create(path)?;
        write_header_cards(&mut fptr, path, &sky.header)?;
        write_matrix(&mut fptr, path, "SKY", &sky.flux)?;
        write_matrix(&mut fptr, path, "IVAR", &sky.ivar)?;
        write_vector(&mut fptr, path, "WAVELENGTH", &sky.wave)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticExposure;
    use fitsio::tables::{ColumnDataType, ColumnDescription};

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("skysub-fits-{tag}-{}", std::process::id()))
    }

    /// A redux-style frame: the HDUs we read plus MASK, RESOLUTION, an extra
    /// fibermap column and an extra header card.
    fn write_redux_frame(path: &Path, frame: &Frame) {
        let (nfiber, nwave) = (frame.nfiber(), frame.nwave());
        let mut fptr = create(path).unwrap();
        let header = frame.header.clone().with("PROGRAM", "dark");
        write_header_cards(&mut fptr, path, &header).unwrap();
        write_matrix(&mut fptr, path, "FLUX", &frame.flux).unwrap();
        write_matrix(&mut fptr, path, "IVAR", &frame.ivar).unwrap();

        let mask: Vec<i32> = (0..nfiber * nwave).map(|i| (i % 3) as i32).collect();
        let desc = ImageDescription {
            data_type: ImageType::Long,
            dimensions: &[nfiber, nwave],
        };
        let hdu = fptr.create_image("MASK".to_string(), &desc).unwrap();
        hdu.write_image(&mut fptr, mask.as_slice()).unwrap();

        write_vector(&mut fptr, path, "WAVELENGTH", &frame.wave).unwrap();

        let desc = ImageDescription {
            data_type: ImageType::Double,
            dimensions: &[nfiber, 5, nwave],
        };
        let hdu = fptr.create_image("RESOLUTION".to_string(), &desc).unwrap();
        let resolution = vec![0.2f64; nfiber * 5 * nwave];
        hdu.write_image(&mut fptr, resolution.as_slice()).unwrap();

        let columns = [
            ColumnDescription::new("FIBER").with_type(ColumnDataType::Int).create().unwrap(),
            ColumnDescription::new("OBJTYPE")
                .with_type(ColumnDataType::String)
                .that_repeats(3)
                .create()
                .unwrap(),
            ColumnDescription::new("FIBERSTATUS").with_type(ColumnDataType::Int).create().unwrap(),
        ];
        let hdu = fptr.create_table("FIBERMAP".to_string(), &columns).unwrap();
        let fibers: Vec<i32> = frame.fibermap.iter().map(|r| r.fiber).collect();
        let objtype: Vec<String> = vec!["TGT".to_string(); nfiber];
        let status: Vec<i32> = (0..nfiber as i32).map(|i| i * 4).collect();
        hdu.write_col(&mut fptr, "FIBER", &fibers).unwrap();
        hdu.write_col(&mut fptr, "OBJTYPE", &objtype).unwrap();
        hdu.write_col(&mut fptr, "FIBERSTATUS", &status).unwrap();
    }

    fn assert_carried_through(path: &Path, nfiber: usize, nwave: usize) {
        let mut fptr = open(path).unwrap();
        let program: String = fptr.primary_hdu().unwrap().read_key(&mut fptr, "PROGRAM").unwrap();
        assert_eq!(program, "dark");
        let mask: Vec<i32> = fptr.hdu("MASK").unwrap().read_image(&mut fptr).unwrap();
        assert_eq!(mask, (0..nfiber * nwave).map(|i| (i % 3) as i32).collect::<Vec<_>>());
        let resolution: Vec<f64> = fptr.hdu("RESOLUTION").unwrap().read_image(&mut fptr).unwrap();
        assert_eq!(resolution.len(), nfiber * 5 * nwave);
        let status: Vec<i32> = fptr.hdu("FIBERMAP").unwrap().read_col(&mut fptr, "FIBERSTATUS").unwrap();
        assert_eq!(status, (0..nfiber as i32).map(|i| i * 4).collect::<Vec<_>>());
    }

    #[test]
    fn derived_frames_keep_every_hdu_of_the_source() {
        let dir = temp_dir("derived");
        let source = dir.join("redux/frame-r3-00000001.fits");
        let products = SyntheticExposure {
            nfiber: 6,
            nwave: 16,
            ..SyntheticExposure::default()
        }
        .generate(4)
        .unwrap();
        let mut input = products.frame.clone();
        input.header.set("FIBERFLT", "/calib/ff.fits");
        write_redux_frame(&source, &input);

        let labels = FiberLabels::new(vec![
            ObjType::Sky,
            ObjType::Target,
            ObjType::Bad,
            ObjType::Target,
            ObjType::Sky,
            ObjType::Target,
        ]);
        let frame_path = dir.join("out/frame-r3-00000001-2-0.fits");
        FitsStore.write_relabelled_frame(&source, &frame_path, &labels).unwrap();

        let frame = FitsStore.read_frame(&frame_path).unwrap();
        assert_eq!(frame.labels(), labels);
        assert_eq!(frame.flux, input.flux);
        assert_eq!(frame.wave, input.wave);
        assert_eq!(frame.header.get("FIBERFLT"), Some("/calib/ff.fits"));
        assert_carried_through(&frame_path, 6, 16);

        let mut subtracted = frame.clone();
        subtracted.flux.fill(2.5);
        subtracted.ivar.fill(0.5);
        let sframe_path = dir.join("out/sframe-r3-00000001-2-0.fits");
        FitsStore
            .write_subtracted_frame(&frame_path, &sframe_path, &subtracted)
            .unwrap();

        let sframe = FitsStore.read_frame(&sframe_path).unwrap();
        assert!(sframe.flux.iter().all(|&v| v == 2.5));
        assert!(sframe.ivar.iter().all(|&v| v == 0.5));
        assert_eq!(sframe.labels(), labels);
        assert_carried_through(&sframe_path, 6, 16);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mismatched_labels_or_shapes_are_rejected() {
        let dir = temp_dir("mismatch");
        let source = dir.join("frame.fits");
        let products = SyntheticExposure {
            nfiber: 4,
            nwave: 8,
            ..SyntheticExposure::default()
        }
        .generate(2)
        .unwrap();
        write_redux_frame(&source, &products.frame);

        let target = dir.join("frame-1-0.fits");
        let short = FiberLabels::new(vec![ObjType::Sky]);
        let err = FitsStore.write_relabelled_frame(&source, &target, &short).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
        assert!(!target.exists());

        let wrong = SyntheticExposure {
            nfiber: 4,
            nwave: 4,
            ..SyntheticExposure::default()
        }
        .generate(2)
        .unwrap();
        let sframe = dir.join("sframe-1-0.fits");
        assert!(FitsStore.write_subtracted_frame(&source, &sframe, &wrong.frame).is_err());
        assert!(!sframe.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
