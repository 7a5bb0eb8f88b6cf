//! In-process `FrameStore` keyed by path.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::{FiberLabels, Fiberflat, Frame, Header, SkyModel, check_shape};
use crate::error::AppError;
use crate::io::store::FrameStore;

#[derive(Debug, Clone)]
enum Product {
    Frame(Frame),
    Fiberflat(Fiberflat),
    Sky(SkyModel),
}

impl Product {
    fn kind(&self) -> &'static str {
        match self {
            Product::Frame(_) => "frame",
            Product::Fiberflat(_) => "fiberflat",
            Product::Sky(_) => "sky",
        }
    }

    fn header(&self) -> &Header {
        match self {
            Product::Frame(f) => &f.header,
            Product::Fiberflat(f) => &f.header,
            Product::Sky(s) => &s.header,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    products: RefCell<BTreeMap<PathBuf, Product>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_frame(&self, path: impl Into<PathBuf>, frame: Frame) {
        self.products.borrow_mut().insert(path.into(), Product::Frame(frame));
    }

    pub fn insert_fiberflat(&self, path: impl Into<PathBuf>, fiberflat: Fiberflat) {
        self.products.borrow_mut().insert(path.into(), Product::Fiberflat(fiberflat));
    }

    pub fn insert_sky(&self, path: impl Into<PathBuf>, sky: SkyModel) {
        self.products.borrow_mut().insert(path.into(), Product::Sky(sky));
    }

    pub fn len(&self) -> usize {
        self.products.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.borrow().is_empty()
    }

    fn get(&self, path: &Path) -> Result<Product, AppError> {
        self.products
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::io("open", path, "no such product"))
    }
}

fn wrong_kind(path: &Path, expected: &str, found: &Product) -> AppError {
    AppError::io("read", path, format!("expected a {expected} product, found {}", found.kind()))
}

impl FrameStore for MemoryStore {
    fn read_header(&self, path: &Path) -> Result<Header, AppError> {
        Ok(self.get(path)?.header().clone())
    }

    fn read_frame(&self, path: &Path) -> Result<Frame, AppError> {
        match self.get(path)? {
            Product::Frame(f) => Ok(f),
            other => Err(wrong_kind(path, "frame", &other)),
        }
    }

    fn write_relabelled_frame(&self, source: &Path, path: &Path, labels: &FiberLabels) -> Result<(), AppError> {
        let frame = self.read_frame(source)?.with_labels(labels)?;
        self.insert_frame(path, frame);
        Ok(())
    }

    fn write_subtracted_frame(&self, source: &Path, path: &Path, frame: &Frame) -> Result<(), AppError> {
        let mut out = self.read_frame(source)?;
        check_shape("subtracted flux", &frame.flux, out.nfiber(), out.nwave())?;
        check_shape("subtracted ivar", &frame.ivar, out.nfiber(), out.nwave())?;
        out.flux = frame.flux.clone();
        out.ivar = frame.ivar.clone();
        self.insert_frame(path, out);
        Ok(())
    }

    fn read_fiberflat(&self, path: &Path) -> Result<Fiberflat, AppError> {
        match self.get(path)? {
            Product::Fiberflat(f) => Ok(f),
            other => Err(wrong_kind(path, "fiberflat", &other)),
        }
    }

    fn read_sky(&self, path: &Path) -> Result<SkyModel, AppError> {
        match self.get(path)? {
            Product::Sky(s) => Ok(s),
            other => Err(wrong_kind(path, "sky", &other)),
        }
    }

    fn write_sky(&self, path: &Path, sky: &SkyModel) -> Result<(), AppError> {
        self.insert_sky(path, sky.clone());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.products.borrow().contains_key(path)
    }
}
