//! `skysub` library crate.
//!
//! The binary (`skysub`) is a thin wrapper around this library so that:
//!
//! - the sweep runs in tests against an in-memory store and a fake sky tool
//! - the FITS layer and the external sky-model command stay behind traits

pub mod app;
pub mod calib;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod select;
