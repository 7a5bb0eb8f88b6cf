//! Read/write residual statistics JSON files.
//!
//! The schema is defined by `domain::ResidualResults`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::domain::ResidualResults;
use crate::error::AppError;

/// Write results JSON, creating the parent directory if needed.
pub fn write_results_json(path: &Path, results: &ResidualResults) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AppError::io("create directory", parent, e))?;
    }
    let file = File::create(path).map_err(|e| AppError::io("create results JSON", path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, results)
        .map_err(|e| AppError::io("write results JSON", path, e))?;
    writer.flush().map_err(|e| AppError::io("write results JSON", path, e))?;
    Ok(())
}

pub fn read_results_json(path: &Path) -> Result<ResidualResults, AppError> {
    let file = File::open(path).map_err(|e| AppError::io("open results JSON", path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::usage(format!("Invalid results JSON '{}': {e}", path.display())))
}
