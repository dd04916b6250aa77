//! CLI commands

use std::path::Path;

use crate::{Error, Result};

pub mod compile;
pub mod crd;

/// Read a file to a string, naming the file on failure
pub(crate) fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::read(path, e))
}
