use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::application::error::AppError;

const STDIN_PATH: &str = "-";

/// Content from a flag or a file; the file wins when both are present.
pub(super) fn read_opt_value(
    value: Option<String>,
    file: Option<PathBuf>,
) -> Result<Option<String>, AppError> {
    match file {
        Some(path) => read_source(&path).map(Some),
        None => Ok(value),
    }
}

/// Read a whole file, or stdin for `-` and for no path at all.
pub(super) fn read_source_or_stdin(path: Option<&Path>) -> Result<String, AppError> {
    match path {
        Some(path) => read_source(path),
        None => read_stdin(),
    }
}

fn read_source(path: &Path) -> Result<String, AppError> {
    if path == Path::new(STDIN_PATH) {
        return read_stdin();
    }
    fs::read_to_string(path).map_err(|source| AppError::Input {
        path: path.display().to_string(),
        source,
    })
}

fn read_stdin() -> Result<String, AppError> {
    let mut data = String::new();
    io::stdin()
        .read_to_string(&mut data)
        .map_err(|source| AppError::Input {
            path: STDIN_PATH.to_string(),
            source,
        })?;
    Ok(data)
}
