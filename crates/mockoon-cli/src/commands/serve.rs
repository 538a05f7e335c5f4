use super::{CommandError, EXIT_SUCCESS};
use std::path::{Path, PathBuf};

pub fn run(
    data: &Path,
    base_dir: Option<PathBuf>,
    log_transaction: bool,
) -> Result<u8, CommandError> {
    mockoon_core::serve(data, base_dir, log_transaction)?;
    Ok(EXIT_SUCCESS)
}
