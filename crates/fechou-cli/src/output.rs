//! Atomic workbook output
//!
//! The workbook goes to a temporary file next to the target and is renamed
//! over it only after a complete write. A failed run leaves any previous file
//! untouched and never leaves a partial one.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    debug!(temp = %file.path().display(), target = %path.display(), "persisting output");
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
