//! Write-then-rename file replacement.
//!
//! Readers of the shared exchange directory never see a partially written
//! file: content goes to a hidden sibling first and is moved over the target
//! with a single `rename`, which replaces the destination atomically on the
//! same filesystem.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use vlabot_types::VlaError;

/// Hidden temp path next to `target`.  The leading dot keeps it out of
/// directory scans that match on a file-name prefix.
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Replace `target` with `bytes`.
///
/// # Errors
///
/// Returns [`VlaError::Io`] if the temp file cannot be written or renamed.
/// The temp file is removed on failure.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), VlaError> {
    let tmp = temp_path(target);
    let result = (|| {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, target)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(VlaError::io(target, e));
    }
    Ok(())
}
