//! Atomic file writes shared by the DOCX and Markdown exporters.
//!
//! Content is written to a temp file in the target directory, synced, then
//! renamed over the target. The target either holds the complete file or is
//! left untouched.
//!
//! `tempfile` creates owner-only files by default. An existing target keeps
//! its permissions; a new one gets `0o666` minus the process umask, the same
//! as a plain `std::fs::write`.

use crate::error::NotesError;
use std::fs::{File, Permissions};
use std::io;
use std::path::Path;

/// Write `path` atomically. `write` fills the temp file and returns a short
/// failure detail on error.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<(), NotesError>
where
    F: FnOnce(&mut File) -> Result<(), String>,
{
    let fail = |reason: String| NotesError::PersistFailed {
        path: path.to_path_buf(),
        reason,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".notes-");
    if let Some(perms) = target_permissions(path) {
        builder.permissions(perms);
    }
    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| fail(format!("temp file: {e}")))?;

    write(tmp.as_file_mut()).map_err(&fail)?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| fail(format!("sync: {e}")))?;
    tmp.persist(path)
        .map_err(|e| fail(format!("rename: {}", e.error)))?;
    Ok(())
}

fn target_permissions(path: &Path) -> Option<Permissions> {
    match std::fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => default_permissions(),
        Err(_) => None,
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn writes_content_and_replaces_target() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.md");
        std::fs::write(&out, "old").unwrap();
        write_atomic(&out, |f| f.write_all(b"new").map_err(|e| e.to_string())).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "new");
    }

    #[test]
    fn failed_write_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.md");
        std::fs::write(&out, "keep").unwrap();
        let err = write_atomic(&out, |_| Err("boom".into())).unwrap_err();
        assert!(matches!(err, NotesError::PersistFailed { ref reason, .. } if reason == "boom"));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "keep");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn new_file_gets_same_mode_as_plain_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "x").unwrap();
        let atomic = dir.path().join("atomic.txt");
        write_atomic(&atomic, |f| f.write_all(b"x").map_err(|e| e.to_string())).unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&atomic), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn existing_target_keeps_its_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("shared.md");
        std::fs::write(&out, "old").unwrap();
        std::fs::set_permissions(&out, Permissions::from_mode(0o640)).unwrap();

        write_atomic(&out, |f| f.write_all(b"new").map_err(|e| e.to_string())).unwrap();
        assert_eq!(std::fs::metadata(&out).unwrap().permissions().mode() & 0o777, 0o640);
    }
}
