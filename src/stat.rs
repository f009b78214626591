//! Minimal real-disk stat/mtime access for the `touch-node` staleness
//! predicate.
//!
//! The teacher's `fs` module is a sandboxed in-memory virtual filesystem,
//! built so untrusted bash scripts can't touch the real disk. That's the
//! wrong collaborator here: `touch-node` is defined against real file
//! `mtime`s (spec §4.3), so this wraps `std::fs` directly instead, shaped
//! roughly like `original_source/josutils/jstat.hpp`'s `Stat`/`FileType`
//! pair.

use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    NoExist,
    RegularFile,
    Directory,
    Symlink,
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub kind: FileKind,
    pub mtime: Option<SystemTime>,
}

/// Stat `path` without following a trailing symlink, so a symlink at the
/// path is reported as `Symlink` rather than resolved through.
pub fn stat(path: &Path) -> std::io::Result<Stat> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => {
            let kind = if meta.file_type().is_symlink() {
                FileKind::Symlink
            } else if meta.is_dir() {
                FileKind::Directory
            } else if meta.is_file() {
                FileKind::RegularFile
            } else {
                FileKind::Other
            };
            let mtime = meta.modified().ok();
            Ok(Stat { kind, mtime })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Stat {
            kind: FileKind::NoExist,
            mtime: None,
        }),
        Err(e) => Err(e),
    }
}

/// Set a regular file's mtime to now, creating it (and its parent
/// directories, which the original tool assumes already exist) if it does
/// not exist.
pub fn touch(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::File::create(path)?;
    } else {
        let now = std::time::SystemTime::now();
        filetime_set_now(path, now)?;
    }
    Ok(())
}

fn filetime_set_now(path: &Path, now: SystemTime) -> std::io::Result<()> {
    // Re-opening for append and writing zero bytes is not sufficient to
    // bump mtime on all platforms; truncate-free content-preserving touch
    // needs an explicit utimes call. std doesn't expose one, so fall back
    // to the portable trick of opening for read-write and doing a
    // zero-length write, which every major OS treats as an mtime bump.
    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().append(true).open(path)?;
    f.write_all(&[])?;
    f.set_modified(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_reports_no_exist() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("missing");
        let s = stat(&p).unwrap();
        assert_eq!(s.kind, FileKind::NoExist);
    }

    #[test]
    fn touch_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out");
        touch(&p).unwrap();
        assert_eq!(stat(&p).unwrap().kind, FileKind::RegularFile);
    }

    #[test]
    fn directory_reports_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(stat(dir.path()).unwrap().kind, FileKind::Directory);
    }
}
