//! Filesystem helpers shared by the installers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{LibraryError, Result};

/// Recursively copy the contents of `src` into `dst`, creating `dst`.
///
/// File permissions are preserved; symlinks are recreated on Unix.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| LibraryError::fs(e, "Failed to create directory", dst))?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            LibraryError::fs(io::Error::from(e), "Failed to read directory entry", path)
        })?;

        let src_path = entry.path();
        let relative = src_path.strip_prefix(src).map_err(|e| {
            LibraryError::fs(io::Error::other(e), "Entry outside of copy source", src_path)
        })?;
        let dst_path = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dst_path)
                .map_err(|e| LibraryError::fs(e, "Failed to create directory", &dst_path))?;
        } else if file_type.is_symlink() {
            copy_symlink(src_path, &dst_path)?;
        } else {
            fs::copy(src_path, &dst_path)
                .map_err(|e| LibraryError::fs(e, "Failed to copy file", src_path))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| LibraryError::fs(e, "Failed to read symlink", src))?;
    std::os::unix::fs::symlink(&link, dst)
        .map_err(|e| LibraryError::fs(e, "Failed to create symlink", dst))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| LibraryError::fs(e, "Failed to copy file", src))
}

/// Recursively delete `path`. A missing directory is not an error.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LibraryError::fs(e, "Failed to remove directory", path)),
    }
}

/// List the entries directly inside `dir`, sorted by name.
pub fn top_level_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| LibraryError::fs(e, "Failed to read directory", dir))? {
        let entry = entry.map_err(|e| LibraryError::fs(e, "Failed to read directory entry", dir))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Whether two paths refer to the same location.
///
/// Existing paths are compared after canonicalization, others lexically.
pub fn paths_equivalent(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => normalize(a) == normalize(b),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                components.pop();
            }
            std::path::Component::CurDir => {}
            _ => components.push(component),
        }
    }
    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        std::fs::create_dir_all(src.join("examples").join("Sweep")).unwrap();
        std::fs::write(src.join("library.properties"), "name=Servo\n").unwrap();
        std::fs::write(src.join("examples").join("Sweep").join("Sweep.ino"), "void setup() {}").unwrap();

        let dst = temp_dir.path().join("dst");
        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.join("library.properties")).unwrap(),
            "name=Servo\n"
        );
        assert!(dst.join("examples").join("Sweep").join("Sweep.ino").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let script = src.join("build.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dst = temp_dir.path().join("dst");
        copy_dir_recursive(&src, &dst).unwrap();

        let mode = std::fs::metadata(dst.join("build.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        assert!(remove_dir_if_exists(&temp_dir.path().join("missing")).is_ok());
    }

    #[test]
    fn test_top_level_entries_sorted() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("b")).unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "").unwrap();

        let entries = top_level_entries(temp_dir.path()).unwrap();
        assert_eq!(entries, vec![temp_dir.path().join("a.txt"), temp_dir.path().join("b")]);
    }

    #[test]
    fn test_paths_equivalent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Servo");
        std::fs::create_dir(&dir).unwrap();

        assert!(paths_equivalent(&dir, &temp_dir.path().join("x").join("..").join("Servo")));
        assert!(paths_equivalent(Path::new("/missing/a/../b"), Path::new("/missing/b")));
        assert!(!paths_equivalent(&dir, &temp_dir.path().join("Other")));
    }
}
