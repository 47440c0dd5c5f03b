//! Shared fixtures for the installer integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libinstall::{LibrariesConfig, LibrariesManager};
use tempfile::TempDir;

/// A data directory with a dedicated scratch root so leftovers can be detected.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config: LibrariesConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = LibrariesConfig::with_data_dir(temp_dir.path());
        config.temp_dir = Some(temp_dir.path().join("scratch"));
        Self { temp_dir, config }
    }

    pub fn manager(&self) -> LibrariesManager {
        LibrariesManager::new(self.config.clone()).unwrap()
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.temp_dir.path().join("libraries")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_dir.path().join("scratch")
    }

    /// Number of entries left in the scratch root (0 if it was never created).
    pub fn scratch_entries(&self) -> usize {
        match std::fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }
}

/// Write a zip archive with the given `(path, contents)` entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Sorted relative file paths under `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
