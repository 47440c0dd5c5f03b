//! Installation from a local archive file.

use std::path::Path;
use tracing::{info, trace, warn};

use crate::cancel::CancellationToken;
use crate::config::PathsConfig;
use crate::error::{LibraryError, Result};
use crate::fsutil::{copy_dir_recursive, remove_dir_if_exists, top_level_entries};
use crate::library::{InstallOutcome, Library};
use crate::manager::LibrariesManager;
use crate::naming::archive_root_name;

impl LibrariesManager {
    /// Install the library packed in `archive_path`.
    ///
    /// The archive must contain exactly one top-level folder; its name
    /// becomes the library name. Whatever is installed under that name is
    /// evicted first, regardless of version. A failed copy removes the
    /// partially written target, and the scratch extraction directory is
    /// removed on every exit path, including cancellation.
    pub fn install_from_archive(
        &self,
        archive_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome> {
        let libs_dir = self.require_user_dir()?;

        let temp_root = self.config.temp_root();
        std::fs::create_dir_all(&temp_root)
            .map_err(|e| LibraryError::fs(e, "Failed to create temp root", &temp_root))?;
        let tmp_dir = tempfile::Builder::new()
            .prefix(PathsConfig::ARCHIVE_TEMP_PREFIX)
            .tempdir_in(&temp_root)
            .map_err(|e| LibraryError::fs(e, "Failed to create temp directory", &temp_root))?;

        // Extract first so the archive layout can be checked and the root
        // folder can name the library.
        self.extractor.extract(archive_path, tmp_dir.path(), cancel)?;

        let entries = top_level_entries(tmp_dir.path())?;
        let root = match entries.as_slice() {
            [root] => root,
            [] => {
                return Err(LibraryError::ArchiveStructureInvalid {
                    archive: archive_path.to_path_buf(),
                    message: "archive is empty".to_string(),
                })
            }
            _ => {
                return Err(LibraryError::ArchiveStructureInvalid {
                    archive: archive_path.to_path_buf(),
                    message: "multiple files found in archive top level".to_string(),
                })
            }
        };

        if !root.is_dir() {
            return Err(LibraryError::ArchiveStructureInvalid {
                archive: archive_path.to_path_buf(),
                message: "archive top level is not a folder".to_string(),
            });
        }
        let library_name = archive_root_name(root).ok_or_else(|| LibraryError::ArchiveStructureInvalid {
            archive: archive_path.to_path_buf(),
            message: format!("root folder name {:?} is not valid UTF-8", root.file_name().unwrap_or_default()),
        })?;

        let _guard = self.locks.acquire(&library_name);
        let install_path = libs_dir.join(&library_name);

        // Last point where giving up leaves the previous install intact.
        cancel.check()?;
        let replaced = self.evict_locked(&library_name, &install_path)?;

        trace!(
            "Installing library {} at {} from {}",
            library_name,
            install_path.display(),
            archive_path.display()
        );
        if let Err(e) = copy_dir_recursive(root, &install_path) {
            warn!("Copying library {} into place: {}", library_name, e);
            if let Err(cleanup) = remove_dir_if_exists(&install_path) {
                warn!("Failed to clean up partial copy: {}", cleanup);
            }
            return Err(e);
        }

        let library = Library::user(&library_name, &install_path, None);
        self.registry.add(library.clone());

        info!("Installed {} from archive {}", library_name, archive_path.display());
        Ok(InstallOutcome { library, replaced })
    }
}
