//! The libraries manager: single entry point for installs and uninstalls.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, trace, warn};

use crate::cancel::CancellationToken;
use crate::config::LibrariesConfig;
use crate::error::{LibraryError, Result};
use crate::fsutil::{paths_equivalent, remove_dir_if_exists};
use crate::installer::{
    ArchiveExtractor, CachedResourceInstaller, DefaultArchiveExtractor, GitCliCloner,
    HttpDownloader, RepositoryCloner, ResourceInstaller,
};
use crate::library::{InstallOutcome, InstallRequest, Library};
use crate::lock::NameLocks;
use crate::registry::LibraryRegistry;

/// Installs, replaces and removes libraries in the user libraries directory.
///
/// # Example
///
/// ```rust,ignore
/// use libinstall::{CancellationToken, InstallRequest, LibrariesConfig, LibrariesManager};
///
/// let manager = LibrariesManager::new(LibrariesConfig::platform_default()?)?;
/// let outcome = manager.install(
///     &InstallRequest::repository("https://github.com/org/MyLib.git"),
///     &CancellationToken::new(),
/// )?;
/// println!("Installed {} at {:?}", outcome.library.name, outcome.library.install_dir);
/// ```
pub struct LibrariesManager {
    pub(crate) config: LibrariesConfig,
    pub(crate) registry: Arc<LibraryRegistry>,
    pub(crate) locks: NameLocks,
    pub(crate) resource_installer: Arc<dyn ResourceInstaller>,
    pub(crate) extractor: Arc<dyn ArchiveExtractor>,
    pub(crate) cloner: Arc<dyn RepositoryCloner>,
}

impl LibrariesManager {
    /// Create a manager with the default download, extraction and clone strategies.
    pub fn new(config: LibrariesConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Create a builder for more control over initialization.
    pub fn builder(config: LibrariesConfig) -> LibrariesManagerBuilder {
        LibrariesManagerBuilder::new(config)
    }

    pub fn config(&self) -> &LibrariesConfig {
        &self.config
    }

    /// Registry of installed libraries this manager reads and updates.
    pub fn registry(&self) -> &Arc<LibraryRegistry> {
        &self.registry
    }

    pub fn user_libraries_dir(&self) -> Option<&Path> {
        self.config.user_libraries_dir.as_deref()
    }

    pub(crate) fn require_user_dir(&self) -> Result<&Path> {
        self.user_libraries_dir()
            .ok_or(LibraryError::MissingUserDirectory)
    }

    /// Directory a library with the given sanitized name is installed into.
    pub fn target_path(&self, sanitized_name: &str) -> Result<PathBuf> {
        Ok(self.require_user_dir()?.join(sanitized_name))
    }

    /// Install a library from any source.
    ///
    /// Index releases go through the prerequisite check; a user variant with
    /// another version is uninstalled before the new one is unpacked.
    /// Archive and repository sources evict any same-named install
    /// unconditionally. The resulting library is registered as
    /// user-installed.
    pub fn install(&self, request: &InstallRequest, cancel: &CancellationToken) -> Result<InstallOutcome> {
        info!("Install requested from {} source", request.kind());

        match request {
            InstallRequest::Index(release) => {
                let sane_name = release.sanitized_name();
                let _guard = self.locks.acquire(&sane_name);

                let plan = self.install_prerequisite_check(release)?;
                if let Some(replaced) = &plan.replaced {
                    info!(
                        "Replacing {} {:?} with {}",
                        replaced.name, replaced.version, release.version
                    );
                    self.uninstall_locked(replaced)?;
                }

                self.install_release(release, &plan.target_path, cancel)?;

                let library = Library::user(sane_name, plan.target_path, Some(release.version.clone()));
                self.registry.add(library.clone());

                Ok(InstallOutcome {
                    library,
                    replaced: plan.replaced,
                })
            }
            InstallRequest::Archive { path } => self.install_from_archive(path, cancel),
            InstallRequest::Repository { url } => self.install_from_repository(url, cancel),
        }
    }

    /// Remove an installed library's directory and its registry entry.
    ///
    /// If the directory cannot be fully removed the registry is left
    /// untouched so the uninstall can be retried.
    pub fn uninstall(&self, library: &Library) -> Result<()> {
        let _guard = self.locks.acquire(&library.name);
        self.uninstall_locked(library)
    }

    fn uninstall_locked(&self, library: &Library) -> Result<()> {
        let install_dir = library
            .install_dir
            .as_deref()
            .ok_or_else(|| LibraryError::InstallDirectoryUnset {
                name: library.name.clone(),
            })?;

        remove_dir_if_exists(install_dir).map_err(|e| {
            warn!("Removing lib directory {}: {}", install_dir.display(), e);
            e
        })?;

        self.registry.remove(library);
        info!("Uninstalled {} from {}", library.name, install_dir.display());
        Ok(())
    }

    /// Clear `install_path` for an archive or repository install of `name`.
    ///
    /// Any registered library of that name allows the directory to be
    /// deleted, whatever its version; the variants living at `install_path`
    /// are dropped from the registry along with it. An unregistered directory
    /// is a `DirectoryConflict`. Returns the user variant being replaced.
    /// Callers must hold the name lock.
    pub(crate) fn evict_locked(&self, name: &str, install_path: &Path) -> Result<Option<Library>> {
        let Some(installed) = self.registry.lookup(name) else {
            if install_path.exists() {
                return Err(LibraryError::DirectoryConflict {
                    path: install_path.to_path_buf(),
                });
            }
            return Ok(None);
        };

        let replaced = installed.user_installed().cloned();
        let evicted: Vec<Library> = installed
            .iter()
            .filter(|lib| {
                lib.install_dir
                    .as_deref()
                    .is_some_and(|dir| paths_equivalent(dir, install_path))
            })
            .cloned()
            .collect();

        trace!("Deleting library {} at {}", name, install_path.display());
        remove_dir_if_exists(install_path)?;

        for library in &evicted {
            self.registry.remove(library);
        }
        Ok(replaced)
    }
}

/// Builder for configuring a `LibrariesManager`.
///
/// # Example
///
/// ```rust,ignore
/// let manager = LibrariesManager::builder(LibrariesConfig::with_data_dir("./data"))
///     .auto_create_dirs(true)
///     .with_repository_cloner(Arc::new(GitCliCloner::with_program("/usr/bin/git")))
///     .build()?;
/// ```
pub struct LibrariesManagerBuilder {
    config: LibrariesConfig,
    auto_create_dirs: bool,
    registry: Option<Arc<LibraryRegistry>>,
    resource_installer: Option<Arc<dyn ResourceInstaller>>,
    extractor: Option<Arc<dyn ArchiveExtractor>>,
    cloner: Option<Arc<dyn RepositoryCloner>>,
}

impl LibrariesManagerBuilder {
    pub fn new(config: LibrariesConfig) -> Self {
        Self {
            config,
            auto_create_dirs: false,
            registry: None,
            resource_installer: None,
            extractor: None,
            cloner: None,
        }
    }

    /// Create the user libraries and downloads directories on build.
    ///
    /// Default: `false` (directories are created lazily by installs)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Share an existing registry instead of starting from an empty one.
    pub fn with_registry(mut self, registry: Arc<LibraryRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_resource_installer(mut self, installer: Arc<dyn ResourceInstaller>) -> Self {
        self.resource_installer = Some(installer);
        self
    }

    pub fn with_archive_extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_repository_cloner(mut self, cloner: Arc<dyn RepositoryCloner>) -> Self {
        self.cloner = Some(cloner);
        self
    }

    pub fn build(self) -> Result<LibrariesManager> {
        if self.auto_create_dirs {
            let dirs = self
                .config
                .user_libraries_dir
                .iter()
                .chain(std::iter::once(&self.config.downloads_dir));
            for dir in dirs {
                std::fs::create_dir_all(dir)
                    .map_err(|e| LibraryError::fs(e, "Failed to create directory", dir))?;
            }
        }

        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(DefaultArchiveExtractor::new()));

        let resource_installer = match self.resource_installer {
            Some(installer) => installer,
            None => Arc::new(CachedResourceInstaller::new(
                HttpDownloader::new()?,
                Arc::clone(&extractor),
            )),
        };

        Ok(LibrariesManager {
            config: self.config,
            registry: self.registry.unwrap_or_default(),
            locks: NameLocks::new(),
            resource_installer,
            extractor,
            cloner: self.cloner.unwrap_or_else(|| Arc::new(GitCliCloner::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryLocation;
    use tempfile::TempDir;

    #[test]
    fn test_target_path_is_pure() {
        let temp_dir = TempDir::new().unwrap();
        let manager = LibrariesManager::new(LibrariesConfig::with_data_dir(temp_dir.path())).unwrap();

        let first = manager.target_path("Servo").unwrap();
        let second = manager.target_path("Servo").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, temp_dir.path().join("libraries").join("Servo"));
    }

    #[test]
    fn test_auto_create_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let config = LibrariesConfig::with_data_dir(temp_dir.path());
        let manager = LibrariesManager::builder(config.clone())
            .auto_create_dirs(true)
            .build()
            .unwrap();

        assert!(manager.user_libraries_dir().unwrap().is_dir());
        assert!(config.downloads_dir.is_dir());
    }

    #[test]
    fn test_uninstall_without_install_dir() {
        let temp_dir = TempDir::new().unwrap();
        let manager = LibrariesManager::new(LibrariesConfig::with_data_dir(temp_dir.path())).unwrap();
        let library = Library {
            install_dir: None,
            ..Library::user("Servo", "/unused", None)
        };
        manager.registry().add(library.clone());

        let result = manager.uninstall(&library);
        assert!(matches!(result, Err(LibraryError::InstallDirectoryUnset { .. })));
        assert!(manager.registry().contains("Servo"));
    }

    #[test]
    fn test_uninstall_removes_dir_and_entry() {
        let temp_dir = TempDir::new().unwrap();
        let manager = LibrariesManager::new(LibrariesConfig::with_data_dir(temp_dir.path())).unwrap();
        let dir = temp_dir.path().join("libraries").join("Servo");
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(dir.join("src").join("Servo.h"), "").unwrap();
        let library = Library::user("Servo", &dir, None);
        manager.registry().add(library.clone());

        manager.uninstall(&library).unwrap();

        assert!(!dir.exists());
        assert!(!manager.registry().contains("Servo"));
    }

    #[test]
    fn test_uninstall_missing_dir_drops_entry() {
        let temp_dir = TempDir::new().unwrap();
        let manager = LibrariesManager::new(LibrariesConfig::with_data_dir(temp_dir.path())).unwrap();
        let library = Library::user("Servo", temp_dir.path().join("libraries").join("Servo"), None);
        manager.registry().add(library.clone());

        manager.uninstall(&library).unwrap();
        assert!(!manager.registry().contains("Servo"));
    }

    #[test]
    fn test_evict_drops_entries_at_install_path() {
        let temp_dir = TempDir::new().unwrap();
        let manager = LibrariesManager::new(LibrariesConfig::with_data_dir(temp_dir.path())).unwrap();
        let dir = temp_dir.path().join("libraries").join("Servo");
        std::fs::create_dir_all(&dir).unwrap();
        let user = Library::user("Servo", &dir, None);
        let builtin = Library {
            location: LibraryLocation::BuiltIn,
            ..Library::user("Servo", temp_dir.path().join("ide").join("Servo"), None)
        };
        manager.registry().add(user.clone());
        manager.registry().add(builtin.clone());

        let replaced = manager.evict_locked("Servo", &dir).unwrap();

        assert_eq!(replaced, Some(user));
        assert!(!dir.exists());
        let remaining: Vec<Library> = manager
            .registry()
            .lookup("Servo")
            .unwrap()
            .iter()
            .cloned()
            .collect();
        assert_eq!(remaining, vec![builtin]);
    }

    #[test]
    fn test_evict_unregistered_directory_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let manager = LibrariesManager::new(LibrariesConfig::with_data_dir(temp_dir.path())).unwrap();
        let dir = temp_dir.path().join("libraries").join("Servo");
        std::fs::create_dir_all(&dir).unwrap();

        let result = manager.evict_locked("Servo", &dir);
        assert!(matches!(result, Err(LibraryError::DirectoryConflict { .. })));
        assert!(dir.exists());
    }
}
