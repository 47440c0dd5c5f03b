//! Installation of catalogued index releases.
//!
//! Index installs are version aware: the prerequisite check decides between
//! a fresh install, a replace-in-place of the user variant, or a conflict,
//! and only then is the release's resource materialized.

use std::path::Path;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::error::{LibraryError, Result};
use crate::fsutil::paths_equivalent;
use crate::library::{IndexRelease, InstallPlan};
use crate::manager::LibrariesManager;

impl LibrariesManager {
    /// Check that `release` can be installed and work out where it goes.
    ///
    /// Returns the target path and the user-installed variant (with a
    /// different version) that the install will replace. Fails with
    /// `AlreadyInstalled` when the same version is already user-installed,
    /// and with `DirectoryConflict` when an unrelated directory already
    /// occupies the target path.
    ///
    /// This does not take the per-name lock; callers pairing it with
    /// [`install_release`](Self::install_release) must serialize mutations
    /// of the same name themselves, or use [`install`](Self::install).
    pub fn install_prerequisite_check(&self, release: &IndexRelease) -> Result<InstallPlan> {
        let sane_name = release.sanitized_name();

        let mut replaced = None;
        if let Some(installed) = self.registry.lookup(&sane_name) {
            for library in installed.iter().filter(|lib| lib.is_user_installed()) {
                if library.version.as_ref() == Some(&release.version) {
                    return Err(LibraryError::AlreadyInstalled {
                        name: sane_name,
                        version: release.version.to_string(),
                    });
                }
                replaced = Some(library.clone());
            }
        }

        let target_path = self.target_path(&sane_name)?;

        let replaces_self = replaced
            .as_ref()
            .and_then(|lib| lib.install_dir.as_deref())
            .is_some_and(|dir| paths_equivalent(dir, &target_path));
        if !replaces_self && target_path.is_dir() {
            return Err(LibraryError::DirectoryConflict { path: target_path });
        }

        debug!(
            "Prerequisites ok for {}@{}: target {}, replacing {:?}",
            sane_name,
            release.version,
            target_path.display(),
            replaced.as_ref().and_then(|lib| lib.version.as_ref()).map(|v| v.to_string())
        );

        Ok(InstallPlan {
            target_path,
            replaced,
        })
    }

    /// Fetch and unpack `release` into `target_path`.
    ///
    /// Trusts that [`install_prerequisite_check`](Self::install_prerequisite_check)
    /// already resolved any conflict. Failures other than cancellation are
    /// reported as `ResourceInstallFailed`.
    pub fn install_release(
        &self,
        release: &IndexRelease,
        target_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let libs_dir = self.require_user_dir()?;

        info!(
            "Installing {}@{} into {}",
            release.name,
            release.version,
            target_path.display()
        );

        self.resource_installer
            .install(
                &release.resource,
                &self.config.downloads_dir,
                libs_dir,
                target_path,
                cancel,
            )
            .map_err(|e| match e {
                LibraryError::Cancelled | LibraryError::ResourceInstallFailed { .. } => e,
                other => LibraryError::ResourceInstallFailed {
                    name: release.sanitized_name(),
                    message: other.to_string(),
                },
            })
    }
}
