//! Installation from a git repository.
//!
//! The repository is shallow-cloned straight into the user libraries
//! directory and its `.git` folder is dropped afterwards, so the installed
//! library is a plain directory rather than a working copy.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, error, info, trace, warn};

use crate::cancel::CancellationToken;
use crate::config::{InstallationConfig, PathsConfig};
use crate::error::{LibraryError, Result};
use crate::fsutil::remove_dir_if_exists;
use crate::library::{InstallOutcome, Library};
use crate::manager::LibrariesManager;
use crate::naming::repository_name;

/// Clones a repository into a destination directory.
///
/// Authentication is whatever the implementation supports for the URL's
/// scheme. On failure the destination may be left partially written; the
/// installer cleans it up.
pub trait RepositoryCloner: Send + Sync {
    fn clone_shallow(
        &self,
        url: &str,
        destination: &Path,
        depth: u32,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Clones by running the `git` command line tool.
///
/// Credentials come from the user's git configuration (credential helpers,
/// ssh agent). Interactive prompts are disabled so a clone never blocks.
#[derive(Debug, Clone)]
pub struct GitCliCloner {
    program: PathBuf,
}

impl Default for GitCliCloner {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCliCloner {
    pub fn new() -> Self {
        Self::with_program(InstallationConfig::GIT_PROGRAM)
    }

    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RepositoryCloner for GitCliCloner {
    fn clone_shallow(
        &self,
        url: &str,
        destination: &Path,
        depth: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let clone_failed = |message: String| LibraryError::RepositoryCloneFailed {
            url: url.to_string(),
            message,
        };

        let mut child = Command::new(&self.program)
            .args(["clone", "--depth", &depth.to_string(), "--quiet", "--", url])
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| clone_failed(format!("Failed to execute git clone: {}", e)))?;

        // Drain stderr on its own thread so a chatty git cannot fill the pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                warn!("Cancelling clone of {}", url);
                let _ = child.kill();
                let _ = child.wait();
                return Err(LibraryError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(InstallationConfig::CLONE_POLL_INTERVAL),
                Err(e) => return Err(clone_failed(format!("Failed to wait for git clone: {}", e))),
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            error!("Failed to clone {}: {}", url, stderr.trim());
            return Err(clone_failed(format!("git clone exited with {}: {}", status, stderr.trim())));
        }

        debug!("Cloned {} into {}", url, destination.display());
        Ok(())
    }
}

impl LibrariesManager {
    /// Install a library by shallow-cloning the git repository at `repo_url`.
    ///
    /// The library name comes from the URL. Whatever is installed under
    /// that name is evicted first, regardless of version. A failed clone
    /// leaves no directory behind.
    pub fn install_from_repository(
        &self,
        repo_url: &str,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome> {
        let library_name = repository_name(repo_url).map_err(|e| {
            warn!("Parsing git url {}: {}", repo_url, e);
            e
        })?;

        let libs_dir = self.require_user_dir()?;

        let _guard = self.locks.acquire(&library_name);
        let install_path = libs_dir.join(&library_name);

        cancel.check()?;
        let replaced = self.evict_locked(&library_name, &install_path)?;

        std::fs::create_dir_all(libs_dir)
            .map_err(|e| LibraryError::fs(e, "Failed to create libraries directory", libs_dir))?;

        trace!(
            "Installing library {} at {} from {}",
            library_name,
            install_path.display(),
            repo_url
        );

        if let Err(e) = self.cloner.clone_shallow(
            repo_url,
            &install_path,
            InstallationConfig::CLONE_DEPTH,
            cancel,
        ) {
            warn!("Cloning git repository {}: {}", repo_url, e);
            if let Err(cleanup) = remove_dir_if_exists(&install_path) {
                warn!("Failed to clean up partial clone: {}", cleanup);
            }
            return Err(e);
        }

        // The installed library must not itself be a git working copy.
        remove_dir_if_exists(&install_path.join(PathsConfig::GIT_METADATA_DIR_NAME))?;

        let library = Library::user(&library_name, &install_path, None);
        self.registry.add(library.clone());

        info!("Installed {} from {}", library_name, repo_url);
        Ok(InstallOutcome { library, replaced })
    }
}
