//! Installed libraries, install requests and install outcomes.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::naming::sanitize_name;

/// Provenance of an installed library variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryLocation {
    /// Shipped with the host application.
    BuiltIn,
    /// Bundled with a platform.
    PlatformBuiltIn,
    /// Installed into the managed user libraries directory.
    User,
}

impl LibraryLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryLocation::BuiltIn => "builtin",
            LibraryLocation::PlatformBuiltIn => "platform",
            LibraryLocation::User => "user",
        }
    }
}

impl std::fmt::Display for LibraryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A library present on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Sanitized, filesystem-safe name.
    pub name: String,
    /// Directory holding the library's files.
    pub install_dir: Option<PathBuf>,
    pub location: LibraryLocation,
    pub version: Option<Version>,
}

impl Library {
    /// A library living in the user libraries directory.
    pub fn user(name: impl Into<String>, install_dir: impl Into<PathBuf>, version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            install_dir: Some(install_dir.into()),
            location: LibraryLocation::User,
            version,
        }
    }

    pub fn is_user_installed(&self) -> bool {
        self.location == LibraryLocation::User
    }

    fn same_variant(&self, other: &Library) -> bool {
        self.location == other.location
            && self.install_dir == other.install_dir
            && self.version == other.version
    }
}

/// All installed variants sharing one sanitized name.
///
/// At most one member is user-installed; adding a user variant replaces the
/// previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryAlternatives {
    alternatives: Vec<Library>,
}

impl LibraryAlternatives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant, replacing the user variant or an entry for the same directory.
    pub fn add(&mut self, library: Library) {
        self.alternatives.retain(|existing| {
            let same_user_slot = library.is_user_installed() && existing.is_user_installed();
            let same_dir = library.install_dir.is_some() && existing.install_dir == library.install_dir;
            !(same_user_slot || same_dir)
        });
        self.alternatives.push(library);
    }

    /// Remove a variant. Returns `true` if it was present.
    pub fn remove(&mut self, library: &Library) -> bool {
        let before = self.alternatives.len();
        self.alternatives.retain(|existing| !existing.same_variant(library));
        self.alternatives.len() != before
    }

    /// The user-installed variant, if any.
    pub fn user_installed(&self) -> Option<&Library> {
        self.alternatives.iter().find(|lib| lib.is_user_installed())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Library> {
        self.alternatives.iter()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

/// Downloadable archive backing an index release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResource {
    pub url: String,
    /// File name the archive is cached under in the downloads directory.
    pub archive_file_name: String,
    /// `ALGO:hex` checksum, e.g. `SHA-256:9f86d0...`. Empty skips verification.
    pub checksum: String,
    /// Expected size in bytes; zero when unknown.
    pub size: u64,
}

/// A catalogued release resolved from the package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRelease {
    /// Display name as listed in the index.
    pub name: String,
    pub version: Version,
    pub resource: DownloadResource,
}

impl IndexRelease {
    pub fn sanitized_name(&self) -> String {
        sanitize_name(&self.name)
    }
}

/// What to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallRequest {
    /// A release from the package index.
    Index(IndexRelease),
    /// A local archive file whose single root folder is the library.
    Archive { path: PathBuf },
    /// A git repository to shallow-clone.
    Repository { url: String },
}

impl InstallRequest {
    pub fn index(release: IndexRelease) -> Self {
        InstallRequest::Index(release)
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        InstallRequest::Archive { path: path.into() }
    }

    pub fn repository(url: impl Into<String>) -> Self {
        InstallRequest::Repository { url: url.into() }
    }

    /// Short label of the source kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InstallRequest::Index(_) => "index",
            InstallRequest::Archive { .. } => "archive",
            InstallRequest::Repository { .. } => "repository",
        }
    }
}

/// Result of the prerequisite check for an index release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    /// Where the release will be installed.
    pub target_path: PathBuf,
    /// User-installed variant with a different version that will be evicted.
    pub replaced: Option<Library>,
}

impl InstallPlan {
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }
}

/// Result of a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// The library now present in the user libraries directory.
    pub library: Library,
    /// The user variant that was evicted to make room, if any.
    pub replaced: Option<Library>,
}
