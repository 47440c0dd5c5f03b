//! libinstall - installs user libraries into a sketchbook-style libraries directory.
//!
//! Libraries come from three sources:
//! - catalogued index releases, downloaded, checksum-verified and cached
//! - local archive files containing a single root folder
//! - git repositories, shallow-cloned without their `.git` metadata
//!
//! Every source ends with the library registered as user-installed in a
//! [`LibraryRegistry`]. Index installs are version aware and replace an
//! older user variant; archive and repository installs always evict a
//! same-named library.
//!
//! # Example
//!
//! ```rust,ignore
//! use libinstall::{CancellationToken, InstallRequest, LibrariesConfig, LibrariesManager};
//!
//! fn main() -> libinstall::Result<()> {
//!     let manager = LibrariesManager::new(LibrariesConfig::with_data_dir("/path/to/data"))?;
//!     let cancel = CancellationToken::new();
//!
//!     let outcome = manager.install(&InstallRequest::archive("MyLib.zip"), &cancel)?;
//!     println!("Installed {}", outcome.library.name);
//!
//!     manager.uninstall(&outcome.library)?;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod installer;
pub mod library;
pub mod lock;
pub mod manager;
pub mod naming;
pub mod registry;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::LibrariesConfig;
pub use error::{LibraryError, Result};
pub use installer::{
    ArchiveExtractor, CachedResourceInstaller, DefaultArchiveExtractor, GitCliCloner,
    HttpDownloader, RepositoryCloner, ResourceInstaller,
};
pub use library::{
    DownloadResource, IndexRelease, InstallOutcome, InstallPlan, InstallRequest, Library,
    LibraryAlternatives, LibraryLocation,
};
pub use lock::{NameGuard, NameLocks};
pub use manager::{LibrariesManager, LibrariesManagerBuilder};
pub use naming::{repository_name, sanitize_name};
pub use registry::LibraryRegistry;

pub use semver::Version;
