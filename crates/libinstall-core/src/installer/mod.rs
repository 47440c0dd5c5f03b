//! Source installers.
//!
//! One module per install source:
//! - `index` - catalogued releases, version aware, via the prerequisite check
//! - `archive` - local archive files with a single root folder
//! - `repository` - shallow git clones
//!
//! The byte-level work (download, extraction, clone) sits behind the
//! `ResourceInstaller`, `ArchiveExtractor` and `RepositoryCloner` traits so a
//! manager can be built with alternative strategies.

pub mod archive;
pub mod extract;
pub mod index;
pub mod repository;
pub mod resource;

pub use extract::{ArchiveExtractor, ArchiveFormat, DefaultArchiveExtractor};
pub use repository::{GitCliCloner, RepositoryCloner};
pub use resource::{
    compute_file_checksum, verify_checksum, CachedResourceInstaller, HttpDownloader,
    ResourceInstaller,
};
