//! Index resource download, verification and unpacking.
//!
//! Provides:
//! - A downloads cache keyed by the resource's archive file name
//! - SHA-256 checksum verification of cached and fresh downloads
//! - Atomic file operations (temp file → final, staging dir → target dir)

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::extract::ArchiveExtractor;
use crate::cancel::CancellationToken;
use crate::config::{NetworkConfig, PathsConfig};
use crate::error::{LibraryError, Result};
use crate::fsutil::{remove_dir_if_exists, top_level_entries};
use crate::library::DownloadResource;

/// Fetches an index resource and materializes it at `target_path`.
///
/// Must be safe to retry: a second call after a failure starts over.
pub trait ResourceInstaller: Send + Sync {
    fn install(
        &self,
        resource: &DownloadResource,
        downloads_dir: &Path,
        libraries_dir: &Path,
        target_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Default resource installer backed by a downloads cache.
pub struct CachedResourceInstaller {
    downloader: HttpDownloader,
    extractor: Arc<dyn ArchiveExtractor>,
}

impl CachedResourceInstaller {
    pub fn new(downloader: HttpDownloader, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self { downloader, extractor }
    }

    /// Make sure a verified copy of the resource is in the downloads cache.
    pub fn ensure_downloaded(
        &self,
        resource: &DownloadResource,
        downloads_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let archive_path = downloads_dir.join(&resource.archive_file_name);

        if archive_path.is_file() {
            if verify_resource(resource, &archive_path)? {
                debug!("Using cached archive {}", archive_path.display());
                return Ok(archive_path);
            }
            warn!(
                "Cached archive {} failed verification, downloading again",
                archive_path.display()
            );
            fs::remove_file(&archive_path)
                .map_err(|e| LibraryError::fs(e, "Failed to remove stale archive", &archive_path))?;
        }

        fs::create_dir_all(downloads_dir)
            .map_err(|e| LibraryError::fs(e, "Failed to create downloads directory", downloads_dir))?;
        self.downloader.download(&resource.url, &archive_path, resource.size, cancel)?;

        if !verify_resource(resource, &archive_path)? {
            let _ = fs::remove_file(&archive_path);
            return Err(LibraryError::ResourceInstallFailed {
                name: resource.archive_file_name.clone(),
                message: format!("Checksum mismatch for {}", resource.url),
            });
        }

        Ok(archive_path)
    }
}

impl ResourceInstaller for CachedResourceInstaller {
    fn install(
        &self,
        resource: &DownloadResource,
        downloads_dir: &Path,
        libraries_dir: &Path,
        target_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let archive_path = self.ensure_downloaded(resource, downloads_dir, cancel)?;

        fs::create_dir_all(libraries_dir)
            .map_err(|e| LibraryError::fs(e, "Failed to create libraries directory", libraries_dir))?;

        // Staging inside the libraries dir keeps the final rename on one filesystem.
        let staging = tempfile::Builder::new()
            .prefix(PathsConfig::RESOURCE_TEMP_PREFIX)
            .tempdir_in(libraries_dir)
            .map_err(|e| LibraryError::fs(e, "Failed to create staging directory", libraries_dir))?;

        self.extractor.extract(&archive_path, staging.path(), cancel)?;
        cancel.check()?;

        let entries = top_level_entries(staging.path())?;
        let root = match entries.as_slice() {
            [root] if root.is_dir() => root.clone(),
            _ => {
                return Err(LibraryError::ArchiveStructureInvalid {
                    archive: archive_path,
                    message: format!("expected a single root folder, found {} entries", entries.len()),
                })
            }
        };

        remove_dir_if_exists(target_path)?;
        fs::rename(&root, target_path)
            .map_err(|e| LibraryError::fs(e, "Failed to move library into place", target_path))?;

        info!("Installed {} into {}", resource.archive_file_name, target_path.display());
        Ok(())
    }
}

/// Blocking downloader for `http(s)://` and `file://` resources.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::DOWNLOAD_REQUEST_TIMEOUT)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(format!("libinstall/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LibraryError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Download `url` to `destination` through a `.part` file.
    ///
    /// Returns the number of bytes written. A non-zero `expected_size` must
    /// match the downloaded length.
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        expected_size: u64,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let failed = |message: String| LibraryError::ResourceInstallFailed {
            name: url.to_string(),
            message,
        };

        let parsed = Url::parse(url).map_err(|e| failed(format!("Invalid resource URL: {}", e)))?;
        let mut reader: Box<dyn Read> = match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| failed("Invalid file URL".to_string()))?;
                Box::new(File::open(&path).map_err(|e| LibraryError::fs(e, "Failed to open resource", path))?)
            }
            "http" | "https" => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .map_err(|e| failed(format!("HTTP request failed: {}", e)))?;
                if !response.status().is_success() {
                    return Err(failed(format!("HTTP {}", response.status())));
                }
                Box::new(response)
            }
            other => return Err(failed(format!("Unsupported URL scheme: {}", other))),
        };

        info!("Downloading {} to {}", url, destination.display());

        let mut part_name = destination.as_os_str().to_owned();
        part_name.push(NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
        let part_path = PathBuf::from(part_name);

        let result = copy_with_cancel(&mut reader, &part_path, cancel);
        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&part_path);
                return Err(e);
            }
        };

        if expected_size > 0 && written != expected_size {
            let _ = fs::remove_file(&part_path);
            return Err(failed(format!(
                "Size mismatch: expected {} bytes, got {}",
                expected_size, written
            )));
        }

        fs::rename(&part_path, destination)
            .map_err(|e| LibraryError::fs(e, "Failed to finalize download", destination))?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}

fn copy_with_cancel(reader: &mut dyn Read, part_path: &Path, cancel: &CancellationToken) -> Result<u64> {
    let mut file = File::create(part_path)
        .map_err(|e| LibraryError::fs(e, "Failed to create download file", part_path))?;
    let mut buffer = vec![0u8; NetworkConfig::DOWNLOAD_CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        cancel.check()?;
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LibraryError::fs(e, "Failed to read download stream", part_path)),
        };
        file.write_all(&buffer[..n])
            .map_err(|e| LibraryError::fs(e, "Failed to write download file", part_path))?;
        written += n as u64;
    }

    file.sync_all()
        .map_err(|e| LibraryError::fs(e, "Failed to flush download file", part_path))?;
    Ok(written)
}

/// Check a downloaded archive against the resource's size and checksum.
pub fn verify_resource(resource: &DownloadResource, path: &Path) -> Result<bool> {
    if resource.size > 0 {
        let len = fs::metadata(path)
            .map_err(|e| LibraryError::fs(e, "Failed to stat archive", path))?
            .len();
        if len != resource.size {
            debug!("Size of {} is {}, expected {}", path.display(), len, resource.size);
            return Ok(false);
        }
    }
    verify_checksum(&resource.checksum, path)
}

/// Verify an `ALGO:hex` checksum. An empty checksum always passes.
pub fn verify_checksum(checksum: &str, path: &Path) -> Result<bool> {
    if checksum.is_empty() {
        return Ok(true);
    }

    let (algorithm, expected) = checksum.split_once(':').ok_or_else(|| LibraryError::ResourceInstallFailed {
        name: path.display().to_string(),
        message: format!("Invalid checksum format: {}", checksum),
    })?;

    if !algorithm.eq_ignore_ascii_case("SHA-256") {
        return Err(LibraryError::ResourceInstallFailed {
            name: path.display().to_string(),
            message: format!("Unsupported checksum algorithm: {}", algorithm),
        });
    }

    let actual = compute_file_checksum(path)?;
    Ok(actual.eq_ignore_ascii_case(expected))
}

/// Compute the SHA-256 of a file as lowercase hex.
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| LibraryError::fs(e, "Failed to open file for hashing", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; NetworkConfig::DOWNLOAD_CHUNK_SIZE];

    loop {
        let n = file
            .read(&mut buffer)
            .map_err(|e| LibraryError::fs(e, "Failed to read file for hashing", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
