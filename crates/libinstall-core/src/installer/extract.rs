//! Archive extraction.
//!
//! The format is sniffed from the archive's leading bytes rather than its
//! file name, so renamed or extension-less downloads still unpack.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::error::{LibraryError, Result};

/// Unpacks an archive into a directory.
///
/// Implementations must preserve the directory structure and file
/// permissions, reject entries that would escape `destination`, and return
/// `LibraryError::Cancelled` when `cancel` fires mid-extraction.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path, cancel: &CancellationToken) -> Result<()>;
}

/// Archive formats understood by `DefaultArchiveExtractor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    /// Detect the format from the first bytes of an archive.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(ArchiveFormat::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else if header.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(ArchiveFormat::TarZst)
        } else if header.len() >= 262 && &header[257..262] == b"ustar" {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Extracts zip, tar, tar.gz and tar.zst archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultArchiveExtractor;

impl DefaultArchiveExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for DefaultArchiveExtractor {
    fn extract(&self, archive: &Path, destination: &Path, cancel: &CancellationToken) -> Result<()> {
        let mut file = File::open(archive).map_err(|e| extraction_error(archive, "Failed to open archive", e))?;

        let mut header = [0u8; 512];
        let read = read_header(&mut file, &mut header)
            .map_err(|e| extraction_error(archive, "Failed to read archive header", e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| extraction_error(archive, "Failed to rewind archive", e))?;

        let format = ArchiveFormat::sniff(&header[..read]).ok_or_else(|| {
            LibraryError::ArchiveExtractionFailed {
                archive: archive.to_path_buf(),
                message: "Unsupported archive format".to_string(),
                source: None,
            }
        })?;

        info!("Extracting {:?} archive {} to {}", format, archive.display(), destination.display());

        match format {
            ArchiveFormat::Zip => extract_zip(file, archive, destination, cancel),
            ArchiveFormat::TarGz => {
                let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
                unpack_tar(decoder, archive, destination, cancel)
            }
            ArchiveFormat::TarZst => {
                let decoder = zstd::Decoder::new(file)
                    .map_err(|e| extraction_error(archive, "Failed to create zstd decoder", e))?;
                unpack_tar(decoder, archive, destination, cancel)
            }
            ArchiveFormat::Tar => unpack_tar(BufReader::new(file), archive, destination, cancel),
        }
    }
}

fn read_header(file: &mut File, header: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn extraction_error(archive: &Path, message: &str, err: io::Error) -> LibraryError {
    LibraryError::ArchiveExtractionFailed {
        archive: archive.to_path_buf(),
        message: format!("{}: {}", message, err),
        source: Some(err),
    }
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, destination: &Path, cancel: &CancellationToken) -> Result<()> {
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);

    let entries = tar
        .entries()
        .map_err(|e| extraction_error(archive, "Failed to read tar entries", e))?;

    for entry in entries {
        cancel.check()?;

        let mut entry = entry.map_err(|e| extraction_error(archive, "Failed to read tar entry", e))?;
        let entry_path = entry
            .path()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| PathBuf::from("<invalid path>"));

        let unpacked = entry
            .unpack_in(destination)
            .map_err(|e| extraction_error(archive, &format!("Failed to extract {}", entry_path.display()), e))?;
        if !unpacked {
            return Err(LibraryError::ArchiveExtractionFailed {
                archive: archive.to_path_buf(),
                message: format!("Entry {} escapes the extraction directory", entry_path.display()),
                source: None,
            });
        }
    }

    Ok(())
}

fn extract_zip(file: File, archive_path: &Path, destination: &Path, cancel: &CancellationToken) -> Result<()> {
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
        LibraryError::ArchiveExtractionFailed {
            archive: archive_path.to_path_buf(),
            message: format!("Invalid zip archive: {}", e),
            source: None,
        }
    })?;

    for i in 0..archive.len() {
        cancel.check()?;

        let mut entry = archive.by_index(i).map_err(|e| LibraryError::ArchiveExtractionFailed {
            archive: archive_path.to_path_buf(),
            message: format!("Failed to read zip entry {}: {}", i, e),
            source: None,
        })?;

        let outpath = match entry.enclosed_name() {
            Some(path) => destination.join(path),
            None => {
                return Err(LibraryError::ArchiveExtractionFailed {
                    archive: archive_path.to_path_buf(),
                    message: format!("Entry {} escapes the extraction directory", entry.name()),
                    source: None,
                })
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| extraction_error(archive_path, "Failed to create directory", e))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| extraction_error(archive_path, "Failed to create parent directory", e))?;
            }

            let mut outfile = File::create(&outpath)
                .map_err(|e| extraction_error(archive_path, "Failed to create file", e))?;
            io::copy(&mut entry, &mut outfile)
                .map_err(|e| extraction_error(archive_path, "Failed to extract file", e))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    debug!("Extracted {} zip entries from {}", archive.len(), archive_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
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

    fn tar_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ArchiveFormat::sniff(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::sniff(&[0x1f, 0x8b, 0x08]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::sniff(&[0x28, 0xb5, 0x2f, 0xfd]), Some(ArchiveFormat::TarZst));
        assert_eq!(ArchiveFormat::sniff(b"plain text"), None);

        let tar = tar_bytes(&[("Lib/a.txt", "a")]);
        assert_eq!(ArchiveFormat::sniff(&tar[..512]), Some(ArchiveFormat::Tar));
    }

    #[test]
    fn test_extract_zip() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("lib.zip");
        write_zip(&archive, &[("MyLib/src/MyLib.h", "#pragma once"), ("MyLib/README.md", "hi")]);

        let dest = temp_dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();
        DefaultArchiveExtractor::new()
            .extract(&archive, &dest, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("MyLib/src/MyLib.h")).unwrap(),
            "#pragma once"
        );
        assert!(dest.join("MyLib/README.md").is_file());
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("lib.bin");
        let mut encoder = flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(&tar_bytes(&[("MyLib/MyLib.cpp", "int x;")])).unwrap();
        encoder.finish().unwrap();

        let dest = temp_dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();
        DefaultArchiveExtractor::new()
            .extract(&archive, &dest, &CancellationToken::new())
            .unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("MyLib/MyLib.cpp")).unwrap(), "int x;");
    }

    #[test]
    fn test_extract_tar_zst() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("lib.tar.zst");
        let compressed = zstd::encode_all(&tar_bytes(&[("MyLib/lib.h", "x")])[..], 3).unwrap();
        std::fs::write(&archive, compressed).unwrap();

        let dest = temp_dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();
        DefaultArchiveExtractor::new()
            .extract(&archive, &dest, &CancellationToken::new())
            .unwrap();

        assert!(dest.join("MyLib/lib.h").is_file());
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("notes.txt");
        std::fs::write(&archive, "just some text").unwrap();

        let result = DefaultArchiveExtractor::new().extract(
            &archive,
            temp_dir.path(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(LibraryError::ArchiveExtractionFailed { .. })));
    }

    #[test]
    fn test_missing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let result = DefaultArchiveExtractor::new().extract(
            &temp_dir.path().join("missing.zip"),
            temp_dir.path(),
            &CancellationToken::new(),
        );
        let err = result.unwrap_err();
        assert!(matches!(err, LibraryError::ArchiveExtractionFailed { .. }));
        assert_eq!(err.io_error_kind(), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_cancelled_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("lib.zip");
        write_zip(&archive, &[("MyLib/a.txt", "a")]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let dest = temp_dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();

        let result = DefaultArchiveExtractor::new().extract(&archive, &dest, &cancel);
        assert!(matches!(result, Err(LibraryError::Cancelled)));
        assert!(!dest.join("MyLib").exists());
    }
}
