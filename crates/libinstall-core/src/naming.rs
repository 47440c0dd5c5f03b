//! Library naming helpers.
//!
//! Derives canonical directory names from index display names, archive root
//! folders and repository URLs.

use std::path::Path;
use url::Url;

use crate::error::{LibraryError, Result};

/// Make a library display name safe to use as a directory name.
///
/// Every character outside `[A-Za-z0-9.-]` becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Library name taken from the single root folder of an extracted archive.
///
/// The folder name is used as-is, without sanitizing. Names that are not
/// valid UTF-8 yield `None`, since a lossy conversion would install under a
/// directory name different from the one extracted.
pub fn archive_root_name(root: &Path) -> Option<String> {
    root.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Derive a library name from a git repository URL.
///
/// Accepted forms, tried in order:
/// - `git@github.com:org/Repo.git` -> `Repo`
/// - an existing local path -> its final component
/// - `https://github.com/org/Repo.git` -> `Repo`
pub fn repository_name(repo_url: &str) -> Result<String> {
    let invalid = || LibraryError::InvalidRepositoryUrl {
        url: repo_url.to_string(),
    };

    let name = if let Some(path) = scp_like_path(repo_url) {
        let path = path.trim_end_matches('/');
        let last = path.rsplit('/').next().unwrap_or(path);
        trim_git_suffix(last).to_string()
    } else if Path::new(repo_url).exists() {
        local_path_name(Path::new(repo_url)).ok_or_else(invalid)?
    } else {
        let parsed = Url::parse(repo_url).map_err(|_| invalid())?;
        let last = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .ok_or_else(invalid)?;
        let decoded = urlencoding::decode(last).map_err(|_| invalid())?;
        trim_git_suffix(&decoded).to_string()
    };

    if name.is_empty() {
        return Err(invalid());
    }
    Ok(name)
}

/// Path part of an scp-like `user@host:path` address, which `Url` cannot parse.
fn scp_like_path(repo_url: &str) -> Option<&str> {
    if repo_url.contains("://") {
        return None;
    }
    let (user_host, path) = repo_url.split_once(':')?;
    let (user, host) = user_host.split_once('@')?;
    if user.is_empty() || host.is_empty() || host.contains('/') || path.is_empty() {
        return None;
    }
    Some(path)
}

fn local_path_name(path: &Path) -> Option<String> {
    archive_root_name(path).filter(|name| name != "." && name != "..").or_else(|| {
        path.canonicalize()
            .ok()
            .and_then(|canonical| archive_root_name(&canonical))
    })
}

// Literal, case-sensitive, at most once.
fn trim_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}
