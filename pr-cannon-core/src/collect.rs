//! Local file discovery: resolves user-supplied paths and walks directories.
//!
//! Directory traversal is depth-first and visits entries in lexical
//! file-name order, so repeated runs over the same tree produce the same
//! file ordering (and therefore the same commit contents). Symbolic links
//! are never followed. Any entry whose name is in the exclusion set or
//! starts with `.` is pruned together with its subtree.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Entry names skipped during traversal, at any depth.
pub const EXCLUDED_SEGMENTS: &[&str] = &[".git", "node_modules", "target", ".DS_Store"];

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("No files to send in {} after filtering", .0.display())]
    Empty(PathBuf),

    #[error("Cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What kind of local input a resolved path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    File,
    Directory,
}

/// A user-supplied path, resolved to absolute form and checked for existence.
#[derive(Debug, Clone)]
pub struct LocalInput {
    pub path: PathBuf,
    pub kind: InputKind,
}

/// Whether an entry name is filtered out of every traversal and destination.
pub fn is_excluded_name(name: &str) -> bool {
    name.starts_with('.') || EXCLUDED_SEGMENTS.contains(&name)
}

/// Resolve a raw user path to an absolute [`LocalInput`], classifying it as a
/// file or directory and mapping access failures onto [`CollectError`].
pub fn resolve_input(raw: &Path) -> Result<LocalInput, CollectError> {
    let path = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|source| CollectError::Io {
            path: raw.to_path_buf(),
            source,
        })?;
        cwd.join(raw)
    };

    let metadata = std::fs::metadata(&path).map_err(|e| access_error(&path, e))?;
    let kind = if metadata.is_dir() {
        InputKind::Directory
    } else {
        InputKind::File
    };
    debug!(path = %path.display(), ?kind, "resolved local input");
    Ok(LocalInput { path, kind })
}

/// Walk a directory and return the ordered list of contained file paths,
/// with the exclusion policy applied.
pub fn collect_dir(root: &Path) -> Result<Vec<PathBuf>, CollectError> {
    let metadata = std::fs::metadata(root).map_err(|e| access_error(root, e))?;
    if !metadata.is_dir() {
        return Err(CollectError::NotADirectory(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_excluded_name(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_file() {
            debug!(path = %entry.path().display(), "collected file");
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(CollectError::Empty(root.to_path_buf()));
    }
    Ok(files)
}

fn access_error(path: &Path, source: io::Error) -> CollectError {
    match source.kind() {
        io::ErrorKind::NotFound => CollectError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => CollectError::PermissionDenied(path.to_path_buf()),
        _ => CollectError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

fn walk_error(root: &Path, source: walkdir::Error) -> CollectError {
    let path = source
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    match source.io_error().map(io::Error::kind) {
        Some(io::ErrorKind::PermissionDenied) => CollectError::PermissionDenied(path),
        Some(io::ErrorKind::NotFound) => CollectError::NotFound(path),
        _ => CollectError::Io {
            path,
            source: source
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed")),
        },
    }
}
