//! Turns resolved local inputs into an ordered batch of files staged for
//! upload, each with its raw bytes and a repository-relative destination
//! path. Destination paths always use forward slashes, regardless of the
//! host platform.
//!
//! Reading is sequential and fail-fast: the first unreadable file aborts the
//! whole batch, so a half-read set of files can never reach the remote side.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::collect::{self, CollectError, InputKind};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("Failed to read file {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate destination path: {0}")]
    DuplicateDestination(String),

    #[error("Destination path contains a hidden or reserved segment: {0}")]
    ReservedDestination(String),

    #[error("Input has no usable file name: {}", .0.display())]
    UnnamedInput(PathBuf),
}

/// A file staged for upload: where it came from, where it lands, its bytes.
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub absolute_path: PathBuf,
    pub dest_path: String,
    pub bytes: Vec<u8>,
}

/// Load every input into a flat batch of [`CollectedFile`]s.
///
/// Destination paths:
/// - a single file input defaults to its basename; an explicit `dest`
///   replaces it verbatim;
/// - a directory input maps each contained file to its path relative to the
///   directory, prefixed with the directory basename; an explicit `dest`
///   replaces that prefix;
/// - multiple file inputs each map to their basename, under `dest` as a
///   common prefix when given.
///
/// Every destination path is validated against the traversal exclusion
/// policy, and duplicate destinations are rejected rather than silently
/// overwritten.
pub fn load_batch(raw_inputs: &[PathBuf], dest: Option<&str>) -> Result<Vec<CollectedFile>, LoadError> {
    let inputs = raw_inputs
        .iter()
        .map(|p| collect::resolve_input(p))
        .collect::<Result<Vec<_>, _>>()?;

    let single_file = matches!(inputs.as_slice(), [one] if one.kind == InputKind::File);

    let mut batch = Vec::new();
    for input in &inputs {
        match input.kind {
            InputKind::File => {
                let name = basename(&input.path)?;
                let dest_path = if single_file {
                    dest.map(str::to_owned).unwrap_or(name)
                } else {
                    prefixed(dest, &name)
                };
                batch.push(read_one(&input.path, dest_path)?);
            }
            InputKind::Directory => {
                let base = match dest {
                    Some(d) => d.to_owned(),
                    None => basename(&input.path)?,
                };
                for file in collect::collect_dir(&input.path)? {
                    let rel = relative_dest(&file, &input.path);
                    let dest_path = prefixed(Some(&base), &rel);
                    batch.push(read_one(&file, dest_path)?);
                }
            }
        }
    }

    validate_destinations(&batch)?;
    info!(files = batch.len(), "loaded local file batch");
    Ok(batch)
}

/// Label used in generated branch names: the file name of a single input,
/// or a count for heterogeneous batches.
pub fn source_label(raw_inputs: &[PathBuf]) -> String {
    match raw_inputs {
        [single] => single
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "files".to_owned()),
        many => format!("{}-files", many.len()),
    }
}

fn read_one(path: &Path, dest_path: String) -> Result<CollectedFile, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), dest = %dest_path, size = bytes.len(), "read file");
    Ok(CollectedFile {
        absolute_path: path.to_path_buf(),
        dest_path,
        bytes,
    })
}

fn basename(path: &Path) -> Result<String, LoadError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LoadError::UnnamedInput(path.to_path_buf()))
}

fn prefixed(prefix: Option<&str>, rest: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}/{}", p.trim_end_matches('/'), rest),
        _ => rest.to_owned(),
    }
}

/// Relative path from `root` to `file`, joined with forward slashes.
fn relative_dest(file: &Path, root: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn validate_destinations(batch: &[CollectedFile]) -> Result<(), LoadError> {
    let mut seen = HashSet::new();
    for file in batch {
        for segment in file.dest_path.split('/') {
            if segment.is_empty() || collect::is_excluded_name(segment) {
                return Err(LoadError::ReservedDestination(file.dest_path.clone()));
            }
        }
        if !seen.insert(file.dest_path.as_str()) {
            return Err(LoadError::DuplicateDestination(file.dest_path.clone()));
        }
    }
    Ok(())
}
