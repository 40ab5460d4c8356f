//! Filtering and grouping over scanned files.
//!
//! These work purely on the given slice and never touch the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::config::normalize_extensions;
use crate::error::{Error, Result};
use crate::models::MediaFile;

/// Files sharing one parent folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderGroup {
    pub folder: PathBuf,
    pub files: Vec<MediaFile>,
}

/// Keep files whose size in megabytes lies within `[min_mb, max_mb]`.
///
/// A missing bound leaves that side open.
pub fn filter_by_size(
    files: &[MediaFile],
    min_mb: Option<f64>,
    max_mb: Option<f64>,
) -> Result<Vec<MediaFile>> {
    if let (Some(min), Some(max)) = (min_mb, max_mb) {
        if min > max {
            return Err(Error::InvalidArgument(format!(
                "min_mb ({}) is greater than max_mb ({})",
                min, max
            )));
        }
    }

    Ok(files
        .iter()
        .filter(|f| {
            let mb = f.size_mb();
            min_mb.map_or(true, |min| mb >= min) && max_mb.map_or(true, |max| mb <= max)
        })
        .cloned()
        .collect())
}

/// Keep files whose extension is in `extensions` (case-insensitive, leading dot ignored)
pub fn filter_by_extension(files: &[MediaFile], extensions: &HashSet<String>) -> Vec<MediaFile> {
    let wanted = normalize_extensions(extensions);
    files
        .iter()
        .filter(|f| wanted.contains(&f.extension.to_lowercase()))
        .cloned()
        .collect()
}

/// Partition files by parent folder.
///
/// Groups appear in order of first occurrence and keep the input order inside each group.
pub fn group_by_folder(files: &[MediaFile]) -> Vec<FolderGroup> {
    let mut groups: Vec<FolderGroup> = Vec::new();
    let mut positions: HashMap<&PathBuf, usize> = HashMap::new();

    for file in files {
        let idx = *positions.entry(&file.parent_folder).or_insert_with(|| {
            groups.push(FolderGroup {
                folder: file.parent_folder.clone(),
                files: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx].files.push(file.clone());
    }

    groups
}
