//! Shared key generation for storage backends.
//!
//! Key format: `orgs/{org_id}/{file_name}`, or `orgs/{org_id}/{folder}/{file_name}` when the
//! upload targets a folder.

use stratus_core::constants::STORAGE_KEY_PREFIX;
use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// Normalize a destination folder into `a/b/c` form.
///
/// Leading, trailing and repeated separators are dropped. Returns `None` for an empty
/// folder and an error for `.`/`..` segments or characters outside `[A-Za-z0-9 ._-]`.
pub fn normalize_folder(folder: &str) -> StorageResult<Option<String>> {
    let mut segments = Vec::new();
    for segment in folder.split(['/', '\\']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if segment == "." || segment == ".." {
            return Err(StorageError::InvalidKey(format!(
                "Folder contains a relative segment: {}",
                folder
            )));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        {
            return Err(StorageError::InvalidKey(format!(
                "Folder contains invalid characters: {}",
                folder
            )));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join("/")))
    }
}

/// Generate the storage key for a file of `org_id`.
///
/// All backends must use this format for consistency.
pub fn generate_storage_key(
    org_id: Uuid,
    folder: Option<&str>,
    file_name: &str,
) -> StorageResult<String> {
    if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "Invalid file name for storage key: {}",
            file_name
        )));
    }

    let folder = match folder {
        Some(f) => normalize_folder(f)?,
        None => None,
    };

    Ok(match folder {
        Some(folder) => format!("{}/{}/{}/{}", STORAGE_KEY_PREFIX, org_id, folder, file_name),
        None => format!("{}/{}/{}", STORAGE_KEY_PREFIX, org_id, file_name),
    })
}
