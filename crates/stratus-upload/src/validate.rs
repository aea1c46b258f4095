//! Per-file validation and identity generation.

use futures::future::join_all;
use stratus_core::models::{FailedUpload, FileDescriptor, FileError, IncomingFile};
use stratus_core::validation::{extension_of, normalize_mime_type, sanitize_filename};
use uuid::Uuid;

fn rejected(original_name: String, message: String) -> FailedUpload {
    tracing::debug!(original_name = %original_name, reason = %message, "File rejected");
    FailedUpload {
        file_id: None,
        file_name: None,
        original_name,
        error: FileError::validation(message),
    }
}

/// Check one file and give it an identity: `file_id`, and `{file_id}.{ext}` as storage
/// name.
pub fn validate_file(file: IncomingFile, max_size: u64) -> Result<FileDescriptor, FailedUpload> {
    let original_name = match sanitize_filename(&file.original_name) {
        Ok(name) => name,
        Err(message) => return Err(rejected(file.original_name, message)),
    };

    let size = file.size();
    if size > max_size {
        return Err(rejected(
            file.original_name,
            format!(
                "File size {} bytes exceeds maximum of {} bytes",
                size, max_size
            ),
        ));
    }

    let file_id = Uuid::new_v4();
    let file_name = match extension_of(&original_name) {
        Some(ext) => format!("{}.{}", file_id, ext),
        None => file_id.to_string(),
    };
    let mime_type = normalize_mime_type(&file.mime_type, &original_name);

    Ok(FileDescriptor {
        file_id,
        file_name,
        original_name,
        size,
        mime_type,
        bytes: file.bytes,
    })
}

/// Validate every file independently. Returns accepted descriptors and rejections, each
/// in input order.
pub async fn validate_files(
    files: Vec<IncomingFile>,
    max_size: u64,
) -> (Vec<FileDescriptor>, Vec<FailedUpload>) {
    let checks = files
        .into_iter()
        .map(|file| async move { validate_file(file, max_size) });

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for outcome in join_all(checks).await {
        match outcome {
            Ok(descriptor) => valid.push(descriptor),
            Err(failure) => invalid.push(failure),
        }
    }
    (valid, invalid)
}
