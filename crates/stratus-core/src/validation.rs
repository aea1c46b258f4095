//! File name and content type helpers used before files are handed to workers.

use crate::constants::{DEFAULT_CONTENT_TYPE, MAX_FILENAME_LENGTH};

/// Sanitize a caller-supplied file name.
///
/// Directory components are stripped, characters outside `[A-Za-z0-9._-]` become `_` and
/// the result is capped at 255 characters. Returns an error for empty names and names
/// that resolve to `.` or `..`.
pub fn sanitize_filename(filename: &str) -> Result<String, String> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err("File name is empty".to_string());
    }

    let name_only = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);

    if name_only.is_empty() || name_only == "." || name_only == ".." {
        return Err(format!("Invalid file name: {}", filename));
    }

    let sanitized: String = name_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    Ok(sanitized)
}

/// Lowercase extension of a file name, without the dot. Hidden files such as `.env` have
/// no extension.
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    let ext = ext.to_lowercase();
    if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

/// Best-effort content type for an extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Normalize a declared MIME type: drop parameters, lowercase, and fall back to the
/// extension (then `application/octet-stream`) when missing or malformed.
pub fn normalize_mime_type(declared: &str, filename: &str) -> String {
    let base = declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if !base.is_empty() && base.contains('/') {
        return base;
    }

    extension_of(filename)
        .map(|ext| content_type_for_extension(&ext).to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
