//! Application-wide constants.

/// Maximum length of a sanitized original filename.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Prefix of every object key written by the upload pipeline.
pub const STORAGE_KEY_PREFIX: &str = "orgs";

/// Object metadata keys attached to every stored upload.
pub const META_ORG_ID: &str = "org-id";
pub const META_UPLOADED_BY: &str = "uploaded-by";
pub const META_ORIGINAL_NAME: &str = "original-name";
pub const META_FILE_ID: &str = "file-id";

/// Content type used when the caller did not provide one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
