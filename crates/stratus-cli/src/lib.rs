use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use stratus_core::models::IncomingFile;

/// Read every regular file directly inside `dir`, sorted by name. Subdirectories are
/// skipped. The content type is left empty and inferred from the extension later.
pub async fn read_upload_directory(dir: &Path) -> Result<Vec<IncomingFile>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(IncomingFile::new(name, "", bytes));
    }
    Ok(files)
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}
