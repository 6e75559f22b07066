use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use walkdir::WalkDir;

/// Extensions readable as plain text. PDF and scans are converted by
/// external tooling before they reach this pipeline.
const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SUPPORTED_EXTENSIONS.contains(&extension) {
            anyhow::bail!("unsupported file format: {:?}", path);
        }
        fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read file: {:?}", path))
    }

    /// Recursively collect supported files under `dir`, sorted for a
    /// deterministic ingestion order.
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.with_context(|| format!("failed to walk directory: {:?}", dir))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if SUPPORTED_EXTENSIONS.contains(&extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
