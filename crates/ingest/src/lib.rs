//! Document intake: plain-text file reading, blank filtering, and stable
//! document ids.

pub mod document;
pub mod reader;

pub use document::Document;
pub use reader::FileReader;

use std::path::Path;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Stable document id derived from the source label.
pub fn generate_doc_id(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Read one file into a [`Document`]. `Ok(None)` means the file was blank
/// and there is nothing to extract.
pub async fn ingest_file(path: &Path) -> Result<Option<Document>> {
    let content = FileReader::read_file(path).await?;
    let source = path.to_string_lossy().to_string();
    match Document::from_text(&source, &content) {
        Some(doc) => Ok(Some(doc)),
        None => {
            debug!(%source, "skipping blank file");
            Ok(None)
        }
    }
}

/// Read every supported file under a directory, skipping blanks.
pub async fn ingest_directory(dir: &Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in FileReader::discover(dir)? {
        if let Some(doc) = ingest_file(&path).await? {
            documents.push(doc);
        }
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ids_are_hex_and_deterministic() {
        let id = generate_doc_id("evidence/memo.txt");
        assert_eq!(id, generate_doc_id("evidence/memo.txt"));
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_doc_id("evidence/other.txt"));
    }

    #[tokio::test]
    async fn directory_ingestion_skips_blank_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("full.txt"), "real content").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   \n").unwrap();

        let documents = ingest_directory(dir.path()).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].source.ends_with("full.txt"));
    }
}
