use serde::{Deserialize, Serialize};

use crate::generate_doc_id;

/// One source document headed for extraction. Construction is the single
/// place where blank input is filtered out, so downstream stages never see
/// an empty text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    /// Human-readable origin label, packaged into the extraction prompt.
    pub source: String,
    pub text: String,
}

impl Document {
    /// Returns `None` when the text is blank after trimming.
    pub fn from_text(source: &str, text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            doc_id: generate_doc_id(source),
            source: source.to_string(),
            text: text.to_string(),
        })
    }

    /// Joins pre-split pages (as produced by external PDF tooling) with
    /// newlines into one document.
    pub fn from_pages(source: &str, pages: &[String]) -> Option<Self> {
        Self::from_text(source, &pages.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_yields_no_document() {
        assert!(Document::from_text("memo.txt", "").is_none());
        assert!(Document::from_text("memo.txt", "   \n\t ").is_none());
    }

    #[test]
    fn pages_are_joined_with_newlines() {
        let pages = vec!["page one".to_string(), "page two".to_string()];
        let doc = Document::from_pages("report.pdf", &pages).unwrap();
        assert_eq!(doc.text, "page one\npage two");
        assert_eq!(doc.source, "report.pdf");
    }

    #[test]
    fn blank_pages_yield_no_document() {
        let pages = vec![" ".to_string(), "\n".to_string()];
        assert!(Document::from_pages("report.pdf", &pages).is_none());
    }

    #[test]
    fn doc_id_is_stable_for_the_same_source() {
        let a = Document::from_text("memo.txt", "text").unwrap();
        let b = Document::from_text("memo.txt", "other text").unwrap();
        assert_eq!(a.doc_id, b.doc_id);
        assert_eq!(a.doc_id.len(), 32);
    }
}
