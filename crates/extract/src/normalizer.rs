//! Deterministic entity identity.
//!
//! The graph deduplicates purely on these derived ids, so the same person
//! mentioned in two documents must normalize to the same string while two
//! people sharing a name (different contexts) must not.

use std::sync::OnceLock;

use regex::Regex;

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-z0-9]+").unwrap())
}

/// Lowercase, collapse every run of non-alphanumeric characters into a single
/// underscore, and trim underscores from both ends.
pub fn normalize(part: &str) -> String {
    let lowered = part.to_lowercase();
    non_alphanumeric()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Derived graph id for an entity: normalized name and context joined by an
/// underscore.
pub fn entity_id(name: &str, context: &str) -> String {
    format!("{}_{}", normalize(name), normalize(context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing_does_not_change_identity() {
        assert_eq!(
            entity_id("Budi Santoso", "Direktur"),
            entity_id("budi santoso", "direktur"),
        );
        assert_eq!(entity_id("Budi Santoso", "Direktur"), "budi_santoso_direktur");
    }

    #[test]
    fn context_separates_namesakes() {
        let director = entity_id("Agus", "Direktur PT X");
        let driver = entity_id("Agus", "Sopir");
        assert_eq!(director, "agus_direktur_pt_x");
        assert_eq!(driver, "agus_sopir");
        assert_ne!(director, driver);
    }

    #[test]
    fn punctuation_runs_collapse_to_one_underscore() {
        assert_eq!(normalize("PT. Maju -- Jaya"), "pt_maju_jaya");
        assert_eq!(normalize("budi@example.com"), "budi_example_com");
    }

    #[test]
    fn leading_and_trailing_separators_are_trimmed() {
        assert_eq!(normalize("  Direktur! "), "direktur");
        assert_eq!(normalize("...---..."), "");
    }
}
