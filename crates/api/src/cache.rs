use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Question -> answer cache keyed by a hash of the question text. Only
/// answered questions are cached; could-not-answer outcomes stay uncached so
/// a later ingest can change the result.
pub struct AnswerCache {
    answers: DashMap<String, String>,
    max_entries: usize,
}

impl AnswerCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            answers: DashMap::new(),
            max_entries,
        }
    }

    pub fn get(&self, question: &str) -> Option<String> {
        let key = hash_text(question);
        self.answers.get(&key).map(|r| r.value().clone())
    }

    pub fn set(&self, question: &str, answer: String) {
        if self.answers.len() >= self.max_entries {
            // Simple eviction: clear 25% when full, at least one entry so
            // tiny capacities still turn over.
            let to_remove: Vec<_> = self
                .answers
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.answers.remove(&key);
            }
        }
        self.answers.insert(hash_text(question), answer);
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn clear(&self) {
        self.answers.clear();
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_answers_come_back_verbatim() {
        let cache = AnswerCache::new(16);
        assert_eq!(cache.get("who is John Doe?"), None);

        cache.set("who is John Doe?", "A former secretary.".to_string());
        assert_eq!(
            cache.get("who is John Doe?").as_deref(),
            Some("A former secretary.")
        );
        // Different question, different key.
        assert_eq!(cache.get("who is Jane Doe?"), None);
    }

    #[test]
    fn eviction_keeps_the_cache_bounded() {
        let cache = AnswerCache::new(8);
        for i in 0..64 {
            cache.set(&format!("question {i}"), format!("answer {i}"));
        }
        assert!(cache.len() <= 8);
    }

    #[test]
    fn capacities_below_four_still_evict() {
        let cache = AnswerCache::new(2);
        for i in 0..16 {
            cache.set(&format!("question {i}"), format!("answer {i}"));
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = AnswerCache::new(8);
        cache.set("q", "a".to_string());
        cache.clear();
        assert!(cache.is_empty());
    }
}
