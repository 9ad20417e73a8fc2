// ============================================================
// Layer 3 — Vocabulary Mapping
// ============================================================
// Index-to-token lookup ("itos"). Built once by the batch
// source from the tokenizer's vocabulary and read-only after
// that; the span decoder is its only consumer.

use std::collections::HashMap;

/// Placeholder for ids the vocabulary has no entry for.
pub const UNKNOWN_TOKEN: &str = "[UNK]";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyMapping {
    itos: Vec<String>,
}

impl VocabularyMapping {
    /// Tokens in id order: `tokens[i]` is the string for id `i`.
    pub fn new(tokens: Vec<String>) -> Self {
        Self { itos: tokens }
    }

    /// Invert a token → id map. Holes in the id range read as `[UNK]`.
    pub fn from_token_ids(vocab: &HashMap<String, u32>) -> Self {
        let size = vocab.values().map(|&id| id as usize + 1).max().unwrap_or(0);
        let mut itos = vec![UNKNOWN_TOKEN.to_string(); size];
        for (token, &id) in vocab {
            itos[id as usize] = token.clone();
        }
        Self { itos }
    }

    pub fn token(&self, id: u32) -> &str {
        self.itos.get(id as usize).map_or(UNKNOWN_TOKEN, String::as_str)
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.itos.iter().position(|t| t == token).map(|i| i as u32)
    }

    pub fn len(&self) -> usize { self.itos.len() }

    pub fn is_empty(&self) -> bool { self.itos.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverts_token_map_and_fills_holes() {
        let map: HashMap<String, u32> = [("[PAD]", 0), ("cat", 3)]
            .into_iter()
            .map(|(t, i)| (t.to_string(), i))
            .collect();
        let vocab = VocabularyMapping::from_token_ids(&map);
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.token(3), "cat");
        assert_eq!(vocab.token(1), UNKNOWN_TOKEN);
        assert_eq!(vocab.id_of("cat"), Some(3));
    }

    #[test]
    fn test_out_of_range_id_reads_unknown() {
        let vocab = VocabularyMapping::new(vec!["a".into()]);
        assert_eq!(vocab.token(42), UNKNOWN_TOKEN);
    }
}
