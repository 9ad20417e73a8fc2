// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the pretrained WordPiece tokenizer that ships next to
// the encoder weights and derives the id → token table the
// decoder prints from.
//
//   <pretrained_dir>/tokenizer.json   ← preferred (HF tokenizers)
//   <pretrained_dir>/vocab.txt        ← fallback: BERT WordPiece
//                                       vocab, one token per line
//
// The same tokenizer must be used for training and prediction,
// so the store only ever reads; it never builds a vocabulary.

use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use tokenizers::{
    models::wordpiece::WordPiece,
    normalizers::BertNormalizer,
    pre_tokenizers::bert::BertPreTokenizer,
    Tokenizer,
};

use crate::domain::vocab::{VocabularyMapping, UNKNOWN_TOKEN};

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str = "vocab.txt";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let json = self.path();
        let (tokenizer, path) = if json.exists() {
            let tokenizer = Tokenizer::from_file(&json)
                .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", json.display(), e))?;
            (tokenizer, json)
        } else {
            let vocab = self.dir.join(VOCAB_FILE);
            (wordpiece_from_vocab(&vocab)?, vocab)
        };

        if vocabulary(&tokenizer).is_empty() {
            bail!("Tokenizer at '{}' has an empty vocabulary", path.display());
        }
        tracing::info!(
            "Loaded tokenizer from '{}' ({} entries)",
            path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }
}

/// Uncased BERT tokenizer over a plain `vocab.txt`.
fn wordpiece_from_vocab(path: &Path) -> Result<Tokenizer> {
    if !path.exists() {
        bail!(
            "No {TOKENIZER_FILE} or {VOCAB_FILE} in '{}'",
            path.parent().unwrap_or(path).display()
        );
    }
    let file = path
        .to_str()
        .ok_or_else(|| anyhow!("Vocab path '{}' is not valid UTF-8", path.display()))?;
    let model = WordPiece::from_file(file)
        .unk_token(UNKNOWN_TOKEN.to_string())
        .build()
        .map_err(|e| anyhow!("Cannot load WordPiece vocab from '{}': {}", path.display(), e))?;

    let mut tokenizer = Tokenizer::new(model);
    tokenizer
        .with_normalizer(BertNormalizer::default())
        .with_pre_tokenizer(BertPreTokenizer);
    Ok(tokenizer)
}

/// Id → token table including added (special) tokens.
pub fn vocabulary(tokenizer: &Tokenizer) -> VocabularyMapping {
    VocabularyMapping::from_token_ids(&tokenizer.get_vocab(true))
}

/// Small lowercase word-level tokenizer for tests.
/// Ids: [PAD]=0, [UNK]=1, [CLS]=2, [SEP]=3, then `words` from 4.
#[cfg(test)]
pub fn word_level(words: &[&str]) -> Tokenizer {
    use std::str::FromStr;

    let mut vocab = serde_json::json!({ "[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3 });
    for (i, w) in words.iter().enumerate() {
        vocab[*w] = serde_json::json!(i + 4);
    }
    let special = |id: u32, content: &str| serde_json::json!({
        "id": id, "content": content, "single_word": false, "lstrip": false,
        "rstrip": false, "normalized": false, "special": true
    });
    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(0, "[PAD]"), special(1, "[UNK]"), special(2, "[CLS]"), special(3, "[SEP]")],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });
    Tokenizer::from_str(&json.to_string()).expect("test tokenizer JSON")
}
