// ============================================================
// Layer 4 — Tokenise and Align
// ============================================================
// Turns one SquadExample into one QaSample:
//
//   1. Tokenise question and context separately (no special
//      tokens), keeping char offsets for every token.
//   2. Map the answer's char range onto context token indices.
//   3. Assemble [CLS] question [SEP] context [SEP] with segment
//      ids 0 / 1, truncating question first to MAX_QUESTION_LEN
//      and then the context to fit max_seq_len.
//   4. Shift the context-relative span by the question prefix.
//
// A training sample whose answer falls outside the kept
// context is dropped. An unlabelled or truncated test sample
// is kept with no span.
//
// Offsets are char offsets (encode_char_offsets), matching
// SQuAD's answer_start, which counts characters, not bytes.

use anyhow::{anyhow, bail, Result};
use tokenizers::Tokenizer;

use crate::data::dataset::QaSample;
use crate::data::squad::SquadExample;
use crate::domain::batch::Span;
use crate::domain::vocab::VocabularyMapping;

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const PAD_TOKEN: &str = "[PAD]";

/// Longest question kept, in tokens.
pub const MAX_QUESTION_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

impl SpecialTokens {
    pub fn resolve(vocab: &VocabularyMapping) -> Result<Self> {
        let lookup = |name: &str| {
            vocab
                .id_of(name)
                .ok_or_else(|| anyhow!("Tokenizer vocabulary has no '{name}' token"))
        };
        Ok(Self { cls: lookup(CLS_TOKEN)?, sep: lookup(SEP_TOKEN)?, pad: lookup(PAD_TOKEN)? })
    }
}

/// Token index range covering the char range `[char_start, char_end)`.
///
/// Start is the first token ending after `char_start`, end is the last
/// token starting before `char_end`. `None` if no token overlaps.
pub fn align_answer(offsets: &[(usize, usize)], char_start: usize, char_end: usize) -> Option<Span> {
    if char_end <= char_start {
        return None;
    }
    let start = offsets.iter().position(|&(_, e)| e > char_start)?;
    let end   = offsets.iter().rposition(|&(s, _)| s < char_end)?;
    (start <= end).then(|| Span::new(start, end))
}

/// Assemble one model input from already-tokenised parts.
///
/// `answer` is relative to `context_ids`. Returns the ids, segment ids
/// and the absolute span, or `None` for the span when it was truncated.
pub fn assemble(
    question_ids: &[u32],
    context_ids:  &[u32],
    answer:       Option<Span>,
    special:      SpecialTokens,
    max_seq_len:  usize,
) -> (Vec<u32>, Vec<u32>, Option<Span>) {
    let budget  = max_seq_len.saturating_sub(3);
    let q_len   = question_ids.len().min(MAX_QUESTION_LEN).min(budget);
    let c_len   = context_ids.len().min(budget - q_len);
    let c_start = q_len + 2;

    let mut ids = Vec::with_capacity(q_len + c_len + 3);
    ids.push(special.cls);
    ids.extend_from_slice(&question_ids[..q_len]);
    ids.push(special.sep);
    ids.extend_from_slice(&context_ids[..c_len]);
    ids.push(special.sep);

    let mut segments = vec![0u32; c_start];
    segments.resize(ids.len(), 1);

    let span = answer
        .filter(|a| a.start <= a.end && a.end < c_len)
        .map(|a| Span::new(a.start + c_start, a.end + c_start));

    (ids, segments, span)
}

pub struct Preprocessor<'a> {
    tokenizer:   &'a Tokenizer,
    special:     SpecialTokens,
    max_seq_len: usize,
}

impl<'a> Preprocessor<'a> {
    pub fn new(tokenizer: &'a Tokenizer, special: SpecialTokens, max_seq_len: usize) -> Self {
        Self { tokenizer, special, max_seq_len }
    }

    fn encode(&self, text: &str) -> Result<(Vec<u32>, Vec<(usize, usize)>)> {
        let encoding = self
            .tokenizer
            .encode_char_offsets(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok((encoding.get_ids().to_vec(), encoding.get_offsets().to_vec()))
    }

    /// `Ok(None)` when `require_answer` is set and the example has no
    /// usable answer inside the kept context.
    pub fn prepare(&self, example: &SquadExample, require_answer: bool) -> Result<Option<QaSample>> {
        if self.max_seq_len < 4 {
            bail!("max_seq_len {} leaves no room for context tokens", self.max_seq_len);
        }
        let (question_ids, _)         = self.encode(&example.question)?;
        let (context_ids, offsets)    = self.encode(&example.context)?;

        let relative = example
            .answer
            .as_ref()
            .and_then(|a| align_answer(&offsets, a.answer_start, a.answer_end()));

        let (input_ids, segment_ids, span) =
            assemble(&question_ids, &context_ids, relative, self.special, self.max_seq_len);

        if require_answer && span.is_none() {
            return Ok(None);
        }
        Ok(Some(QaSample { id: example.id.clone(), input_ids, segment_ids, span }))
    }

    pub fn prepare_all(&self, examples: &[SquadExample], require_answer: bool) -> Result<Vec<QaSample>> {
        let mut samples = Vec::with_capacity(examples.len());
        for example in examples {
            if let Some(sample) = self.prepare(example, require_answer)? {
                samples.push(sample);
            }
        }
        let dropped = examples.len() - samples.len();
        if dropped > 0 {
            tracing::warn!(
                "Dropped {dropped} of {} examples whose answer is missing or truncated",
                examples.len()
            );
        }
        Ok(samples)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::squad::SquadAnswer;
    use crate::infra::tokenizer_store::{vocabulary, word_level};

    const SPECIAL: SpecialTokens = SpecialTokens { cls: 2, sep: 3, pad: 0 };

    #[test]
    fn test_align_answer_word_boundaries() {
        // "the cat sat on the mat"
        let offsets = [(0, 3), (4, 7), (8, 11), (12, 14), (15, 18), (19, 22)];
        assert_eq!(align_answer(&offsets, 12, 22), Some(Span::new(3, 5)));
        assert_eq!(align_answer(&offsets, 4, 7),   Some(Span::new(1, 1)));
    }

    #[test]
    fn test_align_answer_partial_token_is_included() {
        let offsets = [(0, 3), (4, 11)];
        assert_eq!(align_answer(&offsets, 6, 8), Some(Span::new(1, 1)));
    }

    #[test]
    fn test_align_answer_outside_text() {
        let offsets = [(0, 3), (4, 7)];
        assert_eq!(align_answer(&offsets, 20, 25), None);
        assert_eq!(align_answer(&offsets, 5, 5),   None);
    }

    #[test]
    fn test_assemble_layout_and_shifted_span() {
        let (ids, segs, span) = assemble(&[10, 11], &[20, 21, 22], Some(Span::new(1, 2)), SPECIAL, 32);
        assert_eq!(ids,  vec![2, 10, 11, 3, 20, 21, 22, 3]);
        assert_eq!(segs, vec![0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(span, Some(Span::new(5, 6)));
    }

    #[test]
    fn test_assemble_truncates_context_and_drops_cut_answer() {
        let (ids, _, span) = assemble(&[10], &[20, 21, 22, 23], Some(Span::new(3, 3)), SPECIAL, 6);
        assert_eq!(ids, vec![2, 10, 3, 20, 21, 3]);
        assert_eq!(span, None);
    }

    #[test]
    fn test_prepare_tokenises_real_example() {
        let tokenizer = word_level(&["the", "cat", "sat", "on", "mat", "where", "did", "sit", "?", "."]);
        let special   = SpecialTokens::resolve(&vocabulary(&tokenizer)).unwrap();
        assert_eq!(special, SPECIAL);

        let example = SquadExample {
            id:       "q1".into(),
            question: "Where did the cat sit?".into(),
            context:  "The cat sat on the mat.".into(),
            answer:   Some(SquadAnswer { text: "on the mat".into(), answer_start: 12 }),
        };
        let sample = Preprocessor::new(&tokenizer, special, 64)
            .prepare(&example, true)
            .unwrap()
            .unwrap();

        // [CLS] where did the cat sit ? [SEP] the cat sat on the mat . [SEP]
        assert_eq!(sample.input_ids.len(), 16);
        assert_eq!(sample.span, Some(Span::new(11, 13)));
        assert_eq!(sample.answer_ids(), &[7, 4, 8]);
    }

    #[test]
    fn test_prepare_drops_unanswerable_only_when_required() {
        let tokenizer = word_level(&["who", "bob"]);
        let pre = Preprocessor::new(&tokenizer, SPECIAL, 16);
        let example = SquadExample {
            id: "q2".into(), question: "who".into(), context: "bob".into(), answer: None,
        };
        assert!(pre.prepare(&example, true).unwrap().is_none());
        assert_eq!(pre.prepare_all(&[example], false).unwrap().len(), 1);
    }
}
