// ============================================================
// Layer 5 — Span Decoder
// ============================================================
// Turns token ids plus (start, end) pairs back into readable
// question / context / answer text for qualitative samples in
// the training log.
//
// Steps per example:
//   1. ids → token strings via the vocabulary
//   2. join with spaces and drop " ##" so wordpieces re-merge
//   3. split on "[SEP]": part 0 = question, part 1 = context
//      (the spaces around each "[SEP]" stay in the parts)
//   4. tokens [start, end + 1) → answer text (clamped, never panics)
//
// Out-of-range or inverted spans give empty/truncated text.
// Nothing here touches training state.

use crate::domain::batch::{PredictionPair, Span, TokenMatrix};
use crate::domain::vocab::VocabularyMapping;

/// Examples shown per qualitative sample.
pub const NUM_SHOW: usize = 5;

const CONTINUATION: &str = " ##";
const SEPARATOR:    &str = "[SEP]";

/// One rendered example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSample {
    /// Position of this example within the rendered batch
    pub index:            usize,
    pub context:          String,
    pub question:         String,
    pub predicted_answer: String,
    pub gold_answer:      String,
    pub gold_span:        Span,
}

/// Join tokens with spaces and collapse wordpiece continuations.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let joined: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
    joined.join(" ").replace(CONTINUATION, "")
}

/// Text of tokens `[start, end + 1)`, clamped to the row.
pub fn span_text<S: AsRef<str>>(tokens: &[S], span: Span) -> String {
    let lo = span.start.min(tokens.len());
    let hi = span.end.saturating_add(1).min(tokens.len());
    if lo >= hi {
        return String::new();
    }
    join_tokens(&tokens[lo..hi])
}

/// Decode up to `num_samples` examples of a batch.
///
/// Stops early if the batch, the predictions, or the gold spans run out.
pub fn decode(
    input_ids:   &TokenMatrix,
    vocab:       &VocabularyMapping,
    num_samples: usize,
    predicted:   &PredictionPair,
    gold:        &[Span],
) -> Vec<DecodedSample> {
    let mut samples = Vec::new();

    for (index, row) in input_ids.rows().into_iter().enumerate().take(num_samples) {
        let (Some(pred_span), Some(&gold_span)) = (predicted.span(index), gold.get(index)) else {
            break;
        };

        let tokens: Vec<&str> = row.iter().map(|&id| vocab.token(id)).collect();

        let full_text = join_tokens(&tokens);
        let mut parts = full_text.split(SEPARATOR);
        let question  = parts.next().unwrap_or_default().to_string();
        let context   = parts.next().unwrap_or_default().to_string();

        samples.push(DecodedSample {
            index,
            context,
            question,
            predicted_answer: span_text(&tokens, pred_span),
            gold_answer:      span_text(&tokens, gold_span),
            gold_span,
        });
    }

    samples
}

/// Log decoded samples, one block per example.
pub fn emit(samples: &[DecodedSample], num_samples: usize) {
    for s in samples {
        tracing::info!("[{}/{}] ### context: {}", s.index + 1, num_samples, s.context);
        tracing::info!(" ### Question: {}", s.question);
        tracing::info!(" ### Predicted answer: {}", s.predicted_answer);
        tracing::info!(" ### True answer: {}", s.gold_answer);
        tracing::info!(" ### True answer idx: ({}, {})", s.gold_span.start, s.gold_span.end);
    }
}

/// Decode and log in one go.
pub fn render(
    input_ids:   &TokenMatrix,
    vocab:       &VocabularyMapping,
    num_samples: usize,
    predicted:   &PredictionPair,
    gold:        &[Span],
) {
    emit(&decode(input_ids, vocab, num_samples, predicted, gold), num_samples);
}

// ─── Unit Tests ──────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    // [CLS]=0 what=1 sat=2 ?=3 [SEP]=4 the=5 cat=6 sat=2 un=7 ##happy=8 [PAD]=9
    fn vocab() -> VocabularyMapping {
        VocabularyMapping::new(
            ["[CLS]", "what", "sat", "?", "[SEP]", "the", "cat", "un", "##happy", "[PAD]"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn batch_ids() -> TokenMatrix {
        TokenMatrix::from_rows(&[
            vec![0, 1, 2, 3, 4, 5, 6, 2, 4, 9],
            vec![0, 1, 3, 4, 7, 8, 4, 9, 9, 9],
        ])
        .unwrap()
    }

    #[test]
    fn test_span_text_inclusive_end() {
        assert_eq!(span_text(&["the", "cat", "sat"], Span::new(1, 2)), "cat sat");
    }

    #[test]
    fn test_wordpieces_collapse() {
        assert_eq!(join_tokens(&["un", "##happy"]), "unhappy");
    }

    #[test]
    fn test_inverted_and_out_of_range_spans_degrade() {
        let tokens = ["the", "cat", "sat"];
        assert_eq!(span_text(&tokens, Span::new(2, 1)), "");
        assert_eq!(span_text(&tokens, Span::new(5, 9)), "");
        assert_eq!(span_text(&tokens, Span::new(1, 99)), "cat sat");
        assert_eq!(span_text(&tokens, Span::new(0, usize::MAX)), "the cat sat");
    }

    #[test]
    fn test_decode_splits_question_and_context() {
        let predicted = PredictionPair::from_spans(&[Span::new(6, 7), Span::new(4, 5)]);
        let gold      = [Span::new(5, 7), Span::new(4, 5)];
        let samples   = decode(&batch_ids(), &vocab(), NUM_SHOW, &predicted, &gold);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].question, "[CLS] what sat ? ");
        assert_eq!(samples[0].context, " the cat sat ");
        assert_eq!(samples[0].predicted_answer, "cat sat");
        assert_eq!(samples[0].gold_answer, "the cat sat");
        assert_eq!(samples[1].context, " unhappy ");
        assert_eq!(samples[1].predicted_answer, "unhappy");
        assert_eq!(samples[1].gold_span, Span::new(4, 5));
    }

    #[test]
    fn test_decode_respects_num_samples() {
        let predicted = PredictionPair::from_spans(&[Span::new(0, 0); 2]);
        let gold      = [Span::new(0, 0); 2];
        assert_eq!(decode(&batch_ids(), &vocab(), 1, &predicted, &gold).len(), 1);
    }

    #[test]
    fn test_decode_without_separator_has_empty_context() {
        let ids       = TokenMatrix::from_rows(&[vec![5, 6]]).unwrap();
        let predicted = PredictionPair::from_spans(&[Span::new(0, 1)]);
        let samples   = decode(&ids, &vocab(), NUM_SHOW, &predicted, &[Span::new(0, 1)]);
        assert_eq!(samples[0].question, "the cat");
        assert_eq!(samples[0].context, "");
    }

    #[test]
    fn test_rerender_is_identical() {
        let predicted = PredictionPair::from_spans(&[Span::new(3, 1), Span::new(4, 5)]);
        let gold      = [Span::new(5, 7), Span::new(4, 5)];
        let first     = decode(&batch_ids(), &vocab(), NUM_SHOW, &predicted, &gold);
        let second    = decode(&batch_ids(), &vocab(), NUM_SHOW, &predicted, &gold);
        assert_eq!(first, second);
    }
}
