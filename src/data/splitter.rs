// ============================================================
// Layer 4 — Shuffle and Train/Validation Split
// ============================================================
// Two separate steps so the caller decides whether samples
// get shuffled at all:
//
//   shuffled(samples, seed)          — seeded Fisher-Yates
//   split_train_val(samples, 0.9)    — first 90% train, rest val
//
// Seeding keeps a restarted run on the same split, so a
// resumed checkpoint is validated on the same examples.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle with a fixed seed; the same seed gives the same order.
pub fn shuffled<T>(mut samples: Vec<T>, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);
    samples
}

/// Split into (train, validation) without reordering.
///
/// `train_fraction` is clamped to `[0, 1]`; e.g. 0.8 = 80% training.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64) -> (Vec<T>, Vec<T>) {
    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let split_at = split_at.min(total);

    // split_off(n) leaves [0..n) in `samples` and returns [n..total)
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len() * 100) / total.max(1),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.8);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
        assert_eq!(val[0], 80);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(shuffled(items, 7), 0.7);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_full_training_split() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_train_val(items, 1.0);
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }

    #[test]
    fn test_same_seed_same_order() {
        let a = shuffled((0..30).collect::<Vec<usize>>(), 42);
        let b = shuffled((0..30).collect::<Vec<usize>>(), 42);
        assert_eq!(a, b);
    }
}
