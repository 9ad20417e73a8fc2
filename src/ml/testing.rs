// Test doubles for the model, optimiser, and checkpoint seams.
//
// ScriptedModel answers every forward call (train or inference)
// with one-hot logits peaking at the next scripted spans. When
// the script runs dry it predicts (0, 0) for every example.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Result};

use crate::domain::batch::{QaBatch, Span, TokenMatrix};
use crate::domain::traits::{
    Checkpointable, SpanInference, SpanInput, SpanLogits, SpanModel, SpanOptimizer, TrainOutput,
};
use crate::domain::vocab::VocabularyMapping;

fn one_hot(width: usize, hot: usize) -> Vec<f32> {
    (0..width).map(|i| if i == hot { 1.0 } else { 0.0 }).collect()
}

pub fn one_hot_logits(seq_len: usize, spans: &[Span]) -> SpanLogits {
    SpanLogits {
        start: spans.iter().map(|s| one_hot(seq_len, s.start)).collect(),
        end:   spans.iter().map(|s| one_hot(seq_len, s.end)).collect(),
    }
}

type Script = Rc<RefCell<VecDeque<Vec<Span>>>>;

fn next_logits(script: &Script, input: &SpanInput<'_>) -> SpanLogits {
    let (seq_len, batch_size) = input.input_ids.shape();
    let spans = script
        .borrow_mut()
        .pop_front()
        .unwrap_or_else(|| vec![Span::default(); batch_size]);
    one_hot_logits(seq_len, &spans)
}

pub struct ScriptedModel {
    script:          Script,
    live_views:      Rc<Cell<usize>>,
    pub forward_calls: Cell<usize>,
    /// Optimiser steps applied so far; also what gets checkpointed
    pub steps:       usize,
    pub loss:        f64,
    /// 0-based forward_train call that fails
    pub fail_on_call: Option<usize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            script:        Rc::new(RefCell::new(VecDeque::new())),
            live_views:    Rc::new(Cell::new(0)),
            forward_calls: Cell::new(0),
            steps:         0,
            loss:          1.5,
            fail_on_call:  None,
        }
    }

    /// Queue the spans the next forward call predicts.
    pub fn push_prediction(&self, spans: Vec<Span>) {
        self.script.borrow_mut().push_back(spans);
    }

    /// Inference views currently alive.
    pub fn live_views(&self) -> usize {
        self.live_views.get()
    }
}

pub struct ScriptedView {
    script:     Script,
    live_views: Rc<Cell<usize>>,
}

impl Drop for ScriptedView {
    fn drop(&mut self) {
        self.live_views.set(self.live_views.get() - 1);
    }
}

impl SpanInference for ScriptedView {
    fn forward_infer(&self, input: &SpanInput<'_>) -> Result<SpanLogits> {
        Ok(next_logits(&self.script, input))
    }
}

impl SpanModel for ScriptedModel {
    type Gradients = usize;
    type Inference = ScriptedView;

    fn forward_train(&self, input: &SpanInput<'_>, _gold: &[Span]) -> Result<TrainOutput<usize>> {
        let call = self.forward_calls.get();
        self.forward_calls.set(call + 1);
        if self.fail_on_call == Some(call) {
            bail!("scripted failure on call {call}");
        }
        Ok(TrainOutput {
            loss:      self.loss,
            logits:    next_logits(&self.script, input),
            gradients: 1,
        })
    }

    fn inference(&self) -> ScriptedView {
        self.live_views.set(self.live_views.get() + 1);
        ScriptedView {
            script:     Rc::clone(&self.script),
            live_views: Rc::clone(&self.live_views),
        }
    }
}

impl Checkpointable for ScriptedModel {
    const EXTENSION: &'static str = "steps";

    fn save_weights(&self, base: &Path) -> Result<()> {
        std::fs::write(base.with_extension(Self::EXTENSION), self.steps.to_string())?;
        Ok(())
    }

    fn load_weights(mut self, base: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(base.with_extension(Self::EXTENSION))?;
        self.steps = raw.trim().parse().context("corrupt scripted checkpoint")?;
        Ok(self)
    }
}

/// Adds the gradient "value" to the step counter.
#[derive(Default)]
pub struct CountingOptimizer {
    pub steps: usize,
}

impl SpanOptimizer<ScriptedModel> for CountingOptimizer {
    fn step(&mut self, mut model: ScriptedModel, gradients: usize) -> ScriptedModel {
        self.steps  += 1;
        model.steps += gradients;
        model
    }
}

/// A batch of `batch_size` identical 4-token rows with the given gold spans.
pub fn uniform_batch(batch_size: usize, labels: Vec<Span>) -> QaBatch {
    let rows = vec![vec![0, 1, 2, 3]; batch_size];
    let ids  = TokenMatrix::from_rows(&rows).unwrap();
    let segs = TokenMatrix::from_rows(&vec![vec![0, 0, 1, 1]; batch_size]).unwrap();
    QaBatch::new(ids, segs, labels).unwrap()
}

pub fn tiny_vocab() -> VocabularyMapping {
    VocabularyMapping::new(
        ["[CLS]", "who", "[SEP]", "bob", "[PAD]"].iter().map(|s| s.to_string()).collect(),
    )
}
