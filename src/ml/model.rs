// ============================================================
// Layer 5 — Span Encoder (Burn)
// ============================================================
// BERT-shaped encoder with a start/end head:
//
//   ids, segments, positions
//       │  token + segment + position embeddings, LayerNorm, dropout
//       ▼
//   N × EncoderBlock (post-norm: x = LN(x + attn(x)), x = LN(x + ffn(x)))
//       │  padding positions masked out of attention
//       ▼
//   Linear(hidden → 2) → start_logits, end_logits  [batch, seq]
//
// Host batches are sequence-major; they are transposed into
// [batch, seq] tensors here and nowhere else.

use anyhow::{anyhow, bail, Result};
use burn::{
    module::AutodiffModule,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, TensorData},
};
use std::path::Path;

use crate::domain::batch::{Span, TokenMatrix};
use crate::domain::traits::{
    Checkpointable, SpanInference, SpanInput, SpanLogits, SpanModel, SpanOptimizer, TrainOutput,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct QaModelConfig {
    pub vocab_size:              usize,
    pub type_vocab_size:         usize,
    pub max_position_embeddings: usize,
    pub hidden_size:             usize,
    pub num_heads:               usize,
    pub num_layers:              usize,
    pub intermediate_size:       usize,
    pub dropout:                 f64,
}

impl QaModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QaModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let segment_embedding  = EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        QaModel {
            token_embedding,
            segment_embedding,
            position_embedding,
            embedding_norm: LayerNormConfig::new(self.hidden_size).init(device),
            layers,
            qa_head: LinearConfig::new(self.hidden_size, 2).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            max_position_embeddings: self.max_position_embeddings,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.hidden_size, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.hidden_size, self.intermediate_size).init(device);
        let ffn_linear2 = LinearConfig::new(self.intermediate_size, self.hidden_size).init(device);
        let norm1   = LayerNormConfig::new(self.hidden_size).init(device);
        let norm2   = LayerNormConfig::new(self.hidden_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad`: [batch, seq], true = padding
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(mask_pad))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct QaModel<B: Backend> {
    pub token_embedding:         Embedding<B>,
    pub segment_embedding:       Embedding<B>,
    pub position_embedding:      Embedding<B>,
    pub embedding_norm:          LayerNorm<B>,
    pub layers:                  Vec<EncoderBlock<B>>,
    pub qa_head:                 Linear<B>,
    pub dropout:                 Dropout,
    pub max_position_embeddings: usize,
}

/// Start and end logits, both [batch, seq].
pub struct QaModelOutput<B: Backend> {
    pub start_logits: Tensor<B, 2>,
    pub end_logits:   Tensor<B, 2>,
}

/// Sequence-major host matrix → [batch, seq] int tensor.
fn int_tensor<B: Backend>(matrix: &TokenMatrix, device: &B::Device) -> Tensor<B, 2, Int> {
    let (seq_len, batch_size) = matrix.shape();
    let flat: Vec<i64> = matrix.rows().concat().into_iter().map(i64::from).collect();
    Tensor::from_data(TensorData::new(flat, [batch_size, seq_len]), device)
}

fn gold_tensor<B: Backend>(gold: &[Span], pick: fn(&Span) -> usize, device: &B::Device) -> Tensor<B, 1, Int> {
    let positions: Vec<i64> = gold.iter().map(|s| pick(s) as i64).collect();
    Tensor::from_data(TensorData::new(positions, [gold.len()]), device)
}

/// [batch, seq] float tensor → one host row per example.
fn host_rows<B: Backend>(logits: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, seq_len] = logits.dims();
    let flat: Vec<f32> = logits.into_data().iter::<f32>().collect();
    flat.chunks(seq_len.max(1)).map(<[f32]>::to_vec).collect()
}

impl<B: Backend> QaModel<B> {
    pub fn device(&self) -> B::Device {
        self.qa_head.weight.val().device()
    }

    pub fn forward(&self, input: &SpanInput<'_>) -> Result<QaModelOutput<B>> {
        let (seq_len, batch_size) = input.input_ids.shape();
        if seq_len > self.max_position_embeddings {
            bail!(
                "Sequence length {seq_len} exceeds max_position_embeddings {}",
                self.max_position_embeddings
            );
        }
        let device = self.device();

        let tok_emb = self.token_embedding.forward(int_tensor(input.input_ids, &device));
        let seg_emb = self.segment_embedding.forward(int_tensor(input.token_type_ids, &device));

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = match input.position_ids {
            Some(ids) => int_tensor(ids, &device),
            None => Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
                .unsqueeze::<2>()
                .expand([batch_size, seq_len]),
        };
        let pos_emb = self.position_embedding.forward(positions);

        let mask = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(input.attention_mask.as_slice().to_vec(), input.attention_mask.dims()),
            &device,
        );

        let mut x = self.dropout.forward(self.embedding_norm.forward(tok_emb + seg_emb + pos_emb));
        for layer in &self.layers {
            x = layer.forward(x, mask.clone());
        }

        // Project to 2 logits per token then split into start / end.
        let logits = self.qa_head.forward(x); // [batch, seq_len, 2]
        let start_logits = logits.clone()
            .slice([0..batch_size, 0..seq_len, 0..1])
            .reshape([batch_size, seq_len]);
        let end_logits = logits
            .slice([0..batch_size, 0..seq_len, 1..2])
            .reshape([batch_size, seq_len]);

        Ok(QaModelOutput { start_logits, end_logits })
    }
}

impl<B: Backend> SpanInference for QaModel<B> {
    fn forward_infer(&self, input: &SpanInput<'_>) -> Result<SpanLogits> {
        let output = self.forward(input)?;
        Ok(SpanLogits {
            start: host_rows(output.start_logits),
            end:   host_rows(output.end_logits),
        })
    }
}

impl<B: AutodiffBackend> SpanModel for QaModel<B> {
    type Gradients = GradientsParams;
    type Inference = QaModel<B::InnerBackend>;

    fn forward_train(&self, input: &SpanInput<'_>, gold: &[Span]) -> Result<TrainOutput<GradientsParams>> {
        let output = self.forward(input)?;
        let device = self.device();
        let ce     = CrossEntropyLossConfig::new().init(&device);

        // Loss = (CE_start + CE_end) / 2
        let loss = (ce.forward(output.start_logits.clone(), gold_tensor(gold, |s| s.start, &device))
                  + ce.forward(output.end_logits.clone(),   gold_tensor(gold, |s| s.end,   &device))) / 2.0_f64;

        let loss_value = loss.clone().into_scalar().elem::<f64>();
        let gradients  = GradientsParams::from_grads(loss.backward(), self);

        Ok(TrainOutput {
            loss: loss_value,
            logits: SpanLogits {
                start: host_rows(output.start_logits.inner()),
                end:   host_rows(output.end_logits.inner()),
            },
            gradients,
        })
    }

    fn inference(&self) -> Self::Inference {
        self.valid()
    }
}

impl<B: Backend> Checkpointable for QaModel<B> {
    const EXTENSION: &'static str = "mpk";

    fn save_weights(&self, base: &Path) -> Result<()> {
        self.clone()
            .save_file(base.to_path_buf(), &CompactRecorder::new())
            .map_err(|e| anyhow!("Cannot save weights to '{}': {e:?}", base.display()))
    }

    fn load_weights(self, base: &Path) -> Result<Self> {
        let device = self.device();
        self.load_file(base.to_path_buf(), &CompactRecorder::new(), &device)
            .map_err(|e| anyhow!("Cannot load weights from '{}': {e:?}", base.display()))
    }
}

/// Adapts a burn optimiser to `SpanOptimizer` at a fixed learning rate.
pub struct AdamStep<O> {
    optim:         O,
    learning_rate: f64,
}

impl<O> AdamStep<O> {
    pub fn new(optim: O, learning_rate: f64) -> Self {
        Self { optim, learning_rate }
    }
}

impl<B: AutodiffBackend, O: Optimizer<QaModel<B>, B>> SpanOptimizer<QaModel<B>> for AdamStep<O> {
    fn step(&mut self, model: QaModel<B>, gradients: GradientsParams) -> QaModel<B> {
        self.optim.step(self.learning_rate, model, gradients)
    }
}

pub fn adam<B: AutodiffBackend>(learning_rate: f64) -> AdamStep<impl Optimizer<QaModel<B>, B>> {
    AdamStep::new(AdamConfig::new().with_epsilon(1e-8).init::<B, QaModel<B>>(), learning_rate)
}
