//! Masked single-head attention: agent-to-node fusion and GAT layers
//!
//! Both layers are single-head scaled dot-product attention with learned
//! query/key/value projections, differing only in where keys come from and
//! what the mask means.

use burn::nn::{LeakyRelu, LeakyReluConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;

/// Scaled dot-product attention with a boolean mask over key positions.
///
/// `invalid` is [batch, num_queries, num_keys] with true marking key
/// positions that must receive no attention weight. A query whose keys are
/// all invalid produces an exactly-zero output row.
pub(crate) fn masked_attention<B: Backend>(
    queries: Tensor<B, 3>,
    keys: Tensor<B, 3>,
    values: Tensor<B, 3>,
    invalid: Tensor<B, 3, Bool>,
) -> Tensor<B, 3> {
    let [_, _, emb_size] = keys.dims();
    let scores = queries.matmul(keys.transpose()) / (emb_size as f32).sqrt();
    let scores = scores.mask_fill(invalid.clone(), f32::NEG_INFINITY);
    // Fully-masked rows softmax to NaN; the second fill flushes them to zero
    let weights = softmax(scores, 2).mask_fill(invalid, 0.0);
    weights.matmul(values)
}

/// Cross-attention layer infusing each lane node encoding with the context
/// of nearby surrounding agents.
///
/// Queries come from node encodings, keys and values from the concatenated
/// neighbor encodings (vehicles first, then pedestrians). The attention
/// output is concatenated with the original node encoding and mixed back
/// down to the node encoding size.
#[derive(Module, Debug)]
pub struct AgentNodeAttention<B: Backend> {
    query_emb: Linear<B>,
    key_emb: Linear<B>,
    val_emb: Linear<B>,
    mix: Linear<B>,
    activation: LeakyRelu,
}

impl<B: Backend> AgentNodeAttention<B> {
    pub fn new(device: &B::Device, node_enc_size: usize, nbr_enc_size: usize) -> Self {
        Self {
            query_emb: LinearConfig::new(node_enc_size, node_enc_size).init(device),
            key_emb: LinearConfig::new(nbr_enc_size, node_enc_size).init(device),
            val_emb: LinearConfig::new(nbr_enc_size, node_enc_size).init(device),
            mix: LinearConfig::new(node_enc_size * 2, node_enc_size).init(device),
            activation: LeakyReluConfig::new().init(),
        }
    }

    /// `invalid` is [batch, max_nodes, num_nbrs] with true marking agents
    /// that are not near the node. Its key ordering must match the
    /// vehicle/pedestrian concatenation order of `nbr_encodings`.
    pub fn forward(
        &self,
        node_encodings: Tensor<B, 3>,
        nbr_encodings: Tensor<B, 3>,
        invalid: Tensor<B, 3, Bool>,
    ) -> Tensor<B, 3> {
        let att = masked_attention(
            self.query_emb.forward(node_encodings.clone()),
            self.key_emb.forward(nbr_encodings.clone()),
            self.val_emb.forward(nbr_encodings),
            invalid,
        );
        self.activation
            .forward(self.mix.forward(Tensor::cat(vec![node_encodings, att], 2)))
    }
}

/// Graph attention layer aggregating local context at each lane node.
///
/// Self-attention over node encodings restricted to graph neighbors: the
/// attention mask is the complement of the adjacency matrix, which always
/// includes self-loops. The caller adds the residual.
#[derive(Module, Debug)]
pub struct GatLayer<B: Backend> {
    query_emb: Linear<B>,
    key_emb: Linear<B>,
    val_emb: Linear<B>,
}

impl<B: Backend> GatLayer<B> {
    pub fn new(device: &B::Device, node_enc_size: usize) -> Self {
        Self {
            query_emb: LinearConfig::new(node_enc_size, node_enc_size).init(device),
            key_emb: LinearConfig::new(node_enc_size, node_enc_size).init(device),
            val_emb: LinearConfig::new(node_enc_size, node_enc_size).init(device),
        }
    }

    pub fn forward(
        &self,
        node_encodings: Tensor<B, 3>,
        adjacency: Tensor<B, 3, Bool>,
    ) -> Tensor<B, 3> {
        masked_attention(
            self.query_emb.forward(node_encodings.clone()),
            self.key_emb.forward(node_encodings.clone()),
            self.val_emb.forward(node_encodings),
            adjacency.bool_not(),
        )
    }
}
