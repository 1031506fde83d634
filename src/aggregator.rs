//! Context aggregation: global attention and the goal-conditioned variant
//!
//! The goal-conditioned aggregator predicts goal probabilities over lane
//! nodes, samples goals (or takes ground-truth goals while pre-training)
//! and appends the sampled goal encodings to the aggregated context, one
//! row per sample, for the trajectory decoder to consume.

use burn::nn::{LeakyRelu, LeakyReluConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::Distribution;
use burn::tensor::activation::log_softmax;

use crate::attention::masked_attention;
use crate::config::GoalConditionedConfig;
use crate::types::{AggregatorOutput, Encodings};

/// Capability of collapsing encoder outputs into one context vector per
/// example.
pub trait Aggregate<B: Backend> {
    /// Returns the aggregated context [batch, context_size].
    fn aggregate(&self, encodings: &Encodings<B>) -> Tensor<B, 2>;
}

/// Aggregates map and agent context with a single attention query derived
/// from the target agent encoding. The output is the target agent encoding
/// concatenated with the attended context vector.
#[derive(Module, Debug)]
pub struct GlobalAttention<B: Backend> {
    query_emb: Linear<B>,
    key_emb: Linear<B>,
    val_emb: Linear<B>,
}

impl<B: Backend> GlobalAttention<B> {
    pub fn new(
        device: &B::Device,
        target_agent_enc_size: usize,
        context_enc_size: usize,
        emb_size: usize,
    ) -> Self {
        Self {
            query_emb: LinearConfig::new(target_agent_enc_size, emb_size).init(device),
            key_emb: LinearConfig::new(context_enc_size, emb_size).init(device),
            val_emb: LinearConfig::new(context_enc_size, emb_size).init(device),
        }
    }
}

impl<B: Backend> Aggregate<B> for GlobalAttention<B> {
    fn aggregate(&self, encodings: &Encodings<B>) -> Tensor<B, 2> {
        let target = encodings.target_agent_encoding.clone();
        let queries = self.query_emb.forward(target.clone()).unsqueeze_dim(1);
        let keys = self.key_emb.forward(encodings.node_encodings.clone());
        let values = self.val_emb.forward(encodings.node_encodings.clone());
        let invalid = encodings.node_masks.clone().greater_elem(0.5).unsqueeze_dim(1);

        let attended = masked_attention(queries, keys, values, invalid).squeeze::<2>(1);
        Tensor::cat(vec![target, attended], 1)
    }
}

/// Goal conditioned aggregator:
/// 1) predicts goal probabilities over lane nodes,
/// 2) samples goals (or forces ground-truth goals while pre-training),
/// 3) outputs goal conditioned encodings for N samples.
#[derive(Module, Debug)]
pub struct GoalConditioned<B: Backend> {
    global_attention: GlobalAttention<B>,
    goal_h1: Linear<B>,
    goal_h2: Linear<B>,
    goal_op: Linear<B>,
    activation: LeakyRelu,
    num_samples: usize,
    pre_train: bool,
}

impl<B: Backend> GoalConditioned<B> {
    pub fn new(device: &B::Device, config: &GoalConditionedConfig) -> Self {
        tracing::debug!(
            "initializing goal-conditioned aggregator: num_samples={}, pre_train={}",
            config.num_samples,
            config.pre_train
        );

        Self {
            global_attention: GlobalAttention::new(
                device,
                config.target_agent_enc_size,
                config.context_enc_size,
                config.emb_size,
            ),
            goal_h1: LinearConfig::new(
                config.context_enc_size + config.target_agent_enc_size,
                config.goal_h1_size,
            )
            .init(device),
            goal_h2: LinearConfig::new(config.goal_h1_size, config.goal_h2_size).init(device),
            goal_op: LinearConfig::new(config.goal_h2_size, 1).init(device),
            activation: LeakyReluConfig::new().init(),
            num_samples: config.num_samples,
            pre_train: config.pre_train,
        }
    }

    /// Forward pass. `training` selects pre-training behavior together with
    /// the `pre_train` configuration flag: while pre-training, goals are
    /// forced to the ground-truth final node instead of being sampled.
    pub fn forward(&self, encodings: &Encodings<B>, training: bool) -> AggregatorOutput<B> {
        let node_encodings = &encodings.node_encodings;
        let [batch_size, max_nodes, node_enc_size] = node_encodings.dims();

        let goal_log_probs = self.compute_goal_log_probs(
            encodings.target_agent_encoding.clone(),
            node_encodings.clone(),
            encodings.node_masks.clone(),
        );

        let goals: Tensor<B, 2, Int> = if self.pre_train && training {
            self.ground_truth_goals(encodings, max_nodes)
        } else {
            self.sample_goals(goal_log_probs.clone())
        };

        // Repeat the aggregated context for each sample and append the
        // encoding of the sampled goal node
        let context = self
            .global_attention
            .aggregate(encodings)
            .unsqueeze_dim::<3>(1)
            .repeat_dim(1, self.num_samples);
        let goal_indices = goals.unsqueeze_dim::<3>(2).repeat_dim(2, node_enc_size);
        let goal_encodings = node_encodings.clone().gather(1, goal_indices);
        let agg_encoding = Tensor::cat(vec![context, goal_encodings], 2);

        debug_assert_eq!(agg_encoding.dims()[0..2], [batch_size, self.num_samples]);

        AggregatorOutput {
            agg_encoding,
            goal_log_probs,
        }
    }

    /// Goal prediction head: scores each node against the target agent
    /// encoding, masks invalid nodes to -inf via log(1 - mask), and
    /// normalizes with a log-softmax over the node axis.
    fn compute_goal_log_probs(
        &self,
        target_agent_encoding: Tensor<B, 2>,
        node_encodings: Tensor<B, 3>,
        node_masks: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [batch_size, max_nodes, _] = node_encodings.dims();
        assert_eq!(
            node_masks.dims(),
            [batch_size, max_nodes],
            "node_masks shape does not match node_encodings"
        );

        let target = target_agent_encoding
            .unsqueeze_dim::<3>(1)
            .repeat_dim(1, max_nodes);
        let enc = Tensor::cat(vec![target, node_encodings], 2);

        let scores = self
            .goal_op
            .forward(self.activation.forward(
                self.goal_h2
                    .forward(self.activation.forward(self.goal_h1.forward(enc))),
            ))
            .squeeze::<2>(2);

        // log(1 - mask) is 0 at valid nodes and -inf at invalid nodes, so
        // masked nodes end up with probability exactly zero
        let log_valid = (node_masks.ones_like() - node_masks).log();
        log_softmax(scores + log_valid, 1)
    }

    /// Draws `num_samples` independent categorical samples per example from
    /// the goal distribution, using the Gumbel-max trick. Invalid nodes
    /// carry -inf log probability and are never drawn.
    fn sample_goals(&self, goal_log_probs: Tensor<B, 2>) -> Tensor<B, 2, Int> {
        let logits = goal_log_probs
            .unsqueeze_dim::<3>(1)
            .repeat_dim(1, self.num_samples);
        let uniform = Tensor::random(
            logits.shape(),
            Distribution::Uniform(0.0, 1.0),
            &logits.device(),
        );
        let gumbel = -(-uniform.log()).log();
        (logits + gumbel).argmax(2).squeeze::<2>(2)
    }

    /// Pre-training: every sample is the ground-truth final node of the
    /// traversal sequence. Sequence indices live in the traversal index
    /// space, shifted up by max_nodes, and are corrected back to raw node
    /// indices here.
    fn ground_truth_goals(&self, encodings: &Encodings<B>, max_nodes: usize) -> Tensor<B, 2, Int> {
        let graph = encodings.graph.as_ref().unwrap_or_else(|| {
            panic!("pre-training requires ground-truth traversal fields (node_seq_gt) in the encodings")
        });

        let [batch_size, seq_len] = graph.node_seq_gt.dims();
        graph
            .node_seq_gt
            .clone()
            .slice([0..batch_size, seq_len - 1..seq_len])
            .int()
            .sub_scalar(max_nodes as i64)
            .repeat_dim(1, self.num_samples)
    }
}
