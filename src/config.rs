//! Configuration for the encoder and aggregator networks

use burn::prelude::*;

/// Configuration for the lane-graph encoder
#[derive(Debug, Config)]
pub struct EncoderConfig {
    /// Size of target agent features
    pub target_agent_feat_size: usize,
    /// Size of target agent embedding
    pub target_agent_emb_size: usize,
    /// Size of hidden state of target agent GRU encoder
    pub target_agent_enc_size: usize,
    /// Size of lane node features
    pub node_feat_size: usize,
    /// Size of lane node embedding
    pub node_emb_size: usize,
    /// Size of hidden state of lane node GRU encoder
    pub node_enc_size: usize,
    /// Size of neighboring agent features (without the type flag)
    pub nbr_feat_size: usize,
    /// Size of neighboring agent embedding
    pub nbr_emb_size: usize,
    /// Size of hidden state of neighboring agent GRU encoder
    pub nbr_enc_size: usize,
    /// Number of GAT layers applied to the fused node encodings
    pub num_gat_layers: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            target_agent_feat_size: 5,
            target_agent_emb_size: 16,
            target_agent_enc_size: 32,
            node_feat_size: 6,
            node_emb_size: 16,
            node_enc_size: 32,
            nbr_feat_size: 5,
            nbr_emb_size: 16,
            nbr_enc_size: 32,
            num_gat_layers: 2,
        }
    }
}

/// Configuration for the goal-conditioned aggregator
#[derive(Debug, Config)]
pub struct GoalConditionedConfig {
    /// Size of the target agent encoding produced by the encoder
    pub target_agent_enc_size: usize,
    /// Size of the node encodings produced by the encoder
    pub context_enc_size: usize,
    /// Size of queries, keys and values for global attention
    pub emb_size: usize,
    /// Size of the first layer of the goal prediction head
    pub goal_h1_size: usize,
    /// Size of the second layer of the goal prediction head
    pub goal_h2_size: usize,
    /// Number of goals to sample per example
    pub num_samples: usize,
    /// Whether the model is being pre-trained using ground-truth goals
    pub pre_train: bool,
}

impl Default for GoalConditionedConfig {
    fn default() -> Self {
        Self {
            target_agent_enc_size: 32,
            context_enc_size: 32,
            emb_size: 128,
            goal_h1_size: 128,
            goal_h2_size: 64,
            num_samples: 10,
            pre_train: false,
        }
    }
}

impl GoalConditionedConfig {
    /// Feature size of the aggregated context vector before the goal
    /// encoding is appended.
    pub fn context_size(&self) -> usize {
        self.target_agent_enc_size + self.emb_size
    }
}
