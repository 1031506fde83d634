//! Typed tensor records passed between the encoder, the aggregators and the
//! downstream decoder.
//!
//! All tensors are batched along the leading dimension. Masks use the
//! inverted convention throughout: 1.0 marks a padded/invalid entry,
//! 0.0 marks a valid one.

use burn::prelude::*;

/// Vectorized lane-graph map inputs.
#[derive(Debug, Clone)]
pub struct MapRepresentation<B: Backend> {
    /// Lane node pose features [batch, max_nodes, max_poses, feat_size]
    pub lane_node_feats: Tensor<B, 4>,
    /// Padding masks for lane node features, same shape, 1.0 = padded
    pub lane_node_masks: Tensor<B, 4>,
    /// Successor-edge table: destination node index per outgoing edge slot
    /// [batch, max_nodes, max_edges]
    pub s_next: Tensor<B, 3>,
    /// Edge type per edge slot, 0 = no edge [batch, max_nodes, max_edges]
    pub edge_type: Tensor<B, 3, Int>,
}

/// Track histories of agents surrounding the target agent.
#[derive(Debug, Clone)]
pub struct SurroundingAgents<B: Backend> {
    /// Vehicle histories [batch, max_vehicles, t_h, feat_size]
    pub vehicles: Tensor<B, 4>,
    /// Padding masks for vehicle histories, same shape
    pub vehicle_masks: Tensor<B, 4>,
    /// Pedestrian histories [batch, max_peds, t_h, feat_size]
    pub pedestrians: Tensor<B, 4>,
    /// Padding masks for pedestrian histories, same shape
    pub pedestrian_masks: Tensor<B, 4>,
}

/// Per-pair masks indicating which agents are near which lane nodes.
#[derive(Debug, Clone)]
pub struct AgentNodeMasks<B: Backend> {
    /// [batch, max_nodes, max_vehicles], 1.0 = vehicle not near node
    pub vehicles: Tensor<B, 3>,
    /// [batch, max_nodes, max_peds], 1.0 = pedestrian not near node
    pub pedestrians: Tensor<B, 3>,
}

/// Graph traversal fields, present when the lane graph carries edges for
/// goal-conditioned prediction.
#[derive(Debug, Clone)]
pub struct TraversalInputs<B: Backend> {
    /// Initial node in the lane graph based on track history [batch, max_nodes]
    pub init_node: Tensor<B, 2>,
    /// Ground-truth visited-node sequence for pre-training [batch, seq_len].
    /// Indices are expressed in the traversal index space, shifted up by
    /// max_nodes relative to raw node indices.
    pub node_seq_gt: Tensor<B, 2>,
}

/// Full input record for the encoder.
#[derive(Debug, Clone)]
pub struct EncoderInputs<B: Backend> {
    /// Target agent history [batch, t_h, feat_size]
    pub target_agent_representation: Tensor<B, 3>,
    pub map: MapRepresentation<B>,
    pub surrounding: SurroundingAgents<B>,
    pub agent_node_masks: AgentNodeMasks<B>,
    pub traversal: Option<TraversalInputs<B>>,
}

/// Edge structure forwarded to the aggregator alongside the encodings.
#[derive(Debug, Clone)]
pub struct GraphEncodings<B: Backend> {
    pub init_node: Tensor<B, 2>,
    pub node_seq_gt: Tensor<B, 2>,
    pub s_next: Tensor<B, 3>,
    pub edge_type: Tensor<B, 3, Int>,
}

/// Encoder output, consumed by the aggregators.
#[derive(Debug, Clone)]
pub struct Encodings<B: Backend> {
    /// Fixed-size summary of the target agent's motion [batch, enc_size]
    pub target_agent_encoding: Tensor<B, 2>,
    /// Fused and graph-refined lane node encodings [batch, max_nodes, enc_size]
    pub node_encodings: Tensor<B, 3>,
    /// Node-level validity mask [batch, max_nodes], 1.0 = node has no valid pose
    pub node_masks: Tensor<B, 2>,
    /// Edge structure, passed through when traversal inputs were provided
    pub graph: Option<GraphEncodings<B>>,
}

/// Aggregator output, consumed by the trajectory decoder.
#[derive(Debug, Clone)]
pub struct AggregatorOutput<B: Backend> {
    /// Goal-conditioned context encodings [batch, num_samples, context_size + node_enc_size]
    pub agg_encoding: Tensor<B, 3>,
    /// Log probabilities over lane nodes for the predicted goal [batch, max_nodes]
    pub goal_log_probs: Tensor<B, 2>,
}
