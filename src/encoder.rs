//! GRU based lane-graph encoder
//!
//! Lane node features and agent histories are summarized with GRUs,
//! agent-node attention infuses each node encoding with nearby agent
//! context, and GAT layers aggregate local context along the lane graph.

use burn::nn::gru::{Gru, GruConfig};
use burn::nn::{LeakyRelu, LeakyReluConfig, Linear, LinearConfig};
use burn::prelude::*;

use crate::adjacency::build_adjacency;
use crate::attention::{AgentNodeAttention, GatLayer};
use crate::config::EncoderConfig;
use crate::seq::encode_sequences;
use crate::types::{EncoderInputs, Encodings, GraphEncodings};

/// Encoder producing the target agent encoding and fused, graph-refined
/// lane node encodings.
#[derive(Module, Debug)]
pub struct LaneGraphEncoder<B: Backend> {
    target_agent_emb: Linear<B>,
    target_agent_enc: Gru<B>,
    node_emb: Linear<B>,
    node_encoder: Gru<B>,
    nbr_emb: Linear<B>,
    nbr_enc: Gru<B>,
    fusion: AgentNodeAttention<B>,
    gat_layers: Vec<GatLayer<B>>,
    activation: LeakyRelu,
    node_enc_size: usize,
    nbr_enc_size: usize,
}

impl<B: Backend> LaneGraphEncoder<B> {
    pub fn new(device: &B::Device, config: &EncoderConfig) -> Self {
        let gat_layers = (0..config.num_gat_layers)
            .map(|_| GatLayer::new(device, config.node_enc_size))
            .collect();

        tracing::debug!(
            "initializing lane-graph encoder: node_enc_size={}, {} GAT layers",
            config.node_enc_size,
            config.num_gat_layers
        );

        Self {
            target_agent_emb: LinearConfig::new(
                config.target_agent_feat_size,
                config.target_agent_emb_size,
            )
            .init(device),
            target_agent_enc: GruConfig::new(
                config.target_agent_emb_size,
                config.target_agent_enc_size,
                true,
            )
            .init(device),
            node_emb: LinearConfig::new(config.node_feat_size, config.node_emb_size).init(device),
            node_encoder: GruConfig::new(config.node_emb_size, config.node_enc_size, true)
                .init(device),
            // +1 for the vehicle/pedestrian type flag appended to features
            nbr_emb: LinearConfig::new(config.nbr_feat_size + 1, config.nbr_emb_size).init(device),
            nbr_enc: GruConfig::new(config.nbr_emb_size, config.nbr_enc_size, true).init(device),
            fusion: AgentNodeAttention::new(device, config.node_enc_size, config.nbr_enc_size),
            gat_layers,
            activation: LeakyReluConfig::new().init(),
            node_enc_size: config.node_enc_size,
            nbr_enc_size: config.nbr_enc_size,
        }
    }

    pub fn forward(&self, inputs: &EncoderInputs<B>) -> Encodings<B> {
        // Target agent: full-length history, final GRU hidden state
        let target_emb = self
            .activation
            .forward(self.target_agent_emb.forward(inputs.target_agent_representation.clone()));
        let target_seq = self.target_agent_enc.forward(target_emb, None);
        let [batch_size, t_h, enc_size] = target_seq.dims();
        let target_agent_encoding = target_seq
            .slice([0..batch_size, t_h - 1..t_h, 0..enc_size])
            .squeeze::<2>(1);

        // Lane nodes
        let lane_node_masks = &inputs.map.lane_node_masks;
        let node_emb = self
            .activation
            .forward(self.node_emb.forward(inputs.map.lane_node_feats.clone()));
        let lane_node_enc =
            encode_sequences(node_emb, lane_node_masks, &self.node_encoder, self.node_enc_size);

        // Surrounding agents, with a type flag appended: 0.0 for vehicles,
        // 1.0 for pedestrians
        let vehicle_enc = self.encode_neighbors(
            &inputs.surrounding.vehicles,
            &inputs.surrounding.vehicle_masks,
            0.0,
        );
        let ped_enc = self.encode_neighbors(
            &inputs.surrounding.pedestrians,
            &inputs.surrounding.pedestrian_masks,
            1.0,
        );
        let nbr_encodings = Tensor::cat(vec![vehicle_enc, ped_enc], 1);

        // Agent-node attention; mask concatenation order must match the
        // encoding concatenation order above
        let [_, max_nodes, _] = lane_node_enc.dims();
        let num_vehicles = inputs.surrounding.vehicles.dims()[1];
        let num_peds = inputs.surrounding.pedestrians.dims()[1];
        assert_eq!(
            inputs.agent_node_masks.vehicles.dims(),
            [batch_size, max_nodes, num_vehicles],
            "agent_node_masks.vehicles shape does not match vehicle count"
        );
        assert_eq!(
            inputs.agent_node_masks.pedestrians.dims(),
            [batch_size, max_nodes, num_peds],
            "agent_node_masks.pedestrians shape does not match pedestrian count"
        );
        let attn_masks = Tensor::cat(
            vec![
                inputs.agent_node_masks.vehicles.clone(),
                inputs.agent_node_masks.pedestrians.clone(),
            ],
            2,
        );
        let mut lane_node_enc =
            self.fusion
                .forward(lane_node_enc, nbr_encodings, attn_masks.greater_elem(0.5));

        // GAT layers with explicit residual accumulation
        let adjacency = build_adjacency(&inputs.map.s_next, &inputs.map.edge_type);
        for gat in &self.gat_layers {
            lane_node_enc = lane_node_enc.clone() + gat.forward(lane_node_enc, adjacency.clone());
        }

        // A node is valid if any of its poses is valid
        let [_, _, max_poses, _] = lane_node_masks.dims();
        let node_masks = lane_node_masks
            .clone()
            .slice([0..batch_size, 0..max_nodes, 0..max_poses, 0..1])
            .squeeze::<3>(3)
            .equal_elem(0.0)
            .any_dim(2)
            .bool_not()
            .float()
            .squeeze::<2>(2);

        let graph = inputs.traversal.as_ref().map(|traversal| GraphEncodings {
            init_node: traversal.init_node.clone(),
            node_seq_gt: traversal.node_seq_gt.clone(),
            s_next: inputs.map.s_next.clone(),
            edge_type: inputs.map.edge_type.clone(),
        });

        Encodings {
            target_agent_encoding,
            node_encodings: lane_node_enc,
            node_masks,
            graph,
        }
    }

    fn encode_neighbors(
        &self,
        feats: &Tensor<B, 4>,
        masks: &Tensor<B, 4>,
        type_flag: f32,
    ) -> Tensor<B, 3> {
        let [batch_size, max_agents, t_h, _] = feats.dims();
        let flag = Tensor::full([batch_size, max_agents, t_h, 1], type_flag, &feats.device());
        let flagged = Tensor::cat(vec![feats.clone(), flag], 3);
        let emb = self.activation.forward(self.nbr_emb.forward(flagged));
        encode_sequences(emb, masks, &self.nbr_enc, self.nbr_enc_size)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{AgentNodeMasks, MapRepresentation, SurroundingAgents};

    type TestBackend = burn::backend::NdArray;

    pub(crate) fn small_config() -> EncoderConfig {
        EncoderConfig {
            target_agent_feat_size: 5,
            target_agent_emb_size: 8,
            target_agent_enc_size: 16,
            node_feat_size: 6,
            node_emb_size: 8,
            node_enc_size: 16,
            nbr_feat_size: 5,
            nbr_emb_size: 8,
            nbr_enc_size: 16,
            num_gat_layers: 2,
        }
    }

    fn random4(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random(
            shape,
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        )
    }

    /// Two examples, five lane nodes with node 3 fully padded in example 1,
    /// two vehicles, one pedestrian.
    pub(crate) fn sample_inputs() -> EncoderInputs<TestBackend> {
        let device: <TestBackend as Backend>::Device = Default::default();
        let (batch, nodes, poses) = (2, 5, 3);

        let mut node_mask = vec![0.0f32; batch * nodes * poses * 6];
        // Example 1, node 3: every pose padded
        for t in 0..poses {
            for f in 0..6 {
                node_mask[((nodes + 3) * poses + t) * 6 + f] = 1.0;
            }
        }
        let lane_node_masks = Tensor::<TestBackend, 1>::from_floats(node_mask.as_slice(), &device)
            .reshape([batch, nodes, poses, 6]);

        // Chain edges 0->1->2->3->4 in slot 0, slot 1 unused, slot 2 reserved
        let mut s_next = vec![0.0f32; batch * nodes * 3];
        let mut edge_type = vec![0i64; batch * nodes * 3];
        for b in 0..batch {
            for n in 0..nodes - 1 {
                s_next[(b * nodes + n) * 3] = (n + 1) as f32;
                edge_type[(b * nodes + n) * 3] = 1;
            }
        }

        EncoderInputs {
            target_agent_representation: Tensor::random(
                [batch, 4, 5],
                burn::tensor::Distribution::Uniform(-1.0, 1.0),
                &device,
            ),
            map: MapRepresentation {
                lane_node_feats: random4([batch, nodes, poses, 6]),
                lane_node_masks,
                s_next: Tensor::from_data(TensorData::new(s_next, [batch, nodes, 3]), &device),
                edge_type: Tensor::from_data(TensorData::new(edge_type, [batch, nodes, 3]), &device),
            },
            surrounding: SurroundingAgents {
                vehicles: random4([batch, 2, 4, 5]),
                vehicle_masks: Tensor::zeros([batch, 2, 4, 5], &device),
                pedestrians: random4([batch, 1, 4, 5]),
                pedestrian_masks: Tensor::zeros([batch, 1, 4, 5], &device),
            },
            agent_node_masks: AgentNodeMasks {
                vehicles: Tensor::zeros([batch, nodes, 2], &device),
                pedestrians: Tensor::zeros([batch, nodes, 1], &device),
            },
            traversal: None,
        }
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let encoder = LaneGraphEncoder::<TestBackend>::new(&device, &small_config());
        let encodings = encoder.forward(&sample_inputs());

        assert_eq!(encodings.target_agent_encoding.dims(), [2, 16]);
        assert_eq!(encodings.node_encodings.dims(), [2, 5, 16]);
        assert_eq!(encodings.node_masks.dims(), [2, 5]);
        assert!(encodings.graph.is_none());
    }

    #[test]
    fn test_node_mask_collapses_pose_validity() {
        let device = Default::default();
        let encoder = LaneGraphEncoder::<TestBackend>::new(&device, &small_config());
        let encodings = encoder.forward(&sample_inputs());

        let masks: Vec<f32> = encodings.node_masks.into_data().to_vec().unwrap();
        // Only example 1's node 3 is invalid
        let expected = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(masks, expected);
    }

    #[test]
    fn test_swapped_neighbor_tensors_change_fusion() {
        // Swapping vehicle/pedestrian features without swapping their masks
        // breaks the concatenation-order contract; the fused encodings must
        // differ materially from the consistent ordering.
        let device = Default::default();
        let encoder = LaneGraphEncoder::<TestBackend>::new(&device, &small_config());

        let inputs = sample_inputs();
        let mut swapped = inputs.clone();
        // 2 vehicles vs 1 pedestrian: pad shapes by reusing slices so the
        // swap stays shape-compatible (1 agent each way)
        let b = inputs.surrounding.vehicles.dims()[0];
        swapped.surrounding.vehicles = inputs
            .surrounding
            .pedestrians
            .clone()
            .repeat_dim(1, 2)
            .slice([0..b, 0..2, 0..4, 0..5]);
        swapped.surrounding.pedestrians = inputs
            .surrounding
            .vehicles
            .clone()
            .slice([0..b, 0..1, 0..4, 0..5]);

        let base = encoder.forward(&inputs);
        let out = encoder.forward(&swapped);

        let a: Vec<f32> = base.node_encodings.into_data().to_vec().unwrap();
        let c: Vec<f32> = out.node_encodings.into_data().to_vec().unwrap();
        let max_diff = a
            .iter()
            .zip(c.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max);
        assert!(max_diff > 1e-6);
    }

    #[test]
    fn test_traversal_fields_pass_through() {
        let device: <TestBackend as Backend>::Device = Default::default();
        let encoder = LaneGraphEncoder::<TestBackend>::new(&device, &small_config());

        let mut inputs = sample_inputs();
        inputs.traversal = Some(crate::types::TraversalInputs {
            init_node: Tensor::zeros([2, 5], &device),
            node_seq_gt: Tensor::<TestBackend, 1>::from_floats(
                [5.0, 6.0, 7.0, 8.0, 9.0, 5.0].as_slice(),
                &device,
            )
            .reshape([2, 3]),
        });

        let encodings = encoder.forward(&inputs);
        let graph = encodings.graph.expect("traversal fields must pass through");
        assert_eq!(graph.node_seq_gt.dims(), [2, 3]);
        assert_eq!(graph.s_next.dims(), [2, 5, 3]);
    }
}
