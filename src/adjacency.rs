//! Dense adjacency construction from the successor-edge table
//!
//! The lane graph arrives as a sparse table: for every node, a fixed number
//! of outgoing edge slots holding the destination node index, annotated
//! with an edge type where 0 means the slot is unused. GAT layers need a
//! dense boolean adjacency matrix, built here on the host and uploaded
//! once per forward pass.

use burn::prelude::*;

/// Edge type value marking an unused edge slot.
pub const NO_EDGE: i64 = 0;

/// Builds the boolean adjacency matrix [batch, max_nodes, max_nodes] for
/// the GAT layers.
///
/// Every node gets a self-loop. Unused edge slots are redirected to their
/// own source node so they never introduce an edge to an arbitrary node.
/// The last edge slot of each node is reserved for the traversal
/// representation and is not applied here. The result is symmetrized.
pub fn build_adjacency<B: Backend>(
    s_next: &Tensor<B, 3>,
    edge_type: &Tensor<B, 3, Int>,
) -> Tensor<B, 3, Bool> {
    let [batch_size, max_nodes, max_edges] = s_next.dims();
    assert_eq!(
        edge_type.dims(),
        [batch_size, max_nodes, max_edges],
        "s_next/edge_type shape mismatch"
    );

    let device = s_next.device();
    let dest: Vec<f32> = s_next
        .clone()
        .into_data()
        .convert::<f32>()
        .to_vec()
        .unwrap();
    let types: Vec<i64> = edge_type
        .clone()
        .into_data()
        .convert::<i64>()
        .to_vec()
        .unwrap();

    let mut adj = vec![false; batch_size * max_nodes * max_nodes];

    for b in 0..batch_size {
        let base = b * max_nodes * max_nodes;

        // Self-loops
        for node in 0..max_nodes {
            adj[base + node * max_nodes + node] = true;
        }

        for src in 0..max_nodes {
            // Last edge slot is reserved, not an adjacency edge
            for slot in 0..max_edges.saturating_sub(1) {
                let e = (b * max_nodes + src) * max_edges + slot;
                let dst = if types[e] == NO_EDGE {
                    // Harmless self-referential dummy for unused slots
                    src
                } else {
                    let d = dest[e] as i64;
                    assert!(
                        d >= 0 && (d as usize) < max_nodes,
                        "edge destination {d} out of range for {max_nodes} nodes \
                         (batch {b}, node {src}, slot {slot})"
                    );
                    d as usize
                };
                adj[base + src * max_nodes + dst] = true;
            }
        }

        // Symmetrize: adjacency OR its transpose
        for i in 0..max_nodes {
            for j in (i + 1)..max_nodes {
                let ij = base + i * max_nodes + j;
                let ji = base + j * max_nodes + i;
                let edge = adj[ij] || adj[ji];
                adj[ij] = edge;
                adj[ji] = edge;
            }
        }
    }

    Tensor::from_data(
        TensorData::new(adj, [batch_size, max_nodes, max_nodes]),
        &device,
    )
}
