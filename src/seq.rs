//! Variable-length sequence encoding with a GRU summarizer
//!
//! Batches arrive as a grid of [batch, entity, time, feature] where most
//! entity slots are padding. Running the GRU over every slot would waste
//! almost all of its work, so valid entities are compacted into one flat
//! batch, encoded, and scattered back to their original positions.

use burn::nn::gru::Gru;
use burn::prelude::*;

/// Encodes a batch of batches of variable-length sequences into one
/// fixed-size vector per entity slot.
///
/// `feat_embedding` is [batch, max_entities, max_steps, emb_size] and
/// `masks` is the raw feature mask [batch, max_entities, max_steps, feat_size]
/// with 1.0 marking padded steps. Valid steps must form a prefix of each
/// sequence. Returns [batch, max_entities, hidden_size], zero-filled for
/// entities with no valid step.
pub fn encode_sequences<B: Backend>(
    feat_embedding: Tensor<B, 4>,
    masks: &Tensor<B, 4>,
    gru: &Gru<B>,
    hidden_size: usize,
) -> Tensor<B, 3> {
    let [batch_size, max_entities, max_steps, emb_size] = feat_embedding.dims();
    let [m_batch, m_entities, m_steps, _] = masks.dims();
    assert_eq!(
        [batch_size, max_entities, max_steps],
        [m_batch, m_entities, m_steps],
        "feature/mask shape mismatch: features are [{batch_size}, {max_entities}, {max_steps}, ..], \
         masks are [{m_batch}, {m_entities}, {m_steps}, ..]"
    );

    let device = feat_embedding.device();

    // Validity and true lengths from feature 0 of the mask
    let mask0: Vec<f32> = masks
        .clone()
        .slice([0..batch_size, 0..max_entities, 0..max_steps, 0..1])
        .into_data()
        .convert::<f32>()
        .to_vec()
        .unwrap();

    let mut valid_indices: Vec<i64> = Vec::new();
    let mut last_steps: Vec<i64> = Vec::new();
    for entity in 0..batch_size * max_entities {
        let steps = &mask0[entity * max_steps..(entity + 1) * max_steps];
        let len = steps.iter().filter(|&&m| m == 0.0).count();
        if len > 0 {
            valid_indices.push(entity as i64);
            last_steps.push(len as i64 - 1);
        }
    }

    // Degenerate case: no valid entity anywhere. The GRU must not be
    // invoked on an empty batch.
    if valid_indices.is_empty() {
        return Tensor::zeros([batch_size, max_entities, hidden_size], &device);
    }

    let num_valid = valid_indices.len();

    // Compact valid entities into one flat batch of sequences
    let indices = Tensor::<B, 1, Int>::from_ints(valid_indices.as_slice(), &device);
    let flat = feat_embedding.reshape([batch_size * max_entities, max_steps, emb_size]);
    let compacted = flat.select(0, indices.clone());

    // Encode and take the hidden state at the last valid step of each sequence
    let hidden_seq = gru.forward(compacted, None);
    let step_indices = Tensor::<B, 1, Int>::from_ints(last_steps.as_slice(), &device)
        .reshape([num_valid, 1, 1])
        .repeat_dim(2, hidden_size);
    let encodings = hidden_seq.gather(1, step_indices).squeeze::<2>(1);

    // Scatter back to the original (batch, entity) positions
    Tensor::<B, 2>::zeros([batch_size * max_entities, hidden_size], &device)
        .select_assign(0, indices, encodings)
        .reshape([batch_size, max_entities, hidden_size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::gru::GruConfig;

    type TestBackend = burn::backend::NdArray;

    fn test_gru(emb: usize, hidden: usize) -> Gru<TestBackend> {
        let device = Default::default();
        GruConfig::new(emb, hidden, true).init(&device)
    }

    /// Mask where the given entity has `valid` un-padded leading steps.
    fn grid_mask(
        batch: usize,
        entities: usize,
        steps: usize,
        feat: usize,
        valid_steps: &[&[usize]],
    ) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        let mut data = vec![1.0f32; batch * entities * steps * feat];
        for (b, row) in valid_steps.iter().enumerate() {
            for (e, &len) in row.iter().enumerate() {
                for t in 0..len {
                    for f in 0..feat {
                        data[((b * entities + e) * steps + t) * feat + f] = 0.0;
                    }
                }
            }
        }
        Tensor::<TestBackend, 1>::from_floats(data.as_slice(), &device)
            .reshape([batch, entities, steps, feat])
    }

    #[test]
    fn test_all_invalid_batch_returns_zeros() {
        let device = Default::default();
        let gru = test_gru(4, 8);
        let feats = Tensor::<TestBackend, 4>::random(
            [2, 3, 5, 4],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let masks = grid_mask(2, 3, 5, 4, &[&[0, 0, 0], &[0, 0, 0]]);

        let enc = encode_sequences(feats, &masks, &gru, 8);

        assert_eq!(enc.dims(), [2, 3, 8]);
        let data: Vec<f32> = enc.into_data().to_vec().unwrap();
        assert!(data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_invalid_entities_encode_to_zero() {
        let device = Default::default();
        let gru = test_gru(4, 8);
        let feats = Tensor::<TestBackend, 4>::random(
            [2, 3, 5, 4],
            burn::tensor::Distribution::Uniform(0.1, 1.0),
            &device,
        );
        // Entity 1 of example 0 and all of example 1's entity 2 are padding
        let masks = grid_mask(2, 3, 5, 4, &[&[3, 0, 5], &[2, 4, 0]]);

        let enc = encode_sequences(feats, &masks, &gru, 8);
        let data: Vec<f32> = enc.into_data().to_vec().unwrap();

        let row = |b: usize, e: usize| &data[(b * 3 + e) * 8..(b * 3 + e + 1) * 8];
        assert!(row(0, 1).iter().all(|&v| v == 0.0));
        assert!(row(1, 2).iter().all(|&v| v == 0.0));
        assert!(row(0, 0).iter().any(|&v| v != 0.0));
        assert!(row(0, 2).iter().any(|&v| v != 0.0));
        assert!(row(1, 0).iter().any(|&v| v != 0.0));
        assert!(row(1, 1).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_encoding_depends_on_sequence_length() {
        let device = Default::default();
        let gru = test_gru(4, 8);
        let feats = Tensor::<TestBackend, 4>::random(
            [1, 2, 5, 4],
            burn::tensor::Distribution::Uniform(0.1, 1.0),
            &device,
        );
        let short = grid_mask(1, 2, 5, 4, &[&[2, 2]]);
        let long = grid_mask(1, 2, 5, 4, &[&[5, 5]]);

        let enc_short = encode_sequences(feats.clone(), &short, &gru, 8);
        let enc_long = encode_sequences(feats, &long, &gru, 8);

        let a: Vec<f32> = enc_short.into_data().to_vec().unwrap();
        let b: Vec<f32> = enc_long.into_data().to_vec().unwrap();
        let max_diff = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max);
        assert!(max_diff > 1e-6);
    }

    #[test]
    #[should_panic(expected = "feature/mask shape mismatch")]
    fn test_shape_mismatch_panics() {
        let device = Default::default();
        let gru = test_gru(4, 8);
        let feats = Tensor::<TestBackend, 4>::zeros([2, 3, 5, 4], &device);
        let masks = Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device);
        encode_sequences(feats, &masks, &gru, 8);
    }
}
