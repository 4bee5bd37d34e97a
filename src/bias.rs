//! Cached ALiBi bias construction and serving.

use candle_core::{Device, Result, Tensor};

use crate::config::{AlibiConfig, LayerType};
use crate::relative::build_relative_position;
use crate::slopes::build_slopes;

/// Precomputed ALiBi relative position bias.
///
/// Holds the per-head slope tensor and a relative-position tensor covering
/// sequences up to `max_seq_len`. [`compute`](Self::compute) slices, masks,
/// and scales the cached tensor; requests beyond the cached bound rebuild a
/// working tensor on the fly without touching the cache.
///
/// The value is read-only after construction, so sharing it across threads
/// needs no internal locking; callers that replace the whole value must
/// synchronize that swap themselves.
#[derive(Debug, Clone)]
pub struct AlibiBias {
    bidirectional: bool,
    num_attention_heads: usize,
    layer_type: LayerType,
    alibi_num_heads: usize,
    max_seq_len: usize,
    device: Device,
    slopes: Tensor,
    relative_position: Tensor,
}

impl AlibiBias {
    /// Validate the configuration and eagerly build the slope and
    /// relative-position caches on `device`.
    ///
    /// The distance cache costs O(heads * max_seq_len^2) memory in exchange
    /// for a slice-only fast path on every in-bound request.
    pub fn new(config: AlibiConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let alibi_num_heads = config.effective_alibi_heads();
        let slopes = build_slopes(config.num_attention_heads, alibi_num_heads, device)?;
        let relative_position = build_relative_position(
            config.max_seq_len,
            config.max_seq_len,
            config.num_attention_heads,
            device,
        )?;
        log::debug!(
            "alibi cache ready: heads={} biased={} max_seq_len={}",
            config.num_attention_heads,
            alibi_num_heads,
            config.max_seq_len
        );

        Ok(Self {
            bidirectional: config.bidirectional,
            num_attention_heads: config.num_attention_heads,
            layer_type: config.layer_type,
            alibi_num_heads,
            max_seq_len: config.max_seq_len,
            device: device.clone(),
            slopes,
            relative_position,
        })
    }

    /// Serve the bias for a `(query_seq_length, key_seq_length)` request.
    ///
    /// Returns a tensor shaped `(1, num_attention_heads, query_seq_length,
    /// key_seq_length)` holding `slope[h] * |i - j|`, zeroed wherever the key
    /// position lies in the query's future when the bias is not
    /// bidirectional.
    ///
    /// Requests where `max(query_seq_length, key_seq_length)` exceeds the
    /// cached bound recompute the distance tensor on every call; size
    /// `max_seq_len` for the longest sequence you expect to avoid that cost.
    /// Sequence lengths are trusted to be positive.
    pub fn compute(&self, query_seq_length: usize, key_seq_length: usize) -> Result<Tensor> {
        let needed = query_seq_length.max(key_seq_length);

        let relative_position = if needed > self.max_seq_len {
            log::debug!(
                "alibi request for {} positions exceeds cached bound {}, rebuilding uncached",
                needed,
                self.max_seq_len
            );
            build_relative_position(needed, needed, self.num_attention_heads, &self.device)?
        } else {
            self.relative_position.clone()
        };

        let mut relative_position = relative_position
            .narrow(1, 0, query_seq_length)?
            .narrow(2, 0, key_seq_length)?;

        if !self.bidirectional {
            let keep = causal_keep_mask(query_seq_length, key_seq_length, &self.device)?;
            relative_position = relative_position.broadcast_mul(&keep)?;
        }

        relative_position.broadcast_mul(&self.slopes)?.unsqueeze(0)
    }

    /// Whether future positions contribute to the bias.
    pub fn bidirectional(&self) -> bool {
        self.bidirectional
    }

    /// Total number of attention heads served.
    pub fn num_attention_heads(&self) -> usize {
        self.num_attention_heads
    }

    /// Encoder/decoder tag, passed through for the attention layer.
    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    /// Number of heads with a non-zero slope.
    pub fn alibi_num_heads(&self) -> usize {
        self.alibi_num_heads
    }

    /// Sequence length bound covered by the distance cache.
    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    /// Device every served tensor lives on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Cached slope tensor, shaped `(num_attention_heads, 1, 1)`.
    pub fn slopes(&self) -> &Tensor {
        &self.slopes
    }
}

/// Lower-triangular keep mask shaped `(q_len, k_len)`: `1.0` where the key
/// index does not exceed the query index, `0.0` elsewhere.
fn causal_keep_mask(q_len: usize, k_len: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![1f32; q_len * k_len];
    for q in 0..q_len {
        let row_start = q * k_len;
        for k in (q + 1)..k_len {
            data[row_start + k] = 0.0;
        }
    }
    Tensor::from_vec(data, (q_len, k_len), device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_mask_is_lower_triangular() -> Result<()> {
        let mask = causal_keep_mask(3, 3, &Device::Cpu)?;
        let values = mask.flatten_all()?.to_vec1::<f32>()?;
        #[rustfmt::skip]
        let expected = [
            1.0, 0.0, 0.0,
            1.0, 1.0, 0.0,
            1.0, 1.0, 1.0,
        ];
        assert_eq!(values, expected);
        Ok(())
    }

    #[test]
    fn keep_mask_handles_wide_key_windows() -> Result<()> {
        // No query offset: keys past the query index stay masked even when
        // there are more keys than queries.
        let mask = causal_keep_mask(2, 4, &Device::Cpu)?;
        let values = mask.flatten_all()?.to_vec1::<f32>()?;
        #[rustfmt::skip]
        let expected = [
            1.0, 0.0, 0.0, 0.0,
            1.0, 1.0, 0.0, 0.0,
        ];
        assert_eq!(values, expected);
        Ok(())
    }
}
