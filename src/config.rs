//! Configuration for the ALiBi bias module.

use candle_core::{bail, Result};

/// Marks whether the owning attention layer sits in the encoder or decoder
/// stack.
///
/// The tag carries no behavior here; an external attention component reads it
/// to select its distributed reduction group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerType {
    Encoder,
    #[default]
    Decoder,
}

/// Configuration driving ALiBi bias construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlibiConfig {
    /// Whether distances are penalized symmetrically in both directions.
    /// When `false`, key positions in a query's future are masked to zero.
    pub bidirectional: bool,
    /// Total number of attention heads served by the bias.
    pub num_attention_heads: usize,
    /// Encoder/decoder tag forwarded to the attention layer unchanged.
    pub layer_type: LayerType,
    /// Number of heads that receive a non-zero slope; `None` biases all
    /// heads. The remaining heads get a slope of exactly zero.
    pub alibi_num_heads: Option<usize>,
    /// Sequence length covered by the precomputed distance cache. Longer
    /// requests recompute the distance tensor on every call.
    pub max_seq_len: usize,
}

impl Default for AlibiConfig {
    fn default() -> Self {
        Self {
            bidirectional: false,
            num_attention_heads: 0,
            layer_type: LayerType::default(),
            alibi_num_heads: None,
            max_seq_len: 512,
        }
    }
}

impl AlibiConfig {
    /// Number of heads that actually receive a bias slope.
    pub fn effective_alibi_heads(&self) -> usize {
        self.alibi_num_heads.unwrap_or(self.num_attention_heads)
    }

    /// Validate structural invariants before any tensor work happens.
    pub fn validate(&self) -> Result<()> {
        if self.num_attention_heads == 0 {
            bail!("num_attention_heads must be greater than zero");
        }
        if self.max_seq_len == 0 {
            bail!("max_seq_len must be greater than zero");
        }
        if let Some(alibi_num_heads) = self.alibi_num_heads {
            if alibi_num_heads == 0 {
                bail!("alibi_num_heads must be greater than zero");
            }
            if alibi_num_heads > self.num_attention_heads {
                bail!(
                    "alibi_num_heads ({}) cannot be larger than num_attention_heads ({})",
                    alibi_num_heads,
                    self.num_attention_heads
                );
            }
        }
        Ok(())
    }
}
