//! Relative token distance tensor shared by all heads.

use candle_core::{Device, Result, Tensor};

/// Build the `(num_attention_heads, query_length, key_length)` tensor of
/// absolute token distances, with entry `(h, i, j) = |j - i|` for every head.
///
/// The distance matrix is identical across heads; per-head scaling happens
/// later through the slope tensor. Pure and deterministic for positive
/// lengths.
pub fn build_relative_position(
    query_length: usize,
    key_length: usize,
    num_attention_heads: usize,
    device: &Device,
) -> Result<Tensor> {
    let context_position = Tensor::arange(0f32, query_length as f32, device)?.unsqueeze(1)?;
    let memory_position = Tensor::arange(0f32, key_length as f32, device)?.unsqueeze(0)?;

    let relative_position = memory_position.broadcast_sub(&context_position)?.abs()?;
    relative_position
        .unsqueeze(0)?
        .expand((num_attention_heads, query_length, key_length))?
        .contiguous()
}
