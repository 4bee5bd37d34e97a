//! ALiBi relative position bias for transformer attention.
//!
//! Attention with Linear Biases penalizes attention scores in proportion to
//! token distance instead of adding learned positional embeddings. This crate
//! derives the per-head slopes, precomputes a relative-position distance
//! tensor up to a configured bound, and serves sliced, slope-scaled bias
//! tensors with layout `[1, num_heads, q_len, k_len]`.
//!
//! [`AlibiBias`] owns the caches. Construction is eager: the slope tensor and
//! the `(num_heads, max_seq_len, max_seq_len)` distance tensor are built up
//! front so the common serve path reduces to a slice and two broadcast
//! multiplies. Requests beyond the cached bound fall back to an uncached
//! rebuild on every call.
//!
//! All tensors are f32 on the device supplied at construction; callers may
//! downcast to bf16/fp16 at the usage site.

pub mod bias;
pub mod config;
pub mod relative;
pub mod slopes;

pub use bias::AlibiBias;
pub use config::{AlibiConfig, LayerType};
pub use relative::build_relative_position;
pub use slopes::{build_slopes, head_slopes};
