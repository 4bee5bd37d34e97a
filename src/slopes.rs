//! Per-head slope derivation for the ALiBi bias.
//!
//! For a power-of-two head count `n` the slopes form the geometric sequence
//! `r, r^2, ..., r^n` with `r = 2^(-8/n)`. Other head counts extend the
//! sequence of the closest lower power of two with every second slope of the
//! doubled count, which keeps the progression close to geometric.

use candle_core::{Device, Result, Tensor};

fn slopes_power_of_2(n: usize) -> Vec<f64> {
    let start = 2f64.powf(-(2f64.powf(-((n as f64).log2() - 3.0))));
    (0..n).map(|i| start * start.powi(i as i32)).collect()
}

/// Slope sequence for `alibi_num_heads` biased heads.
///
/// `alibi_num_heads` must be non-zero; the configured head counts are
/// validated before this runs.
pub fn head_slopes(alibi_num_heads: usize) -> Vec<f64> {
    debug_assert!(alibi_num_heads > 0, "head count must be non-zero");

    // Largest power of two <= alibi_num_heads.
    let closest_power_of_2 =
        1usize << (usize::BITS - 1 - alibi_num_heads.leading_zeros());

    let mut slopes = slopes_power_of_2(closest_power_of_2);
    if closest_power_of_2 != alibi_num_heads {
        // The doubled count is itself a power of two, so a single extension
        // step always covers the remaining heads.
        let remaining = alibi_num_heads - closest_power_of_2;
        slopes.extend(
            slopes_power_of_2(2 * closest_power_of_2)
                .into_iter()
                .step_by(2)
                .take(remaining),
        );
    }

    slopes
}

/// Slope tensor for all heads, shaped `(num_attention_heads, 1, 1)`.
///
/// Heads beyond `alibi_num_heads` receive a slope of exactly zero, disabling
/// the bias for them. The trailing singleton dims broadcast over the query
/// and key axes.
pub fn build_slopes(
    num_attention_heads: usize,
    alibi_num_heads: usize,
    device: &Device,
) -> Result<Tensor> {
    debug_assert!(
        alibi_num_heads <= num_attention_heads,
        "biased heads must not exceed total heads"
    );

    let mut slopes: Vec<f32> = head_slopes(alibi_num_heads)
        .into_iter()
        .map(|slope| slope as f32)
        .collect();
    slopes.resize(num_attention_heads, 0.0);

    Tensor::from_vec(slopes, (num_attention_heads, 1, 1), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn power_of_two_slopes_are_exact_halvings() {
        // r = 2^(-8/8) = 0.5, so the sequence is 0.5^1 .. 0.5^8.
        let slopes = head_slopes(8);
        let expected: Vec<f64> = (1..=8).map(|i| 0.5f64.powi(i)).collect();
        assert_eq!(slopes, expected);
    }

    #[test]
    fn non_power_of_two_interleaves_the_doubled_sequence() {
        let slopes = head_slopes(12);
        let expected = [
            0.5,
            0.25,
            0.125,
            0.0625,
            0.03125,
            0.015625,
            0.0078125,
            0.00390625,
            0.7071067811865476,
            0.35355339059327384,
            0.17677669529663692,
            0.08838834764831849,
        ];
        assert_eq!(slopes.len(), expected.len());
        for (got, want) in slopes.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }

    #[test]
    fn slopes_are_positive_and_non_increasing_within_each_run() {
        for heads in [1usize, 2, 3, 5, 8, 12, 20, 40] {
            let slopes = head_slopes(heads);
            assert_eq!(slopes.len(), heads);
            assert!(slopes.iter().all(|&s| s > 0.0));
        }

        // The power-of-two prefix itself strictly decreases.
        let slopes = head_slopes(16);
        for pair in slopes.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn disabled_heads_are_padded_with_zeros() -> Result<()> {
        let device = Device::Cpu;
        let slopes = build_slopes(8, 4, &device)?;
        assert_eq!(slopes.dims(), &[8, 1, 1]);

        let values = slopes.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(&values[..4], &[0.25, 0.0625, 0.015625, 0.00390625]);
        assert_eq!(&values[4..], &[0.0, 0.0, 0.0, 0.0]);

        Ok(())
    }
}
