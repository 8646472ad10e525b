//! Quantization step-size selection, scalar deadzone quantization, and the
//! quality-layer wire model (spec.md §4.D).
//!
//! The deadzone shape follows the teacher's `quantize_scalar`, generalized
//! from its optional 0.5-bin reconstruction bias to the spec's simpler,
//! unbiased `q = sign(c)*floor(|c|/step)` / `c = q*step` round trip (bias
//! removed because a lossless `step=1` round trip must be bit-identical,
//! and the spec gives no bias term).

use crate::config::CompressionMode;

/// Selects the scalar quantization step size for a component's bit depth
/// `b` and, for `TargetBitrate`, decomposition level count `levels`.
pub fn step_size(mode: &CompressionMode, bit_depth: u8, levels: u8) -> f64 {
    match mode {
        CompressionMode::Lossless | CompressionMode::LosslessHT => 1.0,
        CompressionMode::Lossy { target_psnr }
        | CompressionMode::LossyHT {
            target_psnr,
        } => step_from_psnr(bit_depth, *target_psnr),
        CompressionMode::VisuallyLossless => step_from_psnr(bit_depth, 50.0),
        CompressionMode::TargetBitrate { bits_per_voxel } => {
            let b = bit_depth as f64;
            let exponent = (b - *bits_per_voxel).max(0.0);
            (2f64.powf(exponent) / ((levels as f64) + 1.0).sqrt()).max(1.0)
        }
    }
}

fn step_from_psnr(bit_depth: u8, target_psnr: f64) -> f64 {
    let peak = (2f64.powi(bit_depth as i32) - 1.0).powi(2);
    let mse = peak / 10f64.powf(target_psnr / 10.0);
    (12.0 * mse).sqrt().max(1.0)
}

/// Quantizes a coefficient. Lossless (`step == 1.0`) rounds to the nearest
/// integer and is bit-identical on dequantization; lossy applies scalar
/// deadzone quantization.
pub fn quantize(coeff: f32, step: f64) -> i32 {
    if step <= 1.0 {
        return coeff.round() as i32;
    }
    let c = coeff as f64;
    let sign = if c < 0.0 { -1.0 } else { 1.0 };
    (sign * (c.abs() / step).floor()) as i32
}

/// Dequantizes a coefficient (`step == 1.0` is bit-identical).
pub fn dequantize(q: i32, step: f64) -> f32 {
    if step <= 1.0 {
        return q as f32;
    }
    (q as f64 * step) as f32
}

/// One entry of the quality-layer wire metadata model (spec.md §4.D).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityLayer {
    pub target_bpv: f64,
    pub distortion_reduction: f64,
}

/// Builds the `layers`-entry quality-layer model for a maximum bitrate
/// `max_bpv`. Carried in the wire's COD metadata only; the tile payload
/// itself uses a single effective layer (spec.md §9, Open Questions).
pub fn quality_layer_model(layers: u16, max_bpv: f64) -> Vec<QualityLayer> {
    let n = layers.max(1) as f64;
    (0..layers.max(1))
        .map(|i| {
            let frac = (i as f64 + 1.0) / n;
            QualityLayer {
                target_bpv: max_bpv * frac,
                distortion_reduction: frac * frac,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_step_is_one() {
        assert_eq!(step_size(&CompressionMode::Lossless, 8, 5), 1.0);
        assert_eq!(step_size(&CompressionMode::LosslessHT, 16, 0), 1.0);
    }

    #[test]
    fn lossless_quantize_is_round_trip_identity() {
        for v in [-12.4f32, 0.0, 3.9, -0.49] {
            let q = quantize(v, 1.0);
            let d = dequantize(q, 1.0);
            assert_eq!(d, v.round());
        }
    }

    #[test]
    fn lossy_step_increases_as_psnr_drops() {
        let high = step_size(&CompressionMode::Lossy { target_psnr: 50.0 }, 8, 0);
        let low = step_size(&CompressionMode::Lossy { target_psnr: 30.0 }, 8, 0);
        assert!(low > high);
    }

    #[test]
    fn deadzone_quantize_matches_formula() {
        let step = 4.0;
        assert_eq!(quantize(10.0, step), 2);
        assert_eq!(quantize(-10.0, step), -2);
        assert_eq!(dequantize(2, step), 8.0);
    }

    #[test]
    fn quality_layer_model_is_monotonic() {
        let layers = quality_layer_model(3, 9.0);
        assert_eq!(layers.len(), 3);
        assert!((layers[2].target_bpv - 9.0).abs() < 1e-9);
        assert!((layers[2].distortion_reduction - 1.0).abs() < 1e-9);
        assert!(layers[0].target_bpv < layers[1].target_bpv);
    }
}
