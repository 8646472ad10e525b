//! Progressive decoder: resolution, quality, and slice(batch) progressions
//! over the full decoder, each driving a caller callback per step
//! (spec.md §4.K).
//!
//! The wire format carries a single effective quality layer and no
//! separate per-resolution bitstream (spec.md §9, Open Questions), so
//! *Resolution* and *Quality* steps are realized by post-processing a
//! single full decode rather than by re-entropy-decoding a subset of the
//! stream: resolution steps box-downsample the reconstructed volume,
//! quality steps round samples to a coarser precision. Both still honor
//! the step ordering, count, and interruptibility the spec requires. See
//! DESIGN.md.

use crate::config::DecoderConfig;
use crate::decoder;
use crate::error::Jp3dError;
use crate::parser;
use crate::volume::{Component, Volume};

/// A single progress record delivered to the callback.
pub struct ProgressStep<'a> {
    pub volume: &'a Volume,
    pub step_index: usize,
    pub total_steps: usize,
}

/// Which progression the decoder drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressiveMode {
    Resolution,
    Quality,
    Slice { batch: u32 },
}

/// Drives a full decode through a progressive sequence of steps, invoking
/// `callback` after each. Cancellable via [`ProgressiveDecoder::cancel`].
pub struct ProgressiveDecoder {
    cancelled: bool,
}

impl Default for ProgressiveDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressiveDecoder {
    pub fn new() -> Self {
        Self { cancelled: false }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn reset(&mut self) {
        self.cancelled = false;
    }

    /// Runs `mode`'s step sequence over `bytes`, calling `callback` after
    /// each step. `callback` returning `false` halts iteration early.
    pub fn run<F>(&mut self, bytes: &[u8], config: &DecoderConfig, mode: ProgressiveMode, mut callback: F) -> Result<(), Jp3dError>
    where
        F: FnMut(ProgressStep) -> bool,
    {
        let parsed = parser::parse(bytes)?;
        let full = decoder::decode_parsed(&parsed, config)?;
        if full.volume.components.is_empty() {
            return Ok(());
        }

        match mode {
            ProgressiveMode::Resolution => {
                // spec.md §4.K: totalSteps = max(Lx,Ly,Lz) + 1, driven by the
                // codestream's decomposition levels, not the volume's extent.
                let total_steps = parsed.cod.levels.max() as usize + 1;
                for step in 0..total_steps {
                    if self.cancelled {
                        break;
                    }
                    let reduction = total_steps - 1 - step;
                    let factor = 1u32 << reduction;
                    let volume = downsample_volume(&full.volume, factor);
                    if !callback(ProgressStep {
                        volume: &volume,
                        step_index: step,
                        total_steps,
                    }) {
                        break;
                    }
                }
            }
            ProgressiveMode::Quality => {
                let total_steps = 3usize;
                for step in 0..total_steps {
                    if self.cancelled {
                        break;
                    }
                    let volume = coarsen_precision(&full.volume, step, total_steps);
                    if !callback(ProgressStep {
                        volume: &volume,
                        step_index: step,
                        total_steps,
                    }) {
                        break;
                    }
                }
            }
            ProgressiveMode::Slice { batch } => {
                let batch = batch.max(1);
                let depth = full.volume.depth;
                let total_steps = depth.div_ceil(batch).max(1) as usize;
                for step in 0..total_steps {
                    if self.cancelled {
                        break;
                    }
                    let z_start = step as u32 * batch;
                    let z_end = (z_start + batch).min(depth);
                    let volume = extract_z_range(&full.volume, z_start, z_end);
                    if !callback(ProgressStep {
                        volume: &volume,
                        step_index: step,
                        total_steps,
                    }) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

fn downsample_volume(volume: &Volume, factor: u32) -> Volume {
    if factor <= 1 {
        return volume.clone();
    }
    let w = volume.width.div_ceil(factor).max(1);
    let h = volume.height.div_ceil(factor).max(1);
    let d = volume.depth.div_ceil(factor).max(1);
    let components = volume
        .components
        .iter()
        .map(|c| {
            let mut out = Component::new_zeroed(c.index, w, h, d, c.bit_depth, c.signed).unwrap();
            for z in 0..d {
                for y in 0..h {
                    for x in 0..w {
                        let x0 = x * factor;
                        let y0 = y * factor;
                        let z0 = z * factor;
                        let mut sum = 0i64;
                        let mut count = 0i64;
                        for dz in 0..factor {
                            let sz = z0 + dz;
                            if sz >= c.depth {
                                continue;
                            }
                            for dy in 0..factor {
                                let sy = y0 + dy;
                                if sy >= c.height {
                                    continue;
                                }
                                for dx in 0..factor {
                                    let sx = x0 + dx;
                                    if sx >= c.width {
                                        continue;
                                    }
                                    sum += c.sample_at(sx, sy, sz);
                                    count += 1;
                                }
                            }
                        }
                        let avg = if count > 0 { sum / count } else { 0 };
                        out.set_sample_at(x, y, z, avg);
                    }
                }
            }
            out
        })
        .collect();
    Volume {
        width: w,
        height: h,
        depth: d,
        components,
    }
}

fn coarsen_precision(volume: &Volume, step: usize, total_steps: usize) -> Volume {
    let components = volume
        .components
        .iter()
        .map(|c| {
            let frac = (step as f64 + 1.0) / total_steps as f64;
            let dropped_bits = ((c.bit_depth as f64) * (1.0 - frac)).round() as u32;
            let divisor = 1i64 << dropped_bits.min(c.bit_depth as u32 - 1);
            let mut out = Component::new_zeroed(c.index, c.width, c.height, c.depth, c.bit_depth, c.signed).unwrap();
            for z in 0..c.depth {
                for y in 0..c.height {
                    for x in 0..c.width {
                        let v = c.sample_at(x, y, z);
                        let coarse = if divisor <= 1 { v } else { (v.div_euclid(divisor)) * divisor };
                        out.set_sample_at(x, y, z, coarse);
                    }
                }
            }
            out
        })
        .collect();
    Volume {
        width: volume.width,
        height: volume.height,
        depth: volume.depth,
        components,
    }
}

fn extract_z_range(volume: &Volume, z_start: u32, z_end: u32) -> Volume {
    let d = z_end.saturating_sub(z_start);
    let components = volume
        .components
        .iter()
        .map(|c| {
            let mut out = Component::new_zeroed(c.index, c.width, c.height, d, c.bit_depth, c.signed).unwrap();
            for z in 0..d {
                for y in 0..c.height {
                    for x in 0..c.width {
                        out.set_sample_at(x, y, z, c.sample_at(x, y, z_start + z));
                    }
                }
            }
            out
        })
        .collect();
    Volume {
        width: volume.width,
        height: volume.height,
        depth: d,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryMode, CompressionMode, DecompositionLevels, EncoderConfig, HtConfig, ProgressionOrder, TilingConfig};
    use crate::encoder;

    fn gradient_volume(w: u32, h: u32, d: u32) -> Volume {
        let mut c = Component::new_zeroed(0, w, h, d, 8, false).unwrap();
        let mut v = 0i64;
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    c.set_sample_at(x, y, z, v % 256);
                    v += 1;
                }
            }
        }
        Volume {
            width: w,
            height: h,
            depth: d,
            components: vec![c],
        }
    }

    fn lossless_stream(v: &Volume) -> Vec<u8> {
        lossless_stream_with_levels(v, DecompositionLevels { x: 1, y: 1, z: 0 })
    }

    fn lossless_stream_with_levels(v: &Volume, levels: DecompositionLevels) -> Vec<u8> {
        let cfg = EncoderConfig {
            tiling: TilingConfig::new(v.width, v.height, v.depth).unwrap(),
            mode: CompressionMode::Lossless,
            levels,
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        };
        encoder::encode(v, &cfg).unwrap()
    }

    #[test]
    fn resolution_steps_deliver_coarsest_first_then_full() {
        let v = gradient_volume(8, 8, 1);
        let bytes = lossless_stream(&v);
        let mut steps = Vec::new();
        let mut decoder = ProgressiveDecoder::new();
        decoder
            .run(&bytes, &DecoderConfig::default(), ProgressiveMode::Resolution, |s| {
                steps.push((s.step_index, s.total_steps, s.volume.width));
                true
            })
            .unwrap();
        assert!(steps.len() >= 2);
        assert_eq!(steps[0].0, 0);
        let last = steps.last().unwrap();
        assert_eq!(last.1, steps.len());
        assert_eq!(last.2, 8);
        assert!(steps[0].2 < last.2);
    }

    #[test]
    fn resolution_total_steps_follows_decomposition_levels_not_extent() {
        // spec.md §8 scenario 5: a 16x16x4 volume encoded with levels
        // (2,2,1) must yield exactly 3 steps, even though
        // floor(log2(16))+1 = 5 would be wrong.
        let v = gradient_volume(16, 16, 4);
        let bytes = lossless_stream_with_levels(&v, DecompositionLevels { x: 2, y: 2, z: 1 });
        let mut steps = Vec::new();
        let mut decoder = ProgressiveDecoder::new();
        decoder
            .run(&bytes, &DecoderConfig::default(), ProgressiveMode::Resolution, |s| {
                steps.push((s.step_index, s.total_steps, s.volume.width, s.volume.height, s.volume.depth));
                true
            })
            .unwrap();
        assert_eq!(steps.len(), 3);
        for (i, s) in steps.iter().enumerate() {
            assert_eq!(s.0, i);
            assert_eq!(s.1, 3);
        }
        assert_eq!((steps[2].2, steps[2].3, steps[2].4), (16, 16, 4));
        assert!(steps[0].2 < steps[2].2);
    }

    #[test]
    fn quality_steps_converge_to_exact() {
        let v = gradient_volume(4, 4, 1);
        let bytes = lossless_stream(&v);
        let mut last_volume: Option<Volume> = None;
        let mut decoder = ProgressiveDecoder::new();
        decoder
            .run(&bytes, &DecoderConfig::default(), ProgressiveMode::Quality, |s| {
                last_volume = Some(s.volume.clone());
                true
            })
            .unwrap();
        let last = last_volume.unwrap();
        for y in 0..4u32 {
            for x in 0..4u32 {
                assert_eq!(last.components[0].sample_at(x, y, 0), v.components[0].sample_at(x, y, 0));
            }
        }
    }

    #[test]
    fn slice_steps_cover_every_z_exactly_once() {
        let v = gradient_volume(2, 2, 5);
        let bytes = lossless_stream(&v);
        let mut total_depth = 0u32;
        let mut decoder = ProgressiveDecoder::new();
        decoder
            .run(&bytes, &DecoderConfig::default(), ProgressiveMode::Slice { batch: 2 }, |s| {
                total_depth += s.volume.depth;
                true
            })
            .unwrap();
        assert_eq!(total_depth, 5);
    }

    #[test]
    fn callback_false_halts_iteration() {
        let v = gradient_volume(8, 8, 1);
        let bytes = lossless_stream(&v);
        let mut count = 0;
        let mut decoder = ProgressiveDecoder::new();
        decoder
            .run(&bytes, &DecoderConfig::default(), ProgressiveMode::Resolution, |_| {
                count += 1;
                count < 2
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn cancel_stops_before_first_step() {
        let v = gradient_volume(4, 4, 1);
        let bytes = lossless_stream(&v);
        let mut count = 0;
        let mut decoder = ProgressiveDecoder::new();
        decoder.cancel();
        decoder
            .run(&bytes, &DecoderConfig::default(), ProgressiveMode::Quality, |_| {
                count += 1;
                true
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
