//! Encoder pipeline: validate -> tile -> DWT -> quantize -> tile-payload ->
//! build (spec.md §4.H).
//!
//! Follows the teacher's `J2kEncoder::encode` top-level shape (validate,
//! then a single pass over tiles, then one call into the builder),
//! generalized to per-tile-per-component 3-D processing.

use crate::builder::{self, TilePayload};
use crate::config::EncoderConfig;
use crate::dwt::DwtEngine;
use crate::error::Jp3dError;
use crate::rate_control;
use crate::tile_codec;
use crate::tiling;
use crate::volume::Volume;

fn validate(volume: &Volume) -> Result<(), Jp3dError> {
    if volume.width == 0 || volume.height == 0 || volume.depth == 0 {
        return Err(Jp3dError::invalid_parameter(format!(
            "volume dimensions must be >= 1, got {}x{}x{}",
            volume.width, volume.height, volume.depth
        )));
    }
    if volume.components.is_empty() {
        return Err(Jp3dError::invalid_parameter("component count must be >= 1"));
    }
    for c in &volume.components {
        if !(1..=38).contains(&c.bit_depth) {
            return Err(Jp3dError::InvalidBitDepth {
                depth: c.bit_depth as u32,
            });
        }
    }
    volume.validate()?;
    Ok(())
}

/// Encodes `volume` into a JP3D codestream under `config`.
pub fn encode(volume: &Volume, config: &EncoderConfig) -> Result<Vec<u8>, Jp3dError> {
    validate(volume)?;
    let config = config.clone().validated()?;

    let tiling = config.tiling.clamped_to(volume.width, volume.height, volume.depth);
    let tiles = tiling::tiles_for_volume(volume, &tiling);
    if tiles.is_empty() {
        return Err(Jp3dError::encoding("tiling produced zero tiles"));
    }

    let filter = config.mode.wavelet_filter();
    let dwt = DwtEngine::new(filter, config.boundary);

    let component_steps: Vec<f64> = volume
        .components
        .iter()
        .map(|c| rate_control::step_size(&config.mode, c.bit_depth, config.levels.max()))
        .collect();

    let grid = tiling::TileGrid::for_volume(volume, &tiling);
    let mut first_tile_levels = None;
    let mut payloads = Vec::with_capacity(tiles.len());

    for tile in &tiles {
        let tw = tile.region.width() as u32;
        let th = tile.region.height() as u32;
        let td = tile.region.depth() as u32;
        let tile_levels = config.levels.clamped_to(tw, th, td);
        if first_tile_levels.is_none() {
            first_tile_levels = Some(tile_levels);
        }

        let mut quantized_components = Vec::with_capacity(volume.components.len());
        for (ci, component) in volume.components.iter().enumerate() {
            let mut samples = tiling::extract_component_region(component, &tile.region);
            dwt.forward(&mut samples, (tw, th, td), tile_levels)
                .map_err(|e| Jp3dError::encoding(format!("tile ({},{},{}): {}", tile.ix, tile.iy, tile.iz, e)))?;
            let step = component_steps[ci];
            let quantized: Vec<i32> = samples.iter().map(|&c| rate_control::quantize(c, step)).collect();
            quantized_components.push(quantized);
        }

        let bytes = tile_codec::encode_tile(&quantized_components, config.ht.block_mode, &config.ht);
        let linear_index = tile.linear_index(grid.tiles_x, grid.tiles_y);
        payloads.push(TilePayload { linear_index, bytes });
    }

    let levels = first_tile_levels.unwrap_or_default();
    let guard_bits = 3u8;
    builder::build_codestream(volume, &config, levels, &component_steps, guard_bits, payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryMode, CompressionMode, DecompositionLevels, HtConfig, ProgressionOrder, TilingConfig};
    use crate::volume::Component;

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

    fn lossless_config(tiling: TilingConfig, levels: DecompositionLevels) -> EncoderConfig {
        EncoderConfig {
            tiling,
            mode: CompressionMode::Lossless,
            levels,
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        }
    }

    #[test]
    fn encode_single_tile_produces_codestream() {
        let v = gradient_volume(4, 4, 2);
        let cfg = lossless_config(
            TilingConfig::new(4, 4, 2).unwrap(),
            DecompositionLevels { x: 1, y: 1, z: 0 },
        );
        let bytes = encode(&v, &cfg).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0x4F]);
    }

    #[test]
    fn encode_rejects_bad_bit_depth() {
        let mut v = gradient_volume(2, 2, 1);
        v.components[0].bit_depth = 0;
        let cfg = lossless_config(TilingConfig::new(2, 2, 1).unwrap(), DecompositionLevels::default());
        assert!(encode(&v, &cfg).is_err());
    }

    #[test]
    fn tile_independence_same_bytes_alone_or_together() {
        let v = gradient_volume(5, 5, 1);
        let cfg = lossless_config(
            TilingConfig::new(2, 2, 1).unwrap(),
            DecompositionLevels { x: 1, y: 1, z: 0 },
        );
        let multi = encode(&v, &cfg).unwrap();
        let parsed = crate::parser::parse(&multi).unwrap();
        assert_eq!(parsed.tiles.len(), 9);

        // Re-encode a volume that is only the first tile's region, and
        // confirm its payload bytes match the corresponding tile in the
        // multi-tile stream.
        let single_cfg = lossless_config(
            TilingConfig::new(2, 2, 1).unwrap(),
            DecompositionLevels { x: 1, y: 1, z: 0 },
        );
        let mut single_component = Component::new_zeroed(0, 2, 2, 1, 8, false).unwrap();
        for y in 0..2u32 {
            for x in 0..2u32 {
                single_component.set_sample_at(x, y, 0, v.components[0].sample_at(x, y, 0));
            }
        }
        let single_volume = Volume {
            width: 2,
            height: 2,
            depth: 1,
            components: vec![single_component],
        };
        let single = encode(&single_volume, &single_cfg).unwrap();
        let single_parsed = crate::parser::parse(&single).unwrap();
        assert_eq!(single_parsed.tiles[0].payload, parsed.tiles[0].payload);
    }
}
