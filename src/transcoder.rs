//! Transcoder: rewrites tile payloads between raw and HT-prefixed framing
//! without touching geometry, with optional round-trip verification
//! (spec.md §4.M).

use crate::builder::{self, TilePayload};
use crate::config::{EncoderConfig, HtConfig};
use crate::error::Jp3dError;
use crate::parser::{self, ParsedCodestream};
use crate::tile_codec;

/// Which direction to rewrite tile payloads in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    StandardToHt,
    HtToStandard,
}

fn voxel_counts(parsed: &ParsedCodestream, tile_index: u16, dims: (u32, u32, u32)) -> Vec<usize> {
    let grid_tiles_x = parsed.siz.width.div_ceil(parsed.siz.tile_width.max(1)) as i64;
    let grid_tiles_y = parsed.siz.height.div_ceil(parsed.siz.tile_height.max(1)) as i64;
    let tile = crate::tiling::tile_at_index(
        dims,
        (parsed.siz.tile_width, parsed.siz.tile_height, parsed.siz.tile_depth),
        grid_tiles_x,
        grid_tiles_y,
        tile_index as i64,
    );
    let voxel_count = (tile.region.width() * tile.region.height() * tile.region.depth()).max(0) as usize;
    vec![voxel_count; parsed.siz.components.len()]
}

fn rewrite_tile(
    parsed: &ParsedCodestream,
    payload: &[u8],
    tile_index: u16,
    dims: (u32, u32, u32),
    direction: Direction,
    ht: &HtConfig,
) -> Result<Vec<u8>, Jp3dError> {
    let counts = voxel_counts(parsed, tile_index, dims);
    match direction {
        Direction::StandardToHt => {
            let components = tile_codec::decode_raw(payload, &counts)?;
            Ok(tile_codec::encode_tile(&components, crate::config::BlockMode::Ht, ht))
        }
        Direction::HtToStandard => {
            if parsed.cod.is_ht {
                let header = tile_codec::read_ht_header(payload)?;
                if header.is_ht {
                    let (_h, components) = tile_codec::decode_ht_prefixed(payload, &counts)?;
                    Ok(tile_codec::encode_tile(&components, crate::config::BlockMode::Legacy, ht))
                } else {
                    Ok(payload[4..].to_vec())
                }
            } else {
                Ok(payload.to_vec())
            }
        }
    }
}

/// Rewrites every tile payload in `bytes` in `direction`, preserving SIZ/COD
/// geometry from the source. When `verify` is set, each transcoded tile is
/// decoded alongside the original and the recovered coefficients must match
/// exactly, or the call fails with `Encoding`.
pub fn transcode(bytes: &[u8], direction: Direction, ht: &HtConfig, verify: bool) -> Result<Vec<u8>, Jp3dError> {
    let parsed = parser::parse(bytes)?;
    let dims = (parsed.siz.width, parsed.siz.height, parsed.siz.depth);

    let mut payloads = Vec::with_capacity(parsed.tiles.len());
    for tile in &parsed.tiles {
        let counts = voxel_counts(&parsed, tile.index, dims);
        let rewritten = rewrite_tile(&parsed, &tile.payload, tile.index, dims, direction, ht)?;

        if verify {
            let original_components = read_components(&parsed, &tile.payload, &counts)?;
            let new_parsed_is_ht = direction == Direction::StandardToHt;
            let rewritten_components = if new_parsed_is_ht {
                let (_h, c) = tile_codec::decode_ht_prefixed(&rewritten, &counts)?;
                c
            } else {
                tile_codec::decode_raw(&rewritten, &counts)?
            };
            if original_components != rewritten_components {
                return Err(Jp3dError::encoding(format!(
                    "transcode verification failed for tile {}",
                    tile.index
                )));
            }
        }

        payloads.push(TilePayload {
            linear_index: tile.index as i64,
            bytes: rewritten,
        });
    }

    let volume_stub = crate::volume::Volume {
        width: dims.0,
        height: dims.1,
        depth: dims.2,
        components: parsed
            .siz
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| crate::volume::Component::new_zeroed(i as u32, dims.0, dims.1, dims.2, c.bit_depth, c.signed))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut config = EncoderConfig {
        tiling: crate::config::TilingConfig::new(parsed.siz.tile_width, parsed.siz.tile_height, parsed.siz.tile_depth)?,
        mode: if direction == Direction::StandardToHt {
            if parsed.qcd.is_lossless() {
                crate::config::CompressionMode::LosslessHT
            } else {
                crate::config::CompressionMode::LossyHT { target_psnr: 40.0 }
            }
        } else if parsed.qcd.is_lossless() {
            crate::config::CompressionMode::Lossless
        } else {
            crate::config::CompressionMode::Lossy { target_psnr: 40.0 }
        },
        levels: parsed.cod.levels,
        boundary: crate::config::BoundaryMode::Symmetric,
        quality_layers: parsed.cod.quality_layers,
        progression_order: parsed.cod.progression_order,
        ht: *ht,
    };
    config = config.validated()?;

    let guard_bits = parsed.qcd.guard_bits;
    let steps = if parsed.qcd.component_steps.is_empty() {
        vec![1.0; parsed.siz.components.len()]
    } else {
        parsed.qcd.component_steps.clone()
    };

    builder::build_codestream(&volume_stub, &config, parsed.cod.levels, &steps, guard_bits, payloads)
}

fn read_components(parsed: &ParsedCodestream, payload: &[u8], counts: &[usize]) -> Result<Vec<Vec<i32>>, Jp3dError> {
    if parsed.cod.is_ht {
        let (_h, c) = tile_codec::decode_ht_prefixed(payload, counts)?;
        Ok(c)
    } else {
        tile_codec::decode_raw(payload, counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryMode, CompressionMode, DecompositionLevels, ProgressionOrder, TilingConfig};
    use crate::encoder;
    use crate::volume::{Component, Volume};

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

    #[test]
    fn standard_to_ht_then_back_preserves_decode() {
        let v = gradient_volume(4, 4, 2);
        let cfg = EncoderConfig {
            tiling: TilingConfig::new(4, 4, 2).unwrap(),
            mode: CompressionMode::Lossless,
            levels: DecompositionLevels { x: 1, y: 1, z: 0 },
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        };
        let standard_bytes = encoder::encode(&v, &cfg).unwrap();

        let ht_bytes = transcode(&standard_bytes, Direction::StandardToHt, &HtConfig::default(), true).unwrap();
        let parsed_ht = parser::parse(&ht_bytes).unwrap();
        assert!(parsed_ht.cod.is_ht);

        let back_bytes = transcode(&ht_bytes, Direction::HtToStandard, &HtConfig::default(), true).unwrap();
        let decoded = crate::decoder::decode(&back_bytes, &crate::config::DecoderConfig::default()).unwrap();
        for z in 0..2u32 {
            for y in 0..4u32 {
                for x in 0..4u32 {
                    assert_eq!(
                        decoded.volume.components[0].sample_at(x, y, z),
                        v.components[0].sample_at(x, y, z)
                    );
                }
            }
        }
    }

    #[test]
    fn standard_to_standard_is_a_passthrough_round_trip() {
        let v = gradient_volume(4, 4, 1);
        let cfg = EncoderConfig {
            tiling: TilingConfig::new(4, 4, 1).unwrap(),
            mode: CompressionMode::Lossless,
            levels: DecompositionLevels { x: 1, y: 1, z: 0 },
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        };
        let bytes = encoder::encode(&v, &cfg).unwrap();
        let rewritten = transcode(&bytes, Direction::HtToStandard, &HtConfig::default(), true).unwrap();
        let decoded = crate::decoder::decode(&rewritten, &crate::config::DecoderConfig::default()).unwrap();
        for y in 0..4u32 {
            for x in 0..4u32 {
                assert_eq!(
                    decoded.volume.components[0].sample_at(x, y, 0),
                    v.components[0].sample_at(x, y, 0)
                );
            }
        }
    }
}
