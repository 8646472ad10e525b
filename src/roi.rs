//! Region-of-interest decoder: intersects a requested region with the tile
//! grid and decodes only the intersecting tiles (spec.md §4.J).

use crate::config::DecoderConfig;
use crate::decoder::{self, DecodeResult};
use crate::error::Jp3dError;
use crate::parser::{self, ParsedCodestream};
use crate::spatial::Region;
use crate::tiling;
use crate::volume::{Component, Volume};

fn tile_region(parsed: &ParsedCodestream, dims: (u32, u32, u32), tile_index: u16) -> Region {
    let grid_tiles_x = parsed.siz.width.div_ceil(parsed.siz.tile_width.max(1)) as i64;
    let grid_tiles_y = parsed.siz.height.div_ceil(parsed.siz.tile_height.max(1)) as i64;
    tiling::tile_at_index(
        dims,
        (parsed.siz.tile_width, parsed.siz.tile_height, parsed.siz.tile_depth),
        grid_tiles_x,
        grid_tiles_y,
        tile_index as i64,
    )
    .region
}

/// Decodes only the tiles intersecting `requested`, clamped to the volume,
/// returning a volume shaped exactly to the clamped region. An empty
/// clamped region yields a zero-sized, all-tiles-skipped result.
pub fn decode_region(bytes: &[u8], requested: &Region, config: &DecoderConfig) -> Result<DecodeResult, Jp3dError> {
    let parsed = parser::parse(bytes)?;
    let dims = (parsed.siz.width, parsed.siz.height, parsed.siz.depth);
    let volume_region = Region::from_origin_extent(0, 0, 0, dims.0 as i64, dims.1 as i64, dims.2 as i64);
    let clamped = match requested.intersect(&volume_region) {
        Some(r) => r,
        None => {
            return Ok(DecodeResult {
                volume: Volume {
                    width: 0,
                    height: 0,
                    depth: 0,
                    components: Vec::new(),
                },
                partial: false,
                warnings: Vec::new(),
            })
        }
    };

    if clamped == volume_region {
        return decoder::decode_parsed(&parsed, config);
    }

    let mut buffers: Vec<Vec<f32>> = parsed
        .siz
        .components
        .iter()
        .map(|_| vec![0.0f32; dims.0 as usize * dims.1 as usize * dims.2 as usize])
        .collect();

    let mut warnings = Vec::new();
    let mut partial = false;

    for tile in &parsed.tiles {
        let region = tile_region(&parsed, dims, tile.index);
        if region.intersect(&clamped).is_none() {
            continue;
        }
        match decoder::decode_tile_into_buffers(&parsed, tile, dims, &mut buffers) {
            Ok(()) => {}
            Err(e) => {
                if config.tolerate_errors {
                    warnings.push(format!("tile {}: {}", tile.index, e));
                    partial = true;
                } else {
                    return Err(e);
                }
            }
        }
    }

    let roi_w = clamped.width() as u32;
    let roi_h = clamped.height() as u32;
    let roi_d = clamped.depth() as u32;
    let components: Vec<Component> = parsed
        .siz
        .components
        .iter()
        .enumerate()
        .map(|(ci, info)| {
            let mut component = Component::new_zeroed(ci as u32, roi_w, roi_h, roi_d, info.bit_depth, info.signed).unwrap();
            for z in 0..roi_d {
                for y in 0..roi_h {
                    for x in 0..roi_w {
                        let sx = clamped.x0 as u32 + x;
                        let sy = clamped.y0 as u32 + y;
                        let sz = clamped.z0 as u32 + z;
                        let src = (sz as usize * dims.1 as usize + sy as usize) * dims.0 as usize + sx as usize;
                        let value = buffers[ci][src].round() as i64;
                        component.set_sample_at(x, y, z, value);
                    }
                }
            }
            component
        })
        .collect();

    Ok(DecodeResult {
        volume: Volume {
            width: roi_w,
            height: roi_h,
            depth: roi_d,
            components,
        },
        partial,
        warnings,
    })
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

    fn lossless_config() -> EncoderConfig {
        EncoderConfig {
            tiling: TilingConfig::new(2, 2, 1).unwrap(),
            mode: CompressionMode::Lossless,
            levels: DecompositionLevels { x: 1, y: 1, z: 0 },
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        }
    }

    #[test]
    fn roi_equals_crop_of_full_decode() {
        let v = gradient_volume(6, 6, 1);
        let cfg = lossless_config();
        let bytes = encoder::encode(&v, &cfg).unwrap();

        let full = decoder::decode(&bytes, &DecoderConfig::default()).unwrap();
        let region = Region::from_origin_extent(2, 1, 0, 3, 4, 1);
        let roi = decode_region(&bytes, &region, &DecoderConfig::default()).unwrap();

        assert_eq!(roi.volume.width, 3);
        assert_eq!(roi.volume.height, 4);
        assert_eq!(roi.volume.depth, 1);
        for y in 0..4u32 {
            for x in 0..3u32 {
                let expected = full.volume.components[0].sample_at(2 + x, 1 + y, 0);
                let actual = roi.volume.components[0].sample_at(x, y, 0);
                assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn roi_outside_volume_is_empty() {
        let v = gradient_volume(4, 4, 1);
        let cfg = lossless_config();
        let bytes = encoder::encode(&v, &cfg).unwrap();
        let region = Region::from_origin_extent(100, 100, 0, 4, 4, 1);
        let roi = decode_region(&bytes, &region, &DecoderConfig::default()).unwrap();
        assert_eq!(roi.volume.width, 0);
        assert!(roi.volume.components.is_empty());
    }

    #[test]
    fn roi_equal_to_full_volume_delegates() {
        let v = gradient_volume(4, 4, 1);
        let cfg = lossless_config();
        let bytes = encoder::encode(&v, &cfg).unwrap();
        let region = Region::from_origin_extent(0, 0, 0, 4, 4, 1);
        let roi = decode_region(&bytes, &region, &DecoderConfig::default()).unwrap();
        assert_eq!(roi.volume.width, 4);
        assert_eq!(roi.volume.height, 4);
    }
}
