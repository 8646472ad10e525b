//! Decoder pipeline: parse -> per-tile dequantize/inverse DWT -> assemble
//! volume (spec.md §4.I).

use crate::config::{DecoderConfig, WaveletFilter};
use crate::dwt::DwtEngine;
use crate::error::Jp3dError;
use crate::parser::{self, ParsedCodestream};
use crate::rate_control;
use crate::spatial::Region;
use crate::tile_codec;
use crate::tiling;
use crate::volume::{Component, Volume};

/// Result of a (possibly tolerant) decode.
pub struct DecodeResult {
    pub volume: Volume,
    pub partial: bool,
    pub warnings: Vec<String>,
}

fn wavelet_filter_from_id(id: u8) -> WaveletFilter {
    if id == 1 {
        WaveletFilter::Reversible53
    } else {
        WaveletFilter::Irreversible97
    }
}

fn write_tile_floats(buffer: &mut [f32], dims: (u32, u32, u32), region: &Region, tile_samples: &[f32]) {
    let w = region.width() as u32;
    let h = region.height() as u32;
    let d = region.depth() as u32;
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                let src = (z as usize * h as usize + y as usize) * w as usize + x as usize;
                let dx = region.x0 as u32 + x;
                let dy = region.y0 as u32 + y;
                let dz = region.z0 as u32 + z;
                let dst = (dz as usize * dims.1 as usize + dy as usize) * dims.0 as usize + dx as usize;
                buffer[dst] = tile_samples[src];
            }
        }
    }
}

/// Decodes one parsed tile into per-component float contributions, writing
/// them into `component_buffers` at the tile's region.
pub(crate) fn decode_tile_into_buffers(
    parsed: &ParsedCodestream,
    tile: &crate::parser::ParsedTile,
    dims: (u32, u32, u32),
    component_buffers: &mut [Vec<f32>],
) -> Result<(), Jp3dError> {
    let grid_tiles_x = parsed.siz.width.div_ceil(parsed.siz.tile_width.max(1)) as i64;
    let grid_tiles_y = parsed.siz.height.div_ceil(parsed.siz.tile_height.max(1)) as i64;
    let tile_geometry = tiling::tile_at_index(
        dims,
        (parsed.siz.tile_width, parsed.siz.tile_height, parsed.siz.tile_depth),
        grid_tiles_x,
        grid_tiles_y,
        tile.index as i64,
    );
    let region = tile_geometry.region;
    let tw = region.width() as u32;
    let th = region.height() as u32;
    let td = region.depth() as u32;
    if tw == 0 || th == 0 || td == 0 {
        return Ok(());
    }
    let voxel_count = tw as usize * th as usize * td as usize;
    let voxel_counts = vec![voxel_count; parsed.siz.components.len()];

    let quantized_components = if parsed.cod.is_ht {
        let (_header, components) = tile_codec::decode_ht_prefixed(&tile.payload, &voxel_counts)?;
        components
    } else {
        tile_codec::decode_raw(&tile.payload, &voxel_counts)?
    };

    let filter = wavelet_filter_from_id(parsed.cod.wavelet_id);
    let dwt = DwtEngine::new(filter, crate::config::BoundaryMode::Symmetric);
    let tile_levels = parsed.cod.levels.clamped_to(tw, th, td);

    for (ci, component_info) in parsed.siz.components.iter().enumerate() {
        let step = if parsed.qcd.is_lossless() {
            1.0
        } else {
            parsed
                .qcd
                .component_steps
                .get(ci)
                .copied()
                .unwrap_or_else(|| rate_control::step_size(&crate::config::CompressionMode::Lossy { target_psnr: 40.0 }, component_info.bit_depth, parsed.cod.levels.max()))
        };
        let mut samples: Vec<f32> = quantized_components[ci]
            .iter()
            .map(|&q| rate_control::dequantize(q, step))
            .collect();
        dwt.inverse(&mut samples, (tw, th, td), tile_levels)?;
        write_tile_floats(&mut component_buffers[ci], dims, &region, &samples);
    }
    Ok(())
}

fn pack_components(parsed: &ParsedCodestream, dims: (u32, u32, u32), buffers: Vec<Vec<f32>>) -> Vec<Component> {
    let (w, h, d) = dims;
    parsed
        .siz
        .components
        .iter()
        .enumerate()
        .map(|(ci, info)| {
            let mut component = Component::new_zeroed(ci as u32, w, h, d, info.bit_depth, info.signed).unwrap();
            for z in 0..d {
                for y in 0..h {
                    for x in 0..w {
                        let idx = (z as usize * h as usize + y as usize) * w as usize + x as usize;
                        let value = buffers[ci][idx].round() as i64;
                        component.set_sample_at(x, y, z, value);
                    }
                }
            }
            component
        })
        .collect()
}

/// Parses `bytes` and reconstructs the full volume.
pub fn decode(bytes: &[u8], config: &DecoderConfig) -> Result<DecodeResult, Jp3dError> {
    let parsed = parser::parse(bytes)?;
    decode_parsed(&parsed, config)
}

pub(crate) fn decode_parsed(parsed: &ParsedCodestream, config: &DecoderConfig) -> Result<DecodeResult, Jp3dError> {
    let dims = (parsed.siz.width, parsed.siz.height, parsed.siz.depth);
    let mut buffers: Vec<Vec<f32>> = parsed
        .siz
        .components
        .iter()
        .map(|_| vec![0.0f32; dims.0 as usize * dims.1 as usize * dims.2 as usize])
        .collect();

    let mut warnings = Vec::new();
    let mut partial = false;

    for tile in &parsed.tiles {
        match decode_tile_into_buffers(parsed, tile, dims, &mut buffers) {
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

    let components = pack_components(parsed, dims, buffers);
    let volume = Volume {
        width: dims.0,
        height: dims.1,
        depth: dims.2,
        components,
    };
    Ok(DecodeResult { volume, partial, warnings })
}
