//! Streaming writer: accepts volume slices out of order, scheduling
//! Z-tile rows for encoding as soon as they are complete (spec.md §4.L).

use crate::builder::{self, TilePayload};
use crate::config::EncoderConfig;
use crate::dwt::DwtEngine;
use crate::error::Jp3dError;
use crate::rate_control;
use crate::tile_codec;
use crate::tiling;
use crate::volume::{Component, Volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Encoding,
    Finalized,
    Cancelled,
}

/// Progress reported to the caller after each accepted slice.
pub struct SliceProgress {
    pub slices_received: u32,
    pub depth: u32,
}

/// Accepts slices of a volume in any Z order and incrementally encodes
/// complete Z-tile rows, preserving tile-index emission order regardless
/// of arrival order.
pub struct StreamingWriter {
    width: u32,
    height: u32,
    depth: u32,
    component_count: u32,
    bit_depth: u8,
    signed: bool,
    config: EncoderConfig,
    slices: Vec<Option<Vec<f32>>>,
    slices_received: u32,
    encoded_tiles: Vec<TilePayload>,
    state: State,
}

impl StreamingWriter {
    /// Opens a writer for a `width x height x depth` volume with
    /// `component_count` interleaved float components per slice.
    pub fn new(
        width: u32,
        height: u32,
        depth: u32,
        component_count: u32,
        bit_depth: u8,
        signed: bool,
        config: EncoderConfig,
    ) -> Self {
        Self {
            width,
            height,
            depth,
            component_count,
            bit_depth,
            signed,
            config,
            slices: (0..depth).map(|_| None).collect(),
            slices_received: 0,
            encoded_tiles: Vec::new(),
            state: State::Ready,
        }
    }

    /// Adds one Z-slice, laid out `comp*(W*H) + y*W + x`.
    pub fn add_slice(&mut self, slice_floats: &[f32], z_index: u32) -> Result<SliceProgress, Jp3dError> {
        if self.state != State::Ready && self.state != State::Encoding {
            return Err(Jp3dError::encoding(format!(
                "addSlice called in state {:?}",
                self.state
            )));
        }
        if z_index >= self.depth {
            return Err(Jp3dError::invalid_parameter(format!(
                "zIndex {z_index} out of range [0,{})",
                self.depth
            )));
        }
        let expected_len = self.width as usize * self.height as usize * self.component_count as usize;
        if slice_floats.len() != expected_len {
            return Err(Jp3dError::invalid_parameter(format!(
                "slice length {} does not match W*H*C = {}",
                slice_floats.len(),
                expected_len
            )));
        }

        self.slices[z_index as usize] = Some(slice_floats.to_vec());
        self.slices_received += 1;
        self.state = State::Encoding;
        self.flush_complete_tiles()?;

        Ok(SliceProgress {
            slices_received: self.slices_received,
            depth: self.depth,
        })
    }

    fn tiles_x(&self) -> i64 {
        let tz = self.config.tiling.clamped_to(self.width, self.height, self.depth);
        crate::spatial::tile_grid_count(self.width as i64, tz.tile_size_x as i64)
    }

    fn tiles_y(&self) -> i64 {
        let tz = self.config.tiling.clamped_to(self.width, self.height, self.depth);
        crate::spatial::tile_grid_count(self.height as i64, tz.tile_size_y as i64)
    }

    fn flush_complete_tiles(&mut self) -> Result<(), Jp3dError> {
        let tiling = self.config.tiling.clamped_to(self.width, self.height, self.depth);
        let tiles_z = crate::spatial::tile_grid_count(self.depth as i64, tiling.tile_size_z as i64);
        let tiles_x = self.tiles_x();
        let tiles_y = self.tiles_y();

        for tz in 0..tiles_z {
            let z_start = (tz * tiling.tile_size_z as i64) as u32;
            let z_end = (z_start + tiling.tile_size_z).min(self.depth);
            let row_complete = (z_start..z_end).all(|z| self.slices[z as usize].is_some());
            let prior_rows_done = self.encoded_tiles.len() as i64 == tz * tiles_x * tiles_y;
            if row_complete && prior_rows_done {
                self.encode_tile_row(tz, z_start, z_end, tiles_x, tiles_y)?;
                for z in z_start..z_end {
                    self.slices[z as usize] = None;
                }
            }
        }
        Ok(())
    }

    fn encode_tile_row(&mut self, tz: i64, z_start: u32, z_end: u32, tiles_x: i64, tiles_y: i64) -> Result<(), Jp3dError> {
        let tiling = self.config.tiling.clamped_to(self.width, self.height, self.depth);
        let row_depth = z_end - z_start;
        let mut components: Vec<Component> = (0..self.component_count)
            .map(|ci| Component::new_zeroed(ci, self.width, self.height, row_depth, self.bit_depth, self.signed).unwrap())
            .collect();
        for (local_z, z) in (z_start..z_end).enumerate() {
            let slice = self.slices[z as usize].as_ref().expect("row_complete checked above");
            for y in 0..self.height {
                for x in 0..self.width {
                    for ci in 0..self.component_count as usize {
                        let v = slice[ci * (self.width as usize * self.height as usize) + y as usize * self.width as usize + x as usize];
                        components[ci].set_sample_at(x, y, local_z as u32, v.round() as i64);
                    }
                }
            }
        }
        let row_volume = Volume {
            width: self.width,
            height: self.height,
            depth: row_depth,
            components,
        };

        let filter = self.config.mode.wavelet_filter();
        let dwt = DwtEngine::new(filter, self.config.boundary);
        let component_steps: Vec<f64> = row_volume
            .components
            .iter()
            .map(|c| rate_control::step_size(&self.config.mode, c.bit_depth, self.config.levels.max()))
            .collect();

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let region = crate::spatial::Region::from_origin_extent(
                    tx * tiling.tile_size_x as i64,
                    ty * tiling.tile_size_y as i64,
                    0,
                    tiling.tile_size_x as i64,
                    tiling.tile_size_y as i64,
                    row_depth as i64,
                )
                .intersect(&crate::spatial::Region::from_origin_extent(
                    0,
                    0,
                    0,
                    self.width as i64,
                    self.height as i64,
                    row_depth as i64,
                ))
                .unwrap_or_default();
                let tw = region.width() as u32;
                let th = region.height() as u32;
                let td = region.depth() as u32;
                if tw == 0 || th == 0 || td == 0 {
                    continue;
                }
                let tile_levels = self.config.levels.clamped_to(tw, th, td);

                let mut quantized_components = Vec::with_capacity(row_volume.components.len());
                for (ci, component) in row_volume.components.iter().enumerate() {
                    let mut samples = tiling::extract_component_region(component, &region);
                    dwt.forward(&mut samples, (tw, th, td), tile_levels)?;
                    let step = component_steps[ci];
                    let quantized: Vec<i32> = samples.iter().map(|&c| rate_control::quantize(c, step)).collect();
                    quantized_components.push(quantized);
                }
                let bytes = tile_codec::encode_tile(&quantized_components, self.config.ht.block_mode, &self.config.ht);
                let linear_index = tz * (tiles_x * tiles_y) + ty * tiles_x + tx;
                self.encoded_tiles.push(TilePayload { linear_index, bytes });
            }
        }
        Ok(())
    }

    /// Encodes any remaining complete or partial tile rows and emits the
    /// final codestream.
    pub fn finalize(mut self, volume_shape: &Volume) -> Result<Vec<u8>, Jp3dError> {
        if self.state == State::Cancelled {
            return Err(Jp3dError::encoding("finalize called after cancel"));
        }
        self.flush_complete_tiles()?;

        let tiling = self.config.tiling.clamped_to(self.width, self.height, self.depth);
        let tiles_z = crate::spatial::tile_grid_count(self.depth as i64, tiling.tile_size_z as i64);
        let tiles_x = self.tiles_x();
        let tiles_y = self.tiles_y();
        for tz in 0..tiles_z {
            let z_start = (tz * tiling.tile_size_z as i64) as u32;
            let z_end = (z_start + tiling.tile_size_z).min(self.depth);
            let already_encoded = self.encoded_tiles.iter().any(|t| {
                let row_of = t.linear_index / (tiles_x * tiles_y);
                row_of == tz
            });
            if !already_encoded {
                for z in z_start..z_end {
                    if self.slices[z as usize].is_none() {
                        self.slices[z as usize] = Some(vec![0.0f32; self.width as usize * self.height as usize * self.component_count as usize]);
                    }
                }
                self.encode_tile_row(tz, z_start, z_end, tiles_x, tiles_y)?;
            }
        }

        let levels = self.config.levels.clamped_to(
            tiling.tile_size_x.min(self.width),
            tiling.tile_size_y.min(self.height),
            tiling.tile_size_z.min(self.depth),
        );
        let component_steps: Vec<f64> = (0..self.component_count)
            .map(|_| rate_control::step_size(&self.config.mode, self.bit_depth, levels.max()))
            .collect();
        self.state = State::Finalized;
        builder::build_codestream(volume_shape, &self.config, levels, &component_steps, 3, self.encoded_tiles)
    }

    /// Drops buffered state and forbids further slices.
    pub fn cancel(&mut self) {
        self.slices.iter_mut().for_each(|s| *s = None);
        self.encoded_tiles.clear();
        self.state = State::Cancelled;
    }
}
