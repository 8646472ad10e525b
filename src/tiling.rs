//! Volume -> tile decomposition and per-tile sample extraction (spec.md §4.B).

use crate::config::TilingConfig;
use crate::spatial::{tile_grid_count, Region, Tile};
use crate::volume::Volume;

/// Tile grid dimensions (tile counts per axis) for a volume/tiling pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub tiles_x: i64,
    pub tiles_y: i64,
    pub tiles_z: i64,
}

impl TileGrid {
    pub fn for_volume(volume: &Volume, tiling: &TilingConfig) -> Self {
        let clamped = tiling.clamped_to(volume.width, volume.height, volume.depth);
        Self {
            tiles_x: tile_grid_count(volume.width as i64, clamped.tile_size_x as i64),
            tiles_y: tile_grid_count(volume.height as i64, clamped.tile_size_y as i64),
            tiles_z: tile_grid_count(volume.depth as i64, clamped.tile_size_z as i64),
        }
    }

    pub fn tile_count(&self) -> i64 {
        self.tiles_x * self.tiles_y * self.tiles_z
    }
}

/// Produces every tile of `volume` under `tiling`, in Z-major, Y-major,
/// X-major order, clamping the configured tile size to the volume extents.
pub fn tiles_for_volume(volume: &Volume, tiling: &TilingConfig) -> Vec<Tile> {
    let clamped = tiling.clamped_to(volume.width, volume.height, volume.depth);
    let grid = TileGrid::for_volume(volume, &clamped);
    let mut tiles = Vec::with_capacity(grid.tile_count() as usize);
    for iz in 0..grid.tiles_z {
        for iy in 0..grid.tiles_y {
            for ix in 0..grid.tiles_x {
                let raw = Region::from_origin_extent(
                    ix * clamped.tile_size_x as i64,
                    iy * clamped.tile_size_y as i64,
                    iz * clamped.tile_size_z as i64,
                    clamped.tile_size_x as i64,
                    clamped.tile_size_y as i64,
                    clamped.tile_size_z as i64,
                );
                let volume_region = Region::from_origin_extent(
                    0,
                    0,
                    0,
                    volume.width as i64,
                    volume.height as i64,
                    volume.depth as i64,
                );
                let region = raw.intersect(&volume_region).unwrap_or_default();
                tiles.push(Tile { ix, iy, iz, region });
            }
        }
    }
    tiles
}

/// Reconstructs the tile at linear `index` from a volume's dimensions and
/// (already clamped) tile size, without needing a `Volume`/`TilingConfig`
/// in hand — used by the decoder side, which only has parsed SIZ fields.
pub fn tile_at_index(
    dims: (u32, u32, u32),
    tile_size: (u32, u32, u32),
    tiles_x: i64,
    tiles_y: i64,
    index: i64,
) -> Tile {
    let per_row = tiles_x * tiles_y;
    let iz = index / per_row;
    let rem = index % per_row;
    let iy = rem / tiles_x;
    let ix = rem % tiles_x;
    let raw = Region::from_origin_extent(
        ix * tile_size.0 as i64,
        iy * tile_size.1 as i64,
        iz * tile_size.2 as i64,
        tile_size.0 as i64,
        tile_size.1 as i64,
        tile_size.2 as i64,
    );
    let volume_region =
        Region::from_origin_extent(0, 0, 0, dims.0 as i64, dims.1 as i64, dims.2 as i64);
    let region = raw.intersect(&volume_region).unwrap_or_default();
    Tile { ix, iy, iz, region }
}

/// Extracts one component's samples within `region` as `f32`, row-major
/// `(z,y,x)` with `x` fastest, matching the coefficient-block layout.
pub fn extract_component_region(
    component: &crate::volume::Component,
    region: &Region,
) -> Vec<f32> {
    let w = region.width() as u32;
    let h = region.height() as u32;
    let d = region.depth() as u32;
    let mut out = Vec::with_capacity((w as usize) * (h as usize) * (d as usize));
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                let sample = component.sample_at(
                    (region.x0 + x as i64) as u32,
                    (region.y0 + y as i64) as u32,
                    (region.z0 + z as i64) as u32,
                );
                out.push(sample as f32);
            }
        }
    }
    out
}

/// Writes decoded tile samples back into a component at `region`'s origin.
pub fn write_component_region(
    component: &mut crate::volume::Component,
    region: &Region,
    samples: &[i64],
) {
    let w = region.width() as u32;
    let h = region.height() as u32;
    let d = region.depth() as u32;
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                let linear = (z as usize * h as usize + y as usize) * w as usize + x as usize;
                component.set_sample_at(
                    (region.x0 + x as i64) as u32,
                    (region.y0 + y as i64) as u32,
                    (region.z0 + z as i64) as u32,
                    samples[linear],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Component;

    fn gradient_volume(w: u32, h: u32, d: u32) -> Volume {
        let mut c = Component::new_zeroed(0, w, h, d, 8, false).unwrap();
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    c.set_sample_at(x, y, z, (x as i64) + 5 * (y as i64));
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
    fn tile_grid_multi_tile_count() {
        let v = gradient_volume(5, 5, 1);
        let tiling = TilingConfig::new(2, 2, 1).unwrap();
        let grid = TileGrid::for_volume(&v, &tiling);
        assert_eq!(grid.tiles_x, 3);
        assert_eq!(grid.tiles_y, 3);
        assert_eq!(grid.tiles_z, 1);
        assert_eq!(grid.tile_count(), 9);
    }

    #[test]
    fn tiles_in_z_y_x_major_order() {
        let v = gradient_volume(4, 4, 2);
        let tiling = TilingConfig::new(2, 2, 1).unwrap();
        let tiles = tiles_for_volume(&v, &tiling);
        let indices: Vec<(i64, i64, i64)> = tiles.iter().map(|t| (t.iz, t.iy, t.ix)).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn extract_matches_gradient() {
        let v = gradient_volume(5, 5, 1);
        let region = Region::from_origin_extent(2, 2, 0, 2, 2, 1);
        let samples = extract_component_region(&v.components[0], &region);
        assert_eq!(samples, vec![12.0, 13.0, 17.0, 18.0]);
    }
}
