//! Configuration surfaces: tiling, compression mode, decomposition levels,
//! progression order, and HT block-coding options (spec.md §6).

use crate::error::Jp3dError;

/// Tile size along each axis. Construction validates (rejects `<= 0`);
/// [`TilingConfig::clamped_to`] is the separate, always-succeeding path used
/// internally once a volume's extents are known (spec.md §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingConfig {
    pub tile_size_x: u32,
    pub tile_size_y: u32,
    pub tile_size_z: u32,
}

impl TilingConfig {
    pub fn new(tile_size_x: u32, tile_size_y: u32, tile_size_z: u32) -> Result<Self, Jp3dError> {
        if tile_size_x == 0 || tile_size_y == 0 || tile_size_z == 0 {
            return Err(Jp3dError::invalid_tile_configuration(format!(
                "tile sizes must be >= 1, got ({tile_size_x},{tile_size_y},{tile_size_z})"
            )));
        }
        Ok(Self {
            tile_size_x,
            tile_size_y,
            tile_size_z,
        })
    }

    /// Single-tile configuration sized to the given volume extents.
    pub fn whole_volume(width: u32, height: u32, depth: u32) -> Self {
        Self {
            tile_size_x: width.max(1),
            tile_size_y: height.max(1),
            tile_size_z: depth.max(1),
        }
    }

    /// Clamps each axis to `[1, axisExtent]`.
    pub fn clamped_to(&self, width: u32, height: u32, depth: u32) -> Self {
        Self {
            tile_size_x: self.tile_size_x.clamp(1, width.max(1)),
            tile_size_y: self.tile_size_y.clamp(1, height.max(1)),
            tile_size_z: self.tile_size_z.clamp(1, depth.max(1)),
        }
    }
}

/// Per-axis decomposition level counts, clamped to `floor(log2(axisExtent))`
/// (0 when the axis extent is 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecompositionLevels {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl DecompositionLevels {
    pub fn uniform(levels: u8) -> Self {
        Self {
            x: levels,
            y: levels,
            z: levels,
        }
    }

    pub fn clamped_to(&self, width: u32, height: u32, depth: u32) -> Self {
        Self {
            x: clamp_levels(self.x, width),
            y: clamp_levels(self.y, height),
            z: clamp_levels(self.z, depth),
        }
    }

    pub fn max(&self) -> u8 {
        self.x.max(self.y).max(self.z)
    }
}

fn clamp_levels(requested: u8, axis_extent: u32) -> u8 {
    if axis_extent <= 1 {
        return 0;
    }
    let max_levels = 31 - axis_extent.leading_zeros();
    requested.min(max_levels as u8)
}

/// The wavelet filter used by the DWT engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletFilter {
    /// Reversible 5/3 integer lifting.
    Reversible53,
    /// Irreversible 9/7 floating-point lifting.
    Irreversible97,
}

/// Boundary extension mode for the 1-D lifting steps (spec.md §4.C). The
/// normative mode is `Symmetric`; `Periodic`/`ZeroPad` are provided for
/// experimentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryMode {
    #[default]
    Symmetric,
    Periodic,
    ZeroPad,
}

/// Compression mode, selecting both the wavelet filter and the quantization
/// step-size formula (spec.md §4.D).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionMode {
    Lossless,
    Lossy { target_psnr: f64 },
    TargetBitrate { bits_per_voxel: f64 },
    VisuallyLossless,
    LosslessHT,
    LossyHT { target_psnr: f64 },
}

impl CompressionMode {
    pub fn wavelet_filter(&self) -> WaveletFilter {
        match self {
            CompressionMode::Lossless | CompressionMode::LosslessHT => WaveletFilter::Reversible53,
            _ => WaveletFilter::Irreversible97,
        }
    }

    pub fn is_ht(&self) -> bool {
        matches!(self, CompressionMode::LosslessHT | CompressionMode::LossyHT { .. })
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, CompressionMode::Lossless | CompressionMode::LosslessHT)
    }
}

/// Progression order persisted in COD; header-only in this core (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionOrder {
    Lrcps,
    Rlcps,
    Pcrls,
    Slrcp,
    Cprls,
}

impl ProgressionOrder {
    pub fn to_wire_byte(self) -> u8 {
        match self {
            ProgressionOrder::Lrcps => 0,
            ProgressionOrder::Rlcps => 1,
            ProgressionOrder::Pcrls => 2,
            ProgressionOrder::Slrcp => 3,
            ProgressionOrder::Cprls => 4,
        }
    }

    pub fn from_wire_byte(byte: u8) -> Self {
        match byte {
            1 => ProgressionOrder::Rlcps,
            2 => ProgressionOrder::Pcrls,
            3 => ProgressionOrder::Slrcp,
            4 => ProgressionOrder::Cprls,
            _ => ProgressionOrder::Lrcps,
        }
    }
}

/// HT block-coding mode selection for the tile codec (spec.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    Ht,
    Legacy,
    /// Per-tile decision: HT when `#nonZero / count > 0.25`.
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtConfig {
    pub block_mode: BlockMode,
    pub pass_count: u8,
    pub cleanup_pass_enabled: bool,
    pub allow_mixed_tiles: bool,
}

impl Default for HtConfig {
    fn default() -> Self {
        Self {
            block_mode: BlockMode::Legacy,
            pass_count: 1,
            cleanup_pass_enabled: true,
            allow_mixed_tiles: true,
        }
    }
}

/// Full encoder configuration.
#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub tiling: TilingConfig,
    pub mode: CompressionMode,
    pub levels: DecompositionLevels,
    pub boundary: BoundaryMode,
    pub quality_layers: u16,
    pub progression_order: ProgressionOrder,
    pub ht: HtConfig,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            tiling: TilingConfig {
                tile_size_x: u32::MAX,
                tile_size_y: u32::MAX,
                tile_size_z: u32::MAX,
            },
            mode: CompressionMode::Lossless,
            levels: DecompositionLevels::uniform(5),
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        }
    }
}

impl EncoderConfig {
    pub fn validated(mut self) -> Result<Self, Jp3dError> {
        if self.quality_layers == 0 {
            return Err(Jp3dError::invalid_parameter(
                "quality_layers must be >= 1".to_string(),
            ));
        }
        if self.mode.is_ht() {
            self.ht.block_mode = BlockMode::Ht;
        }
        Ok(self)
    }
}

/// Decoder-side tolerance configuration (spec.md §7).
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderConfig {
    pub tolerate_errors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiling_rejects_zero_size() {
        assert!(TilingConfig::new(0, 4, 4).is_err());
    }

    #[test]
    fn levels_clamp_to_log2() {
        let lv = DecompositionLevels::uniform(5).clamped_to(16, 16, 1);
        assert_eq!(lv.x, 4);
        assert_eq!(lv.y, 4);
        assert_eq!(lv.z, 0);
    }

    #[test]
    fn ht_mode_forces_ht_block_mode() {
        let cfg = EncoderConfig {
            mode: CompressionMode::LosslessHT,
            ..EncoderConfig::default()
        }
        .validated()
        .unwrap();
        assert_eq!(cfg.ht.block_mode, BlockMode::Ht);
    }
}
