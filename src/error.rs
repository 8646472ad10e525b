//! Error taxonomy for the JP3D codec.
//!
//! Every variant carries a human-readable message that includes the
//! offending numeric bounds and, where applicable, the tile or component
//! index, so callers can act on the failure without re-deriving context.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Jp3dError {
    /// Dimension <= 0, buffer/extent size mismatch, bit depth outside
    /// `[1,38]`, or an out-of-range index.
    #[error("invalid parameter: {detail}")]
    InvalidParameter { detail: String },

    /// A tile size <= 0 was supplied to a constructor that does not clamp.
    #[error("invalid tile configuration: {detail}")]
    InvalidTileConfiguration { detail: String },

    /// Component bit depth outside `[1,38]`.
    #[error("invalid bit depth {depth}: must be in [1,38]")]
    InvalidBitDepth { depth: u32 },

    /// Empty tile set, round-trip verification mismatch, or a tile-codec
    /// failure during payload emission.
    #[error("encoding error: {detail}")]
    Encoding { detail: String },

    /// Missing SOC/SIZ/COD, truncated segment reads, unexpected marker
    /// order, too-short HT payload, or a codestream with zero tiles.
    #[error("decoding error: {detail}")]
    Decoding { detail: String },
}

impl Jp3dError {
    pub fn invalid_parameter(detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            detail: detail.into(),
        }
    }

    pub fn invalid_tile_configuration(detail: impl Into<String>) -> Self {
        Self::InvalidTileConfiguration {
            detail: detail.into(),
        }
    }

    pub fn encoding(detail: impl Into<String>) -> Self {
        Self::Encoding {
            detail: detail.into(),
        }
    }

    pub fn decoding(detail: impl Into<String>) -> Self {
        Self::Decoding {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Jp3dError>;
