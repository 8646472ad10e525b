//! JP3D marker alphabet (16-bit, big-endian).

use crate::error::Jp3dError;
use num_enum::TryFromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum MarkerCode {
    /// SOC: Start of codestream.
    StartOfCodestream = 0xFF4F,
    /// SIZ: Image and tile size (carries the JP3D depth extension).
    ImageAndTileSize = 0xFF51,
    /// COD: Coding style default.
    CodingStyleDefault = 0xFF52,
    /// QCD: Quantization default.
    QuantizationDefault = 0xFF5C,
    /// COM: Comment.
    Comment = 0xFF64,
    /// SOT: Start of tile-part.
    StartOfTile = 0xFF90,
    /// SOD: Start of tile data.
    StartOfData = 0xFF93,
    /// EOC: End of codestream.
    EndOfCodestream = 0xFFD9,
    /// CAP: Part-15 capability marker (HTJ2K).
    Capability = 0xFF50,
    /// CPF: Part-15 corresponding profile marker (HTJ2K).
    CorrespondingProfile = 0xFF59,
}

/// Resolves a raw 16-bit marker word, wrapping `num_enum`'s conversion error
/// into the codec's own error taxonomy.
pub fn marker_from_u16(value: u16) -> Result<MarkerCode, Jp3dError> {
    MarkerCode::try_from(value)
        .map_err(|_| Jp3dError::decoding(format!("unknown marker code 0x{value:04X}")))
}

pub const MARKER_START_BYTE: u8 = 0xFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_markers() {
        assert_eq!(marker_from_u16(0xFF4F).unwrap(), MarkerCode::StartOfCodestream);
        assert_eq!(marker_from_u16(0xFFD9).unwrap(), MarkerCode::EndOfCodestream);
    }

    #[test]
    fn rejects_unknown_marker() {
        assert!(marker_from_u16(0x1234).is_err());
    }
}
