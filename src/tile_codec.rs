//! Per-tile payload: raw big-endian coefficient arrays, or the HT-prefixed
//! variant with a 4-byte info header and optional zero-bit-planes prefix
//! (spec.md §3, §4.E, §6).

use crate::byte_io::{ByteReader, ByteWriter};
use crate::config::{BlockMode, HtConfig};
use crate::error::Jp3dError;

/// The 4-byte HT-info prefix, decoded structurally (used directly by the
/// transcoder, which must inspect a tile payload without reference to the
/// stream-wide COD/CAP flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtHeader {
    pub is_ht: bool,
    pub pass_count: u8,
    pub cleanup_present: bool,
}

fn nonzero_fraction(quantized: &[Vec<i32>]) -> f64 {
    let mut count = 0usize;
    let mut nonzero = 0usize;
    for comp in quantized {
        for &q in comp {
            count += 1;
            if q != 0 {
                nonzero += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        nonzero as f64 / count as f64
    }
}

fn zero_bit_planes(flat: &[i32]) -> u32 {
    let max_abs = flat.iter().map(|v| v.unsigned_abs()).max().unwrap_or(0);
    if max_abs == 0 {
        0
    } else {
        31 - max_abs.leading_zeros()
    }
}

/// Whether this tile will use the HT-prefixed framing, and if so, whether
/// it carries an HT payload (adaptive: `#nonZero/count > 0.25`).
pub fn decide_ht(block_mode: BlockMode, quantized: &[Vec<i32>]) -> Option<bool> {
    match block_mode {
        BlockMode::Legacy => None,
        BlockMode::Ht => Some(true),
        BlockMode::Adaptive => Some(nonzero_fraction(quantized) > 0.25),
    }
}

/// Serializes one tile's per-component quantized coefficients.
pub fn encode_tile(quantized: &[Vec<i32>], block_mode: BlockMode, ht: &HtConfig) -> Vec<u8> {
    match decide_ht(block_mode, quantized) {
        None => encode_raw(quantized),
        Some(is_ht) => encode_ht_prefixed(quantized, is_ht, ht),
    }
}

fn encode_raw(quantized: &[Vec<i32>]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    for comp in quantized {
        for &q in comp {
            w.write_i32(q);
        }
    }
    w.into_bytes()
}

fn encode_ht_prefixed(quantized: &[Vec<i32>], is_ht: bool, ht: &HtConfig) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(if is_ht { 1 } else { 0 });
    w.write_u8(ht.pass_count);
    w.write_u8(if ht.cleanup_pass_enabled { 1 } else { 0 });
    w.write_u8(0);
    if is_ht {
        let flat: Vec<i32> = quantized.iter().flatten().copied().collect();
        w.write_u32(zero_bit_planes(&flat));
        for q in flat {
            w.write_i32(q);
        }
    } else {
        for comp in quantized {
            for &q in comp {
                w.write_i32(q);
            }
        }
    }
    w.into_bytes()
}

/// Reads `count` Int32 BE coefficients, tolerating a payload longer than
/// needed (stopping at `count`) but failing if it is shorter.
fn read_coefficients(reader: &mut ByteReader, count: usize) -> Result<Vec<i32>, Jp3dError> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(reader.read_i32()?);
    }
    Ok(out)
}

fn split_by_counts(flat: Vec<i32>, voxel_counts: &[usize]) -> Vec<Vec<i32>> {
    let mut out = Vec::with_capacity(voxel_counts.len());
    let mut pos = 0;
    for &n in voxel_counts {
        out.push(flat[pos..pos + n].to_vec());
        pos += n;
    }
    out
}

/// Decodes a payload known to be in Raw framing.
pub fn decode_raw(bytes: &[u8], voxel_counts: &[usize]) -> Result<Vec<Vec<i32>>, Jp3dError> {
    let mut reader = ByteReader::new(bytes);
    let mut out = Vec::with_capacity(voxel_counts.len());
    for &n in voxel_counts {
        out.push(read_coefficients(&mut reader, n)?);
    }
    Ok(out)
}

/// Inspects the first 4 bytes of a payload assumed to be HT-prefixed
/// framing. Returns `Err` if the payload is too short to carry the header.
pub fn read_ht_header(bytes: &[u8]) -> Result<HtHeader, Jp3dError> {
    if bytes.len() < 4 {
        return Err(Jp3dError::decoding(format!(
            "HT-prefixed tile payload too short for header: {} bytes",
            bytes.len()
        )));
    }
    Ok(HtHeader {
        is_ht: bytes[0] != 0,
        pass_count: bytes[1],
        cleanup_present: bytes[2] != 0,
    })
}

/// Decodes a payload known to be in HT-prefixed framing.
pub fn decode_ht_prefixed(
    bytes: &[u8],
    voxel_counts: &[usize],
) -> Result<(HtHeader, Vec<Vec<i32>>), Jp3dError> {
    let header = read_ht_header(bytes)?;
    let mut reader = ByteReader::new(bytes);
    reader.advance(4)?;
    let total: usize = voxel_counts.iter().sum();
    if header.is_ht {
        let _zbp = reader.read_u32()?;
        let flat = read_coefficients(&mut reader, total)?;
        Ok((header, split_by_counts(flat, voxel_counts)))
    } else {
        let components = decode_raw(reader.remaining(), voxel_counts)?;
        Ok((header, components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HtConfig;

    #[test]
    fn raw_round_trip() {
        let quantized = vec![vec![1, -2, 3, 4], vec![5, 6, -7, 8]];
        let bytes = encode_raw(&quantized);
        let decoded = decode_raw(&bytes, &[4, 4]).unwrap();
        assert_eq!(decoded, quantized);
    }

    #[test]
    fn raw_tolerates_overlong_payload() {
        let quantized = vec![vec![1, 2, 3, 4]];
        let mut bytes = encode_raw(&quantized);
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        let decoded = decode_raw(&bytes, &[4]).unwrap();
        assert_eq!(decoded, quantized);
    }

    #[test]
    fn raw_rejects_underlong_payload() {
        let bytes = vec![0u8; 3];
        assert!(decode_raw(&bytes, &[4]).is_err());
    }

    #[test]
    fn ht_round_trip() {
        let quantized = vec![vec![0, 0, 5, -3], vec![0, 1, 0, 0]];
        let ht = HtConfig::default();
        let bytes = encode_ht_prefixed(&quantized, true, &ht);
        let (header, decoded) = decode_ht_prefixed(&bytes, &[4, 4]).unwrap();
        assert!(header.is_ht);
        assert_eq!(decoded, quantized);
    }

    #[test]
    fn ht_rejects_underlong_payload() {
        let mut bytes = vec![1u8, 1, 1, 0]; // header only, isHT=1, no ZBP/data
        bytes.extend_from_slice(&[0, 0, 0, 0]); // zbp
        assert!(decode_ht_prefixed(&bytes, &[4]).is_err());
    }

    #[test]
    fn adaptive_decision_threshold() {
        let sparse = vec![vec![0, 0, 0, 1]];
        assert_eq!(decide_ht(BlockMode::Adaptive, &sparse), Some(false));
        let dense = vec![vec![1, 2, 0, 4]];
        assert_eq!(decide_ht(BlockMode::Adaptive, &dense), Some(true));
    }

    #[test]
    fn legacy_mode_has_no_header() {
        let quantized = vec![vec![1, 2, 3, 4]];
        let ht = HtConfig::default();
        let bytes = encode_tile(&quantized, BlockMode::Legacy, &ht);
        assert_eq!(bytes.len(), 16);
    }
}
