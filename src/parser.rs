//! Codestream parser: recovers SIZ/COD/QCD and collects tile payloads
//! (spec.md §4.G).
//!
//! Keeps the teacher's `J2kParser` "one marker segment, one method" shape
//! (`parse_siz`/`parse_cod`/`parse_qcd`), generalized to the 3-D SIZ/COD
//! extension and a `parse_sot` that slices the tile-part payload directly
//! out of the source buffer instead of copying into an intermediate image
//! tree (this core has no codeblock/subband tree to populate).

use crate::byte_io::ByteReader;
use crate::config::{DecompositionLevels, ProgressionOrder};
use crate::error::Jp3dError;
use crate::marker::MarkerCode;

#[derive(Debug, Clone)]
pub struct ParsedComponent {
    pub bit_depth: u8,
    pub signed: bool,
}

#[derive(Debug, Clone)]
pub struct ParsedSiz {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_depth: u32,
    pub components: Vec<ParsedComponent>,
}

#[derive(Debug, Clone)]
pub struct ParsedCod {
    pub is_ht: bool,
    pub progression_order: ProgressionOrder,
    pub quality_layers: u16,
    pub levels: DecompositionLevels,
    pub wavelet_id: u8,
}

#[derive(Debug, Clone)]
pub struct ParsedQcd {
    /// `0` = lossless, `2` = scalar expounded (spec.md §4.F/§4.G).
    pub style: u8,
    pub guard_bits: u8,
    /// Per-component step sizes recovered from the wire (empty for
    /// lossless, where the step is always `1.0`).
    pub component_steps: Vec<f64>,
}

impl ParsedQcd {
    pub fn is_lossless(&self) -> bool {
        self.style == 0
    }
}

#[derive(Debug, Clone)]
pub struct ParsedCap {
    pub pcap: u32,
    pub ccap: u16,
}

/// A tile-part's geometry-free wire record: its index and the exact byte
/// range of its payload (the parser's exclusive ownership of this slice,
/// per spec.md §3 ownership rules).
#[derive(Debug, Clone)]
pub struct ParsedTile {
    pub index: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ParsedCodestream {
    pub siz: ParsedSiz,
    pub cod: ParsedCod,
    pub qcd: ParsedQcd,
    pub cap: Option<ParsedCap>,
    pub tiles: Vec<ParsedTile>,
}

pub fn parse(bytes: &[u8]) -> Result<ParsedCodestream, Jp3dError> {
    let mut reader = ByteReader::new(bytes);
    let marker = reader.read_marker()?;
    if marker != MarkerCode::StartOfCodestream {
        return Err(Jp3dError::decoding("codestream does not begin with SOC"));
    }

    let mut siz: Option<ParsedSiz> = None;
    let mut cod: Option<ParsedCod> = None;
    let mut qcd: Option<ParsedQcd> = None;
    let mut cap: Option<ParsedCap> = None;
    let mut tiles: Vec<ParsedTile> = Vec::new();

    loop {
        if reader.remaining().is_empty() {
            break;
        }
        // Read the raw marker word rather than `read_marker()`: an unknown
        // code is not an error here, just a segment to skip by its declared
        // length (spec.md §4.G/§8 parser tolerance).
        let word = reader.read_u16()?;
        if (word >> 8) as u8 != crate::marker::MARKER_START_BYTE {
            return Err(Jp3dError::decoding(format!(
                "expected marker at byte {}, found 0x{word:04X}",
                reader.position().saturating_sub(2)
            )));
        }
        match MarkerCode::try_from(word) {
            Ok(MarkerCode::ImageAndTileSize) => siz = Some(parse_siz(&mut reader)?),
            Ok(MarkerCode::CodingStyleDefault) => cod = Some(parse_cod(&mut reader)?),
            Ok(MarkerCode::QuantizationDefault) => qcd = Some(parse_qcd(&mut reader)?),
            Ok(MarkerCode::Capability) => cap = Some(parse_cap(&mut reader)?),
            Ok(MarkerCode::CorrespondingProfile) => {
                let len = reader.read_u16()?;
                reader.advance(len as usize - 2)?;
            }
            Ok(MarkerCode::Comment) => {
                let len = reader.read_u16()?;
                reader.advance(len as usize - 2)?;
            }
            Ok(MarkerCode::StartOfTile) => {
                tiles.push(parse_sot(&mut reader, bytes)?);
            }
            Ok(MarkerCode::EndOfCodestream) => break,
            Ok(MarkerCode::StartOfData) => {
                return Err(Jp3dError::decoding("unexpected SOD outside a tile-part"));
            }
            Err(_) => {
                // Unrecognized marker segment (e.g. RGN, POC, TLM): skip
                // past its declared length rather than rejecting the
                // codestream.
                let len = reader.read_u16()?;
                if len < 2 {
                    return Err(Jp3dError::decoding(format!(
                        "marker segment 0x{word:04X} declares length {len} < 2"
                    )));
                }
                reader.advance(len as usize - 2)?;
            }
        }
    }

    let siz = siz.ok_or_else(|| Jp3dError::decoding("codestream has no SIZ marker"))?;
    let cod = cod.ok_or_else(|| Jp3dError::decoding("codestream has no COD marker"))?;
    let qcd = qcd.unwrap_or(ParsedQcd {
        style: 0,
        guard_bits: 3,
        component_steps: Vec::new(),
    });
    if tiles.is_empty() {
        return Err(Jp3dError::decoding("codestream contains zero tiles"));
    }
    tiles.sort_by_key(|t| t.index);
    Ok(ParsedCodestream { siz, cod, qcd, cap, tiles })
}

fn parse_siz(reader: &mut ByteReader) -> Result<ParsedSiz, Jp3dError> {
    let lsiz = reader.read_u16()?;
    if lsiz < 38 {
        return Err(Jp3dError::decoding(format!(
            "SIZ segment too short: Lsiz={lsiz}, expected >= 38"
        )));
    }
    let _rsiz = reader.read_u16()?;
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let _x_origin = reader.read_u32()?;
    let _y_origin = reader.read_u32()?;
    let tile_width = reader.read_u32()?;
    let tile_height = reader.read_u32()?;
    let _xt_origin = reader.read_u32()?;
    let _yt_origin = reader.read_u32()?;
    let component_count = reader.read_u16()?;

    let mut components = Vec::with_capacity(component_count as usize);
    for _ in 0..component_count {
        let ssiz = reader.read_u8()?;
        let _xr = reader.read_u8()?;
        let _yr = reader.read_u8()?;
        components.push(ParsedComponent {
            bit_depth: (ssiz & 0x7F) + 1,
            signed: (ssiz & 0x80) != 0,
        });
    }

    // JP3D depth extension: present whenever the declared length covers it.
    let consumed_before_extension = 2 + 36 + 3 * component_count as usize;
    let (depth, tile_depth) = if lsiz as usize >= consumed_before_extension + 8 {
        (reader.read_u32()?, reader.read_u32()?)
    } else {
        (1, 1)
    };

    Ok(ParsedSiz {
        width,
        height,
        depth,
        tile_width,
        tile_height,
        tile_depth,
        components,
    })
}

fn parse_cod(reader: &mut ByteReader) -> Result<ParsedCod, Jp3dError> {
    let lcod = reader.read_u16()?;
    if lcod < 12 {
        return Err(Jp3dError::decoding(format!(
            "COD segment too short: Lcod={lcod}, expected >= 12"
        )));
    }
    let scod = reader.read_u8()?;
    let sprog = reader.read_u8()?;
    let layers = reader.read_u16()?;
    let _mct = reader.read_u8()?;

    let levels = if lcod >= 14 {
        let lx = reader.read_u8()?;
        let ly = reader.read_u8()?;
        let lz = reader.read_u8()?;
        DecompositionLevels { x: lx, y: ly, z: lz }
    } else {
        let l = reader.read_u8()?;
        DecompositionLevels { x: l, y: l, z: l }
    };
    let _cbw = reader.read_u8()?;
    let _cbh = reader.read_u8()?;
    let _cbstyle = reader.read_u8()?;
    let wavelet_id = reader.read_u8()?;

    // Skip anything declared beyond the fields this core understands
    // (e.g. precinct sizes), matching parser tolerance (spec.md §8).
    let consumed: usize = 2 + 1 + 1 + 2 + 1 + if lcod >= 14 { 3 } else { 1 } + 4;
    if (lcod as usize) > consumed {
        reader.advance(lcod as usize - consumed)?;
    }

    Ok(ParsedCod {
        is_ht: (scod & (1 << 6)) != 0,
        progression_order: ProgressionOrder::from_wire_byte(sprog),
        quality_layers: layers,
        levels,
        wavelet_id,
    })
}

fn parse_qcd(reader: &mut ByteReader) -> Result<ParsedQcd, Jp3dError> {
    let lqcd = reader.read_u16()?;
    if lqcd < 3 {
        return Err(Jp3dError::decoding(format!(
            "QCD segment too short: Lqcd={lqcd}, expected >= 3"
        )));
    }
    let sqcd = reader.read_u8()?;
    let style = sqcd & 0x1F;
    let guard_bits = sqcd >> 5;
    let mut bytes_left = lqcd as usize - 3;
    let entry_len = if style == 0 { 1usize } else { 4 };
    let mut component_steps = Vec::new();
    while bytes_left >= entry_len {
        if style == 0 {
            let _ = reader.read_u8()?;
        } else {
            let bits = reader.read_u32()?;
            component_steps.push(f32::from_bits(bits) as f64);
        }
        bytes_left -= entry_len;
    }
    if bytes_left > 0 {
        reader.advance(bytes_left)?;
    }
    Ok(ParsedQcd { style, guard_bits, component_steps })
}

fn parse_cap(reader: &mut ByteReader) -> Result<ParsedCap, Jp3dError> {
    let len = reader.read_u16()?;
    if len < 8 {
        return Err(Jp3dError::decoding(format!(
            "CAP segment too short: Lcap={len}, expected >= 8"
        )));
    }
    let pcap = reader.read_u32()?;
    let ccap = reader.read_u16()?;
    let consumed = 2 + 4 + 2;
    if (len as usize) > consumed {
        reader.advance(len as usize - consumed)?;
    }
    Ok(ParsedCap { pcap, ccap })
}

fn parse_sot(reader: &mut ByteReader, full_stream: &[u8]) -> Result<ParsedTile, Jp3dError> {
    let sot_marker_start = reader.position() - 2;
    let _lsot = reader.read_u16()?;
    let isot = reader.read_u16()?;
    let psot = reader.read_u32()?;
    let _tpsot = reader.read_u8()?;
    let _tnsot = reader.read_u8()?;

    let sod_marker = reader.read_marker()?;
    if sod_marker != MarkerCode::StartOfData {
        return Err(Jp3dError::decoding(format!(
            "expected SOD after SOT for tile {isot}, found different marker"
        )));
    }
    let data_start = reader.position();

    let data_end = if psot == 0 {
        // Fallback: scan forward for the next marker byte.
        let mut pos = data_start;
        while pos + 1 < full_stream.len() {
            if full_stream[pos] == crate::marker::MARKER_START_BYTE {
                break;
            }
            pos += 1;
        }
        pos
    } else {
        sot_marker_start + psot as usize
    };
    if data_end > full_stream.len() || data_end < data_start {
        return Err(Jp3dError::decoding(format!(
            "tile {isot} payload range [{data_start},{data_end}) exceeds stream length {}",
            full_stream.len()
        )));
    }
    let payload = full_stream[data_start..data_end].to_vec();
    reader.advance(data_end - data_start)?;

    Ok(ParsedTile { index: isot, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_codestream, TilePayload};
    use crate::config::{BoundaryMode, CompressionMode, EncoderConfig, HtConfig, TilingConfig};
    use crate::volume::Component;
    use crate::volume::Volume;

    fn simple_stream() -> Vec<u8> {
        let c = Component::new_zeroed(0, 4, 4, 2, 8, false).unwrap();
        let v = Volume {
            width: 4,
            height: 4,
            depth: 2,
            components: vec![c],
        };
        let cfg = EncoderConfig {
            tiling: TilingConfig::new(4, 4, 2).unwrap(),
            mode: CompressionMode::Lossless,
            levels: DecompositionLevels { x: 1, y: 1, z: 0 },
            boundary: BoundaryMode::Symmetric,
            quality_layers: 1,
            progression_order: ProgressionOrder::Lrcps,
            ht: HtConfig::default(),
        };
        let payloads = vec![TilePayload {
            linear_index: 0,
            bytes: vec![0u8; 4 * 4 * 2 * 4],
        }];
        build_codestream(&v, &cfg, cfg.levels, &[1.0], 3, payloads).unwrap()
    }

    #[test]
    fn parses_siz_and_single_tile() {
        let bytes = simple_stream();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.siz.width, 4);
        assert_eq!(parsed.siz.height, 4);
        assert_eq!(parsed.siz.depth, 2);
        assert_eq!(parsed.tiles.len(), 1);
        assert_eq!(parsed.tiles[0].index, 0);
    }

    #[test]
    fn tolerates_unknown_marker_segment() {
        let mut bytes = simple_stream();
        // Splice a COM marker with a bogus-but-valid length right after SOC.
        let mut com = vec![0xFFu8, 0x64, 0x00, 0x06, 0xAA, 0xAA, 0xAA, 0xAA];
        let mut spliced = bytes[..2].to_vec();
        spliced.append(&mut com);
        spliced.extend_from_slice(&bytes[2..]);
        bytes = spliced;
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.siz.width, 4);
    }

    #[test]
    fn tolerates_genuinely_unknown_marker_segment() {
        let mut bytes = simple_stream();
        // Splice an RGN marker (0xFF5E) this parser has no variant for,
        // with a valid declared length, right after SOC.
        let mut rgn = vec![0xFFu8, 0x5E, 0x00, 0x05, 0x00, 0x01, 0x02];
        let mut spliced = bytes[..2].to_vec();
        spliced.append(&mut rgn);
        spliced.extend_from_slice(&bytes[2..]);
        bytes = spliced;
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.siz.width, 4);
        assert_eq!(parsed.tiles.len(), 1);
    }

    #[test]
    fn rejects_missing_siz() {
        let bytes = vec![0xFF, 0x4F, 0xFF, 0xD9];
        assert!(parse(&bytes).is_err());
    }
}
