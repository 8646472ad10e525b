//! Codestream builder: emits SOC/SIZ/COD/QCD/SOT/SOD/EOC and the optional
//! CAP/CPF HT markers (spec.md §4.F, §6).
//!
//! Keeps the teacher's `J2kWriter` "one method per marker segment" shape
//! (`write_soc`/`write_siz`/`write_cod`/`write_qcd`/`write_sot`/`write_sod`),
//! generalized to the 3-D SIZ/COD layout and the CAP/CPF markers the
//! teacher's writer has no counterpart for.

use crate::byte_io::ByteWriter;
use crate::config::{DecompositionLevels, EncoderConfig, WaveletFilter};
use crate::error::Jp3dError;
use crate::marker::MarkerCode;
use crate::volume::Volume;

/// Encodes a quantization step as a style byte plus, for lossy, an IEEE-754
/// `f32` per component (the "mantissa/exponent pair" of spec.md §4.F,
/// realized as the float's own sign/exponent/mantissa bit layout rather
/// than reconstructing the ISO Annex E bit-packing, since the core does
/// not implement full rate-distortion bit allocation; see DESIGN.md).
pub fn write_qcd(
    w: &mut ByteWriter,
    lossless: bool,
    guard_bits: u8,
    component_steps: &[f64],
) {
    w.write_marker(MarkerCode::QuantizationDefault);
    let entry_len = if lossless { 1 } else { 4 };
    let payload_len = 1 + component_steps.len() * entry_len;
    w.write_u16((payload_len + 2) as u16);
    let style = if lossless { 0u8 } else { 2u8 };
    w.write_u8((guard_bits << 5) | style);
    for &step in component_steps {
        if lossless {
            w.write_u8(0);
        } else {
            w.write_u32((step as f32).to_bits());
        }
    }
}

fn write_siz(w: &mut ByteWriter, volume: &Volume, config: &EncoderConfig) {
    w.write_marker(MarkerCode::ImageAndTileSize);
    let c = volume.components.len() as u16;
    let lsiz = 38u16 + 3 * c + 8;
    w.write_u16(lsiz);
    w.write_u16(0); // Rsiz
    w.write_u32(volume.width);
    w.write_u32(volume.height);
    w.write_u32(0); // XOsiz
    w.write_u32(0); // YOsiz
    let tiling = config.tiling.clamped_to(volume.width, volume.height, volume.depth);
    w.write_u32(tiling.tile_size_x);
    w.write_u32(tiling.tile_size_y);
    w.write_u32(0); // XTOsiz
    w.write_u32(0); // YTOsiz
    w.write_u16(c);
    for comp in &volume.components {
        let mut ssiz = comp.bit_depth - 1;
        if comp.signed {
            ssiz |= 0x80;
        }
        w.write_u8(ssiz);
        w.write_u8(1); // XRsiz
        w.write_u8(1); // YRsiz
    }
    w.write_u32(volume.depth);
    w.write_u32(tiling.tile_size_z);
}

fn write_cod(w: &mut ByteWriter, config: &EncoderConfig, levels: DecompositionLevels) {
    w.write_marker(MarkerCode::CodingStyleDefault);
    w.write_u16(14);
    let mut scod = 0u8;
    if config.mode.is_ht() {
        scod |= 1 << 6;
    }
    w.write_u8(scod);
    w.write_u8(config.progression_order.to_wire_byte());
    w.write_u16(config.quality_layers);
    w.write_u8(0); // MCT: not part of this core
    w.write_u8(levels.x);
    w.write_u8(levels.y);
    w.write_u8(levels.z);
    w.write_u8(4); // code-block width exponent (unused by this core's entropy path)
    w.write_u8(4); // code-block height exponent
    w.write_u8(0); // code-block style
    let wavelet_id = match config.mode.wavelet_filter() {
        WaveletFilter::Reversible53 => 1u8,
        WaveletFilter::Irreversible97 => 0u8,
    };
    w.write_u8(wavelet_id);
}

fn write_cap_cpf(w: &mut ByteWriter, config: &EncoderConfig) {
    w.write_marker(MarkerCode::Capability);
    w.write_u16(8);
    let pcap: u32 = 1 << 14;
    w.write_u32(pcap);
    let mut ccap: u16 = 0b01;
    if config.ht.allow_mixed_tiles {
        ccap |= 0b10;
    }
    w.write_u16(ccap);

    w.write_marker(MarkerCode::CorrespondingProfile);
    w.write_u16(4);
    let mut pcpf: u16 = 1 << 15;
    if !config.mode.is_lossless() {
        pcpf |= 1;
    }
    w.write_u16(pcpf);
}

/// One tile's payload, keyed by its Z-major/Y-major/X-major linear index.
pub struct TilePayload {
    pub linear_index: i64,
    pub bytes: Vec<u8>,
}

/// Builds a full codestream. `levels` must be the first tile's actual
/// clamped decomposition levels (spec.md §4.H: "the header matches
/// decoding"). `tile_payloads` need not be pre-sorted; the builder emits
/// tiles in ascending index order regardless of input order.
pub fn build_codestream(
    volume: &Volume,
    config: &EncoderConfig,
    levels: DecompositionLevels,
    component_steps: &[f64],
    guard_bits: u8,
    mut tile_payloads: Vec<TilePayload>,
) -> Result<Vec<u8>, Jp3dError> {
    if tile_payloads.is_empty() {
        return Err(Jp3dError::encoding("cannot build a codestream with zero tiles"));
    }
    tile_payloads.sort_by_key(|t| t.linear_index);

    let mut w = ByteWriter::new();
    w.write_marker(MarkerCode::StartOfCodestream);
    write_siz(&mut w, volume, config);
    write_cod(&mut w, config, levels);
    write_qcd(&mut w, config.mode.is_lossless(), guard_bits, component_steps);
    if config.mode.is_ht() {
        write_cap_cpf(&mut w, config);
    }
    for tile in &tile_payloads {
        w.write_marker(MarkerCode::StartOfTile);
        w.write_u16(10);
        w.write_u16(tile.linear_index as u16);
        let psot = 12u32 + 2 + tile.bytes.len() as u32;
        w.write_u32(psot);
        w.write_u8(0); // TPsot
        w.write_u8(1); // TNsot
        w.write_marker(MarkerCode::StartOfData);
        w.write_bytes(&tile.bytes);
    }
    w.write_marker(MarkerCode::EndOfCodestream);
    Ok(w.into_bytes())
}
