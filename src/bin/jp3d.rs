//! jp3d CLI - volumetric JPEG 2000 (JP3D) command-line utility.
//!
//! Encodes/decodes raw planar volume files against the JP3D codestream
//! format, with ROI decoding, transcoding, and codestream inspection.

use clap::{Parser, Subcommand};
use jp3d_rs::config::{
    BoundaryMode, CompressionMode, DecoderConfig, DecompositionLevels, EncoderConfig, HtConfig,
    ProgressionOrder, TilingConfig,
};
use jp3d_rs::spatial::Region;
use jp3d_rs::transcoder::Direction;
use jp3d_rs::volume::{Component, Volume};
use std::fs;
use std::path::PathBuf;

/// Volumetric JPEG 2000 (JP3D) codec
#[derive(Parser)]
#[command(name = "jp3d")]
#[command(author = "jp3d-rs contributors")]
#[command(version)]
#[command(about = "Encode, decode, transcode, and inspect JP3D volumetric codestreams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a raw planar volume file into a JP3D codestream
    Encode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long)]
        depth: u32,
        #[arg(long, default_value = "1")]
        components: u32,
        #[arg(long, default_value = "8")]
        bit_depth: u8,
        #[arg(long)]
        signed: bool,
        #[arg(long)]
        lossless: bool,
        #[arg(long)]
        psnr: Option<f64>,
        #[arg(long)]
        bpv: Option<f64>,
        #[arg(long)]
        ht: bool,
        #[arg(long)]
        tile_x: Option<u32>,
        #[arg(long)]
        tile_y: Option<u32>,
        #[arg(long)]
        tile_z: Option<u32>,
        #[arg(long)]
        levels_x: Option<u8>,
        #[arg(long)]
        levels_y: Option<u8>,
        #[arg(long)]
        levels_z: Option<u8>,
    },

    /// Decode a JP3D codestream to a raw planar volume file
    Decode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// Region of interest: x0,x1,y0,y1,z0,z1
        #[arg(long, value_delimiter = ',')]
        roi: Option<Vec<i64>>,
        #[arg(long)]
        tolerate_errors: bool,
    },

    /// Rewrite tile payloads between raw and HT-prefixed framing
    Transcode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, value_enum)]
        direction: CliDirection,
        #[arg(long)]
        verify: bool,
    },

    /// Print codestream metadata (SIZ/COD/QCD/CAP and tile list)
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum CliDirection {
    ToHt,
    ToStandard,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Encode {
            input,
            out,
            width,
            height,
            depth,
            components,
            bit_depth,
            signed,
            lossless,
            psnr,
            bpv,
            ht,
            tile_x,
            tile_y,
            tile_z,
            levels_x,
            levels_y,
            levels_z,
        } => encode_cmd(
            &input, &out, width, height, depth, components, bit_depth, signed, lossless, psnr, bpv, ht, tile_x, tile_y,
            tile_z, levels_x, levels_y, levels_z,
        ),
        Commands::Decode {
            input,
            out,
            roi,
            tolerate_errors,
        } => decode_cmd(&input, &out, roi, tolerate_errors),
        Commands::Transcode { input, out, direction, verify } => transcode_cmd(&input, &out, direction, verify),
        Commands::Inspect { input } => inspect_cmd(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_cmd(
    input: &PathBuf,
    out: &PathBuf,
    width: u32,
    height: u32,
    depth: u32,
    components: u32,
    bit_depth: u8,
    signed: bool,
    lossless: bool,
    psnr: Option<f64>,
    bpv: Option<f64>,
    ht: bool,
    tile_x: Option<u32>,
    tile_y: Option<u32>,
    tile_z: Option<u32>,
    levels_x: Option<u8>,
    levels_y: Option<u8>,
    levels_z: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read(input)?;
    let sample_bytes = Component::bytes_per_sample(bit_depth);
    let voxels = width as usize * height as usize * depth as usize;
    let expected = voxels * sample_bytes * components as usize;
    if raw.len() != expected {
        return Err(format!("input length {} does not match W*H*D*C*bytes = {expected}", raw.len()).into());
    }

    let mut comps = Vec::with_capacity(components as usize);
    for ci in 0..components {
        let start = ci as usize * voxels * sample_bytes;
        let end = start + voxels * sample_bytes;
        comps.push(Component {
            index: ci,
            width,
            height,
            depth,
            bit_depth,
            signed,
            data: raw[start..end].to_vec(),
        });
    }
    let volume = Volume {
        width,
        height,
        depth,
        components: comps,
    };

    let mode = if ht {
        if lossless || (psnr.is_none() && bpv.is_none()) {
            CompressionMode::LosslessHT
        } else if let Some(p) = psnr {
            CompressionMode::LossyHT { target_psnr: p }
        } else {
            CompressionMode::LossyHT { target_psnr: 40.0 }
        }
    } else if lossless || (psnr.is_none() && bpv.is_none()) {
        CompressionMode::Lossless
    } else if let Some(p) = psnr {
        CompressionMode::Lossy { target_psnr: p }
    } else {
        CompressionMode::TargetBitrate {
            bits_per_voxel: bpv.unwrap(),
        }
    };

    let tiling = TilingConfig::new(tile_x.unwrap_or(width), tile_y.unwrap_or(height), tile_z.unwrap_or(depth))?;
    let levels = DecompositionLevels {
        x: levels_x.unwrap_or(5),
        y: levels_y.unwrap_or(5),
        z: levels_z.unwrap_or(5),
    };

    let config = EncoderConfig {
        tiling,
        mode,
        levels,
        boundary: BoundaryMode::Symmetric,
        quality_layers: 1,
        progression_order: ProgressionOrder::Lrcps,
        ht: HtConfig::default(),
    };

    let bytes = jp3d_rs::encoder::encode(&volume, &config)?;
    fs::write(out, &bytes)?;
    println!("Encoded {width}x{height}x{depth} ({components} components) to {out:?} ({} bytes)", bytes.len());
    Ok(())
}

fn decode_cmd(input: &PathBuf, out: &PathBuf, roi: Option<Vec<i64>>, tolerate_errors: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let config = DecoderConfig { tolerate_errors };

    let result = match roi {
        Some(coords) if coords.len() == 6 => {
            let region = Region::from_bounds(coords[0], coords[1], coords[2], coords[3], coords[4], coords[5]);
            jp3d_rs::roi::decode_region(&bytes, &region, &config)?
        }
        Some(_) => return Err("--roi requires exactly 6 values: x0,x1,y0,y1,z0,z1".into()),
        None => jp3d_rs::decoder::decode(&bytes, &config)?,
    };

    let mut raw = Vec::new();
    for component in &result.volume.components {
        raw.extend_from_slice(&component.data);
    }
    fs::write(out, &raw)?;
    println!(
        "Decoded {}x{}x{} to {out:?} (partial={}, {} warning(s))",
        result.volume.width,
        result.volume.height,
        result.volume.depth,
        result.partial,
        result.warnings.len()
    );
    for w in &result.warnings {
        eprintln!("warning: {w}");
    }
    Ok(())
}

fn transcode_cmd(input: &PathBuf, out: &PathBuf, direction: CliDirection, verify: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let dir = match direction {
        CliDirection::ToHt => Direction::StandardToHt,
        CliDirection::ToStandard => Direction::HtToStandard,
    };
    let transcoded = jp3d_rs::transcoder::transcode(&bytes, dir, &HtConfig::default(), verify)?;
    fs::write(out, &transcoded)?;
    println!("Transcoded {input:?} to {out:?} ({} bytes)", transcoded.len());
    Ok(())
}

fn inspect_cmd(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let parsed = jp3d_rs::parser::parse(&bytes)?;

    println!("File: {input:?}");
    println!("Size: {} bytes", bytes.len());
    println!(
        "Dimensions: {}x{}x{} ({} component(s))",
        parsed.siz.width,
        parsed.siz.height,
        parsed.siz.depth,
        parsed.siz.components.len()
    );
    println!(
        "Tile size: {}x{}x{}",
        parsed.siz.tile_width, parsed.siz.tile_height, parsed.siz.tile_depth
    );
    println!(
        "Decomposition levels: x={} y={} z={}",
        parsed.cod.levels.x, parsed.cod.levels.y, parsed.cod.levels.z
    );
    println!("Progression order: {:?}", parsed.cod.progression_order);
    println!("Quality layers: {}", parsed.cod.quality_layers);
    println!("HT block coding: {}", parsed.cod.is_ht);
    println!("Lossless: {}", parsed.qcd.is_lossless());
    if let Some(cap) = &parsed.cap {
        println!("CAP: Pcap=0x{:08X} Ccap=0x{:04X}", cap.pcap, cap.ccap);
    }
    println!("Tiles: {}", parsed.tiles.len());
    Ok(())
}
