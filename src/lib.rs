/*!
# jp3d-rs

`jp3d-rs` is a pure Rust implementation of a volumetric JPEG 2000 codec
(ISO/IEC 15444-10, JP3D): a 3-D separable wavelet transform, tiling and
scalar quantization, a raw/HT-prefixed tile payload, and the JP3D
codestream wire format, plus region-of-interest, progressive, streaming,
and transcoding access modes over that format.

## Scope

This core does not implement a full Tier-1 entropy coder (MQ-coder,
bit-plane coding, tag trees, packet headers); tile payloads are raw
big-endian quantized coefficients or the documented HT-prefixed variant.
Multi-component decorrelation transforms (ICT/RCT) are not implemented.
*/

pub mod builder;
pub mod byte_io;
pub mod config;
pub mod decoder;
pub mod dwt;
pub mod encoder;
pub mod error;
pub mod marker;
pub mod parser;
pub mod progressive;
pub mod rate_control;
pub mod roi;
pub mod spatial;
pub mod streaming;
pub mod tile_codec;
pub mod tiling;
pub mod transcoder;
pub mod volume;

pub use error::{Jp3dError, Result};
