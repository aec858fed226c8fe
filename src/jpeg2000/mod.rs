//! EBCOT Tier-1 coding (ISO/IEC 15444-1, Annexes C and D)
//!
//! - `mq_coder`: The MQ arithmetic coder and its probability states.
//! - `context`: Context formation from 3x3 significance neighbourhoods.
//! - `bit_plane_coder`: The three coding passes over one bit-plane.
//! - `code_block`: Bit-plane coding of one code-block into one MQ codeword.
//! - `band`: Splitting sub-bands into code-blocks, on a worker pool.
//! - `image`: Sub-bands, tiles and their coded forms.
//! - `writer` / `parser`: The length-prefixed byte codestream.
//! - `sentinel_stream`: The sentinel-delimited integer stream.
//! - `encoder` / `decoder`: Tile-level entry points.
//! - `coefficients`: Binary dump of quantized coefficients.

pub mod band;
pub mod bit_plane_coder;
pub mod code_block;
pub mod coefficients;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod image;
pub mod mq_coder;
pub mod parser;
pub mod sentinel_stream;
pub mod writer;
