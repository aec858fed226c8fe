//! Band framing: splitting subbands into code-blocks and coding the blocks,
//! on a worker pool when the band is large enough.

use log::{debug, trace};

use super::code_block::{CodeBlock, decode_code_block, encode_code_block};
use super::image::{EncodedBand, Subband};
use crate::coding_parameters::{CodingParameters, ParallelPolicy};
use crate::constants::MAXIMUM_DECODED_BAND_AREA;
use crate::error::{EbcotError, Location};

/// Block rows and block columns covering a `width` x `height` band.
pub fn block_grid(width: usize, height: usize, block_size: usize) -> (usize, usize) {
    (height.div_ceil(block_size), width.div_ceil(block_size))
}

/// Cuts a band into square blocks in row-major order. Blocks on the right
/// and bottom edges are padded with zeros.
pub fn split_into_blocks(band: &Subband, block_size: usize) -> Vec<CodeBlock> {
    let (rows, cols) = block_grid(band.width, band.height, block_size);
    let mut blocks = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let mut block = CodeBlock::zeros(block_size, block_size);
            let (x0, y0) = (col * block_size, row * block_size);
            let w = block_size.min(band.width - x0);
            let h = block_size.min(band.height - y0);
            for y in 0..h {
                let src = (y0 + y) * band.width + x0;
                block.coefficients[y * block_size..y * block_size + w]
                    .copy_from_slice(&band.data[src..src + w]);
            }
            blocks.push(block);
        }
    }
    blocks
}

/// Codes every block of `band`; the result keeps row-major block order.
pub fn encode_band(
    band: &Subband,
    params: &CodingParameters,
    location: Location,
) -> Result<EncodedBand, EbcotError> {
    params.validate()?;
    let blocks = split_into_blocks(band, params.code_block_size);
    debug!(
        "Encoding {:?} band {}x{} at {}: {} blocks",
        band.orientation,
        band.width,
        band.height,
        location,
        blocks.len()
    );
    let encoded = map_blocks(&blocks, &params.parallel, |index, block| {
        let encoded = encode_code_block(block, band.orientation, params.bit_planes)
            .map_err(|e| e.at(location.with_block(index)))?;
        trace!(
            "Block {} of {}: {} symbols, {} bytes",
            index,
            location,
            encoded.contexts.as_ref().map_or(0, Vec::len),
            encoded.data.len()
        );
        Ok(encoded)
    })?;
    Ok(EncodedBand {
        orientation: band.orientation,
        width: band.width,
        height: band.height,
        blocks: encoded,
    })
}

/// Decodes every block of `encoded` and crops the result to the band size.
///
/// Each block is cropped as soon as it is decoded, so peak memory follows
/// the band area rather than the padded block grid. Bands larger than
/// [`MAXIMUM_DECODED_BAND_AREA`] coefficients are refused.
pub fn decode_band(
    encoded: &EncodedBand,
    params: &CodingParameters,
    location: Location,
) -> Result<Subband, EbcotError> {
    params.validate()?;
    let size = params.code_block_size;
    let (rows, cols) = block_grid(encoded.width, encoded.height, size);
    if encoded.blocks.len() != rows * cols {
        return Err(EbcotError::BlockCountMismatch {
            expected: rows * cols,
            found: encoded.blocks.len(),
            location,
        });
    }
    if encoded
        .width
        .checked_mul(encoded.height)
        .is_none_or(|area| area > MAXIMUM_DECODED_BAND_AREA)
    {
        return Err(EbcotError::BandTooLarge {
            width: encoded.width,
            height: encoded.height,
            location,
        });
    }
    debug!(
        "Decoding {:?} band {}x{} at {}: {} blocks",
        encoded.orientation,
        encoded.width,
        encoded.height,
        location,
        encoded.blocks.len()
    );
    let blocks = map_blocks(&encoded.blocks, &params.parallel, |index, block| {
        trace!("Block {} of {}: {} bytes", index, location, block.data.len());
        let decoded = decode_code_block(block, encoded.orientation, size, size, params.bit_planes)
            .map_err(|e| e.at(location.with_block(index)))?;
        let (x0, y0) = ((index % cols) * size, (index / cols) * size);
        let w = size.min(encoded.width - x0);
        let h = size.min(encoded.height - y0);
        let mut coefficients = Vec::with_capacity(w * h);
        for row in decoded.coefficients.chunks_exact(size).take(h) {
            coefficients.extend_from_slice(&row[..w]);
        }
        Ok(CodeBlock {
            width: w,
            height: h,
            coefficients,
        })
    })?;

    let mut band = Subband::zeros(encoded.orientation, encoded.width, encoded.height);
    for (index, block) in blocks.iter().enumerate() {
        let (x0, y0) = ((index % cols) * size, (index / cols) * size);
        for (y, row) in block.coefficients.chunks_exact(block.width).enumerate() {
            let dst = (y0 + y) * band.width + x0;
            band.data[dst..dst + block.width].copy_from_slice(row);
        }
    }
    Ok(band)
}

/// Applies `f` to every block, keeping input order in the output. Fails on
/// the first block error.
fn map_blocks<T, R, F>(items: &[T], policy: &ParallelPolicy, f: F) -> Result<Vec<R>, EbcotError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> Result<R, EbcotError> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        if policy.should_parallelize(items.len()) {
            return map_blocks_parallel(items, policy, f);
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = policy;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| f(index, item))
        .collect()
}

#[cfg(feature = "parallel")]
fn map_blocks_parallel<T, R, F>(
    items: &[T],
    policy: &ParallelPolicy,
    f: F,
) -> Result<Vec<R>, EbcotError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> Result<R, EbcotError> + Sync + Send,
{
    use rayon::prelude::*;

    let run = || {
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| f(index, item))
            .collect::<Result<Vec<_>, _>>()
    };
    match policy.max_workers {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| EbcotError::WorkerPool(e.to_string()))?;
            pool.install(run)
        }
        None => run(),
    }
}
