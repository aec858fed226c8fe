//! Sentinel integer framing.
//!
//! A tile is a flat sequence of integers: per band `height, width`, then per
//! block `contexts.., 2048, bytes.., 2048`, `2049` after every block row,
//! `2050` after the band and `2051` after the tile. Context labels (0..=18)
//! and coded bytes (0..=255) never reach the sentinel range.
//!
//! On disk the sequence is stored as little-endian `i32`s.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::debug;

use super::band::block_grid;
use super::image::{EncodedBand, EncodedBlock, EncodedImage, EncodedTile, SubbandOrientation};
use crate::coding_parameters::{validate_bit_planes, validate_code_block_size};
use crate::constants::{
    CHANNEL_COUNT, MAXIMUM_CONTEXT_LABEL, MAXIMUM_DECOMPOSITION_LEVELS, SENTINEL_BAND,
    SENTINEL_BLOCK, SENTINEL_ROW, SENTINEL_TILE,
};
use crate::error::{EbcotError, Location};

fn is_sentinel(value: i32) -> bool {
    (SENTINEL_BLOCK..=SENTINEL_TILE).contains(&value)
}

fn frame_block(
    block: &EncodedBlock,
    location: Location,
    out: &mut Vec<i32>,
) -> Result<(), EbcotError> {
    let contexts = block
        .contexts
        .as_ref()
        .ok_or(EbcotError::MissingContextLabels { location })?;
    out.extend(contexts.iter().map(|&label| i32::from(label)));
    out.push(SENTINEL_BLOCK);
    out.extend(block.data.iter().map(|&byte| i32::from(byte)));
    out.push(SENTINEL_BLOCK);
    Ok(())
}

fn frame_band(
    band: &EncodedBand,
    block_size: usize,
    location: Location,
    out: &mut Vec<i32>,
) -> Result<(), EbcotError> {
    // Dimensions share the integer channel with the sentinels.
    let height = i32::try_from(band.height)
        .ok()
        .filter(|&h| h < SENTINEL_BLOCK)
        .ok_or(EbcotError::InvalidParameter(
            "band dimensions must stay below 2048 in a sentinel stream",
        ))?;
    let width = i32::try_from(band.width)
        .ok()
        .filter(|&w| w < SENTINEL_BLOCK)
        .ok_or(EbcotError::InvalidParameter(
            "band dimensions must stay below 2048 in a sentinel stream",
        ))?;
    let (rows, cols) = block_grid(band.width, band.height, block_size);
    if band.blocks.len() != rows * cols {
        return Err(EbcotError::BlockCountMismatch {
            expected: rows * cols,
            found: band.blocks.len(),
            location,
        });
    }

    out.push(height);
    out.push(width);
    for row in 0..rows {
        for col in 0..cols {
            let index = row * cols + col;
            frame_block(&band.blocks[index], location.with_block(index), out)?;
        }
        out.push(SENTINEL_ROW);
    }
    out.push(SENTINEL_BAND);
    Ok(())
}

/// Frames the bands of one tile, closed by the tile sentinel.
pub fn frame_tile(
    tile: &EncodedTile,
    block_size: usize,
    tile_index: usize,
) -> Result<Vec<i32>, EbcotError> {
    validate_code_block_size(block_size)?;
    let mut out = Vec::new();
    for (band_index, band) in tile.bands.iter().enumerate() {
        let location = Location::tile(tile_index).with_band(band_index);
        frame_band(band, block_size, location, &mut out)?;
    }
    out.push(SENTINEL_TILE);
    Ok(out)
}

/// Frames every tile of `image`. The stream has no header, so the image must
/// have the fixed Y, Cb, Cr channel layout.
pub fn frame_image(image: &EncodedImage) -> Result<Vec<i32>, EbcotError> {
    if image.channel_count as usize != CHANNEL_COUNT {
        return Err(EbcotError::InvalidParameter(
            "a sentinel stream carries exactly three channels",
        ));
    }
    let bands_per_tile = image.bands_per_tile();
    let mut out = Vec::new();
    for (index, tile) in image.tiles.iter().enumerate() {
        if tile.bands.len() != bands_per_tile {
            return Err(EbcotError::BandCountMismatch {
                found: tile.bands.len(),
                location: Location::tile(index),
            });
        }
        out.extend(frame_tile(tile, image.code_block_size, index)?);
    }
    debug!("Framed {} tiles into {} values", image.tiles.len(), out.len());
    Ok(out)
}

/// Cursor over a sentinel stream that tracks where it is for error reports.
struct SentinelReader<'a> {
    values: &'a [i32],
    position: usize,
}

impl SentinelReader<'_> {
    fn peek(&self) -> Option<i32> {
        self.values.get(self.position).copied()
    }

    fn next(&mut self) -> Result<i32, EbcotError> {
        let value = self.peek().ok_or(EbcotError::UnexpectedEndOfStream {
            location: Location::default(),
        })?;
        self.position += 1;
        Ok(value)
    }

    fn expect(&mut self, sentinel: i32, name: &'static str) -> Result<(), EbcotError> {
        match self.next()? {
            value if value == sentinel => Ok(()),
            found => Err(EbcotError::MissingSentinel {
                expected: name,
                found,
                location: Location::default(),
            }),
        }
    }

    /// Reads values up to the block sentinel, each checked against `0..=max`.
    fn read_segment(&mut self, max: i32, kind: &'static str) -> Result<Vec<u8>, EbcotError> {
        let mut segment = Vec::new();
        loop {
            match self.next()? {
                SENTINEL_BLOCK => return Ok(segment),
                value if is_sentinel(value) => {
                    return Err(EbcotError::MissingSentinel {
                        expected: "block",
                        found: value,
                        location: Location::default(),
                    });
                }
                value if (0..=max).contains(&value) => segment.push(value as u8),
                value => {
                    return Err(EbcotError::InvalidSymbol {
                        kind,
                        value,
                        location: Location::default(),
                    });
                }
            }
        }
    }

    fn read_dimension(&mut self, kind: &'static str) -> Result<usize, EbcotError> {
        match self.next()? {
            value if (0..SENTINEL_BLOCK).contains(&value) => Ok(value as usize),
            value => Err(EbcotError::InvalidSymbol {
                kind,
                value,
                location: Location::default(),
            }),
        }
    }

    fn read_block(&mut self) -> Result<EncodedBlock, EbcotError> {
        let contexts = self.read_segment(i32::from(MAXIMUM_CONTEXT_LABEL), "context label")?;
        let data = self.read_segment(i32::from(u8::MAX), "coded byte")?;
        Ok(EncodedBlock {
            data,
            contexts: Some(contexts),
        })
    }

    /// Reads one band; its orientation is fixed later from its position.
    fn read_band(&mut self, block_size: usize) -> Result<EncodedBand, EbcotError> {
        let height = self.read_dimension("band height")?;
        let width = self.read_dimension("band width")?;
        let (rows, cols) = block_grid(width, height, block_size);
        let mut blocks = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let index = row * cols + col;
                let block = self
                    .read_block()
                    .map_err(|e| e.at(Location::default().with_block(index)))?;
                blocks.push(block);
            }
            self.expect(SENTINEL_ROW, "row")?;
        }
        self.expect(SENTINEL_BAND, "band")?;
        Ok(EncodedBand {
            orientation: SubbandOrientation::LL,
            width,
            height,
            blocks,
        })
    }

    fn read_tile(
        &mut self,
        tile_index: usize,
        block_size: usize,
    ) -> Result<(EncodedTile, u8), EbcotError> {
        let mut bands = Vec::new();
        loop {
            let location = Location::tile(tile_index).with_band(bands.len());
            match self.peek() {
                None => return Err(EbcotError::UnexpectedEndOfStream { location }),
                Some(SENTINEL_TILE) => {
                    self.position += 1;
                    break;
                }
                Some(_) => bands.push(self.read_band(block_size).map_err(|e| e.at(location))?),
            }
        }

        let levels = decomposition_levels(bands.len()).ok_or(EbcotError::BandCountMismatch {
            found: bands.len(),
            location: Location::tile(tile_index),
        })?;
        let per_channel = bands.len() / CHANNEL_COUNT;
        for (index, band) in bands.iter_mut().enumerate() {
            band.orientation = SubbandOrientation::at_channel_position(index % per_channel);
        }
        Ok((EncodedTile { bands }, levels))
    }
}

/// `D` for a tile of `band_count` bands, if the count is `3 * (1 + 3D)`.
fn decomposition_levels(band_count: usize) -> Option<u8> {
    if band_count == 0 || band_count % CHANNEL_COUNT != 0 {
        return None;
    }
    let details = band_count / CHANNEL_COUNT - 1;
    if details % 3 != 0 {
        return None;
    }
    u8::try_from(details / 3)
        .ok()
        .filter(|&levels| levels <= MAXIMUM_DECOMPOSITION_LEVELS)
}

/// Iterator over the tiles of a sentinel stream, parsed one at a time.
///
/// Yields the tile and its decomposition depth. Stops after the first error.
pub struct SentinelTiles<'a> {
    reader: SentinelReader<'a>,
    block_size: usize,
    tile_index: usize,
    failed: bool,
}

impl<'a> SentinelTiles<'a> {
    pub fn new(values: &'a [i32], block_size: usize) -> Result<Self, EbcotError> {
        validate_code_block_size(block_size)?;
        Ok(Self {
            reader: SentinelReader {
                values,
                position: 0,
            },
            block_size,
            tile_index: 0,
            failed: false,
        })
    }
}

impl Iterator for SentinelTiles<'_> {
    type Item = Result<(EncodedTile, u8), EbcotError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.peek().is_none() {
            return None;
        }
        let result = self.reader.read_tile(self.tile_index, self.block_size);
        self.failed = result.is_err();
        self.tile_index += 1;
        Some(result)
    }
}

/// Parses a whole sentinel stream. Block size and bit-plane count are not
/// carried by the stream and must be supplied.
pub fn parse_image(
    values: &[i32],
    code_block_size: usize,
    bit_planes: u8,
) -> Result<EncodedImage, EbcotError> {
    validate_bit_planes(bit_planes)?;
    let mut tiles = Vec::new();
    let mut depth = None;
    for (index, tile) in SentinelTiles::new(values, code_block_size)?.enumerate() {
        let (tile, levels) = tile?;
        if *depth.get_or_insert(levels) != levels {
            return Err(EbcotError::BandCountMismatch {
                found: tile.bands.len(),
                location: Location::tile(index),
            });
        }
        tiles.push(tile);
    }
    Ok(EncodedImage {
        code_block_size,
        bit_planes,
        decomposition_levels: depth.unwrap_or(0),
        channel_count: CHANNEL_COUNT as u8,
        tiles,
    })
}

pub fn write_file(path: impl AsRef<Path>, values: &[i32]) -> Result<(), EbcotError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for &value in values {
        writer.write_i32::<LittleEndian>(value)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<i32>, EbcotError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(EbcotError::UnexpectedEndOfStream {
            location: Location::default(),
        });
    }
    let mut values = vec![0; bytes.len() / 4];
    LittleEndian::read_i32_into(&bytes, &mut values);
    Ok(values)
}
