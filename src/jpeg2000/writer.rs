//! Length-prefixed codestream writer.
//!
//! Layout: SOC, one PRM segment, then per tile an SOT segment followed by one
//! SOB segment per band, each band followed by its blocks as
//! `(length: u32, bytes)`, and finally EOC. Context labels are not written.

use log::debug;

use super::band::block_grid;
use super::image::{EncodedBand, EncodedImage, EncodedTile};
use crate::coding_parameters::{validate_bit_planes, validate_code_block_size};
use crate::error::{EbcotError, Location};
use crate::marker_code::{
    CODING_PARAMETERS_SEGMENT_LENGTH, MarkerCode, START_OF_BAND_SEGMENT_LENGTH,
    START_OF_TILE_SEGMENT_LENGTH,
};
use crate::stream_writer::StreamWriter;

pub struct CodestreamWriter {
    writer: StreamWriter,
}

fn to_u32(value: usize, what: &'static str) -> Result<u32, EbcotError> {
    u32::try_from(value).map_err(|_| EbcotError::InvalidParameter(what))
}

impl Default for CodestreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodestreamWriter {
    pub fn new() -> Self {
        Self {
            writer: StreamWriter::new(),
        }
    }

    pub fn write_soc(&mut self) -> Result<(), EbcotError> {
        self.writer.write_marker(MarkerCode::StartOfCodestream)
    }

    pub fn write_eoc(&mut self) -> Result<(), EbcotError> {
        self.writer.write_marker(MarkerCode::EndOfCodestream)
    }

    pub fn write_prm(&mut self, image: &EncodedImage) -> Result<(), EbcotError> {
        let block_size = u16::try_from(image.code_block_size)
            .map_err(|_| EbcotError::InvalidParameter("code-block size does not fit in 16 bits"))?;
        self.writer.write_marker(MarkerCode::CodingParameters)?;
        self.writer.write_u16(CODING_PARAMETERS_SEGMENT_LENGTH)?;
        self.writer.write_u16(block_size)?;
        self.writer.write_byte(image.bit_planes)?;
        self.writer.write_byte(image.decomposition_levels)?;
        self.writer.write_byte(image.channel_count)?;
        self.writer
            .write_u32(to_u32(image.tiles.len(), "too many tiles")?)?;
        Ok(())
    }

    /// Writes one tile; Psot is patched once the tile length is known.
    pub fn write_tile(
        &mut self,
        index: usize,
        tile: &EncodedTile,
        block_size: usize,
    ) -> Result<(), EbcotError> {
        let start = self.writer.len();
        self.writer.write_marker(MarkerCode::StartOfTile)?;
        self.writer.write_u16(START_OF_TILE_SEGMENT_LENGTH)?;
        self.writer.write_u32(to_u32(index, "too many tiles")?)?;
        let psot_position = self.writer.len();
        self.writer.write_u32(0)?;

        for (band_index, band) in tile.bands.iter().enumerate() {
            let location = Location::tile(index).with_band(band_index);
            self.write_band(band_index, band, block_size, location)?;
        }

        let tile_length = to_u32(self.writer.len() - start, "tile exceeds 4 GiB")?;
        self.writer.patch_u32(psot_position, tile_length)?;
        debug!("Wrote tile {index}: {} bands, {tile_length} bytes", tile.bands.len());
        Ok(())
    }

    fn write_band(
        &mut self,
        band_index: usize,
        band: &EncodedBand,
        block_size: usize,
        location: Location,
    ) -> Result<(), EbcotError> {
        let (rows, cols) = block_grid(band.width, band.height, block_size);
        if band.blocks.len() != rows * cols {
            return Err(EbcotError::BlockCountMismatch {
                expected: rows * cols,
                found: band.blocks.len(),
                location,
            });
        }
        let band_index = u16::try_from(band_index)
            .map_err(|_| EbcotError::InvalidParameter("too many bands in a tile"))?;

        self.writer.write_marker(MarkerCode::StartOfBand)?;
        self.writer.write_u16(START_OF_BAND_SEGMENT_LENGTH)?;
        self.writer.write_u16(band_index)?;
        self.writer.write_byte(band.orientation.into())?;
        self.writer.write_u32(to_u32(band.height, "band height exceeds 32 bits")?)?;
        self.writer.write_u32(to_u32(band.width, "band width exceeds 32 bits")?)?;
        self.writer.write_u32(to_u32(band.blocks.len(), "too many blocks")?)?;
        for block in &band.blocks {
            self.writer
                .write_u32(to_u32(block.data.len(), "code-block exceeds 4 GiB")?)?;
            self.writer.write_bytes(&block.data)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Serialises `image` as a length-prefixed codestream.
pub fn write_codestream(image: &EncodedImage) -> Result<Vec<u8>, EbcotError> {
    validate_code_block_size(image.code_block_size)?;
    validate_bit_planes(image.bit_planes)?;
    let bands_per_tile = image.bands_per_tile();
    let mut writer = CodestreamWriter::new();
    writer.write_soc()?;
    writer.write_prm(image)?;
    for (index, tile) in image.tiles.iter().enumerate() {
        if tile.bands.len() != bands_per_tile {
            return Err(EbcotError::BandCountMismatch {
                found: tile.bands.len(),
                location: Location::tile(index),
            });
        }
        writer.write_tile(index, tile, image.code_block_size)?;
    }
    writer.write_eoc()?;
    Ok(writer.into_inner())
}
