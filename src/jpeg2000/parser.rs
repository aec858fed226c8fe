//! Length-prefixed codestream parser.
//!
//! Inverse of [`super::writer`]. Every marker, segment length and index is
//! checked against the position it is read at; counts read from the stream
//! are never used to preallocate. Header errors carry the tile and band they
//! were found in.

use log::debug;

use super::band::block_grid;
use super::image::{EncodedBand, EncodedBlock, EncodedImage, EncodedTile, SubbandOrientation};
use crate::constants::{
    MAXIMUM_BIT_PLANES, MAXIMUM_CODE_BLOCK_SIZE, MAXIMUM_DECOMPOSITION_LEVELS,
    MINIMUM_CODE_BLOCK_SIZE, STRIPE_HEIGHT,
};
use crate::error::{EbcotError, Location};
use crate::marker_code::{
    CODING_PARAMETERS_SEGMENT_LENGTH, MarkerCode, START_OF_BAND_SEGMENT_LENGTH,
    START_OF_TILE_SEGMENT_LENGTH,
};
use crate::stream_reader::StreamReader;

/// Fields of the PRM segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodestreamHeader {
    pub code_block_size: usize,
    pub bit_planes: u8,
    pub decomposition_levels: u8,
    pub channel_count: u8,
    pub tile_count: usize,
}

impl CodestreamHeader {
    fn bands_per_channel(&self) -> usize {
        1 + 3 * self.decomposition_levels as usize
    }
}

pub struct CodestreamParser<'a> {
    reader: StreamReader<'a>,
}

impl<'a> CodestreamParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: StreamReader::new(data),
        }
    }

    /// Reads SOC and the PRM segment.
    pub fn parse_main_header(&mut self) -> Result<CodestreamHeader, EbcotError> {
        self.reader.expect_marker(MarkerCode::StartOfCodestream)?;
        self.reader.expect_marker(MarkerCode::CodingParameters)?;
        self.reader.read_segment_length(
            CODING_PARAMETERS_SEGMENT_LENGTH,
            "PRM segment length must be 11",
        )?;
        let header = CodestreamHeader {
            code_block_size: self.reader.read_u16()? as usize,
            bit_planes: self.reader.read_u8()?,
            decomposition_levels: self.reader.read_u8()?,
            channel_count: self.reader.read_u8()?,
            tile_count: self.reader.read_u32()? as usize,
        };

        if !(MINIMUM_CODE_BLOCK_SIZE..=MAXIMUM_CODE_BLOCK_SIZE).contains(&header.code_block_size)
            || header.code_block_size % STRIPE_HEIGHT != 0
        {
            return Err(EbcotError::invalid_header(
                "code-block size must be a multiple of 4 between 4 and 1024",
            ));
        }
        if header.bit_planes == 0 || header.bit_planes > MAXIMUM_BIT_PLANES {
            return Err(EbcotError::invalid_header(
                "bit-plane count must be between 1 and 31",
            ));
        }
        if header.decomposition_levels > MAXIMUM_DECOMPOSITION_LEVELS {
            return Err(EbcotError::invalid_header(
                "decomposition levels must not exceed 32",
            ));
        }
        if header.channel_count == 0 {
            return Err(EbcotError::invalid_header("channel count must not be zero"));
        }
        debug!("PRM: {header:?}");
        Ok(header)
    }

    /// Reads one SOT segment and the bands it holds.
    pub fn parse_tile(
        &mut self,
        index: usize,
        header: &CodestreamHeader,
    ) -> Result<EncodedTile, EbcotError> {
        let start = self.reader.position();
        self.reader.expect_marker(MarkerCode::StartOfTile)?;
        self.reader
            .read_segment_length(START_OF_TILE_SEGMENT_LENGTH, "SOT segment length must be 10")?;
        if self.reader.read_u32()? as usize != index {
            return Err(EbcotError::invalid_header("tile index out of order"));
        }
        let psot = self.reader.read_u32()? as usize;

        let bands_per_channel = header.bands_per_channel();
        let band_count = bands_per_channel * header.channel_count as usize;
        let mut bands = Vec::new();
        for band_index in 0..band_count {
            let expected = SubbandOrientation::at_channel_position(band_index % bands_per_channel);
            let band = self
                .parse_band(band_index, expected, header.code_block_size)
                .map_err(|e| e.at(Location::tile(index).with_band(band_index)))?;
            bands.push(band);
        }

        let consumed = self.reader.position() - start;
        if consumed != psot {
            return Err(EbcotError::invalid_header("tile length does not match Psot"));
        }
        debug!("Parsed tile {index}: {band_count} bands, {consumed} bytes");
        Ok(EncodedTile { bands })
    }

    fn parse_band(
        &mut self,
        band_index: usize,
        expected: SubbandOrientation,
        block_size: usize,
    ) -> Result<EncodedBand, EbcotError> {
        self.reader.expect_marker(MarkerCode::StartOfBand)?;
        self.reader
            .read_segment_length(START_OF_BAND_SEGMENT_LENGTH, "SOB segment length must be 17")?;
        if self.reader.read_u16()? as usize != band_index {
            return Err(EbcotError::invalid_header("band index out of order"));
        }
        let orientation = SubbandOrientation::try_from(self.reader.read_u8()?)?;
        if orientation != expected {
            return Err(EbcotError::invalid_header(
                "band type does not match its position in the tile",
            ));
        }
        let height = self.reader.read_u32()? as usize;
        let width = self.reader.read_u32()? as usize;
        let block_count = self.reader.read_u32()? as usize;

        let (rows, cols) = block_grid(width, height, block_size);
        if block_count != rows * cols {
            return Err(EbcotError::BlockCountMismatch {
                expected: rows * cols,
                found: block_count,
                location: Location::default(),
            });
        }

        let mut blocks = Vec::new();
        for block_index in 0..block_count {
            let block = self
                .parse_block()
                .map_err(|e| e.at(Location::default().with_block(block_index)))?;
            blocks.push(block);
        }
        Ok(EncodedBand {
            orientation,
            width,
            height,
            blocks,
        })
    }

    fn parse_block(&mut self) -> Result<EncodedBlock, EbcotError> {
        let length = self.reader.read_u32()? as usize;
        let data = self.reader.read_bytes(length)?.to_vec();
        Ok(EncodedBlock {
            data,
            contexts: None,
        })
    }

    /// Reads EOC and rejects anything after it.
    pub fn parse_end(&mut self) -> Result<(), EbcotError> {
        self.reader.expect_marker(MarkerCode::EndOfCodestream)?;
        match self.reader.remaining_data().len() {
            0 => Ok(()),
            trailing => Err(EbcotError::TrailingData(trailing)),
        }
    }
}

/// Parses a length-prefixed codestream into its coded blocks.
pub fn parse_codestream(data: &[u8]) -> Result<EncodedImage, EbcotError> {
    let mut parser = CodestreamParser::new(data);
    let header = parser.parse_main_header()?;
    let mut tiles = Vec::new();
    for index in 0..header.tile_count {
        let tile = parser
            .parse_tile(index, &header)
            .map_err(|e| e.at(Location::tile(index)))?;
        tiles.push(tile);
    }
    parser.parse_end()?;
    Ok(EncodedImage {
        code_block_size: header.code_block_size,
        bit_planes: header.bit_planes,
        decomposition_levels: header.decomposition_levels,
        channel_count: header.channel_count,
        tiles,
    })
}
