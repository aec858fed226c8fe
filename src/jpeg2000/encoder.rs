//! Tier-1 encoder.
//!
//! Walks every tile channel by channel (`[LL, (LH, HL, HH) x levels]` each)
//! and codes every band through the band framer.

use log::{debug, info};

use super::band::encode_band;
use super::image::{EncodedImage, EncodedTile, SubbandOrientation, TileCoefficients};
use crate::coding_parameters::CodingParameters;
use crate::constants::CHANNEL_COUNT;
use crate::error::{EbcotError, Location};

/// Encodes quantized tile coefficients into coded blocks.
///
/// The parameters are fixed at construction; the encoder holds no other
/// state and can be shared between threads.
#[derive(Debug, Clone)]
pub struct EbcotEncoder {
    params: CodingParameters,
}

impl EbcotEncoder {
    pub fn new(params: CodingParameters) -> Result<Self, EbcotError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &CodingParameters {
        &self.params
    }

    /// Encodes one tile. `index` only serves error locations and logging.
    pub fn encode_tile(
        &self,
        tile: &TileCoefficients,
        index: usize,
    ) -> Result<EncodedTile, EbcotError> {
        let band_count = tile.bands().count();
        if tile.channels.is_empty()
            || tile.decomposition_levels() != Some(self.params.decomposition_levels as usize)
        {
            return Err(EbcotError::BandCountMismatch {
                found: band_count,
                location: Location::tile(index),
            });
        }

        let per_channel = self.params.bands_per_channel();
        let mut bands = Vec::with_capacity(band_count);
        for (band_index, band) in tile.bands().enumerate() {
            let location = Location::tile(index).with_band(band_index);
            if band.orientation != SubbandOrientation::at_channel_position(band_index % per_channel)
            {
                return Err(EbcotError::InvalidParameter(
                    "sub-band orientation does not match its position in the channel",
                ));
            }
            bands.push(encode_band(band, &self.params, location)?);
        }

        let tile = EncodedTile { bands };
        debug!(
            "Encoded tile {index}: {band_count} bands, {} bytes",
            tile.bands.iter().map(|band| band.coded_bytes()).sum::<usize>()
        );
        Ok(tile)
    }

    /// Encodes every tile. All tiles must have the same channel count and
    /// the configured decomposition depth.
    pub fn encode(&self, tiles: &[TileCoefficients]) -> Result<EncodedImage, EbcotError> {
        let channel_count = tiles
            .first()
            .map_or(CHANNEL_COUNT, |tile| tile.channels.len());
        let channel_count = u8::try_from(channel_count)
            .map_err(|_| EbcotError::InvalidParameter("too many channels"))?;

        let mut encoded = Vec::with_capacity(tiles.len());
        for (index, tile) in tiles.iter().enumerate() {
            if tile.channels.len() != channel_count as usize {
                return Err(EbcotError::InvalidParameter(
                    "every tile must have the same channel count",
                ));
            }
            encoded.push(self.encode_tile(tile, index)?);
        }

        let image = EncodedImage {
            code_block_size: self.params.code_block_size,
            bit_planes: self.params.bit_planes,
            decomposition_levels: self.params.decomposition_levels,
            channel_count,
            tiles: encoded,
        };
        info!(
            "Encoded {} tiles, {} coded bytes",
            image.tiles.len(),
            image.raw_stream().len()
        );
        Ok(image)
    }
}
