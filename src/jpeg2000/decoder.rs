//! Tier-1 decoder.
//!
//! Accepts coded blocks in either persisted form and rebuilds the quantized
//! tile coefficients, tile by tile.

use std::path::Path;

use log::{debug, info, warn};

use super::band::decode_band;
use super::image::{EncodedImage, EncodedTile, TileCoefficients};
use super::parser::parse_codestream;
use super::sentinel_stream::{self, SentinelTiles};
use crate::coding_parameters::CodingParameters;
use crate::constants::CHANNEL_COUNT;
use crate::error::{EbcotError, Location};

#[derive(Debug, Clone)]
pub struct EbcotDecoder {
    params: CodingParameters,
}

impl EbcotDecoder {
    pub fn new(params: CodingParameters) -> Result<Self, EbcotError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &CodingParameters {
        &self.params
    }

    /// Parameters for an image whose own header takes precedence over the
    /// configured ones.
    fn parameters_for(&self, image: &EncodedImage) -> Result<CodingParameters, EbcotError> {
        let params = CodingParameters {
            code_block_size: image.code_block_size,
            bit_planes: image.bit_planes,
            decomposition_levels: image.decomposition_levels,
            parallel: self.params.parallel,
        };
        let differs = params.code_block_size != self.params.code_block_size
            || params.bit_planes != self.params.bit_planes;
        if differs && !image.tiles.is_empty() {
            warn!(
                "Stream parameters (block {}, {} bit-planes) override the configured ones \
                 (block {}, {} bit-planes)",
                params.code_block_size,
                params.bit_planes,
                self.params.code_block_size,
                self.params.bit_planes
            );
        }
        params.validate()?;
        Ok(params)
    }

    /// Decodes one tile of `channel_count` channels.
    pub fn decode_tile(
        &self,
        tile: &EncodedTile,
        channel_count: usize,
        index: usize,
        params: &CodingParameters,
    ) -> Result<TileCoefficients, EbcotError> {
        if tile.bands.len() != channel_count * params.bands_per_channel() {
            return Err(EbcotError::BandCountMismatch {
                found: tile.bands.len(),
                location: Location::tile(index),
            });
        }
        let bands = tile
            .bands
            .iter()
            .enumerate()
            .map(|(band_index, band)| {
                decode_band(band, params, Location::tile(index).with_band(band_index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Decoded tile {index}: {} bands", bands.len());
        TileCoefficients::from_bands(bands, channel_count)
    }

    pub fn decode(&self, image: &EncodedImage) -> Result<Vec<TileCoefficients>, EbcotError> {
        let params = self.parameters_for(image)?;
        let tiles = image
            .tiles
            .iter()
            .enumerate()
            .map(|(index, tile)| {
                self.decode_tile(tile, image.channel_count as usize, index, &params)
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!("Decoded {} tiles", tiles.len());
        Ok(tiles)
    }

    /// Decodes a length-prefixed codestream; its PRM segment overrides the
    /// configured block size, bit-plane count and depth.
    pub fn decode_codestream(&self, data: &[u8]) -> Result<Vec<TileCoefficients>, EbcotError> {
        self.decode(&parse_codestream(data)?)
    }

    /// Decodes a sentinel stream tile by tile. The configured block size and
    /// bit-plane count apply; the depth follows from each tile's band count
    /// and must not change between tiles.
    pub fn decode_sentinel_stream(
        &self,
        values: &[i32],
    ) -> Result<Vec<TileCoefficients>, EbcotError> {
        let mut tiles = Vec::new();
        let mut depth = None;
        let block_size = self.params.code_block_size;
        for (index, tile) in SentinelTiles::new(values, block_size)?.enumerate() {
            let (tile, levels) = tile?;
            if *depth.get_or_insert(levels) != levels {
                return Err(EbcotError::BandCountMismatch {
                    found: tile.bands.len(),
                    location: Location::tile(index),
                });
            }
            if levels != self.params.decomposition_levels {
                debug!(
                    "Tile {index} has {levels} levels, configured {}",
                    self.params.decomposition_levels
                );
            }
            let params = CodingParameters {
                decomposition_levels: levels,
                ..self.params
            };
            tiles.push(self.decode_tile(&tile, CHANNEL_COUNT, index, &params)?);
        }
        info!("Decoded {} tiles", tiles.len());
        Ok(tiles)
    }

    /// Reads a persisted sentinel stream and decodes it.
    pub fn decode_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<TileCoefficients>, EbcotError> {
        self.decode_sentinel_stream(&sentinel_stream::read_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding_parameters::ParallelPolicy;
    use crate::jpeg2000::encoder::EbcotEncoder;
    use crate::jpeg2000::image::{Subband, SubbandOrientation};

    fn tile(seed: usize) -> TileCoefficients {
        let bands = (0..12)
            .map(|i| {
                let side = [3, 3, 5, 6][i % 4];
                let data = (0..side * side)
                    .map(|j| (((j + i + seed) * 37) % 61) as i32 - 30)
                    .collect();
                Subband::new(SubbandOrientation::at_channel_position(i % 4), side, side, data)
                    .unwrap()
            })
            .collect();
        TileCoefficients::from_bands(bands, 3).unwrap()
    }

    fn params() -> CodingParameters {
        CodingParameters {
            code_block_size: 4,
            bit_planes: 6,
            decomposition_levels: 1,
            parallel: ParallelPolicy::sequential(),
        }
    }

    #[test]
    fn test_decodes_what_was_encoded() {
        let tiles = vec![tile(0), tile(1)];
        let image = EbcotEncoder::new(params()).unwrap().encode(&tiles).unwrap();
        let decoder = EbcotDecoder::new(params()).unwrap();
        assert_eq!(decoder.decode(&image).unwrap(), tiles);

        let values = image.to_sentinel_stream().unwrap();
        assert_eq!(decoder.decode_sentinel_stream(&values).unwrap(), tiles);
    }

    #[test]
    fn test_codestream_header_overrides_configuration() {
        let tiles = vec![tile(3)];
        let bytes = EbcotEncoder::new(params())
            .unwrap()
            .encode(&tiles)
            .unwrap()
            .to_codestream()
            .unwrap();
        let decoder = EbcotDecoder::new(CodingParameters::default()).unwrap();
        assert_eq!(decoder.decode_codestream(&bytes).unwrap(), tiles);
    }

    #[test]
    fn test_sentinel_context_tampering_is_detected() {
        let image = EbcotEncoder::new(params())
            .unwrap()
            .encode(&[tile(2)])
            .unwrap();
        let mut values = image.to_sentinel_stream().unwrap();
        // First context label of the first block is always a run-length or
        // zero-coding label; 16 is a refinement context.
        values[2] = 16;
        let err = EbcotDecoder::new(params())
            .unwrap()
            .decode_sentinel_stream(&values)
            .unwrap_err();
        match err {
            EbcotError::ContextMismatch {
                index: 0,
                transmitted: 16,
                location,
                ..
            } => assert_eq!(location, Location::tile(0).with_band(0).with_block(0)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_band_count_is_checked() {
        let mut image = EbcotEncoder::new(params())
            .unwrap()
            .encode(&[tile(0)])
            .unwrap();
        image.tiles[0].bands.pop();
        assert!(matches!(
            EbcotDecoder::new(params()).unwrap().decode(&image),
            Err(EbcotError::BandCountMismatch { found: 11, .. })
        ));
    }
}
