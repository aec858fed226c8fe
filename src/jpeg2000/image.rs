use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::EbcotError;

/// Orientation of a wavelet subband.
///
/// The tag values are the ones carried by the codestream band headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = EbcotError, constructor = EbcotError::UnsupportedBand))]
#[repr(u8)]
pub enum SubbandOrientation {
    /// Low-Low (base image)
    LL = 0,
    /// Low-High (horizontal details)
    LH = 1,
    /// High-Low (vertical details)
    HL = 2,
    /// High-High (diagonal details)
    HH = 3,
}

impl SubbandOrientation {
    /// Detail orientations of one decomposition level, in stream order.
    pub const DETAILS: [SubbandOrientation; 3] = [Self::LH, Self::HL, Self::HH];

    /// Orientation of the band at `index` in a channel laid out as
    /// `[LL, (LH, HL, HH) x levels]`.
    pub fn at_channel_position(index: usize) -> Self {
        if index == 0 {
            Self::LL
        } else {
            Self::DETAILS[(index - 1) % 3]
        }
    }
}

/// Quantized coefficients of one subband, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subband {
    /// Orientation of the subband; selects the zero-coding context table.
    pub orientation: SubbandOrientation,
    /// Width of the subband in coefficients.
    pub width: usize,
    /// Height of the subband.
    pub height: usize,
    /// `width * height` coefficients, row after row.
    pub data: Vec<i32>,
}

impl Subband {
    pub fn new(
        orientation: SubbandOrientation,
        width: usize,
        height: usize,
        data: Vec<i32>,
    ) -> Result<Self, EbcotError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(EbcotError::InvalidShape {
                width,
                height,
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            orientation,
            width,
            height,
            data,
        })
    }

    pub fn zeros(orientation: SubbandOrientation, width: usize, height: usize) -> Self {
        Self {
            orientation,
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.data[y * self.width + x]
    }
}

/// The three detail subbands of one decomposition level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLevel {
    pub lh: Subband,
    pub hl: Subband,
    pub hh: Subband,
}

/// Coefficients of one colour channel: `[LL, (LH, HL, HH) x levels]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCoefficients {
    pub ll: Subband,
    pub levels: Vec<DetailLevel>,
}

impl ChannelCoefficients {
    /// Subbands in stream order.
    pub fn bands(&self) -> impl Iterator<Item = &Subband> {
        std::iter::once(&self.ll).chain(
            self.levels
                .iter()
                .flat_map(|level| [&level.lh, &level.hl, &level.hh]),
        )
    }

    /// Rebuilds a channel from its subbands in stream order.
    ///
    /// Orientations are taken from the position in the list.
    pub fn from_bands(bands: Vec<Subband>) -> Result<Self, EbcotError> {
        if bands.is_empty() || (bands.len() - 1) % 3 != 0 {
            return Err(EbcotError::InvalidParameter(
                "a channel needs one LL band and whole detail triples",
            ));
        }
        let mut bands = bands.into_iter().enumerate().map(|(i, mut band)| {
            band.orientation = SubbandOrientation::at_channel_position(i);
            band
        });
        let ll = bands.next().ok_or(EbcotError::InvalidParameter(
            "a channel needs one LL band",
        ))?;
        let mut levels = Vec::new();
        while let (Some(lh), Some(hl), Some(hh)) = (bands.next(), bands.next(), bands.next()) {
            levels.push(DetailLevel { lh, hl, hh });
        }
        Ok(Self { ll, levels })
    }
}

/// Quantized coefficients of one tile, one entry per channel (Y, Cb, Cr).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCoefficients {
    pub channels: Vec<ChannelCoefficients>,
}

impl TileCoefficients {
    /// Subbands of every channel, in stream order.
    pub fn bands(&self) -> impl Iterator<Item = &Subband> {
        self.channels.iter().flat_map(|channel| channel.bands())
    }

    /// Splits a flat band list into `channel_count` equal channels.
    pub fn from_bands(bands: Vec<Subband>, channel_count: usize) -> Result<Self, EbcotError> {
        if channel_count == 0 || bands.len() % channel_count != 0 {
            return Err(EbcotError::InvalidParameter(
                "band count is not a multiple of the channel count",
            ));
        }
        let per_channel = bands.len() / channel_count;
        let mut bands = bands.into_iter();
        let channels = (0..channel_count)
            .map(|_| ChannelCoefficients::from_bands(bands.by_ref().take(per_channel).collect()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    /// Decomposition depth, or `None` when channels disagree.
    pub fn decomposition_levels(&self) -> Option<usize> {
        let first = self.channels.first()?.levels.len();
        self.channels
            .iter()
            .all(|channel| channel.levels.len() == first)
            .then_some(first)
    }
}

/// The coded form of one code-block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedBlock {
    /// MQ codeword of the block.
    pub data: Vec<u8>,
    /// Context label of every coded symbol, in coding order. Present on
    /// freshly encoded blocks and blocks read from a sentinel stream; the
    /// byte codestream does not carry them.
    pub contexts: Option<Vec<u8>>,
}

/// The coded blocks of one subband in row-major block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBand {
    pub orientation: SubbandOrientation,
    /// Width of the subband before padding to whole blocks.
    pub width: usize,
    /// Height of the subband before padding to whole blocks.
    pub height: usize,
    pub blocks: Vec<EncodedBlock>,
}

impl EncodedBand {
    /// Number of coded bytes in all blocks of the band.
    pub fn coded_bytes(&self) -> usize {
        self.blocks.iter().map(|block| block.data.len()).sum()
    }
}

/// The coded bands of one tile, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    pub bands: Vec<EncodedBand>,
}

/// A whole coded image: the coding parameters and every coded tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Side of the square code-blocks.
    pub code_block_size: usize,
    /// Magnitude bit-planes coded per block.
    pub bit_planes: u8,
    /// Detail triples per channel.
    pub decomposition_levels: u8,
    /// Channels per tile.
    pub channel_count: u8,
    pub tiles: Vec<EncodedTile>,
}

impl EncodedImage {
    /// Bands every tile must carry.
    pub fn bands_per_tile(&self) -> usize {
        self.channel_count as usize * (1 + 3 * self.decomposition_levels as usize)
    }

    /// Concatenation of every block's coded bytes, without any framing.
    pub fn raw_stream(&self) -> Vec<u8> {
        self.tiles
            .iter()
            .flat_map(|tile| tile.bands.iter())
            .flat_map(|band| band.blocks.iter())
            .flat_map(|block| block.data.iter().copied())
            .collect()
    }

    /// Serialises the image as a length-prefixed codestream.
    pub fn to_codestream(&self) -> Result<Vec<u8>, EbcotError> {
        super::writer::write_codestream(self)
    }

    /// Parses a length-prefixed codestream.
    pub fn from_codestream(data: &[u8]) -> Result<Self, EbcotError> {
        super::parser::parse_codestream(data)
    }

    /// Frames the image as a sentinel integer stream.
    pub fn to_sentinel_stream(&self) -> Result<Vec<i32>, EbcotError> {
        super::sentinel_stream::frame_image(self)
    }

    /// Parses a sentinel integer stream. The stream carries neither the block
    /// size nor the bit-plane count.
    pub fn from_sentinel_stream(
        values: &[i32],
        code_block_size: usize,
        bit_planes: u8,
    ) -> Result<Self, EbcotError> {
        super::sentinel_stream::parse_image(values, code_block_size, bit_planes)
    }
}
