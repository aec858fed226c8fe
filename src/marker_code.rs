#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarkerCode {
    /// SOC: Marks the start of a codestream.
    StartOfCodestream = 0x4F,

    /// PRM: Tier-1 coding parameters (block size, bit-planes, levels, channels, tiles).
    CodingParameters = 0x51,

    /// SOT: Marks the start of a tile; carries the tile index and its length.
    StartOfTile = 0x90,

    /// SOB: Marks the start of a band; carries its orientation, shape and block count.
    StartOfBand = 0x93,

    /// EOC: Marks the end of a codestream.
    EndOfCodestream = 0xD9,
}

impl MarkerCode {
    /// Short segment name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::StartOfCodestream => "SOC",
            Self::CodingParameters => "PRM",
            Self::StartOfTile => "SOT",
            Self::StartOfBand => "SOB",
            Self::EndOfCodestream => "EOC",
        }
    }
}

impl std::convert::TryFrom<u8> for MarkerCode {
    /// The unknown marker byte.
    type Error = u8;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x4F => Ok(Self::StartOfCodestream),
            0x51 => Ok(Self::CodingParameters),
            0x90 => Ok(Self::StartOfTile),
            0x93 => Ok(Self::StartOfBand),
            0xD9 => Ok(Self::EndOfCodestream),
            _ => Err(v),
        }
    }
}

pub const MARKER_START_BYTE: u8 = 0xFF;

// Segment lengths count the length field itself.
pub const CODING_PARAMETERS_SEGMENT_LENGTH: u16 = 11;
pub const START_OF_TILE_SEGMENT_LENGTH: u16 = 10;
pub const START_OF_BAND_SEGMENT_LENGTH: u16 = 17;
