use std::fmt;
use thiserror::Error;

/// Position of a failure inside a tile stream.
///
/// Every index is optional: lower layers do not know where they are and leave
/// the fields empty, the band and tile framers fill in what they know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub tile: Option<usize>,
    pub band: Option<usize>,
    pub block: Option<usize>,
}

impl Location {
    pub fn tile(tile: usize) -> Self {
        Self {
            tile: Some(tile),
            ..Self::default()
        }
    }

    pub fn with_band(mut self, band: usize) -> Self {
        self.band = Some(band);
        self
    }

    pub fn with_block(mut self, block: usize) -> Self {
        self.block = Some(block);
        self
    }

    /// Fills the fields of `self` that are still unknown from `outer`.
    fn merge(self, outer: Location) -> Self {
        Self {
            tile: self.tile.or(outer.tile),
            band: self.band.or(outer.band),
            block: self.block.or(outer.block),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(tile) = self.tile {
            parts.push(format!("tile {tile}"));
        }
        if let Some(band) = self.band {
            parts.push(format!("band {band}"));
        }
        if let Some(block) = self.block {
            parts.push(format!("block {block}"));
        }
        if parts.is_empty() {
            write!(f, "<unknown position>")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Error, Debug)]
pub enum EbcotError {
    // Structural errors
    #[error("Unexpected end of stream at {location}")]
    UnexpectedEndOfStream { location: Location },
    #[error("Missing {expected} sentinel at {location}, found {found}")]
    MissingSentinel {
        expected: &'static str,
        found: i32,
        location: Location,
    },
    #[error("Block count mismatch at {location}: expected {expected}, found {found}")]
    BlockCountMismatch {
        expected: usize,
        found: usize,
        location: Location,
    },
    #[error("Band count mismatch at {location}: {found} bands is not 3 x (1 + 3 x levels)")]
    BandCountMismatch { found: usize, location: Location },
    #[error("Invalid {kind} value {value} at {location}")]
    InvalidSymbol {
        kind: &'static str,
        value: i32,
        location: Location,
    },
    #[error("Unexpected marker {found:#04x} at byte {position}, expected {expected}")]
    UnexpectedMarker {
        expected: &'static str,
        found: u8,
        position: usize,
    },
    #[error("Invalid header at {location}: {reason}")]
    InvalidHeader {
        reason: &'static str,
        location: Location,
    },
    #[error("Trailing data after end of codestream ({0} bytes)")]
    TrailingData(usize),
    #[error("Block at {location} carries no context labels")]
    MissingContextLabels { location: Location },
    #[error("Band at {location} is too large to decode: {width}x{height}")]
    BandTooLarge {
        width: usize,
        height: usize,
        location: Location,
    },

    // Invalid input
    #[error("Invalid neighborhood: expected 3x3, found {rows}x{cols}")]
    InvalidNeighborhood { rows: usize, cols: usize },
    #[error("Unsupported sub-band tag {0}")]
    UnsupportedBand(u8),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("Invalid sub-band shape: {width}x{height} needs {expected} coefficients, found {found}")]
    InvalidShape {
        width: usize,
        height: usize,
        expected: usize,
        found: usize,
    },
    #[error("Coefficient {value} at {location} does not fit in {bit_planes} bit-planes")]
    CoefficientOverflow {
        value: i32,
        bit_planes: u8,
        location: Location,
    },

    // Encoder/decoder desynchronisation
    #[error("Context mismatch at symbol {index} of {location}: stream carries {transmitted}, decoder derived {derived}")]
    ContextMismatch {
        index: usize,
        transmitted: u8,
        derived: u8,
        location: Location,
    },
    #[error("Symbol count mismatch at {location}: stream carries {transmitted}, decoder consumed {derived}")]
    SymbolCountMismatch {
        transmitted: usize,
        derived: usize,
        location: Location,
    },

    // Environment
    #[error("Worker pool: {0}")]
    WorkerPool(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EbcotError {
    /// A header error whose position the caller fills in with [`Self::at`].
    pub fn invalid_header(reason: &'static str) -> Self {
        EbcotError::InvalidHeader {
            reason,
            location: Location::default(),
        }
    }

    /// Attaches the indices of `outer` to the error, keeping any that are
    /// already more specific.
    pub fn at(self, outer: Location) -> Self {
        use EbcotError::*;
        match self {
            UnexpectedEndOfStream { location } => UnexpectedEndOfStream {
                location: location.merge(outer),
            },
            MissingSentinel {
                expected,
                found,
                location,
            } => MissingSentinel {
                expected,
                found,
                location: location.merge(outer),
            },
            BlockCountMismatch {
                expected,
                found,
                location,
            } => BlockCountMismatch {
                expected,
                found,
                location: location.merge(outer),
            },
            BandCountMismatch { found, location } => BandCountMismatch {
                found,
                location: location.merge(outer),
            },
            InvalidSymbol {
                kind,
                value,
                location,
            } => InvalidSymbol {
                kind,
                value,
                location: location.merge(outer),
            },
            InvalidHeader { reason, location } => InvalidHeader {
                reason,
                location: location.merge(outer),
            },
            MissingContextLabels { location } => MissingContextLabels {
                location: location.merge(outer),
            },
            BandTooLarge {
                width,
                height,
                location,
            } => BandTooLarge {
                width,
                height,
                location: location.merge(outer),
            },
            CoefficientOverflow {
                value,
                bit_planes,
                location,
            } => CoefficientOverflow {
                value,
                bit_planes,
                location: location.merge(outer),
            },
            ContextMismatch {
                index,
                transmitted,
                derived,
                location,
            } => ContextMismatch {
                index,
                transmitted,
                derived,
                location: location.merge(outer),
            },
            SymbolCountMismatch {
                transmitted,
                derived,
                location,
            } => SymbolCountMismatch {
                transmitted,
                derived,
                location: location.merge(outer),
            },
            other => other,
        }
    }
}
