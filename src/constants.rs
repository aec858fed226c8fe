// Context labels as defined in ISO/IEC 15444-1, Annex D.
pub const CONTEXT_COUNT: usize = 19;
pub const SIGN_CODING_CONTEXT_FIRST: u8 = 9;
/// First refinement of a coefficient without significant neighbours.
pub const REFINEMENT_CONTEXT_ISOLATED: u8 = 14;
/// First refinement of a coefficient with at least one significant neighbour.
pub const REFINEMENT_CONTEXT_NEIGHBORS: u8 = 15;
/// Every refinement after the first one.
pub const REFINEMENT_CONTEXT_REFINED: u8 = 16;
pub const RUN_LENGTH_CONTEXT: u8 = 17;
pub const UNIFORM_CONTEXT: u8 = 18;
pub const MAXIMUM_CONTEXT_LABEL: u8 = UNIFORM_CONTEXT;

// Initial probability states, ISO/IEC 15444-1, table D.7.
pub const INITIAL_STATE_ZERO_NEIGHBORS: u8 = 4;
pub const INITIAL_STATE_RUN_LENGTH: u8 = 3;
pub const INITIAL_STATE_UNIFORM: u8 = 46;

/// Height of the stripes scanned by the coding passes; also the run-length group size.
pub const STRIPE_HEIGHT: usize = 4;

pub const DEFAULT_CODE_BLOCK_SIZE: usize = 64;
pub const MINIMUM_CODE_BLOCK_SIZE: usize = 4;
pub const MAXIMUM_CODE_BLOCK_SIZE: usize = 1024;

pub const DEFAULT_BIT_PLANES: u8 = 8;
pub const MAXIMUM_BIT_PLANES: u8 = 31;

pub const DEFAULT_DECOMPOSITION_LEVELS: u8 = 3;
pub const MAXIMUM_DECOMPOSITION_LEVELS: u8 = 32;

/// Y, Cb and Cr.
pub const CHANNEL_COUNT: usize = 3;

pub const DEFAULT_MIN_PARALLEL_BLOCKS: usize = 10;

/// Largest sub-band, in coefficients, the decoder will reconstruct (1 GiB of `i32`).
pub const MAXIMUM_DECODED_BAND_AREA: usize = 1 << 28;

// Out-of-band values of the sentinel integer stream. They exceed every context
// label and byte value, which only works because the stream is wider than a byte.
pub const SENTINEL_BLOCK: i32 = 2048;
pub const SENTINEL_ROW: i32 = 2049;
pub const SENTINEL_BAND: i32 = 2050;
pub const SENTINEL_TILE: i32 = 2051;

/// Magic bytes of the coefficient dump.
pub const COEFFICIENT_DUMP_MAGIC: [u8; 4] = *b"EBQC";
