use crate::constants::{
    DEFAULT_BIT_PLANES, DEFAULT_CODE_BLOCK_SIZE, DEFAULT_DECOMPOSITION_LEVELS,
    DEFAULT_MIN_PARALLEL_BLOCKS, MAXIMUM_BIT_PLANES, MAXIMUM_CODE_BLOCK_SIZE,
    MAXIMUM_DECOMPOSITION_LEVELS, MINIMUM_CODE_BLOCK_SIZE, STRIPE_HEIGHT,
};
use crate::error::EbcotError;

/// When and how code-blocks are spread over worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelPolicy {
    pub enabled: bool,
    /// Bands with fewer blocks than this are coded on the calling thread.
    pub min_blocks: usize,
    /// Size of a dedicated pool; `None` uses the global rayon pool.
    pub max_workers: Option<usize>,
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_blocks: DEFAULT_MIN_PARALLEL_BLOCKS,
            max_workers: None,
        }
    }
}

impl ParallelPolicy {
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether a band of `block_count` blocks should go to the pool.
    pub fn should_parallelize(&self, block_count: usize) -> bool {
        self.enabled && block_count >= self.min_blocks.max(2)
    }
}

/// Parameters shared by the encoder and the decoder.
///
/// This is the only configuration the coder reads. It is fixed when an
/// encoder or decoder is built; a byte codestream header overrides it on
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingParameters {
    pub code_block_size: usize,
    pub bit_planes: u8,
    pub decomposition_levels: u8,
    pub parallel: ParallelPolicy,
}

impl Default for CodingParameters {
    fn default() -> Self {
        Self {
            code_block_size: DEFAULT_CODE_BLOCK_SIZE,
            bit_planes: DEFAULT_BIT_PLANES,
            decomposition_levels: DEFAULT_DECOMPOSITION_LEVELS,
            parallel: ParallelPolicy::default(),
        }
    }
}

impl CodingParameters {
    pub fn validate(&self) -> Result<(), EbcotError> {
        validate_code_block_size(self.code_block_size)?;
        validate_bit_planes(self.bit_planes)?;
        if self.decomposition_levels > MAXIMUM_DECOMPOSITION_LEVELS {
            return Err(EbcotError::InvalidParameter(
                "decomposition levels must not exceed 32",
            ));
        }
        if self.parallel.max_workers == Some(0) {
            return Err(EbcotError::InvalidParameter(
                "worker pool needs at least one thread",
            ));
        }
        Ok(())
    }

    /// Number of sub-bands in one channel: LL plus one detail triple per level.
    pub fn bands_per_channel(&self) -> usize {
        1 + 3 * self.decomposition_levels as usize
    }

    /// Largest magnitude representable in `bit_planes` bit-planes.
    pub fn maximum_magnitude(&self) -> u32 {
        maximum_magnitude(self.bit_planes)
    }
}

/// Checks a code-block side: a multiple of the stripe height in 4..=1024.
pub fn validate_code_block_size(code_block_size: usize) -> Result<(), EbcotError> {
    if !(MINIMUM_CODE_BLOCK_SIZE..=MAXIMUM_CODE_BLOCK_SIZE).contains(&code_block_size) {
        return Err(EbcotError::InvalidParameter(
            "code-block size must be between 4 and 1024",
        ));
    }
    if code_block_size % STRIPE_HEIGHT != 0 {
        return Err(EbcotError::InvalidParameter(
            "code-block size must be a multiple of the stripe height (4)",
        ));
    }
    Ok(())
}

pub fn validate_bit_planes(bit_planes: u8) -> Result<(), EbcotError> {
    if bit_planes == 0 || bit_planes > MAXIMUM_BIT_PLANES {
        return Err(EbcotError::InvalidParameter(
            "bit-plane count must be between 1 and 31",
        ));
    }
    Ok(())
}

/// Largest magnitude representable in `bit_planes` (at most 31) bit-planes.
pub fn maximum_magnitude(bit_planes: u8) -> u32 {
    ((1u64 << bit_planes.min(MAXIMUM_BIT_PLANES)) - 1) as u32
}
