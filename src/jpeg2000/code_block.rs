//! Code-block coder: bit-planes MSB first through the pass engine, then one
//! MQ codeword per block.

use super::bit_plane_coder::{BitPlaneCoder, CodingPass, SymbolCoder};
use super::context::{self, Neighborhood};
use super::image::{EncodedBlock, SubbandOrientation};
use super::mq_coder::{MqDecoder, MqEncoder, Symbol};
use crate::coding_parameters::{maximum_magnitude, validate_bit_planes};
use crate::constants::{RUN_LENGTH_CONTEXT, UNIFORM_CONTEXT};
use crate::error::{EbcotError, Location};

/// Coefficients of one code-block, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub width: usize,
    pub height: usize,
    pub coefficients: Vec<i32>,
}

impl CodeBlock {
    pub fn new(width: usize, height: usize, coefficients: Vec<i32>) -> Result<Self, EbcotError> {
        let expected = width * height;
        if coefficients.len() != expected {
            return Err(EbcotError::InvalidShape {
                width,
                height,
                expected,
                found: coefficients.len(),
            });
        }
        Ok(Self {
            width,
            height,
            coefficients,
        })
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            coefficients: vec![0; width * height],
        }
    }

    fn magnitude_bit(&self, x: usize, y: usize, plane: u8) -> bool {
        (self.coefficients[y * self.width + x].unsigned_abs() >> plane) & 1 == 1
    }
}

/// Encoder side of the pass engine: answers from the coefficients and
/// records every symbol.
struct SymbolRecorder<'a> {
    block: &'a CodeBlock,
    symbols: Vec<Symbol>,
}

impl SymbolCoder for SymbolRecorder<'_> {
    fn magnitude_bit(
        &mut self,
        _pass: CodingPass,
        x: usize,
        y: usize,
        plane: u8,
        context: u8,
    ) -> Result<bool, EbcotError> {
        let bit = self.block.magnitude_bit(x, y, plane);
        self.symbols.push(Symbol::new(bit as u8, context));
        Ok(bit)
    }

    fn sign(
        &mut self,
        x: usize,
        y: usize,
        neighborhood: &Neighborhood,
    ) -> Result<bool, EbcotError> {
        let negative = self.block.coefficients[y * self.block.width + x] < 0;
        self.symbols.push(context::sign_coding(neighborhood, negative));
        Ok(negative)
    }

    fn run_length(&mut self, x: usize, y0: usize, plane: u8) -> Result<Option<usize>, EbcotError> {
        let bits = std::array::from_fn(|row| self.block.magnitude_bit(x, y0 + row, plane));
        let run = context::run_length_coding(bits);
        self.symbols.extend_from_slice(&run.symbols);
        Ok(run.position)
    }
}

/// Runs every bit-plane of `block` and returns the ordered symbol stream.
pub fn collect_symbols(
    block: &CodeBlock,
    orientation: SubbandOrientation,
    bit_planes: u8,
) -> Result<Vec<Symbol>, EbcotError> {
    validate_bit_planes(bit_planes)?;
    let limit = maximum_magnitude(bit_planes);
    if let Some(&value) = block
        .coefficients
        .iter()
        .find(|value| value.unsigned_abs() > limit)
    {
        return Err(EbcotError::CoefficientOverflow {
            value,
            bit_planes,
            location: Location::default(),
        });
    }

    let mut coder = BitPlaneCoder::new(block.width, block.height, orientation);
    let mut recorder = SymbolRecorder {
        block,
        symbols: Vec::new(),
    };
    for plane in (0..bit_planes).rev() {
        coder.code_plane(plane, &mut recorder)?;
    }
    Ok(recorder.symbols)
}

/// Codes one block into a fresh MQ codeword.
pub fn encode_code_block(
    block: &CodeBlock,
    orientation: SubbandOrientation,
    bit_planes: u8,
) -> Result<EncodedBlock, EbcotError> {
    let symbols = collect_symbols(block, orientation, bit_planes)?;
    let mut encoder = MqEncoder::new();
    for symbol in &symbols {
        encoder.encode(symbol.bit, symbol.context);
    }
    Ok(EncodedBlock {
        data: encoder.finish(),
        contexts: Some(symbols.iter().map(|symbol| symbol.context).collect()),
    })
}

/// Decoder side of the pass engine: answers from the MQ decoder, checking
/// each regenerated context against the transmitted one when available.
struct SymbolReader<'a> {
    decoder: MqDecoder<'a>,
    transmitted: Option<&'a [u8]>,
    consumed: usize,
    width: usize,
    magnitudes: Vec<u32>,
}

impl SymbolReader<'_> {
    fn next(&mut self, context: u8) -> Result<u8, EbcotError> {
        if let Some(transmitted) = self.transmitted {
            match transmitted.get(self.consumed) {
                Some(&label) if label != context => {
                    return Err(EbcotError::ContextMismatch {
                        index: self.consumed,
                        transmitted: label,
                        derived: context,
                        location: Location::default(),
                    });
                }
                None => {
                    return Err(EbcotError::SymbolCountMismatch {
                        transmitted: transmitted.len(),
                        derived: self.consumed + 1,
                        location: Location::default(),
                    });
                }
                Some(_) => {}
            }
        }
        self.consumed += 1;
        Ok(self.decoder.decode(context))
    }

    fn set_bit(&mut self, x: usize, y: usize, plane: u8) {
        self.magnitudes[y * self.width + x] |= 1 << plane;
    }
}

impl SymbolCoder for SymbolReader<'_> {
    fn magnitude_bit(
        &mut self,
        _pass: CodingPass,
        x: usize,
        y: usize,
        plane: u8,
        context: u8,
    ) -> Result<bool, EbcotError> {
        let bit = self.next(context)? == 1;
        if bit {
            self.set_bit(x, y, plane);
        }
        Ok(bit)
    }

    fn sign(
        &mut self,
        _x: usize,
        _y: usize,
        neighborhood: &Neighborhood,
    ) -> Result<bool, EbcotError> {
        let (sign_context, _) = context::sign_context(neighborhood);
        let bit = self.next(sign_context)?;
        Ok(context::sign_decoding(neighborhood, bit))
    }

    fn run_length(&mut self, x: usize, y0: usize, plane: u8) -> Result<Option<usize>, EbcotError> {
        if self.next(RUN_LENGTH_CONTEXT)? == 0 {
            return Ok(None);
        }
        let high = self.next(UNIFORM_CONTEXT)? as usize;
        let low = self.next(UNIFORM_CONTEXT)? as usize;
        let offset = (high << 1) | low;
        self.set_bit(x, y0 + offset, plane);
        Ok(Some(offset))
    }
}

/// Reconstructs a `width` x `height` block from its codeword.
pub fn decode_code_block(
    encoded: &EncodedBlock,
    orientation: SubbandOrientation,
    width: usize,
    height: usize,
    bit_planes: u8,
) -> Result<CodeBlock, EbcotError> {
    validate_bit_planes(bit_planes)?;
    let mut coder = BitPlaneCoder::new(width, height, orientation);
    let mut reader = SymbolReader {
        decoder: MqDecoder::new(&encoded.data),
        transmitted: encoded.contexts.as_deref(),
        consumed: 0,
        width,
        magnitudes: vec![0; width * height],
    };
    for plane in (0..bit_planes).rev() {
        coder.code_plane(plane, &mut reader)?;
    }
    if let Some(transmitted) = reader.transmitted {
        if transmitted.len() != reader.consumed {
            return Err(EbcotError::SymbolCountMismatch {
                transmitted: transmitted.len(),
                derived: reader.consumed,
                location: Location::default(),
            });
        }
    }

    let coefficients = reader
        .magnitudes
        .iter()
        .enumerate()
        .map(|(i, &magnitude)| {
            let value = magnitude as i32;
            if coder.is_negative(i % width, i / width) {
                -value
            } else {
                value
            }
        })
        .collect();
    Ok(CodeBlock {
        width,
        height,
        coefficients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xorshift(state: &mut u32) -> u32 {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        *state
    }

    /// Sparse, mostly small values, like quantized detail coefficients.
    fn random_block(width: usize, height: usize, seed: u32, bit_planes: u8) -> CodeBlock {
        let mut state = seed;
        let limit = maximum_magnitude(bit_planes);
        let coefficients = (0..width * height)
            .map(|_| {
                let r = xorshift(&mut state);
                if r % 3 == 0 {
                    return 0;
                }
                let magnitude = (xorshift(&mut state) % (limit + 1).max(1)) >> (r % 4);
                if r & 0x100 != 0 {
                    -(magnitude as i32)
                } else {
                    magnitude as i32
                }
            })
            .collect();
        CodeBlock::new(width, height, coefficients).unwrap()
    }

    #[test]
    fn test_all_zero_block_single_plane() {
        let block = CodeBlock::zeros(8, 8);
        let symbols = collect_symbols(&block, SubbandOrientation::LL, 1).unwrap();
        assert_eq!(symbols, vec![Symbol::new(0, 17); 16]);

        let first = encode_code_block(&block, SubbandOrientation::LL, 1).unwrap();
        let second = encode_code_block(&block, SubbandOrientation::LL, 1).unwrap();
        assert_eq!(first, second);

        let decoded = decode_code_block(&first, SubbandOrientation::LL, 8, 8, 1).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_single_negative_coefficient() {
        let mut block = CodeBlock::zeros(8, 8);
        block.coefficients[0] = -1;
        let symbols = collect_symbols(&block, SubbandOrientation::LL, 1).unwrap();
        assert_eq!(
            &symbols[..4],
            &[
                Symbol::new(1, 17),
                Symbol::new(0, 18),
                Symbol::new(0, 18),
                // No significant neighbours: positive prediction, bit 1 means negative.
                Symbol::new(1, 9),
            ]
        );
        // The rest of column 0 is coded one by one: (0, 1) sees (0, 0) above it.
        assert_eq!(symbols[4], Symbol::new(0, 3));

        let encoded = encode_code_block(&block, SubbandOrientation::LL, 1).unwrap();
        let decoded = decode_code_block(&encoded, SubbandOrientation::LL, 8, 8, 1).unwrap();
        assert_eq!(decoded.coefficients[0], -1);
        assert!(decoded.coefficients[1..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_random_blocks_roundtrip() {
        let orientations = [
            SubbandOrientation::LL,
            SubbandOrientation::LH,
            SubbandOrientation::HL,
            SubbandOrientation::HH,
        ];
        for (seed, orientation) in (1..9).zip(orientations.iter().cycle()) {
            for (size, bit_planes) in [(4, 1), (8, 8), (16, 5), (32, 12), (12, 31)] {
                let block = random_block(size, size, seed * 7919, bit_planes);
                let encoded = encode_code_block(&block, *orientation, bit_planes).unwrap();
                let decoded =
                    decode_code_block(&encoded, *orientation, size, size, bit_planes).unwrap();
                assert_eq!(decoded, block, "seed {seed} size {size} planes {bit_planes}");
            }
        }
    }

    #[test]
    fn test_decoding_without_contexts() {
        let block = random_block(16, 16, 42, 8);
        let mut encoded = encode_code_block(&block, SubbandOrientation::HH, 8).unwrap();
        encoded.contexts = None;
        let decoded = decode_code_block(&encoded, SubbandOrientation::HH, 16, 16, 8).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_tampered_context_is_detected() {
        let block = random_block(8, 8, 3, 6);
        let mut encoded = encode_code_block(&block, SubbandOrientation::LL, 6).unwrap();
        let contexts = encoded.contexts.as_mut().unwrap();
        let index = contexts.len() / 2;
        let original = contexts[index];
        contexts[index] = (original + 1) % 19;

        let err = decode_code_block(&encoded, SubbandOrientation::LL, 8, 8, 6).unwrap_err();
        match err {
            EbcotError::ContextMismatch {
                index: at,
                transmitted,
                derived,
                ..
            } => {
                assert_eq!(at, index);
                assert_eq!(transmitted, (original + 1) % 19);
                assert_eq!(derived, original);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_symbol_count_is_checked() {
        let block = random_block(8, 8, 9, 4);
        let encoded = encode_code_block(&block, SubbandOrientation::LH, 4).unwrap();

        let mut short = encoded.clone();
        short.contexts.as_mut().unwrap().pop();
        assert!(matches!(
            decode_code_block(&short, SubbandOrientation::LH, 8, 8, 4),
            Err(EbcotError::SymbolCountMismatch { .. })
        ));

        let mut long = encoded;
        long.contexts.as_mut().unwrap().push(0);
        assert!(matches!(
            decode_code_block(&long, SubbandOrientation::LH, 8, 8, 4),
            Err(EbcotError::SymbolCountMismatch { .. })
        ));
    }

    #[test]
    fn test_overflowing_coefficient_is_rejected() {
        let mut block = CodeBlock::zeros(4, 4);
        block.coefficients[5] = -256;
        let err = encode_code_block(&block, SubbandOrientation::LL, 8).unwrap_err();
        assert!(matches!(
            err,
            EbcotError::CoefficientOverflow {
                value: -256,
                bit_planes: 8,
                ..
            }
        ));
        block.coefficients[5] = -255;
        assert!(encode_code_block(&block, SubbandOrientation::LL, 8).is_ok());
    }

    #[test]
    fn test_bit_plane_count_out_of_range_is_rejected() {
        let block = CodeBlock::zeros(4, 4);
        for bit_planes in [0, 32, 64, 255] {
            assert!(
                matches!(
                    encode_code_block(&block, SubbandOrientation::LL, bit_planes),
                    Err(EbcotError::InvalidParameter(_))
                ),
                "bit_planes={bit_planes}"
            );
            let empty = EncodedBlock::default();
            assert!(matches!(
                decode_code_block(&empty, SubbandOrientation::LL, 4, 4, bit_planes),
                Err(EbcotError::InvalidParameter(_))
            ));
        }
    }
}
