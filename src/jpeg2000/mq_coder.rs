//! MQ Arithmetic Coder (ISO/IEC 15444-1 Annex C)
//!
//! The encoder keeps the byte about to be emitted in `t` so that a carry out
//! of `c` can still be added to it; a byte equal to `0xFF` is followed by a
//! byte holding only 7 bits of code. The decoder reverses that stuffing in
//! [`MqDecoder::fill_lsb`] and pads with ones when the input runs out.

use crate::constants::{
    CONTEXT_COUNT, INITIAL_STATE_RUN_LENGTH, INITIAL_STATE_UNIFORM,
    INITIAL_STATE_ZERO_NEIGHBORS, MAXIMUM_CONTEXT_LABEL, RUN_LENGTH_CONTEXT, UNIFORM_CONTEXT,
};
use crate::error::{EbcotError, Location};

/// One row of the probability estimation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbabilityState {
    pub qe: u16,
    pub nmps: u8,
    pub nlps: u8,
    /// Flip the MPS sense when an LPS is coded in this state.
    pub switch: bool,
}

const fn state(qe: u16, nmps: u8, nlps: u8, switch: bool) -> ProbabilityState {
    ProbabilityState {
        qe,
        nmps,
        nlps,
        switch,
    }
}

// Standard Table C.2
pub const PROBABILITY_TABLE: [ProbabilityState; 47] = [
    state(0x5601, 1, 1, true),
    state(0x3401, 2, 6, false),
    state(0x1801, 3, 9, false),
    state(0x0AC1, 4, 12, false),
    state(0x0521, 5, 29, false),
    state(0x0221, 38, 33, false),
    state(0x5601, 7, 6, true),
    state(0x5401, 8, 14, false),
    state(0x4801, 9, 14, false),
    state(0x3801, 10, 14, false),
    state(0x3001, 11, 17, false),
    state(0x2401, 12, 18, false),
    state(0x1C01, 13, 20, false),
    state(0x1601, 29, 21, false),
    state(0x5601, 15, 14, true),
    state(0x5401, 16, 14, false),
    state(0x5101, 17, 15, false),
    state(0x4801, 18, 16, false),
    state(0x3801, 19, 17, false),
    state(0x3401, 20, 18, false),
    state(0x3001, 21, 19, false),
    state(0x2801, 22, 19, false),
    state(0x2401, 23, 20, false),
    state(0x2201, 24, 21, false),
    state(0x1C01, 25, 22, false),
    state(0x1801, 26, 23, false),
    state(0x1601, 27, 24, false),
    state(0x1401, 28, 25, false),
    state(0x1201, 29, 26, false),
    state(0x1101, 30, 27, false),
    state(0x0AC1, 31, 28, false),
    state(0x09C1, 32, 29, false),
    state(0x08A1, 33, 30, false),
    state(0x0521, 34, 31, false),
    state(0x0441, 35, 32, false),
    state(0x02A1, 36, 33, false),
    state(0x0221, 37, 34, false),
    state(0x0141, 38, 35, false),
    state(0x0111, 39, 36, false),
    state(0x0085, 40, 37, false),
    state(0x0049, 41, 38, false),
    state(0x0025, 42, 39, false),
    state(0x0015, 43, 40, false),
    state(0x0009, 44, 41, false),
    state(0x0005, 45, 42, false),
    state(0x0001, 45, 43, false),
    state(0x5601, 46, 46, false),
];

/// Adaptive state of one context label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextState {
    pub index: u8,
    pub mps: u8,
}

impl ContextState {
    fn probability(&self) -> ProbabilityState {
        PROBABILITY_TABLE[self.index as usize]
    }

    /// Moves to the next state after a renormalisation.
    fn adapt(&mut self, coded_mps: bool) {
        let current = self.probability();
        if coded_mps {
            self.index = current.nmps;
        } else {
            if current.switch {
                self.mps ^= 1;
            }
            self.index = current.nlps;
        }
    }
}

/// States of the 19 context labels, reset for every code-block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTable {
    states: [ContextState; CONTEXT_COUNT],
}

impl Default for ContextTable {
    fn default() -> Self {
        let mut states = [ContextState::default(); CONTEXT_COUNT];
        states[0].index = INITIAL_STATE_ZERO_NEIGHBORS;
        states[RUN_LENGTH_CONTEXT as usize].index = INITIAL_STATE_RUN_LENGTH;
        states[UNIFORM_CONTEXT as usize].index = INITIAL_STATE_UNIFORM;
        Self { states }
    }
}

impl ContextTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, context: u8) -> ContextState {
        self.states[context as usize]
    }

    fn get_mut(&mut self, context: u8) -> &mut ContextState {
        &mut self.states[context as usize]
    }
}

/// A binary decision and the context label it is coded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub bit: u8,
    pub context: u8,
}

impl Symbol {
    pub const fn new(bit: u8, context: u8) -> Self {
        Self { bit, context }
    }
}

pub struct MqEncoder {
    // Interval size, kept in [0x8000, 0xFFFF] between symbols.
    a: u32,
    // Lower bound register; bit 27 is the carry into `t`.
    c: u32,
    // Byte waiting for a possible carry before being written.
    t: u32,
    // Shifts left before the next byte transfer.
    ct: u32,
    // Number of bytes written, -1 until the placeholder byte has been dropped.
    l: i64,
    buffer: Vec<u8>,
    contexts: ContextTable,
}

impl Default for MqEncoder {
    fn default() -> Self {
        Self {
            a: 0x8000,
            c: 0,
            t: 0,
            ct: 12,
            l: -1,
            buffer: Vec::new(),
            contexts: ContextTable::new(),
        }
    }
}

impl MqEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codes `bit` in `context`.
    ///
    /// `context` must be a label below 19; [`encode_symbols`] checks this for
    /// untrusted input.
    pub fn encode(&mut self, bit: u8, context: u8) {
        let cx = self.contexts.get(context);
        let qe = cx.probability().qe as u32;

        self.a -= qe;
        let mut upper = cx.mps;
        if self.a < qe {
            // Conditional exchange: the MPS now gets the smaller sub-interval.
            upper ^= 1;
        }
        if bit == upper {
            self.c += qe;
        } else {
            self.a = qe;
        }

        if self.a < 0x8000 {
            self.contexts.get_mut(context).adapt(bit == cx.mps);
            while self.a < 0x8000 {
                self.a <<= 1;
                self.c <<= 1;
                self.ct -= 1;
                if self.ct == 0 {
                    self.transfer_byte();
                }
            }
        }
    }

    fn transfer_byte(&mut self) {
        if self.t == 0xFF {
            // No carry can enter a 0xFF byte: stuff a zero bit instead.
            self.put_byte();
            self.t = self.c >> 20;
            self.c &= 0xFFFFF;
            self.ct = 7;
        } else {
            self.t += (self.c >> 27) & 1;
            self.c &= 0x7FFFFFF;
            self.put_byte();
            if self.t == 0xFF {
                self.t = self.c >> 20;
                self.c &= 0xFFFFF;
                self.ct = 7;
            } else {
                self.t = self.c >> 19;
                self.c &= 0x7FFFF;
                self.ct = 8;
            }
        }
    }

    fn put_byte(&mut self) {
        if self.l >= 0 {
            self.buffer.push(self.t as u8);
        }
        self.l += 1;
    }

    /// Terminates the codeword and returns the coded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        // Pick the value inside the final interval with the most trailing ones.
        let upper = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= upper {
            self.c -= 0x8000;
        }

        self.c <<= self.ct;
        self.transfer_byte();
        self.c <<= self.ct;
        self.transfer_byte();
        if self.t != 0xFF {
            self.put_byte();
        }
        self.buffer
    }
}

/// Codes a whole symbol stream with a fresh context table.
pub fn encode_symbols(symbols: &[Symbol]) -> Result<Vec<u8>, EbcotError> {
    let mut encoder = MqEncoder::new();
    for symbol in symbols {
        check_symbol(symbol)?;
        encoder.encode(symbol.bit, symbol.context);
    }
    Ok(encoder.finish())
}

fn check_symbol(symbol: &Symbol) -> Result<(), EbcotError> {
    if symbol.context > MAXIMUM_CONTEXT_LABEL {
        return Err(EbcotError::InvalidSymbol {
            kind: "context label",
            value: symbol.context as i32,
            location: Location::default(),
        });
    }
    if symbol.bit > 1 {
        return Err(EbcotError::InvalidSymbol {
            kind: "bit",
            value: symbol.bit as i32,
            location: Location::default(),
        });
    }
    Ok(())
}

pub struct MqDecoder<'a> {
    data: &'a [u8],
    a: u32,
    // Bits 16..31 hold the active code value compared against the interval.
    c: u32,
    // Last byte read, needed to detect stuffing after 0xFF.
    t: u8,
    ct: u32,
    // Index of the next byte to read.
    l: usize,
    contexts: ContextTable,
}

impl<'a> MqDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            a: 0,
            c: 0,
            t: 0,
            ct: 0,
            l: 0,
            contexts: ContextTable::new(),
        };
        decoder.fill_lsb();
        decoder.c <<= decoder.ct;
        decoder.fill_lsb();
        decoder.c <<= 7;
        decoder.ct -= 7;
        decoder.a = 0x8000;
        decoder
    }

    fn fill_lsb(&mut self) {
        self.ct = 8;
        let exhausted = self.l >= self.data.len();
        if exhausted || (self.t == 0xFF && self.data[self.l] > 0x8F) {
            // End of data or a marker: feed ones without consuming anything.
            self.c = self.c.wrapping_add(0xFF00);
        } else {
            if self.t == 0xFF {
                self.ct = 7;
            }
            self.t = self.data[self.l];
            self.l += 1;
            self.c = self
                .c
                .wrapping_add((self.t as u32) << (16 - self.ct));
        }
    }

    pub fn decode(&mut self, context: u8) -> u8 {
        let cx = self.contexts.get(context);
        let qe = cx.probability().qe as u32;

        self.a -= qe;
        let mut upper = cx.mps;
        if self.a < qe {
            upper ^= 1;
        }

        let bit = if (self.c >> 16) < qe {
            self.a = qe;
            upper ^ 1
        } else {
            self.c = self.c.wrapping_sub(qe << 16);
            upper
        };

        if self.a < 0x8000 {
            self.contexts.get_mut(context).adapt(bit == cx.mps);
            while self.a < 0x8000 {
                if self.ct == 0 {
                    self.fill_lsb();
                }
                self.a <<= 1;
                self.c <<= 1;
                self.ct -= 1;
            }
        }
        bit
    }
}

/// Decodes one bit per entry of `contexts` with a fresh context table.
pub fn decode_symbols(data: &[u8], contexts: &[u8]) -> Result<Vec<Symbol>, EbcotError> {
    let mut decoder = MqDecoder::new(data);
    contexts
        .iter()
        .map(|&context| {
            check_symbol(&Symbol::new(0, context))?;
            Ok(Symbol::new(decoder.decode(context), context))
        })
        .collect()
}
