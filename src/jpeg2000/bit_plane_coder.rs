//! Bit-plane pass engine (ISO/IEC 15444-1 D.3).
//!
//! One [`BitPlaneCoder`] owns the significance state of one code-block. The
//! same scan drives encoding and decoding: the coder asks a [`SymbolCoder`]
//! for every decision, and the symbol coder either reads the answer from the
//! coefficients (encoder) or from the MQ decoder (decoder).

use super::context::{self, Neighborhood};
use super::image::SubbandOrientation;
use crate::constants::STRIPE_HEIGHT;
use crate::error::EbcotError;

/// The three passes run over every bit-plane, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodingPass {
    SignificancePropagation,
    MagnitudeRefinement,
    Cleanup,
}

/// Source or sink of the decisions taken while scanning a bit-plane.
pub trait SymbolCoder {
    /// Codes the bit of `(x, y)` at `plane` in `context` and returns it.
    fn magnitude_bit(
        &mut self,
        pass: CodingPass,
        x: usize,
        y: usize,
        plane: u8,
        context: u8,
    ) -> Result<bool, EbcotError>;

    /// Codes the sign of `(x, y)`, which just became significant. Returns
    /// `true` for a negative coefficient.
    fn sign(
        &mut self,
        x: usize,
        y: usize,
        neighborhood: &Neighborhood,
    ) -> Result<bool, EbcotError>;

    /// Run-length codes rows `y0..y0 + 4` of column `x` at `plane` and
    /// returns the offset of the first row that becomes significant.
    fn run_length(
        &mut self,
        x: usize,
        y0: usize,
        plane: u8,
    ) -> Result<Option<usize>, EbcotError>;
}

pub struct BitPlaneCoder {
    width: usize,
    height: usize,
    orientation: SubbandOrientation,
    // Flags with a one-cell border of permanently insignificant positions.
    flags: Vec<u8>,
}

impl BitPlaneCoder {
    // State Bit Definitions
    const SIG: u8 = 1 << 0;
    const VISITED: u8 = 1 << 1;
    const REFINE: u8 = 1 << 2;
    const NEGATIVE: u8 = 1 << 3;

    pub fn new(width: usize, height: usize, orientation: SubbandOrientation) -> Self {
        Self {
            width,
            height,
            orientation,
            flags: vec![0; (width + 2) * (height + 2)],
        }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        (y + 1) * (self.width + 2) + (x + 1)
    }

    pub fn is_significant(&self, x: usize, y: usize) -> bool {
        self.flags[self.index(x, y)] & Self::SIG != 0
    }

    pub fn is_negative(&self, x: usize, y: usize) -> bool {
        self.flags[self.index(x, y)] & Self::NEGATIVE != 0
    }

    fn signed_significance(&self, index: usize) -> i8 {
        let flags = self.flags[index];
        if flags & Self::SIG == 0 {
            0
        } else if flags & Self::NEGATIVE != 0 {
            -1
        } else {
            1
        }
    }

    pub fn neighborhood(&self, x: usize, y: usize) -> Neighborhood {
        let stride = self.width + 2;
        // Top-left neighbour in the bordered grid.
        let origin = y * stride + x;
        let mut cells = [[0i8; 3]; 3];
        for (row, line) in cells.iter_mut().enumerate() {
            for (col, cell) in line.iter_mut().enumerate() {
                if row != 1 || col != 1 {
                    *cell = self.signed_significance(origin + row * stride + col);
                }
            }
        }
        Neighborhood::new(cells)
    }

    fn mark_significant(&mut self, x: usize, y: usize, negative: bool) {
        let index = self.index(x, y);
        self.flags[index] |= Self::SIG;
        if negative {
            self.flags[index] |= Self::NEGATIVE;
        }
    }

    /// Runs the three coding passes of one bit-plane.
    pub fn code_plane<C: SymbolCoder>(
        &mut self,
        plane: u8,
        coder: &mut C,
    ) -> Result<(), EbcotError> {
        self.significance_propagation(plane, coder)?;
        self.magnitude_refinement(plane, coder)?;
        self.cleanup(plane, coder)?;
        for flags in &mut self.flags {
            *flags &= !Self::VISITED;
        }
        Ok(())
    }

    fn stripe_rows(&self, y0: usize) -> std::ops::Range<usize> {
        y0..(y0 + STRIPE_HEIGHT).min(self.height)
    }

    fn significance_propagation<C: SymbolCoder>(
        &mut self,
        plane: u8,
        coder: &mut C,
    ) -> Result<(), EbcotError> {
        for y0 in (0..self.height).step_by(STRIPE_HEIGHT) {
            for x in 0..self.width {
                for y in self.stripe_rows(y0) {
                    let index = self.index(x, y);
                    if self.flags[index] & Self::SIG != 0 {
                        continue;
                    }
                    let neighborhood = self.neighborhood(x, y);
                    if !neighborhood.any_significant() {
                        continue;
                    }
                    self.flags[index] |= Self::VISITED;
                    let context = context::zero_coding(&neighborhood, self.orientation);
                    let pass = CodingPass::SignificancePropagation;
                    if coder.magnitude_bit(pass, x, y, plane, context)? {
                        let negative = coder.sign(x, y, &neighborhood)?;
                        self.mark_significant(x, y, negative);
                    }
                }
            }
        }
        Ok(())
    }

    fn magnitude_refinement<C: SymbolCoder>(
        &mut self,
        plane: u8,
        coder: &mut C,
    ) -> Result<(), EbcotError> {
        for y0 in (0..self.height).step_by(STRIPE_HEIGHT) {
            for x in 0..self.width {
                for y in self.stripe_rows(y0) {
                    let index = self.index(x, y);
                    let flags = self.flags[index];
                    if flags & Self::SIG == 0 || flags & Self::VISITED != 0 {
                        continue;
                    }
                    let neighborhood = self.neighborhood(x, y);
                    let context =
                        context::magnitude_refinement(&neighborhood, flags & Self::REFINE != 0);
                    coder.magnitude_bit(CodingPass::MagnitudeRefinement, x, y, plane, context)?;
                    self.flags[index] |= Self::REFINE | Self::VISITED;
                }
            }
        }
        Ok(())
    }

    /// Whether column `x` of the stripe at `y0` qualifies for run-length coding.
    fn run_length_eligible(&self, x: usize, y0: usize) -> bool {
        if y0 + STRIPE_HEIGHT > self.height {
            return false;
        }
        (y0..y0 + STRIPE_HEIGHT).all(|y| {
            self.flags[self.index(x, y)] & (Self::SIG | Self::VISITED) == 0
                && !self.neighborhood(x, y).any_significant()
        })
    }

    fn cleanup<C: SymbolCoder>(&mut self, plane: u8, coder: &mut C) -> Result<(), EbcotError> {
        for y0 in (0..self.height).step_by(STRIPE_HEIGHT) {
            for x in 0..self.width {
                let mut first_row = y0;
                if self.run_length_eligible(x, y0) {
                    match coder.run_length(x, y0, plane)? {
                        None => continue,
                        Some(offset) => {
                            let y = y0 + offset;
                            let neighborhood = self.neighborhood(x, y);
                            let negative = coder.sign(x, y, &neighborhood)?;
                            self.mark_significant(x, y, negative);
                            first_row = y + 1;
                        }
                    }
                }
                for y in first_row..self.stripe_rows(y0).end {
                    if self.flags[self.index(x, y)] & (Self::SIG | Self::VISITED) != 0 {
                        continue;
                    }
                    let neighborhood = self.neighborhood(x, y);
                    let context = context::zero_coding(&neighborhood, self.orientation);
                    if coder.magnitude_bit(CodingPass::Cleanup, x, y, plane, context)? {
                        let negative = coder.sign(x, y, &neighborhood)?;
                        self.mark_significant(x, y, negative);
                    }
                }
            }
        }
        Ok(())
    }
}
