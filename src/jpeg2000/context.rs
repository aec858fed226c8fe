//! Context formation for the Tier-1 coding passes (ISO/IEC 15444-1 D.3).
//!
//! Every function here is pure: it maps the significance state of the eight
//! neighbours of a coefficient (and the subband orientation) to a context
//! label. All mutable state lives in the bit-plane coder.

use super::image::SubbandOrientation;
use super::mq_coder::Symbol;
use crate::constants::{
    REFINEMENT_CONTEXT_ISOLATED, REFINEMENT_CONTEXT_NEIGHBORS, REFINEMENT_CONTEXT_REFINED,
    RUN_LENGTH_CONTEXT, SIGN_CODING_CONTEXT_FIRST, STRIPE_HEIGHT, UNIFORM_CONTEXT,
};
use crate::error::EbcotError;

/// Signed significance of a 3x3 window centred on the coded coefficient.
///
/// Each cell is `0` for an insignificant neighbour, `1` for a significant
/// positive one and `-1` for a significant negative one. Neighbours outside
/// the code-block are insignificant. The centre cell is never read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighborhood {
    pub cells: [[i8; 3]; 3],
}

impl Neighborhood {
    pub fn new(cells: [[i8; 3]; 3]) -> Self {
        Self { cells }
    }

    /// Builds a neighbourhood from row slices, rejecting anything but 3x3.
    pub fn try_from_rows(rows: &[&[i8]]) -> Result<Self, EbcotError> {
        let cols = rows.first().map_or(0, |row| row.len());
        if rows.len() != 3 || rows.iter().any(|row| row.len() != 3) {
            return Err(EbcotError::InvalidNeighborhood {
                rows: rows.len(),
                cols,
            });
        }
        let mut cells = [[0i8; 3]; 3];
        for (dst, src) in cells.iter_mut().zip(rows) {
            for (cell, &value) in dst.iter_mut().zip(src.iter()) {
                *cell = value.signum();
            }
        }
        Ok(Self { cells })
    }

    fn significant(&self, row: usize, col: usize) -> u8 {
        (self.cells[row][col] != 0) as u8
    }

    /// Significant neighbours as (horizontal, vertical, diagonal) counts.
    pub fn counts(&self) -> (u8, u8, u8) {
        let h = self.significant(1, 0) + self.significant(1, 2);
        let v = self.significant(0, 1) + self.significant(2, 1);
        let d = self.significant(0, 0)
            + self.significant(0, 2)
            + self.significant(2, 0)
            + self.significant(2, 2);
        (h, v, d)
    }

    pub fn any_significant(&self) -> bool {
        let (h, v, d) = self.counts();
        h + v + d > 0
    }
}

/// Zero-coding context (0..=8) for a coefficient that is not yet significant.
pub fn zero_coding(neighborhood: &Neighborhood, orientation: SubbandOrientation) -> u8 {
    let (h, v, d) = neighborhood.counts();
    match orientation {
        SubbandOrientation::LL | SubbandOrientation::LH => zero_coding_low_high(h, v, d),
        // HL favours vertical neighbours: same table with the roles swapped.
        SubbandOrientation::HL => zero_coding_low_high(v, h, d),
        SubbandOrientation::HH => zero_coding_diagonal(h + v, d),
    }
}

fn zero_coding_low_high(h: u8, v: u8, d: u8) -> u8 {
    match (h, v, d) {
        (2, _, _) => 8,
        (1, 1.., _) => 7,
        (1, 0, 1..) => 6,
        (1, 0, 0) => 5,
        (0, 2, _) => 4,
        (0, 1, _) => 3,
        (0, 0, 2..) => 2,
        (0, 0, 1) => 1,
        _ => 0,
    }
}

fn zero_coding_diagonal(hv: u8, d: u8) -> u8 {
    match (hv, d) {
        (_, 3..) => 8,
        (1.., 2) => 7,
        (0, 2) => 6,
        (2.., 1) => 5,
        (1, 1) => 4,
        (0, 1) => 3,
        (2.., 0) => 2,
        (1, 0) => 1,
        _ => 0,
    }
}

/// Sign-coding context (9..=13) and the predicted sign (`true` = negative).
///
/// The horizontal and vertical contributions are the clamped sums of the
/// signed significance of the two neighbours in each direction (table D.3).
pub fn sign_context(neighborhood: &Neighborhood) -> (u8, bool) {
    let cells = &neighborhood.cells;
    let h = (cells[1][0] + cells[1][2]).clamp(-1, 1);
    let v = (cells[0][1] + cells[2][1]).clamp(-1, 1);
    let (offset, predicted_negative) = match (h, v) {
        (1, 1) => (4, false),
        (1, 0) => (3, false),
        (1, -1) => (2, false),
        (0, 1) => (1, false),
        (0, 0) => (0, false),
        (0, -1) => (1, true),
        (-1, 1) => (2, true),
        (-1, 0) => (3, true),
        _ => (4, true),
    };
    (SIGN_CODING_CONTEXT_FIRST + offset, predicted_negative)
}

/// Symbol coding the sign of a newly significant coefficient: the bit is 0
/// when the prediction holds.
pub fn sign_coding(neighborhood: &Neighborhood, negative: bool) -> Symbol {
    let (context, predicted_negative) = sign_context(neighborhood);
    Symbol::new((negative ^ predicted_negative) as u8, context)
}

/// Inverse of [`sign_coding`]: recovers the sign from the decoded bit.
pub fn sign_decoding(neighborhood: &Neighborhood, bit: u8) -> bool {
    let (_, predicted_negative) = sign_context(neighborhood);
    (bit != 0) ^ predicted_negative
}

/// Magnitude-refinement context (14..=16).
pub fn magnitude_refinement(neighborhood: &Neighborhood, already_refined: bool) -> u8 {
    if already_refined {
        REFINEMENT_CONTEXT_REFINED
    } else if neighborhood.any_significant() {
        REFINEMENT_CONTEXT_NEIGHBORS
    } else {
        REFINEMENT_CONTEXT_ISOLATED
    }
}

/// Outcome of run-length coding one stripe column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLength {
    /// Row (0..4) of the first coefficient that becomes significant.
    pub position: Option<usize>,
    /// Rows covered by the run, including the significant one.
    pub length: usize,
    pub symbols: Vec<Symbol>,
}

/// Run-length coding of four stripe rows whose neighbourhoods are all
/// insignificant.
///
/// An all-zero column costs one symbol in context 17. Otherwise a 1 in
/// context 17 is followed by the two-bit row index, MSB first, in the
/// uniform context.
pub fn run_length_coding(bits: [bool; STRIPE_HEIGHT]) -> RunLength {
    match bits.iter().position(|&bit| bit) {
        None => RunLength {
            position: None,
            length: STRIPE_HEIGHT,
            symbols: vec![Symbol::new(0, RUN_LENGTH_CONTEXT)],
        },
        Some(row) => RunLength {
            position: Some(row),
            length: row + 1,
            symbols: vec![
                Symbol::new(1, RUN_LENGTH_CONTEXT),
                Symbol::new(((row >> 1) & 1) as u8, UNIFORM_CONTEXT),
                Symbol::new((row & 1) as u8, UNIFORM_CONTEXT),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(cells: &[(usize, usize, i8)]) -> Neighborhood {
        let mut n = Neighborhood::default();
        for &(row, col, value) in cells {
            n.cells[row][col] = value;
        }
        n
    }

    #[test]
    fn test_try_from_rows_checks_shape() {
        let ok = Neighborhood::try_from_rows(&[&[0, 1, 0], &[0, 0, -1], &[5, 0, 0]]).unwrap();
        assert_eq!(ok.cells, [[0, 1, 0], [0, 0, -1], [1, 0, 0]]);

        let err = Neighborhood::try_from_rows(&[&[0, 0], &[0, 0]]).unwrap_err();
        assert!(matches!(
            err,
            EbcotError::InvalidNeighborhood { rows: 2, cols: 2 }
        ));
        assert!(Neighborhood::try_from_rows(&[&[0, 0, 0], &[0, 0], &[0, 0, 0]]).is_err());
    }

    #[test]
    fn test_counts_ignore_centre() {
        let n = with(&[(1, 1, 1), (1, 0, 1), (0, 1, -1), (2, 2, 1)]);
        assert_eq!(n.counts(), (1, 1, 1));
        assert!(!with(&[(1, 1, 1)]).any_significant());
    }

    #[test]
    fn test_zero_coding_low_high() {
        use SubbandOrientation::LL;
        assert_eq!(zero_coding(&Neighborhood::default(), LL), 0);
        assert_eq!(zero_coding(&with(&[(0, 0, 1)]), LL), 1);
        assert_eq!(zero_coding(&with(&[(0, 0, 1), (2, 2, 1)]), LL), 2);
        assert_eq!(zero_coding(&with(&[(0, 1, 1)]), LL), 3);
        assert_eq!(zero_coding(&with(&[(0, 1, 1), (2, 1, -1)]), LL), 4);
        assert_eq!(zero_coding(&with(&[(1, 0, 1)]), LL), 5);
        assert_eq!(zero_coding(&with(&[(1, 0, 1), (2, 0, 1)]), LL), 6);
        assert_eq!(zero_coding(&with(&[(1, 0, 1), (0, 1, 1)]), LL), 7);
        assert_eq!(zero_coding(&with(&[(1, 0, 1), (1, 2, 1)]), LL), 8);
    }

    #[test]
    fn test_zero_coding_hl_transposes() {
        let vertical = with(&[(0, 1, 1)]);
        let horizontal = with(&[(1, 0, 1)]);
        assert_eq!(zero_coding(&vertical, SubbandOrientation::LH), 3);
        assert_eq!(zero_coding(&vertical, SubbandOrientation::HL), 5);
        assert_eq!(zero_coding(&horizontal, SubbandOrientation::HL), 3);
        assert_eq!(
            zero_coding(&with(&[(0, 1, 1), (2, 1, 1)]), SubbandOrientation::HL),
            8
        );
    }

    #[test]
    fn test_zero_coding_diagonal() {
        use SubbandOrientation::HH;
        assert_eq!(zero_coding(&Neighborhood::default(), HH), 0);
        assert_eq!(zero_coding(&with(&[(1, 0, 1)]), HH), 1);
        assert_eq!(zero_coding(&with(&[(1, 0, 1), (0, 1, 1)]), HH), 2);
        assert_eq!(zero_coding(&with(&[(0, 0, 1)]), HH), 3);
        assert_eq!(zero_coding(&with(&[(0, 0, 1), (1, 2, 1)]), HH), 4);
        assert_eq!(zero_coding(&with(&[(0, 0, 1), (1, 2, 1), (2, 1, 1)]), HH), 5);
        assert_eq!(zero_coding(&with(&[(0, 0, 1), (2, 2, 1)]), HH), 6);
        assert_eq!(zero_coding(&with(&[(0, 0, 1), (2, 2, 1), (1, 0, 1)]), HH), 7);
        assert_eq!(zero_coding(&with(&[(0, 0, 1), (2, 2, 1), (0, 2, 1)]), HH), 8);
    }

    #[test]
    fn test_sign_context_table() {
        let cases = [
            (1, 1, 13, false),
            (1, 0, 12, false),
            (1, -1, 11, false),
            (0, 1, 10, false),
            (0, 0, 9, false),
            (0, -1, 10, true),
            (-1, 1, 11, true),
            (-1, 0, 12, true),
            (-1, -1, 13, true),
        ];
        for (h, v, context, predicted) in cases {
            let n = with(&[(1, 0, h), (0, 1, v)]);
            assert_eq!(sign_context(&n), (context, predicted), "h={h} v={v}");
        }
    }

    #[test]
    fn test_sign_contributions_cancel_and_clamp() {
        // Opposite horizontal neighbours cancel out.
        assert_eq!(sign_context(&with(&[(1, 0, 1), (1, 2, -1)])), (9, false));
        // Two positive neighbours clamp to one.
        assert_eq!(sign_context(&with(&[(1, 0, 1), (1, 2, 1)])), (12, false));
        // Diagonals do not take part.
        assert_eq!(sign_context(&with(&[(0, 0, -1), (2, 2, -1)])), (9, false));
    }

    #[test]
    fn test_sign_coding_roundtrip() {
        let n = with(&[(1, 0, -1), (2, 1, -1)]);
        for negative in [false, true] {
            let symbol = sign_coding(&n, negative);
            assert_eq!(symbol.context, 13);
            assert_eq!(sign_decoding(&n, symbol.bit), negative);
        }
        // Default prediction is positive: a negative sign codes as 1 in context 9.
        assert_eq!(
            sign_coding(&Neighborhood::default(), true),
            Symbol::new(1, 9)
        );
    }

    #[test]
    fn test_magnitude_refinement_contexts() {
        assert_eq!(magnitude_refinement(&Neighborhood::default(), false), 14);
        assert_eq!(magnitude_refinement(&with(&[(2, 0, -1)]), false), 15);
        assert_eq!(magnitude_refinement(&with(&[(2, 0, -1)]), true), 16);
        assert_eq!(magnitude_refinement(&Neighborhood::default(), true), 16);
    }

    #[test]
    fn test_run_length_coding() {
        let none = run_length_coding([false; 4]);
        assert_eq!(none.position, None);
        assert_eq!(none.length, 4);
        assert_eq!(none.symbols, vec![Symbol::new(0, 17)]);

        for row in 0..4 {
            let mut bits = [false; 4];
            bits[row] = true;
            if row < 3 {
                bits[3] = true;
            }
            let run = run_length_coding(bits);
            assert_eq!(run.position, Some(row));
            assert_eq!(run.length, row + 1);
            assert_eq!(
                run.symbols,
                vec![
                    Symbol::new(1, 17),
                    Symbol::new((row >> 1) as u8, 18),
                    Symbol::new((row & 1) as u8, 18),
                ]
            );
        }
    }
}
