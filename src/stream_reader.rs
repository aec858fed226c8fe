use byteorder::{BigEndian, ByteOrder};

use crate::error::{EbcotError, Location};
use crate::marker_code::{MARKER_START_BYTE, MarkerCode};

/// Big-endian cursor over a codestream.
pub struct StreamReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position..]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], EbcotError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.source.len())
            .ok_or(EbcotError::UnexpectedEndOfStream {
                location: Location::default(),
            })?;
        let bytes = &self.source[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, EbcotError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, EbcotError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, EbcotError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_marker(&mut self) -> Result<MarkerCode, EbcotError> {
        let position = self.position;
        let start = self.read_u8()?;
        if start != MARKER_START_BYTE {
            return Err(EbcotError::UnexpectedMarker {
                expected: "a marker",
                found: start,
                position,
            });
        }
        let marker_byte = self.read_u8()?;
        MarkerCode::try_from(marker_byte).map_err(|found| EbcotError::UnexpectedMarker {
            expected: "a known marker",
            found,
            position: position + 1,
        })
    }

    /// Reads a marker and fails unless it is `expected`.
    pub fn expect_marker(&mut self, expected: MarkerCode) -> Result<(), EbcotError> {
        let position = self.position;
        let marker = self.read_marker()?;
        if marker != expected {
            return Err(EbcotError::UnexpectedMarker {
                expected: expected.name(),
                found: marker as u8,
                position: position + 1,
            });
        }
        Ok(())
    }

    /// Reads a segment length and checks it against the fixed size of the segment.
    pub fn read_segment_length(
        &mut self,
        expected: u16,
        error: &'static str,
    ) -> Result<(), EbcotError> {
        if self.read_u16()? != expected {
            return Err(EbcotError::invalid_header(error));
        }
        Ok(())
    }
}
