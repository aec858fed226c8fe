//! Codestream writer utilities.
//!
//! `StreamWriter` emits big-endian fields and markers into a growable
//! buffer. Lengths that are only known after a segment has been written are
//! reserved first and patched afterwards.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::EbcotError;
use crate::marker_code::{MARKER_START_BYTE, MarkerCode};

#[derive(Debug, Default)]
pub struct StreamWriter {
    destination: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.destination.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destination.is_empty()
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), EbcotError> {
        self.destination.write_u8(value)?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), EbcotError> {
        self.destination.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), EbcotError> {
        self.destination.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EbcotError> {
        self.destination.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_marker(&mut self, marker: MarkerCode) -> Result<(), EbcotError> {
        self.write_byte(MARKER_START_BYTE)?;
        self.write_byte(marker as u8)?;
        Ok(())
    }

    /// Overwrites a previously written 32-bit field at `position`.
    pub fn patch_u32(&mut self, position: usize, value: u32) -> Result<(), EbcotError> {
        let field = self
            .destination
            .get_mut(position..position + 4)
            .ok_or(EbcotError::InvalidParameter("patched field lies outside the stream"))?;
        BigEndian::write_u32(field, value);
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.destination
    }
}
