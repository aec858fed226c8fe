//! Binary dump of quantized tile coefficients.
//!
//! Layout, little-endian: magic `EBQC`, `tile_count: u32`, `channels: u8`,
//! `levels: u8`, then for every band of every tile in stream order
//! `height: u32`, `width: u32` and `height * width` `i32` coefficients.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use super::image::{Subband, SubbandOrientation, TileCoefficients};
use crate::constants::{CHANNEL_COUNT, COEFFICIENT_DUMP_MAGIC, MAXIMUM_DECOMPOSITION_LEVELS};
use crate::error::{EbcotError, Location};

fn end_of_stream(error: std::io::Error, location: Location) -> EbcotError {
    if error.kind() == ErrorKind::UnexpectedEof {
        EbcotError::UnexpectedEndOfStream { location }
    } else {
        EbcotError::Io(error)
    }
}

pub fn write_dump<W: Write>(mut writer: W, tiles: &[TileCoefficients]) -> Result<(), EbcotError> {
    let channels = tiles.first().map_or(CHANNEL_COUNT, |tile| tile.channels.len());
    let levels = tiles
        .first()
        .map_or(Some(0), TileCoefficients::decomposition_levels)
        .ok_or(EbcotError::InvalidParameter(
            "channels of a tile disagree on the decomposition depth",
        ))?;
    for tile in tiles {
        if tile.channels.len() != channels || tile.decomposition_levels() != Some(levels) {
            return Err(EbcotError::InvalidParameter(
                "every tile must share the channel count and decomposition depth",
            ));
        }
    }
    let channels =
        u8::try_from(channels).map_err(|_| EbcotError::InvalidParameter("too many channels"))?;
    let levels = u8::try_from(levels)
        .map_err(|_| EbcotError::InvalidParameter("too many decomposition levels"))?;
    let tile_count =
        u32::try_from(tiles.len()).map_err(|_| EbcotError::InvalidParameter("too many tiles"))?;

    writer.write_all(&COEFFICIENT_DUMP_MAGIC)?;
    writer.write_u32::<LittleEndian>(tile_count)?;
    writer.write_u8(channels)?;
    writer.write_u8(levels)?;
    for band in tiles.iter().flat_map(|tile| tile.bands()) {
        let height = u32::try_from(band.height)
            .map_err(|_| EbcotError::InvalidParameter("band height exceeds 32 bits"))?;
        let width = u32::try_from(band.width)
            .map_err(|_| EbcotError::InvalidParameter("band width exceeds 32 bits"))?;
        writer.write_u32::<LittleEndian>(height)?;
        writer.write_u32::<LittleEndian>(width)?;
        for &value in &band.data {
            writer.write_i32::<LittleEndian>(value)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_band<R: Read>(
    reader: &mut R,
    orientation: SubbandOrientation,
    location: Location,
) -> Result<Subband, EbcotError> {
    let height = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| end_of_stream(e, location))? as usize;
    let width = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| end_of_stream(e, location))? as usize;
    let byte_count = height
        .checked_mul(width)
        .and_then(|count| count.checked_mul(4))
        .ok_or(EbcotError::invalid_header("band shape overflows"))?;

    // Grows with the data actually present rather than the declared shape.
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(byte_count as u64)
        .read_to_end(&mut bytes)?;
    if bytes.len() != byte_count {
        return Err(EbcotError::UnexpectedEndOfStream { location });
    }
    let mut data = vec![0; height * width];
    LittleEndian::read_i32_into(&bytes, &mut data);
    Subband::new(orientation, width, height, data)
}

pub fn read_dump<R: Read>(mut reader: R) -> Result<Vec<TileCoefficients>, EbcotError> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| end_of_stream(e, Location::default()))?;
    if magic != COEFFICIENT_DUMP_MAGIC {
        return Err(EbcotError::invalid_header("not a coefficient dump"));
    }
    let tile_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| end_of_stream(e, Location::default()))? as usize;
    let channels = reader
        .read_u8()
        .map_err(|e| end_of_stream(e, Location::default()))? as usize;
    let levels = reader
        .read_u8()
        .map_err(|e| end_of_stream(e, Location::default()))?;
    if channels == 0 {
        return Err(EbcotError::invalid_header("channel count must not be zero"));
    }
    if levels > MAXIMUM_DECOMPOSITION_LEVELS {
        return Err(EbcotError::invalid_header(
            "decomposition levels must not exceed 32",
        ));
    }

    let per_channel = 1 + 3 * levels as usize;
    let mut tiles = Vec::new();
    for tile_index in 0..tile_count {
        let bands = (0..channels * per_channel)
            .map(|band_index| {
                let orientation = SubbandOrientation::at_channel_position(band_index % per_channel);
                let location = Location::tile(tile_index).with_band(band_index);
                read_band(&mut reader, orientation, location)
            })
            .collect::<Result<Vec<_>, _>>()?;
        tiles.push(TileCoefficients::from_bands(bands, channels)?);
    }
    Ok(tiles)
}

pub fn write_dump_file(
    path: impl AsRef<Path>,
    tiles: &[TileCoefficients],
) -> Result<(), EbcotError> {
    write_dump(BufWriter::new(File::create(path)?), tiles)
}

pub fn read_dump_file(path: impl AsRef<Path>) -> Result<Vec<TileCoefficients>, EbcotError> {
    read_dump(BufReader::new(File::open(path)?))
}
