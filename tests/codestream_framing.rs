use ebcot_rs::constants::{SENTINEL_BAND, SENTINEL_BLOCK, SENTINEL_ROW, SENTINEL_TILE};
use ebcot_rs::{
    CodingParameters, EbcotDecoder, EbcotEncoder, EbcotError, EncodedImage, Location,
    ParallelPolicy, Subband, SubbandOrientation, TileCoefficients,
};

fn tile(seed: i32) -> TileCoefficients {
    let shapes = [(5, 3), (5, 3), (9, 6), (9, 6)];
    let bands = (0..12)
        .map(|i| {
            let (w, h) = shapes[i % 4];
            let data = (0..w * h)
                .map(|j| ((j as i32 * 29 + i as i32 * 7 + seed) % 51) - 25)
                .collect();
            Subband::new(SubbandOrientation::at_channel_position(i % 4), w, h, data).unwrap()
        })
        .collect();
    TileCoefficients::from_bands(bands, 3).unwrap()
}

fn params() -> CodingParameters {
    CodingParameters {
        code_block_size: 4,
        bit_planes: 5,
        decomposition_levels: 1,
        parallel: ParallelPolicy::sequential(),
    }
}

fn encoded() -> EncodedImage {
    EbcotEncoder::new(params())
        .unwrap()
        .encode(&[tile(1), tile(2), tile(3)])
        .unwrap()
}

#[test]
fn test_codestream_reframing_is_identity() {
    let bytes = encoded().to_codestream().unwrap();
    let parsed = EncodedImage::from_codestream(&bytes).unwrap();
    assert_eq!(parsed.to_codestream().unwrap(), bytes);
    assert!(parsed
        .tiles
        .iter()
        .flat_map(|t| &t.bands)
        .flat_map(|b| &b.blocks)
        .all(|block| block.contexts.is_none()));
}

#[test]
fn test_sentinel_reframing_is_identity() {
    let image = encoded();
    let values = image.to_sentinel_stream().unwrap();
    let parsed = EncodedImage::from_sentinel_stream(&values, 4, 5).unwrap();
    assert_eq!(parsed, image);
    assert_eq!(parsed.to_sentinel_stream().unwrap(), values);
}

#[test]
fn test_codestream_blocks_cannot_be_reframed_as_sentinels() {
    let bytes = encoded().to_codestream().unwrap();
    let parsed = EncodedImage::from_codestream(&bytes).unwrap();
    assert!(matches!(
        parsed.to_sentinel_stream(),
        Err(EbcotError::MissingContextLabels { .. })
    ));
}

#[test]
fn test_trailing_data_is_rejected() {
    let mut bytes = encoded().to_codestream().unwrap();
    bytes.push(0);
    let err = EbcotDecoder::new(params())
        .unwrap()
        .decode_codestream(&bytes)
        .unwrap_err();
    assert!(matches!(err, EbcotError::TrailingData(1)));
}

#[test]
fn test_truncated_codestream() {
    let bytes = encoded().to_codestream().unwrap();
    let cut = bytes.len() / 2;
    let err = EncodedImage::from_codestream(&bytes[..cut]).unwrap_err();
    match err {
        EbcotError::UnexpectedEndOfStream { location } => assert!(location.tile.is_some()),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_corrupt_codeword_decodes_without_failing() {
    let image = encoded();
    let mut corrupted = image.clone();
    for block in &mut corrupted.tiles[1].bands[2].blocks {
        block.contexts = None;
        for byte in &mut block.data {
            *byte ^= 0x5A;
        }
    }
    let decoder = EbcotDecoder::new(params()).unwrap();
    // Without context labels nothing can detect the damage; the MQ decoder
    // keeps producing symbols.
    let first = decoder.decode(&corrupted).unwrap();
    let second = decoder.decode(&corrupted).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0], tile(1));
}

#[test]
fn test_sentinel_tile_without_bands() {
    let values = [SENTINEL_TILE];
    match EncodedImage::from_sentinel_stream(&values, 4, 5).unwrap_err() {
        EbcotError::BandCountMismatch { found: 0, location } => {
            assert_eq!(location, Location::tile(0));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_missing_band_sentinel_is_located() {
    let mut values = encoded().to_sentinel_stream().unwrap();
    let tile_end = values.iter().position(|&v| v == SENTINEL_TILE).unwrap();
    let second_tile_band = values[tile_end..]
        .iter()
        .position(|&v| v == SENTINEL_BAND)
        .unwrap()
        + tile_end;
    values.remove(second_tile_band);
    let err = EbcotDecoder::new(params())
        .unwrap()
        .decode_sentinel_stream(&values)
        .unwrap_err();
    match err {
        EbcotError::MissingSentinel {
            expected: "band",
            location,
            ..
        } => assert_eq!(location, Location::tile(1).with_band(0)),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_sentinel_decode_uses_configured_block_size() {
    let values = encoded().to_sentinel_stream().unwrap();
    let decoder = EbcotDecoder::new(CodingParameters {
        code_block_size: 8,
        ..params()
    })
    .unwrap();
    assert!(decoder.decode_sentinel_stream(&values).is_err());
}

#[test]
fn test_sentinel_parse_rejects_zero_block_size() {
    let values = [
        1,
        1,
        17,
        SENTINEL_BLOCK,
        SENTINEL_BLOCK,
        SENTINEL_ROW,
        SENTINEL_BAND,
        SENTINEL_TILE,
    ];
    assert!(matches!(
        EncodedImage::from_sentinel_stream(&values, 0, 8),
        Err(EbcotError::InvalidParameter(_))
    ));
    assert!(matches!(
        EncodedImage::from_sentinel_stream(&values, 4, 64),
        Err(EbcotError::InvalidParameter(_))
    ));
}
