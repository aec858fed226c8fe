use ebcot_rs::jpeg2000::coefficients::{read_dump_file, write_dump_file};
use ebcot_rs::jpeg2000::sentinel_stream;
use ebcot_rs::{
    CodingParameters, EbcotDecoder, EbcotEncoder, ParallelPolicy, Subband, SubbandOrientation,
    TileCoefficients,
};

/// Deterministic xorshift generator for test coefficients.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Mostly small values with occasional large ones, like quantized
    /// wavelet detail coefficients.
    fn coefficient(&mut self, bit_planes: u8) -> i32 {
        let max = ((1u64 << bit_planes) - 1) as i64;
        let roll = self.next() % 10;
        let magnitude = match roll {
            0..=4 => 0,
            5..=7 => (self.next() % 4) as i64,
            _ => (self.next() % (max as u64 + 1)) as i64,
        };
        let value = if self.next() & 1 == 1 { -magnitude } else { magnitude };
        value as i32
    }
}

/// A tile of three channels whose band sizes halve per level, the way a
/// wavelet decomposition of a `width` x `height` tile would lay them out.
fn tile(width: usize, height: usize, levels: u8, bit_planes: u8, seed: u64) -> TileCoefficients {
    let mut rng = XorShift(seed);
    let mut bands = Vec::new();
    for _ in 0..3 {
        let ll_width = width >> levels;
        let ll_height = height >> levels;
        let mut shapes = vec![(ll_width.max(1), ll_height.max(1))];
        for level in (0..levels).rev() {
            let (w, h) = ((width >> (level + 1)).max(1), (height >> (level + 1)).max(1));
            shapes.extend([(w, h); 3]);
        }
        for (index, (w, h)) in shapes.into_iter().enumerate() {
            let data = (0..w * h).map(|_| rng.coefficient(bit_planes)).collect();
            bands.push(
                Subband::new(SubbandOrientation::at_channel_position(index), w, h, data).unwrap(),
            );
        }
    }
    TileCoefficients::from_bands(bands, 3).unwrap()
}

fn params(block: usize, bit_planes: u8, levels: u8) -> CodingParameters {
    CodingParameters {
        code_block_size: block,
        bit_planes,
        decomposition_levels: levels,
        parallel: ParallelPolicy::default(),
    }
}

#[test]
fn test_codestream_roundtrip() {
    let params = params(16, 8, 3);
    let tiles = vec![tile(72, 40, 3, 8, 1), tile(72, 40, 3, 8, 2)];
    let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
    let bytes = image.to_codestream().unwrap();
    let decoded = EbcotDecoder::new(params)
        .unwrap()
        .decode_codestream(&bytes)
        .unwrap();
    assert_eq!(decoded, tiles);
}

#[test]
fn test_sentinel_stream_roundtrip() {
    let params = params(8, 7, 2);
    let tiles = vec![tile(30, 22, 2, 7, 3)];
    let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
    let values = image.to_sentinel_stream().unwrap();
    let decoded = EbcotDecoder::new(params)
        .unwrap()
        .decode_sentinel_stream(&values)
        .unwrap();
    assert_eq!(decoded, tiles);
}

#[test]
fn test_default_parameters_roundtrip() {
    let params = CodingParameters::default();
    let tiles = vec![tile(160, 136, 3, 8, 4)];
    let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
    assert_eq!(EbcotDecoder::new(params).unwrap().decode(&image).unwrap(), tiles);
}

#[test]
fn test_boundary_shapes_decode_unpadded() {
    for (width, height) in [(1, 1), (5, 3), (17, 64), (65, 9), (4, 4)] {
        let params = params(16, 5, 0);
        let tiles = vec![tile(width, height, 0, 5, width as u64 * 31 + height as u64)];
        let bytes = EbcotEncoder::new(params)
            .unwrap()
            .encode(&tiles)
            .unwrap()
            .to_codestream()
            .unwrap();
        let decoded = EbcotDecoder::new(params)
            .unwrap()
            .decode_codestream(&bytes)
            .unwrap();
        assert_eq!(decoded[0].channels[0].ll.width, width);
        assert_eq!(decoded[0].channels[0].ll.height, height);
        assert_eq!(decoded, tiles, "{width}x{height}");
    }
}

#[test]
fn test_extreme_magnitudes() {
    for bit_planes in [1, 8, 16, 31] {
        let max = ((1u64 << bit_planes) - 1) as i32;
        let params = params(4, bit_planes, 0);
        let bands = (0..3)
            .map(|channel| {
                let data = (0..36)
                    .map(|i| match (i + channel) % 4 {
                        0 => max,
                        1 => -max,
                        2 => 0,
                        _ => 1 - 2 * (i as i32 % 2),
                    })
                    .collect();
                Subband::new(SubbandOrientation::LL, 6, 6, data).unwrap()
            })
            .collect();
        let tiles = vec![TileCoefficients::from_bands(bands, 3).unwrap()];
        let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
        assert_eq!(
            EbcotDecoder::new(params).unwrap().decode(&image).unwrap(),
            tiles,
            "bit_planes={bit_planes}"
        );
    }
}

#[test]
fn test_all_zero_tile() {
    let params = params(8, 8, 1);
    let mut tiles = vec![tile(16, 16, 1, 8, 5)];
    for channel in &mut tiles[0].channels {
        channel.ll.data.fill(0);
        for level in &mut channel.levels {
            level.lh.data.fill(0);
            level.hl.data.fill(0);
            level.hh.data.fill(0);
        }
    }
    let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
    let first = &image.tiles[0].bands[0].blocks[0].data;
    assert!(image.tiles[0]
        .bands
        .iter()
        .flat_map(|b| &b.blocks)
        .all(|block| &block.data == first));
    assert_eq!(EbcotDecoder::new(params).unwrap().decode(&image).unwrap(), tiles);
}

#[test]
fn test_parallel_output_is_identical() {
    let tiles = vec![tile(128, 96, 1, 8, 6)];
    let sequential = CodingParameters {
        parallel: ParallelPolicy::sequential(),
        ..params(8, 8, 1)
    };
    let pooled = CodingParameters {
        parallel: ParallelPolicy {
            enabled: true,
            min_blocks: 2,
            max_workers: Some(4),
        },
        ..params(8, 8, 1)
    };
    let a = EbcotEncoder::new(sequential).unwrap().encode(&tiles).unwrap();
    let b = EbcotEncoder::new(pooled).unwrap().encode(&tiles).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_codestream().unwrap(), b.to_codestream().unwrap());
    assert_eq!(EbcotDecoder::new(pooled).unwrap().decode(&a).unwrap(), tiles);
}

#[test]
fn test_encoding_is_deterministic() {
    let params = params(16, 8, 2);
    let tiles = vec![tile(48, 48, 2, 8, 7)];
    let encoder = EbcotEncoder::new(params).unwrap();
    let first = encoder.encode(&tiles).unwrap().to_codestream().unwrap();
    let second = encoder.encode(&tiles).unwrap().to_codestream().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_raw_stream_matches_block_bytes() {
    let params = params(8, 6, 1);
    let tiles = vec![tile(24, 16, 1, 6, 8), tile(24, 16, 1, 6, 9)];
    let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
    let raw = image.raw_stream();
    let total: usize = image
        .tiles
        .iter()
        .flat_map(|t| &t.bands)
        .map(|b| b.coded_bytes())
        .sum();
    assert_eq!(raw.len(), total);
    let first = &image.tiles[0].bands[0].blocks[0].data;
    assert_eq!(&raw[..first.len()], first.as_slice());
}

#[test]
fn test_file_roundtrips() {
    let params = params(8, 8, 1);
    let tiles = vec![tile(20, 12, 1, 8, 10), tile(20, 12, 1, 8, 11)];
    let dir = tempfile::tempdir().unwrap();

    let dump = dir.path().join("coefficients.ebqc");
    write_dump_file(&dump, &tiles).unwrap();
    let tiles = read_dump_file(&dump).unwrap();

    let image = EbcotEncoder::new(params).unwrap().encode(&tiles).unwrap();
    let stream = dir.path().join("tiles.bin");
    sentinel_stream::write_file(&stream, &image.to_sentinel_stream().unwrap()).unwrap();

    let decoded = EbcotDecoder::new(params)
        .unwrap()
        .decode_file(&stream)
        .unwrap();
    assert_eq!(decoded, tiles);
}
