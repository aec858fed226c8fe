//! ebcot CLI - EBCOT Tier-1 coding of quantized wavelet coefficients.
//!
//! Reads and writes coefficient dumps (`EBQC`), length-prefixed codestreams
//! and sentinel integer streams.

use clap::{ArgAction, Args, Parser, Subcommand};
use ebcot_rs::jpeg2000::coefficients::{read_dump_file, write_dump_file};
use ebcot_rs::jpeg2000::sentinel_stream;
use ebcot_rs::{CodingParameters, EbcotDecoder, EbcotEncoder, EncodedImage, ParallelPolicy};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::path::{Path, PathBuf};

/// EBCOT Tier-1 entropy coder
#[derive(Parser)]
#[command(name = "ebcot")]
#[command(version)]
#[command(about = "EBCOT Tier-1 encoder and decoder for quantized wavelet coefficients", long_about = None)]
#[command(after_help = "EXAMPLES:
    ebcot encode -i coeffs.ebqc -o image.ebc
    ebcot encode -i coeffs.ebqc -o image.bin --sentinel --raw-output image.raw
    ebcot decode -i image.ebc -o coeffs.ebqc
    ebcot info -i image.bin --sentinel -b 32")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CodingArgs {
    /// Code-block side (multiple of 4, 4 to 1024)
    #[arg(short = 'b', long, default_value = "64")]
    block_size: usize,

    /// Magnitude bit-planes per code-block (1 to 31)
    #[arg(short = 'p', long, default_value = "8")]
    bit_planes: u8,

    /// Code every block on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Cap on worker threads (default: one per core)
    #[arg(long)]
    workers: Option<usize>,
}

impl CodingArgs {
    fn parameters(&self, decomposition_levels: u8) -> CodingParameters {
        let parallel = if self.sequential {
            ParallelPolicy::sequential()
        } else {
            ParallelPolicy {
                max_workers: self.workers,
                ..ParallelPolicy::default()
            }
        };
        CodingParameters {
            code_block_size: self.block_size,
            bit_planes: self.bit_planes,
            decomposition_levels,
            parallel,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a coefficient dump
    ///
    /// The decomposition depth is taken from the dump.
    #[command(visible_alias = "e")]
    Encode {
        /// Coefficient dump (EBQC)
        #[arg(short, long)]
        input: PathBuf,

        /// Coded output
        #[arg(short, long)]
        output: PathBuf,

        /// Write a sentinel integer stream instead of a byte codestream
        #[arg(long)]
        sentinel: bool,

        /// Also write every block's coded bytes back to back, unframed
        #[arg(long)]
        raw_output: Option<PathBuf>,

        #[command(flatten)]
        coding: CodingArgs,
    },

    /// Decode a codestream back to a coefficient dump
    ///
    /// A byte codestream carries its own coding parameters; a sentinel
    /// stream is decoded with the block size and bit-planes given here.
    #[command(visible_alias = "d")]
    Decode {
        /// Coded input
        #[arg(short, long)]
        input: PathBuf,

        /// Coefficient dump (EBQC)
        #[arg(short, long)]
        output: PathBuf,

        /// Read a sentinel integer stream instead of a byte codestream
        #[arg(long)]
        sentinel: bool,

        #[command(flatten)]
        coding: CodingArgs,
    },

    /// Display the structure of a coded file
    #[command(visible_alias = "i")]
    Info {
        /// Coded input
        #[arg(short, long)]
        input: PathBuf,

        /// Read a sentinel integer stream instead of a byte codestream
        #[arg(long)]
        sentinel: bool,

        #[command(flatten)]
        coding: CodingArgs,
    },
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            sentinel,
            raw_output,
            coding,
        } => encode(&input, &output, sentinel, raw_output.as_deref(), &coding),
        Commands::Decode {
            input,
            output,
            sentinel,
            coding,
        } => decode(&input, &output, sentinel, &coding),
        Commands::Info {
            input,
            sentinel,
            coding,
        } => show_info(&input, sentinel, &coding),
    };

    if let Err(e) = result {
        log::debug!("{e:?}");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn encode(
    input: &Path,
    output: &Path,
    sentinel: bool,
    raw_output: Option<&Path>,
    coding: &CodingArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let tiles = read_dump_file(input)?;
    let levels = match tiles.first() {
        Some(tile) => tile
            .decomposition_levels()
            .ok_or("channels of the first tile disagree on the decomposition depth")?,
        None => 0,
    };
    let encoder = EbcotEncoder::new(coding.parameters(u8::try_from(levels)?))?;
    let image = encoder.encode(&tiles)?;

    let written = if sentinel {
        let values = image.to_sentinel_stream()?;
        sentinel_stream::write_file(output, &values)?;
        values.len() * 4
    } else {
        let bytes = image.to_codestream()?;
        fs::write(output, &bytes)?;
        bytes.len()
    };
    if let Some(raw_output) = raw_output {
        fs::write(raw_output, image.raw_stream())?;
    }

    println!(
        "✓ Encoded {} tiles ({} levels) to {:?}, {} bytes",
        image.tiles.len(),
        levels,
        output,
        written
    );
    Ok(())
}

fn decode(
    input: &Path,
    output: &Path,
    sentinel: bool,
    coding: &CodingArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let decoder = EbcotDecoder::new(coding.parameters(0))?;
    let tiles = if sentinel {
        decoder.decode_file(input)?
    } else {
        decoder.decode_codestream(&fs::read(input)?)?
    };
    write_dump_file(output, &tiles)?;
    println!("✓ Decoded {} tiles to {:?}", tiles.len(), output);
    Ok(())
}

fn show_info(
    input: &Path,
    sentinel: bool,
    coding: &CodingArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = if sentinel {
        let params = coding.parameters(0);
        params.validate()?;
        let values = sentinel_stream::read_file(input)?;
        EncodedImage::from_sentinel_stream(&values, params.code_block_size, params.bit_planes)?
    } else {
        EncodedImage::from_codestream(&fs::read(input)?)?
    };

    println!("File: {:?}", input);
    println!(
        "Format: {}",
        if sentinel {
            "Sentinel integer stream"
        } else {
            "Length-prefixed codestream"
        }
    );
    println!("  Block size: {0}x{0}", image.code_block_size);
    println!("  Bit-planes: {}", image.bit_planes);
    println!("  Levels:     {}", image.decomposition_levels);
    println!("  Channels:   {}", image.channel_count);
    println!("  Tiles:      {}", image.tiles.len());
    for (tile_index, tile) in image.tiles.iter().enumerate() {
        println!();
        println!("Tile {tile_index}:");
        for (band_index, band) in tile.bands.iter().enumerate() {
            println!(
                "  Band {:>3} {:?}: {}x{}, {} blocks, {} bytes",
                band_index,
                band.orientation,
                band.width,
                band.height,
                band.blocks.len(),
                band.coded_bytes()
            );
        }
    }
    Ok(())
}
