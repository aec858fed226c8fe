pub mod coding_parameters;
pub mod constants;
pub mod error;
pub mod jpeg2000;
pub mod marker_code;
pub mod stream_reader;
pub mod stream_writer;

pub use coding_parameters::{CodingParameters, ParallelPolicy};
pub use error::{EbcotError, Location};
pub use jpeg2000::decoder::EbcotDecoder;
pub use jpeg2000::encoder::EbcotEncoder;
pub use jpeg2000::image::{
    ChannelCoefficients, DetailLevel, EncodedBand, EncodedBlock, EncodedImage, EncodedTile,
    Subband, SubbandOrientation, TileCoefficients,
};
