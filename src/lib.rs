mod bitmap;
mod compositor;
mod endian_aware_io;
mod errors;
mod highlight;
mod map_container;
mod pixel_encodings;
mod sprite_container;
mod texture_utils;
mod tile_codec;

pub mod audio;
pub mod wav;

#[cfg(test)]
mod utils;

pub use bitmap::{Alignment, Bitmap};
pub use compositor::{AlphaMode, FrameCompositor};
pub use endian_aware_io::{Endian, EndianAwareReader};
pub use highlight::{apply_highlight, EffectParameters, HighlightConfig};
pub use map_container::MapContainer;
pub use pixel_encodings::{decode_rgb555, decode_rgb555_pixel, encode_rgb555_pixel};
pub use sprite_container::{
    AudioClip, ChunkKind, FrameConstruct, FrameParameter, ParameterUnit, SpriteContainer,
    TileBlock, UnknownChunk,
};
pub use texture_utils::{tiled_coordinate, tiled_offset, BLOCK_HEIGHT, BLOCK_WIDTH};
pub use tile_codec::TileCodec;
pub use wav::WavFormat;

pub use errors::{AudioError, ConfigError, ContainerError, EndianCodecError, TileCodecError};
