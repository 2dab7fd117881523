use thiserror::Error;

#[derive(Error, Debug)]
pub enum EndianCodecError {
    #[error("Reading {1} bytes at '0x{0:x}' falls outside a buffer of size '0x{2:x}'.")]
    OutOfBounds(usize, usize, usize),

    #[error("Unable to convert bytes to an integer.")]
    ConversionError,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TileCodecError {
    #[error("Opcode at '0x{0:x}' writes {2} pixels from pixel {1}, past the end of the tile.")]
    RunOverflow(usize, usize, usize),

    #[error("Opcode at '0x{0:x}' is missing its color operand.")]
    TruncatedOperand(usize),

    #[error("Tile pixel buffer must be {1} bytes, got {0}.")]
    WrongPixelBufferSize(usize, usize),
}

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Bad magic: expected {0}.")]
    BadMagic(String),

    #[error("Invalid range '0x{0:x}'..'0x{1:x}' in buffer of size '0x{2:x}'.")]
    OutOfBoundsRange(usize, usize, usize),

    #[error("Reading {1} bytes at '0x{0:x}' overruns buffer of size '0x{2:x}'.")]
    Truncated(usize, usize, usize),

    #[error("Found a chunk descriptor after the five known chunk kinds.")]
    TooManyChunks,

    #[error("{0} index '{1}' is out of bounds for a table of size '{2}'.")]
    IndexOutOfBounds(&'static str, usize, usize),

    #[error("{0} count '{1}' exceeds the limit of {2}.")]
    SizeLimitExceeded(&'static str, usize, usize),

    #[error("Map size {0}x{1} is outside 1..={2}.")]
    InvalidMapSize(i32, i32, usize),

    #[error("Layout cannot be written: {0}.")]
    UnrepresentableLayout(String),

    #[error("Bitmap is {0}x{1} but the map needs {2}x{3}.")]
    BitmapSizeMismatch(usize, usize, usize, usize),

    #[error("{0}")]
    ParserError(String),

    #[error(transparent)]
    TileCodecError(#[from] TileCodecError),

    #[error(transparent)]
    EndianCodecError(#[from] EndianCodecError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Unsupported PCM bit depth '{0}'.")]
    UnsupportedBitDepth(u8),

    #[error("Clip index '{0}' is out of bounds for {1} clips.")]
    ClipIndexOutOfBounds(usize, usize),

    #[error("The container has no audio clips.")]
    NoClips,

    #[error("The container has no frames.")]
    NoFrames,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed effect parameters: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}
