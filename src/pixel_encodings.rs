use crate::{Endian, EndianCodecError};

type Result<T> = std::result::Result<T, EndianCodecError>;

pub const BYTES_PER_PIXEL: usize = 2;

/// Expands a 15-bit `0RRRRRGGGGGBBBBB` color to 8-bit channels by shifting.
pub fn decode_rgb555_pixel(value: u16) -> [u8; 3] {
    let r = (value & 0x7C00) >> 7;
    let g = (value & 0x03E0) >> 2;
    let b = (value & 0x001F) << 3;
    [r as u8, g as u8, b as u8]
}

pub fn encode_rgb555_pixel(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 7) | ((g as u16 & 0xF8) << 2) | ((b as u16 & 0xF8) >> 3)
}

/// Decodes little endian RGB555 pixel data into RGBA with the given alpha.
pub fn decode_rgb555(pixel_data: &[u8], alpha: u8) -> Result<Vec<u8>> {
    if pixel_data.len() % BYTES_PER_PIXEL != 0 {
        return Err(EndianCodecError::ConversionError);
    }
    let mut decoded: Vec<u8> = Vec::with_capacity(pixel_data.len() * 2);
    for raw in pixel_data.chunks_exact(BYTES_PER_PIXEL) {
        let value = Endian::Little.decode_u16(raw)?;
        decoded.extend_from_slice(&decode_rgb555_pixel(value));
        decoded.push(alpha);
    }
    Ok(decoded)
}
