use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::AudioError;

type Result<T> = std::result::Result<T, AudioError>;

pub const WAV_HEADER_SIZE: usize = 44;
// The legacy writer copied this byte rate from its template and never updated it.
const TEMPLATE_BYTE_RATE: u32 = 44_100;
const FMT_CHUNK_SIZE: u32 = 16;
const PCM_FORMAT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u8,
    pub bits_per_sample: u8,
    pub sample_rate: u16,
}

impl WavFormat {
    pub fn block_align(&self) -> u16 {
        (self.bits_per_sample as u16 / 8) * self.channels as u16
    }
}

/// Writes the 44 byte header the legacy tool emits. The sample rate (at 0x18) and
/// data length (at 0x28) are big endian, unlike the rest of the header.
pub fn write_header(format: &WavFormat, data_length: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(WAV_HEADER_SIZE);
    out.extend_from_slice(b"RIFF");
    out.write_u32::<LittleEndian>(data_length.wrapping_add(WAV_HEADER_SIZE as u32 - 8))?;
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.write_u32::<LittleEndian>(FMT_CHUNK_SIZE)?;
    out.write_u16::<LittleEndian>(PCM_FORMAT)?;
    out.write_u16::<LittleEndian>(format.channels as u16)?;
    out.write_u16::<BigEndian>(format.sample_rate)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(TEMPLATE_BYTE_RATE)?;
    out.write_u16::<LittleEndian>(format.block_align())?;
    out.write_u16::<LittleEndian>(format.bits_per_sample as u16)?;
    out.extend_from_slice(b"data");
    out.write_u32::<BigEndian>(data_length)?;
    Ok(out)
}

pub fn write_wav(format: &WavFormat, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = write_header(format, data.len() as u32)?;
    out.extend_from_slice(data);
    Ok(out)
}
