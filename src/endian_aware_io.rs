use std::{convert::TryFrom, io::{Cursor, Read}};

use crate::EndianCodecError;

type Result<T> = std::result::Result<T, EndianCodecError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

pub trait EndianAwareReader {
    fn read_u16(&mut self, endian: Endian) -> Result<u16>;

    fn read_i16(&mut self, endian: Endian) -> Result<i16>;

    fn read_u32(&mut self, endian: Endian) -> Result<u32>;
}

fn span(buffer_len: usize, offset: usize, width: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(width) {
        Some(end) if end <= buffer_len => Ok(offset..end),
        _ => Err(EndianCodecError::OutOfBounds(offset, width, buffer_len)),
    }
}

impl Endian {
    pub fn decode_u16(&self, bytes: &[u8]) -> Result<u16> {
        let arr = <[u8; 2]>::try_from(bytes).map_err(|_| EndianCodecError::ConversionError)?;
        Ok(match self {
            Endian::Little => u16::from_le_bytes(arr),
            Endian::Big => u16::from_be_bytes(arr),
        })
    }

    pub fn decode_u32(&self, bytes: &[u8]) -> Result<u32> {
        let arr = <[u8; 4]>::try_from(bytes).map_err(|_| EndianCodecError::ConversionError)?;
        Ok(match self {
            Endian::Little => u32::from_le_bytes(arr),
            Endian::Big => u32::from_be_bytes(arr),
        })
    }

    pub fn decode_i16(&self, bytes: &[u8]) -> Result<i16> {
        let arr = <[u8; 2]>::try_from(bytes).map_err(|_| EndianCodecError::ConversionError)?;
        Ok(match self {
            Endian::Little => i16::from_le_bytes(arr),
            Endian::Big => i16::from_be_bytes(arr),
        })
    }

    pub fn decode_i32(&self, bytes: &[u8]) -> Result<i32> {
        let arr = <[u8; 4]>::try_from(bytes).map_err(|_| EndianCodecError::ConversionError)?;
        Ok(match self {
            Endian::Little => i32::from_le_bytes(arr),
            Endian::Big => i32::from_be_bytes(arr),
        })
    }

    pub fn encode_u16(&self, value: u16) -> Vec<u8> {
        match self {
            Endian::Little => value.to_le_bytes().to_vec(),
            Endian::Big => value.to_be_bytes().to_vec(),
        }
    }

    pub fn encode_u32(&self, value: u32) -> Vec<u8> {
        match self {
            Endian::Little => value.to_le_bytes().to_vec(),
            Endian::Big => value.to_be_bytes().to_vec(),
        }
    }

    pub fn encode_i16(&self, value: i16) -> Vec<u8> {
        match self {
            Endian::Little => value.to_le_bytes().to_vec(),
            Endian::Big => value.to_be_bytes().to_vec(),
        }
    }

    pub fn encode_i32(&self, value: i32) -> Vec<u8> {
        match self {
            Endian::Little => value.to_le_bytes().to_vec(),
            Endian::Big => value.to_be_bytes().to_vec(),
        }
    }

    pub fn read_u16_at(&self, buffer: &[u8], offset: usize) -> Result<u16> {
        self.decode_u16(&buffer[span(buffer.len(), offset, 2)?])
    }

    pub fn read_i16_at(&self, buffer: &[u8], offset: usize) -> Result<i16> {
        self.decode_i16(&buffer[span(buffer.len(), offset, 2)?])
    }

    pub fn read_u32_at(&self, buffer: &[u8], offset: usize) -> Result<u32> {
        self.decode_u32(&buffer[span(buffer.len(), offset, 4)?])
    }

    pub fn read_i32_at(&self, buffer: &[u8], offset: usize) -> Result<i32> {
        self.decode_i32(&buffer[span(buffer.len(), offset, 4)?])
    }

    pub fn write_u16_at(&self, buffer: &mut [u8], offset: usize, value: u16) -> Result<()> {
        let range = span(buffer.len(), offset, 2)?;
        buffer[range].copy_from_slice(&self.encode_u16(value));
        Ok(())
    }

    pub fn write_u32_at(&self, buffer: &mut [u8], offset: usize, value: u32) -> Result<()> {
        let range = span(buffer.len(), offset, 4)?;
        buffer[range].copy_from_slice(&self.encode_u32(value));
        Ok(())
    }
}

impl EndianAwareReader for Cursor<&[u8]> {
    fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        endian.decode_u16(&buf)
    }

    fn read_i16(&mut self, endian: Endian) -> Result<i16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        endian.decode_i16(&buf)
    }

    fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        endian.decode_u32(&buf)
    }
}
