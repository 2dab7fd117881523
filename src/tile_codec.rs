use crate::pixel_encodings::BYTES_PER_PIXEL;
use crate::texture_utils::{BLOCK_BYTES, BLOCK_WIDTH};
use crate::TileCodecError;

type Result<T> = std::result::Result<T, TileCodecError>;

const RUN_MASK: u8 = 0x1F;
const MODE_MASK: u8 = 0xC0;
const FILL: u8 = 0x80;
const FILL_REPEAT: u8 = 0xC0;

// Longest run the encoder emits.
const MAX_RUN: usize = 0x1F;
// The encoder never lets a run cross one tile row.
const SUB_BLOCK_BYTES: usize = BLOCK_WIDTH * BYTES_PER_PIXEL;

/// Run-length codec for 30x24 RGB555 tile blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileCodec;

impl TileCodec {
    pub fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; BLOCK_BYTES];
        let mut p = 0;
        let mut j = 0;
        while j < bytes.len() {
            let opcode = bytes[j];
            let run = (opcode & RUN_MASK) as usize + 1;
            let span = run * BYTES_PER_PIXEL;
            if p + span > BLOCK_BYTES {
                return Err(TileCodecError::RunOverflow(j, p / BYTES_PER_PIXEL, run));
            }
            match opcode & MODE_MASK {
                FILL_REPEAT => {
                    let color = bytes
                        .get(j + 1..j + 3)
                        .ok_or(TileCodecError::TruncatedOperand(j))?;
                    for chunk in out[p..p + span].chunks_exact_mut(BYTES_PER_PIXEL) {
                        chunk.copy_from_slice(color);
                    }
                    j += 3;
                }
                FILL => {
                    let colors = bytes
                        .get(j + 1..j + 1 + span)
                        .ok_or(TileCodecError::TruncatedOperand(j))?;
                    out[p..p + span].copy_from_slice(colors);
                    j += 1 + span;
                }
                // Skip and the unused 00 marker both leave the slots untouched.
                _ => j += 1,
            }
            p += span;
        }
        Ok(out)
    }

    pub fn compress(&self, pixels: &[u8]) -> Result<Vec<u8>> {
        if pixels.len() != BLOCK_BYTES {
            return Err(TileCodecError::WrongPixelBufferSize(pixels.len(), BLOCK_BYTES));
        }
        let mut buf: Vec<u8> = Vec::new();
        for sub_block in pixels.chunks(SUB_BLOCK_BYTES) {
            compress_sub_block(sub_block, &mut buf);
        }
        Ok(buf)
    }
}

fn compress_sub_block(block: &[u8], buf: &mut Vec<u8>) {
    let pixels: Vec<&[u8]> = block.chunks_exact(BYTES_PER_PIXEL).collect();
    let mut i = 0;
    while i < pixels.len() {
        let mut repeat_count = 1;
        while i + repeat_count < pixels.len()
            && repeat_count < MAX_RUN
            && pixels[i] == pixels[i + repeat_count]
        {
            repeat_count += 1;
        }
        if repeat_count > 1 {
            buf.push(FILL_REPEAT | (repeat_count - 1) as u8);
            buf.extend_from_slice(pixels[i]);
            i += repeat_count;
            continue;
        }

        let mut fill_count = 1;
        while i + fill_count < pixels.len()
            && fill_count < MAX_RUN
            && pixels[i + fill_count - 1] != pixels[i + fill_count]
        {
            fill_count += 1;
        }
        // fill_count == 1 only happens on the last pixel of a sub-block.
        buf.push(FILL | (fill_count - 1) as u8);
        for pixel in &pixels[i..i + fill_count] {
            buf.extend_from_slice(pixel);
        }
        i += fill_count;
    }
}
