use crate::pixel_encodings::{decode_rgb555, BYTES_PER_PIXEL};
use crate::EndianCodecError;

type Result<T> = std::result::Result<T, EndianCodecError>;

pub const BLOCK_WIDTH: usize = 30;
pub const BLOCK_HEIGHT: usize = 24;
pub const BLOCK_PIXELS: usize = BLOCK_WIDTH * BLOCK_HEIGHT;
pub const BLOCK_BYTES: usize = BLOCK_PIXELS * BYTES_PER_PIXEL;

// Decoded tiles are stored block after block, each block row-major.
// A canvas places those blocks left to right, then top to bottom.
pub fn tiled_coordinate(offset: usize, x_limit: usize, y_limit: usize) -> Option<(usize, usize)> {
    let blocks_in_row = x_limit / BLOCK_WIDTH;
    if blocks_in_row == 0 {
        return None;
    }
    let point = offset / BYTES_PER_PIXEL;
    let line = point / BLOCK_WIDTH;
    let block = line / BLOCK_HEIGHT;
    let x = point % BLOCK_WIDTH + (block % blocks_in_row) * BLOCK_WIDTH;
    let y = line % BLOCK_HEIGHT + (block / blocks_in_row) * BLOCK_HEIGHT;
    if x < x_limit && y < y_limit {
        Some((x, y))
    } else {
        None
    }
}

pub fn tiled_offset(x: usize, y: usize, x_limit: usize) -> usize {
    let blocks_in_row = (x_limit / BLOCK_WIDTH).max(1);
    let block = (y / BLOCK_HEIGHT) * blocks_in_row + x / BLOCK_WIDTH;
    let line = block * BLOCK_HEIGHT + y % BLOCK_HEIGHT;
    (line * BLOCK_WIDTH + x % BLOCK_WIDTH) * BYTES_PER_PIXEL
}

/// Rearranges concatenated RGB555 tile data into a sequential RGBA canvas.
/// Pixels that map outside the canvas are dropped; uncovered pixels stay transparent.
pub fn block_to_sequential(
    draw_data: &[u8],
    texture_width: usize,
    texture_height: usize,
    alpha: u8,
) -> Result<Vec<u8>> {
    let decoded = decode_rgb555(draw_data, alpha)?;
    let mut sequential: Vec<u8> = vec![0; texture_width * texture_height * 4];
    for (index, rgba) in decoded.chunks_exact(4).enumerate() {
        let offset = index * BYTES_PER_PIXEL;
        if let Some((x, y)) = tiled_coordinate(offset, texture_width, texture_height) {
            let index_in_output = (y * texture_width + x) * 4;
            sequential[index_in_output..index_in_output + 4].copy_from_slice(rgba);
        }
    }
    Ok(sequential)
}
