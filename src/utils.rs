use crate::texture_utils::BLOCK_PIXELS;
use crate::{
    AudioClip, FrameConstruct, FrameParameter, ParameterUnit, SpriteContainer, TileBlock, TileCodec,
    UnknownChunk,
};

/// A compressed tile where every pixel is `color`.
pub fn solid_tile(color: u16) -> Vec<u8> {
    let pixels: Vec<u8> = (0..BLOCK_PIXELS).flat_map(|_| color.to_le_bytes()).collect();
    TileCodec.compress(&pixels).unwrap()
}

pub fn unit(construct_index: i16, x: i16, y: i16, alpha_mode: u8) -> ParameterUnit {
    ParameterUnit {
        construct_index,
        x,
        y,
        alpha_mode,
        ..Default::default()
    }
}

pub fn frame(audio_index: i16, units: Vec<ParameterUnit>) -> FrameParameter {
    FrameParameter {
        audio_index,
        reserved: [1, 2, 3, 4, 5, 6],
        units,
    }
}

pub fn mono_clip(sample_rate: u16, samples: &[i16]) -> AudioClip {
    let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    AudioClip {
        channels: 1,
        bits_per_sample: 16,
        sample_rate,
        data_length: payload.len() as u32,
        payload,
    }
}

/// Two frames, a 1x1 and a 2x1 construct sharing one solid tile, one clip
/// and two unknown items.
pub fn sample_container() -> SpriteContainer {
    SpriteContainer {
        frame_parameters: vec![
            frame(0, vec![unit(0, -4, 6, 0)]),
            frame(-1, vec![unit(1, 0, 0, 1), unit(-1, 5, 5, 0)]),
        ],
        frame_constructs: vec![
            FrameConstruct {
                cell_width: 1,
                cell_height: 1,
                tile_indices: vec![0],
            },
            FrameConstruct {
                cell_width: 2,
                cell_height: 1,
                tile_indices: vec![0, -1],
            },
        ],
        tile_blocks: vec![TileBlock {
            data: solid_tile(0x1234),
        }],
        audio_clips: vec![mono_clip(22050, &[0, 100, -100, 2000])],
        unknown_chunks: vec![UnknownChunk { data: [0xAB, 0xCD] }, UnknownChunk { data: [0, 1] }],
        ..Default::default()
    }
}
