use std::io::{Cursor, Read};
use std::path::Path;

use binread::{BinRead, BinReaderExt};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::texture_utils::{BLOCK_HEIGHT, BLOCK_WIDTH};
use crate::{ContainerError, Endian, TileCodec};

type Result<T> = std::result::Result<T, ContainerError>;

pub const SAF_MAGIC: &[u8] = b"SAF";
pub const DEFAULT_SAF_HEADER: [u8; HEADER_SIZE] = [
    0x53, 0x41, 0x46, 0x05, 0x02, 0x74, 0x00, 0x1E, 0x00, 0x18, 0x00, 0x00,
];

const HEADER_SIZE: usize = 12;
const DESCRIPTOR_SIZE: usize = 10;
// Chunk data always begins here when writing; the gap holds the descriptor records.
const DATA_START: usize = 0x74;
const OFFSET_ENTRY_SIZE: usize = 4;
const FRAME_PARAMETER_HEADER_SIZE: usize = 10;
const UNIT_RECORD_SIZE: usize = 13;
const CONSTRUCT_HEADER_SIZE: usize = 4;
const CLIP_HEADER_SIZE: usize = 8;
const UNKNOWN_ITEM_SIZE: usize = 2;

pub const MAX_UNITS_PER_FRAME: usize = 10_000;
/// Per side, in 30x24 cells.
pub const MAX_CONSTRUCT_CELLS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ChunkKind {
    #[strum(serialize = "frame-parameters")]
    FrameParameters,
    #[strum(serialize = "frame-constructs")]
    FrameConstructs,
    #[strum(serialize = "tile-data")]
    TileData,
    #[strum(serialize = "audio-clips")]
    AudioClips,
    #[strum(serialize = "unknown")]
    Unknown,
}

#[derive(BinRead, Debug, Clone, Copy)]
struct ChunkDescriptor {
    item_count: u16,
    start: u32,
    length: u32,
}

#[derive(BinRead, Debug, Clone, Copy)]
struct ClipHeader {
    channels: u8,
    bits_per_sample: u8,
    sample_rate: u16,
    data_length: u32,
}

/// One placement of a frame construct inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterUnit {
    pub construct_index: i16,
    pub x: i16,
    pub y: i16,
    pub alpha_mode: u8,
    pub red: i16,
    pub green: i16,
    pub blue: i16,
}

impl ParameterUnit {
    /// The construct this unit draws, or `None` when the unit is disabled.
    pub fn construct(&self) -> Option<usize> {
        usize::try_from(self.construct_index).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameParameter {
    pub audio_index: i16,
    pub reserved: [u8; 6],
    /// Back to front.
    pub units: Vec<ParameterUnit>,
}

impl FrameParameter {
    /// The referenced clip index. Out of range values are not filtered here.
    pub fn audio_clip(&self) -> Option<usize> {
        usize::try_from(self.audio_index).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameConstruct {
    pub cell_width: u16,
    pub cell_height: u16,
    /// Row-major, block-major. Negative entries are blank slots.
    pub tile_indices: Vec<i16>,
}

impl FrameConstruct {
    pub fn width(&self) -> usize {
        self.cell_width as usize * BLOCK_WIDTH
    }

    pub fn height(&self) -> usize {
        self.cell_height as usize * BLOCK_HEIGHT
    }

    pub fn tiles(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.tile_indices.iter().map(|i| usize::try_from(*i).ok())
    }

    /// Non-zero area and at least one non-blank slot.
    pub fn is_drawable(&self) -> bool {
        self.width() > 0 && self.height() > 0 && self.tiles().any(|t| t.is_some())
    }
}

/// A compressed 30x24 tile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileBlock {
    pub data: Vec<u8>,
}

impl TileBlock {
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(TileCodec.decompress(&self.data)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioClip {
    pub channels: u8,
    pub bits_per_sample: u8,
    pub sample_rate: u16,
    pub data_length: u32,
    /// Everything after the clip header, including any bytes past `data_length`.
    pub payload: Vec<u8>,
}

impl AudioClip {
    /// The PCM bytes the clip declares.
    pub fn pcm(&self) -> &[u8] {
        let end = (self.data_length as usize).min(self.payload.len());
        &self.payload[..end]
    }

    pub fn duration_secs(&self) -> f64 {
        let bytes_per_frame = self.channels as usize * self.bits_per_sample as usize / 8;
        if bytes_per_frame == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        let frames = self.data_length as usize / bytes_per_frame;
        frames as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnknownChunk {
    pub data: [u8; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteContainer {
    pub header: [u8; HEADER_SIZE],
    pub frame_parameters: Vec<FrameParameter>,
    pub frame_constructs: Vec<FrameConstruct>,
    pub tile_blocks: Vec<TileBlock>,
    pub audio_clips: Vec<AudioClip>,
    pub unknown_chunks: Vec<UnknownChunk>,
}

impl Default for SpriteContainer {
    fn default() -> Self {
        SpriteContainer {
            header: DEFAULT_SAF_HEADER,
            frame_parameters: Vec::new(),
            frame_constructs: Vec::new(),
            tile_blocks: Vec::new(),
            audio_clips: Vec::new(),
            unknown_chunks: Vec::new(),
        }
    }
}

impl SpriteContainer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        debug!("Read {} bytes from {}", raw.len(), path.as_ref().display());
        Self::from_bytes(&raw)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let raw = self.serialize()?;
        std::fs::write(path.as_ref(), &raw)?;
        debug!("Wrote {} bytes to {}", raw.len(), path.as_ref().display());
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.frame_parameters.len()
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE || &raw[0..3] != SAF_MAGIC {
            return Err(ContainerError::BadMagic("SAF".to_string()));
        }
        let mut container = SpriteContainer::default();
        container.header.copy_from_slice(&raw[0..HEADER_SIZE]);

        let mut kinds = ChunkKind::iter();
        let mut p = HEADER_SIZE;
        while p + 2 <= raw.len() {
            let item_count = Endian::Little.read_u16_at(raw, p)?;
            if item_count == 0 {
                break;
            }
            let kind = kinds.next().ok_or(ContainerError::TooManyChunks)?;
            if p + DESCRIPTOR_SIZE > raw.len() {
                return Err(ContainerError::Truncated(p, DESCRIPTOR_SIZE, raw.len()));
            }
            let mut cursor = Cursor::new(&raw[p..p + DESCRIPTOR_SIZE]);
            let descriptor: ChunkDescriptor = cursor
                .read_le()
                .map_err(|e| ContainerError::ParserError(format!("{:?}", e)))?;
            debug!(
                "Chunk {} has {} items at 0x{:x} (length 0x{:x})",
                kind, descriptor.item_count, descriptor.start, descriptor.length
            );
            container.read_chunk(raw, kind, &descriptor)?;
            p += DESCRIPTOR_SIZE;
        }

        container.validate()?;
        Ok(container)
    }

    fn read_chunk(
        &mut self,
        raw: &[u8],
        kind: ChunkKind,
        descriptor: &ChunkDescriptor,
    ) -> Result<()> {
        let start = descriptor.start as usize;
        let count = descriptor.item_count as usize;
        if kind == ChunkKind::Unknown {
            let span = count * UNKNOWN_ITEM_SIZE;
            if start + span > raw.len() {
                return Err(ContainerError::Truncated(start, span, raw.len()));
            }
            for item in raw[start..start + span].chunks_exact(UNKNOWN_ITEM_SIZE) {
                self.unknown_chunks.push(UnknownChunk {
                    data: [item[0], item[1]],
                });
            }
            return Ok(());
        }

        let chunk_end = start + descriptor.length as usize;
        for j in 0..count {
            let entry = start + j * OFFSET_ENTRY_SIZE;
            let item_start = read_offset(raw, entry)?;
            let item_end = if j + 1 < count {
                read_offset(raw, entry + OFFSET_ENTRY_SIZE)?
            } else {
                chunk_end
            };
            if item_start >= item_end || item_end > raw.len() {
                return Err(ContainerError::OutOfBoundsRange(item_start, item_end, raw.len()));
            }
            let item = &raw[item_start..item_end];
            match kind {
                ChunkKind::FrameParameters => {
                    self.frame_parameters.push(parse_frame_parameter(item)?)
                }
                ChunkKind::FrameConstructs => {
                    self.frame_constructs.push(parse_frame_construct(item)?)
                }
                ChunkKind::TileData => self.tile_blocks.push(TileBlock {
                    data: item.to_vec(),
                }),
                ChunkKind::AudioClips => self.audio_clips.push(parse_audio_clip(item)?),
                ChunkKind::Unknown => unreachable!(),
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for construct in &self.frame_constructs {
            for tile in construct.tiles().flatten() {
                if tile >= self.tile_blocks.len() {
                    return Err(ContainerError::IndexOutOfBounds(
                        "Tile",
                        tile,
                        self.tile_blocks.len(),
                    ));
                }
            }
        }
        for frame in &self.frame_parameters {
            for construct in frame.units.iter().filter_map(|u| u.construct()) {
                if construct >= self.frame_constructs.len() {
                    return Err(ContainerError::IndexOutOfBounds(
                        "Construct",
                        construct,
                        self.frame_constructs.len(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = self.header.to_vec();
        out.resize(DATA_START, 0);

        let mut descriptors: Vec<(u16, u32, u32)> = Vec::new();
        let mut empty_kind: Option<ChunkKind> = None;
        for kind in ChunkKind::iter() {
            let items = self.chunk_items(kind)?;
            if items.is_empty() {
                empty_kind.get_or_insert(kind);
                continue;
            }
            if let Some(empty) = empty_kind {
                return Err(ContainerError::UnrepresentableLayout(format!(
                    "chunk '{}' has items but '{}' before it is empty",
                    kind, empty
                )));
            }
            if items.len() > u16::MAX as usize {
                return Err(ContainerError::SizeLimitExceeded(
                    "Chunk item",
                    items.len(),
                    u16::MAX as usize,
                ));
            }

            let start = out.len();
            if kind == ChunkKind::Unknown {
                for item in &items {
                    out.extend_from_slice(item);
                }
            } else {
                let mut next = start + items.len() * OFFSET_ENTRY_SIZE;
                for (j, item) in items.iter().enumerate() {
                    if item.is_empty() {
                        return Err(ContainerError::UnrepresentableLayout(format!(
                            "item {} of chunk '{}' is empty",
                            j, kind
                        )));
                    }
                    out.write_u32::<LittleEndian>(next as u32)?;
                    next += item.len();
                }
                for item in &items {
                    out.extend_from_slice(item);
                }
            }
            descriptors.push((items.len() as u16, start as u32, (out.len() - start) as u32));
        }

        let mut table: Vec<u8> = Vec::new();
        for (count, start, length) in descriptors {
            table.write_u16::<LittleEndian>(count)?;
            table.write_u32::<LittleEndian>(start)?;
            table.write_u32::<LittleEndian>(length)?;
        }
        out[HEADER_SIZE..HEADER_SIZE + table.len()].copy_from_slice(&table);
        Ok(out)
    }

    fn chunk_items(&self, kind: ChunkKind) -> Result<Vec<Vec<u8>>> {
        match kind {
            ChunkKind::FrameParameters => {
                self.frame_parameters.iter().map(write_frame_parameter).collect()
            }
            ChunkKind::FrameConstructs => {
                self.frame_constructs.iter().map(write_frame_construct).collect()
            }
            ChunkKind::TileData => Ok(self.tile_blocks.iter().map(|t| t.data.clone()).collect()),
            ChunkKind::AudioClips => self.audio_clips.iter().map(write_audio_clip).collect(),
            ChunkKind::Unknown => Ok(self.unknown_chunks.iter().map(|u| u.data.to_vec()).collect()),
        }
    }
}

fn read_offset(raw: &[u8], entry: usize) -> Result<usize> {
    if entry + OFFSET_ENTRY_SIZE > raw.len() {
        return Err(ContainerError::Truncated(entry, OFFSET_ENTRY_SIZE, raw.len()));
    }
    Ok(Endian::Little.read_u32_at(raw, entry)? as usize)
}

fn parse_frame_parameter(item: &[u8]) -> Result<FrameParameter> {
    if item.len() < FRAME_PARAMETER_HEADER_SIZE {
        return Err(ContainerError::Truncated(0, FRAME_PARAMETER_HEADER_SIZE, item.len()));
    }
    let mut cursor = Cursor::new(item);
    let audio_index = cursor.read_i16::<LittleEndian>()?;
    let mut reserved = [0u8; 6];
    cursor.read_exact(&mut reserved)?;
    let unit_count = cursor.read_u16::<LittleEndian>()? as usize;
    if unit_count > MAX_UNITS_PER_FRAME {
        return Err(ContainerError::SizeLimitExceeded(
            "Parameter unit",
            unit_count,
            MAX_UNITS_PER_FRAME,
        ));
    }
    let needed = unit_count * UNIT_RECORD_SIZE;
    if FRAME_PARAMETER_HEADER_SIZE + needed > item.len() {
        return Err(ContainerError::Truncated(FRAME_PARAMETER_HEADER_SIZE, needed, item.len()));
    }

    let mut units = Vec::with_capacity(unit_count);
    for _ in 0..unit_count {
        units.push(ParameterUnit {
            construct_index: cursor.read_i16::<LittleEndian>()?,
            x: cursor.read_i16::<LittleEndian>()?,
            y: cursor.read_i16::<LittleEndian>()?,
            alpha_mode: cursor.read_u8()?,
            red: cursor.read_i16::<LittleEndian>()?,
            green: cursor.read_i16::<LittleEndian>()?,
            blue: cursor.read_i16::<LittleEndian>()?,
        });
    }
    Ok(FrameParameter {
        audio_index,
        reserved,
        units,
    })
}

fn write_frame_parameter(frame: &FrameParameter) -> Result<Vec<u8>> {
    if frame.units.len() > MAX_UNITS_PER_FRAME {
        return Err(ContainerError::SizeLimitExceeded(
            "Parameter unit",
            frame.units.len(),
            MAX_UNITS_PER_FRAME,
        ));
    }
    let capacity = FRAME_PARAMETER_HEADER_SIZE + frame.units.len() * UNIT_RECORD_SIZE;
    let mut out = Vec::with_capacity(capacity);
    out.write_i16::<LittleEndian>(frame.audio_index)?;
    out.extend_from_slice(&frame.reserved);
    out.write_u16::<LittleEndian>(frame.units.len() as u16)?;
    for unit in &frame.units {
        out.write_i16::<LittleEndian>(unit.construct_index)?;
        out.write_i16::<LittleEndian>(unit.x)?;
        out.write_i16::<LittleEndian>(unit.y)?;
        out.write_u8(unit.alpha_mode)?;
        out.write_i16::<LittleEndian>(unit.red)?;
        out.write_i16::<LittleEndian>(unit.green)?;
        out.write_i16::<LittleEndian>(unit.blue)?;
    }
    Ok(out)
}

fn parse_frame_construct(item: &[u8]) -> Result<FrameConstruct> {
    if item.len() < CONSTRUCT_HEADER_SIZE {
        return Err(ContainerError::Truncated(0, CONSTRUCT_HEADER_SIZE, item.len()));
    }
    let mut cursor = Cursor::new(item);
    let cell_width = cursor.read_u16::<LittleEndian>()?;
    let cell_height = cursor.read_u16::<LittleEndian>()?;
    check_construct_cells(cell_width, cell_height)?;
    let mut tile_indices = Vec::with_capacity((item.len() - CONSTRUCT_HEADER_SIZE) / 2);
    for raw in item[CONSTRUCT_HEADER_SIZE..].chunks_exact(2) {
        tile_indices.push(Endian::Little.decode_i16(raw)?);
    }
    Ok(FrameConstruct {
        cell_width,
        cell_height,
        tile_indices,
    })
}

fn check_construct_cells(cell_width: u16, cell_height: u16) -> Result<()> {
    let cells = cell_width.max(cell_height) as usize;
    if cells > MAX_CONSTRUCT_CELLS {
        return Err(ContainerError::SizeLimitExceeded(
            "Construct cell",
            cells,
            MAX_CONSTRUCT_CELLS,
        ));
    }
    Ok(())
}

fn write_frame_construct(construct: &FrameConstruct) -> Result<Vec<u8>> {
    check_construct_cells(construct.cell_width, construct.cell_height)?;
    let mut out = Vec::with_capacity(CONSTRUCT_HEADER_SIZE + construct.tile_indices.len() * 2);
    out.write_u16::<LittleEndian>(construct.cell_width)?;
    out.write_u16::<LittleEndian>(construct.cell_height)?;
    for index in &construct.tile_indices {
        out.write_i16::<LittleEndian>(*index)?;
    }
    Ok(out)
}

fn parse_audio_clip(item: &[u8]) -> Result<AudioClip> {
    if item.len() < CLIP_HEADER_SIZE {
        return Err(ContainerError::Truncated(0, CLIP_HEADER_SIZE, item.len()));
    }
    let mut cursor = Cursor::new(item);
    let header: ClipHeader = cursor
        .read_be()
        .map_err(|e| ContainerError::ParserError(format!("{:?}", e)))?;
    let payload = item[CLIP_HEADER_SIZE..].to_vec();
    if header.data_length as usize > payload.len() {
        return Err(ContainerError::Truncated(
            CLIP_HEADER_SIZE,
            header.data_length as usize,
            item.len(),
        ));
    }
    Ok(AudioClip {
        channels: header.channels,
        bits_per_sample: header.bits_per_sample,
        sample_rate: header.sample_rate,
        data_length: header.data_length,
        payload,
    })
}

fn write_audio_clip(clip: &AudioClip) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(CLIP_HEADER_SIZE + clip.payload.len());
    out.write_u8(clip.channels)?;
    out.write_u8(clip.bits_per_sample)?;
    out.write_u16::<BigEndian>(clip.sample_rate)?;
    out.write_u32::<BigEndian>(clip.data_length)?;
    out.extend_from_slice(&clip.payload);
    Ok(out)
}
