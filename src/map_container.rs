use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::endian_aware_io::EndianAwareReader;
use crate::pixel_encodings::encode_rgb555_pixel;
use crate::texture_utils::{block_to_sequential, BLOCK_HEIGHT, BLOCK_PIXELS, BLOCK_WIDTH};
use crate::{Bitmap, ContainerError, Endian, TileBlock, TileCodec};

type Result<T> = std::result::Result<T, ContainerError>;

const PRIMARY_HEADER_SIZE: usize = 0x0F;
const INDEX_HEADER_SIZE: usize = 0x0B;
const UNIT_COUNT_OFFSET: usize = 0x0B;
const MAP_SIZE_OFFSET: usize = 7;

pub const CEL_MAGIC: &[u8] = b"CEL";
pub const MPL_MAGIC: &[u8] = b"MPL";
pub const DEFAULT_CEL_HEADER: [u8; PRIMARY_HEADER_SIZE] = [
    0x43, 0x45, 0x4C, 0xD0, 0x07, 0x0F, 0x00, 0x1E, 0x00, 0x18, 0x00, 0x00, 0x00, 0x10, 0x00,
];
pub const DEFAULT_MPL_HEADER: [u8; INDEX_HEADER_SIZE] =
    [0x4D, 0x50, 0x4C, 0xD0, 0x07, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00];

pub const MAX_MAP_UNITS: usize = 10_000;
pub const MAX_MAP_SIDE: usize = 1_000;

/// A tile map stored as a primary unit file plus an index file naming one unit per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapContainer {
    pub primary_header: [u8; PRIMARY_HEADER_SIZE],
    pub index_header: [u8; INDEX_HEADER_SIZE],
    /// Grid size in cells.
    pub width: usize,
    pub height: usize,
    pub units: Vec<TileBlock>,
    /// Row-major, one entry per cell.
    pub unit_indices: Vec<i16>,
    /// Byte order of the map size fields in the index file.
    pub size_endian: Endian,
}

impl MapContainer {
    /// Opens a primary file and the `.mpl` file sharing its base name.
    pub fn open<P: AsRef<Path>>(path: P, size_endian: Endian) -> Result<Self> {
        let path = path.as_ref();
        let index_path = index_path_for(path);
        let primary = std::fs::read(path)?;
        let index = std::fs::read(&index_path)?;
        debug!(
            "Read map {} ({} bytes) with index {} ({} bytes)",
            path.display(),
            primary.len(),
            index_path.display(),
            index.len()
        );
        Self::from_bytes(&primary, &index, size_endian)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let (primary, index) = self.serialize()?;
        std::fs::write(path, primary)?;
        std::fs::write(path.with_extension("mpl"), index)?;
        Ok(())
    }

    pub fn from_bytes(primary: &[u8], index: &[u8], size_endian: Endian) -> Result<Self> {
        if index.len() < INDEX_HEADER_SIZE || &index[0..3] != MPL_MAGIC {
            return Err(ContainerError::BadMagic("MPL".to_string()));
        }
        if primary.len() < PRIMARY_HEADER_SIZE || &primary[0..3] != CEL_MAGIC {
            return Err(ContainerError::BadMagic("CEL".to_string()));
        }

        let mut cursor = Cursor::new(index);
        cursor.set_position(MAP_SIZE_OFFSET as u64);
        let width = cursor.read_i16(size_endian)? as i32;
        let height = cursor.read_i16(size_endian)? as i32;
        let (width, height) = validate_map_size(width, height)?;
        let cells = width * height;
        let needed = cells * 2;
        if INDEX_HEADER_SIZE + needed > index.len() {
            return Err(ContainerError::Truncated(INDEX_HEADER_SIZE, needed, index.len()));
        }
        let mut unit_indices = Vec::with_capacity(cells);
        for raw in index[INDEX_HEADER_SIZE..INDEX_HEADER_SIZE + needed].chunks_exact(2) {
            unit_indices.push(Endian::Little.decode_i16(raw)?);
        }

        let unit_count = Endian::Little.read_u16_at(primary, UNIT_COUNT_OFFSET)? as usize;
        if unit_count == 0 || unit_count > MAX_MAP_UNITS {
            return Err(ContainerError::SizeLimitExceeded("Map unit", unit_count, MAX_MAP_UNITS));
        }
        let table_end = PRIMARY_HEADER_SIZE + unit_count * 4;
        if table_end > primary.len() {
            return Err(ContainerError::Truncated(
                PRIMARY_HEADER_SIZE,
                unit_count * 4,
                primary.len(),
            ));
        }
        let mut units = Vec::with_capacity(unit_count);
        for i in 0..unit_count {
            let entry = PRIMARY_HEADER_SIZE + i * 4;
            let start = Endian::Little.read_u32_at(primary, entry)? as usize;
            let end = if i + 1 < unit_count {
                Endian::Little.read_u32_at(primary, entry + 4)? as usize
            } else {
                primary.len()
            };
            if start >= end || end > primary.len() {
                return Err(ContainerError::OutOfBoundsRange(start, end, primary.len()));
            }
            units.push(TileBlock {
                data: primary[start..end].to_vec(),
            });
        }

        for index in &unit_indices {
            match usize::try_from(*index) {
                Ok(i) if i < units.len() => {}
                _ => {
                    return Err(ContainerError::IndexOutOfBounds(
                        "Map unit",
                        *index as u16 as usize,
                        units.len(),
                    ))
                }
            }
        }
        debug!("Map is {}x{} cells with {} units", width, height, unit_count);

        let mut primary_header = [0u8; PRIMARY_HEADER_SIZE];
        primary_header.copy_from_slice(&primary[0..PRIMARY_HEADER_SIZE]);
        let mut index_header = [0u8; INDEX_HEADER_SIZE];
        index_header.copy_from_slice(&index[0..INDEX_HEADER_SIZE]);
        Ok(MapContainer {
            primary_header,
            index_header,
            width,
            height,
            units,
            unit_indices,
            size_endian,
        })
    }

    /// Re-encodes a bitmap as one unit per cell with an identity index table.
    pub fn from_bitmap(bitmap: &Bitmap, width: usize, height: usize) -> Result<Self> {
        let (width, height) = validate_map_size(width as i32, height as i32)?;
        let (pixel_width, pixel_height) = (width * BLOCK_WIDTH, height * BLOCK_HEIGHT);
        if bitmap.width != pixel_width || bitmap.height != pixel_height {
            return Err(ContainerError::BitmapSizeMismatch(
                bitmap.width,
                bitmap.height,
                pixel_width,
                pixel_height,
            ));
        }
        let cells = width * height;
        if cells > MAX_MAP_UNITS {
            return Err(ContainerError::SizeLimitExceeded("Map unit", cells, MAX_MAP_UNITS));
        }

        let mut units = Vec::with_capacity(cells);
        for cell in 0..cells {
            let origin_x = (cell % width) * BLOCK_WIDTH;
            let origin_y = (cell / width) * BLOCK_HEIGHT;
            let mut pixels: Vec<u8> = Vec::with_capacity(BLOCK_PIXELS * 2);
            for y in origin_y..origin_y + BLOCK_HEIGHT {
                for x in origin_x..origin_x + BLOCK_WIDTH {
                    let [r, g, b, _] = bitmap.pixel(x, y).unwrap_or_default();
                    pixels.write_u16::<LittleEndian>(encode_rgb555_pixel(r, g, b))?;
                }
            }
            units.push(TileBlock {
                data: TileCodec.compress(&pixels)?,
            });
        }
        Ok(MapContainer {
            primary_header: DEFAULT_CEL_HEADER,
            index_header: DEFAULT_MPL_HEADER,
            width,
            height,
            units,
            unit_indices: (0..cells).map(|i| i as i16).collect(),
            size_endian: Endian::default(),
        })
    }

    /// Decodes every cell into one opaque bitmap of `width*30` by `height*24` pixels.
    pub fn render(&self) -> Result<Bitmap> {
        let mut draw_data: Vec<u8> = Vec::with_capacity(self.unit_indices.len() * BLOCK_PIXELS * 2);
        for index in &self.unit_indices {
            let unit = usize::try_from(*index)
                .ok()
                .and_then(|i| self.units.get(i))
                .ok_or(ContainerError::IndexOutOfBounds(
                    "Map unit",
                    *index as u16 as usize,
                    self.units.len(),
                ))?;
            draw_data.extend(unit.decode()?);
        }
        let (width, height) = (self.width * BLOCK_WIDTH, self.height * BLOCK_HEIGHT);
        Ok(Bitmap {
            width,
            height,
            pixel_data: block_to_sequential(&draw_data, width, height, 0xFF)?,
        })
    }

    /// Returns the primary and index file contents.
    pub fn serialize(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        if self.units.is_empty() || self.units.len() > MAX_MAP_UNITS {
            return Err(ContainerError::SizeLimitExceeded(
                "Map unit",
                self.units.len(),
                MAX_MAP_UNITS,
            ));
        }
        let mut primary = self.primary_header.to_vec();
        Endian::Little.write_u16_at(&mut primary, UNIT_COUNT_OFFSET, self.units.len() as u16)?;
        let mut next = PRIMARY_HEADER_SIZE + self.units.len() * 4;
        for unit in &self.units {
            primary.write_u32::<LittleEndian>(next as u32)?;
            next += unit.data.len();
        }
        for unit in &self.units {
            primary.extend_from_slice(&unit.data);
        }

        let (width, height) = validate_map_size(self.width as i32, self.height as i32)?;
        let mut index = self.index_header.to_vec();
        index[MAP_SIZE_OFFSET..MAP_SIZE_OFFSET + 2]
            .copy_from_slice(&self.size_endian.encode_u16(width as u16));
        index[MAP_SIZE_OFFSET + 2..MAP_SIZE_OFFSET + 4]
            .copy_from_slice(&self.size_endian.encode_u16(height as u16));
        for unit_index in &self.unit_indices {
            index.write_i16::<LittleEndian>(*unit_index)?;
        }
        Ok((primary, index))
    }
}

fn validate_map_size(width: i32, height: i32) -> Result<(usize, usize)> {
    let range = 1..=MAX_MAP_SIDE as i32;
    if !range.contains(&width) || !range.contains(&height) {
        return Err(ContainerError::InvalidMapSize(width, height, MAX_MAP_SIDE));
    }
    Ok((width as usize, height as usize))
}

fn index_path_for(path: &Path) -> PathBuf {
    let lower = path.with_extension("mpl");
    if lower.exists() {
        return lower;
    }
    let upper = path.with_extension("MPL");
    if upper.exists() {
        upper
    } else {
        lower
    }
}
