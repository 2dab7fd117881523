use log::debug;
use rustc_hash::FxHashMap;

use crate::highlight::apply_highlight;
use crate::texture_utils::{block_to_sequential, BLOCK_BYTES};
use crate::{Bitmap, ContainerError, EffectParameters, FrameConstruct, SpriteContainer};

type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Uniform,
    Highlight,
    WhiteKey,
    Other(u8),
}

impl From<u8> for AlphaMode {
    fn from(value: u8) -> Self {
        match value {
            0 => AlphaMode::Opaque,
            1 => AlphaMode::Uniform,
            2 => AlphaMode::Highlight,
            7 => AlphaMode::WhiteKey,
            other => AlphaMode::Other(other),
        }
    }
}

/// Decoded tiles keyed by tile index, shared across the units of one frame.
type TileCache = FxHashMap<usize, Vec<u8>>;

/// Turns frames of a sprite container into RGBA bitmaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCompositor {
    pub effects: EffectParameters,
}

impl FrameCompositor {
    pub fn new(effects: EffectParameters) -> Self {
        FrameCompositor { effects }
    }

    /// Renders one construct with pure black keyed out.
    /// Blank slots are skipped, so the tiles after them move up one block.
    /// Returns `None` when the construct has no area or only blank slots.
    pub fn render_construct(
        &self,
        container: &SpriteContainer,
        index: usize,
    ) -> Result<Option<Bitmap>> {
        let mut cache = TileCache::default();
        self.render_construct_cached(container, index, &mut cache)
    }

    fn render_construct_cached(
        &self,
        container: &SpriteContainer,
        index: usize,
        cache: &mut TileCache,
    ) -> Result<Option<Bitmap>> {
        let construct = construct_at(container, index)?;
        let (width, height) = (construct.width(), construct.height());
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let mut draw_data: Vec<u8> = Vec::with_capacity(construct.tile_indices.len() * BLOCK_BYTES);
        for tile in construct.tiles().flatten() {
            if !cache.contains_key(&tile) {
                let block = container.tile_blocks.get(tile).ok_or(
                    ContainerError::IndexOutOfBounds("Tile", tile, container.tile_blocks.len()),
                )?;
                cache.insert(tile, block.decode()?);
            }
            draw_data.extend_from_slice(&cache[&tile]);
        }
        if draw_data.is_empty() {
            return Ok(None);
        }

        let mut bitmap = Bitmap {
            width,
            height,
            pixel_data: block_to_sequential(&draw_data, width, height, 0xFF)?,
        };
        for pixel in bitmap.pixel_data.chunks_exact_mut(4) {
            if pixel[0] == 0 && pixel[1] == 0 && pixel[2] == 0 {
                pixel[3] = 0;
            }
        }
        Ok(Some(bitmap))
    }

    /// The canvas size `render_frame` allocates, computed without decoding tiles.
    pub fn frame_size(
        &self,
        container: &SpriteContainer,
        index: usize,
    ) -> Result<Option<(usize, usize)>> {
        let frame = container.frame_parameters.get(index).ok_or(
            ContainerError::IndexOutOfBounds("Frame", index, container.frame_count()),
        )?;
        let mut right = 0i64;
        let mut bottom = 0i64;
        for unit in &frame.units {
            let Some(construct_index) = unit.construct() else {
                continue;
            };
            let construct = construct_at(container, construct_index)?;
            if !construct.is_drawable() {
                continue;
            }
            right = right.max(unit.x as i64 + construct.width() as i64);
            bottom = bottom.max(unit.y as i64 + construct.height() as i64);
        }
        if right <= 0 || bottom <= 0 {
            return Ok(None);
        }
        Ok(Some((right as usize, bottom as usize)))
    }

    /// Largest width and height over every frame.
    pub fn max_frame_size(
        &self,
        container: &SpriteContainer,
    ) -> Result<Option<(usize, usize)>> {
        let mut result: Option<(usize, usize)> = None;
        for index in 0..container.frame_count() {
            if let Some((w, h)) = self.frame_size(container, index)? {
                result = Some(match result {
                    Some((mw, mh)) => (mw.max(w), mh.max(h)),
                    None => (w, h),
                });
            }
        }
        Ok(result)
    }

    /// Layers every unit of a frame back to front.
    /// Returns `None` when the frame has nothing to draw.
    pub fn render_frame(
        &self,
        container: &SpriteContainer,
        index: usize,
    ) -> Result<Option<Bitmap>> {
        let (width, height) = match self.frame_size(container, index)? {
            Some(size) => size,
            None => return Ok(None),
        };
        let frame = &container.frame_parameters[index];
        debug!(
            "Rendering frame {} ({} units) onto {}x{}",
            index,
            frame.units.len(),
            width,
            height
        );

        let mut cache = TileCache::default();
        let mut canvas = Bitmap::new(width, height);
        for unit in &frame.units {
            let Some(construct_index) = unit.construct() else {
                continue;
            };
            let layer = self.render_construct_cached(container, construct_index, &mut cache)?;
            if let Some(mut layer) = layer {
                self.apply_alpha_mode(&mut layer, AlphaMode::from(unit.alpha_mode));
                canvas.alpha_composite(&layer, unit.x as i32, unit.y as i32);
            }
        }
        Ok(Some(canvas))
    }

    pub fn apply_alpha_mode(&self, bitmap: &mut Bitmap, mode: AlphaMode) {
        match mode {
            AlphaMode::Opaque | AlphaMode::Other(_) => {}
            AlphaMode::Uniform => {
                for pixel in bitmap.pixel_data.chunks_exact_mut(4) {
                    pixel[3] = (pixel[3] as f64 * self.effects.uniform_alpha) as u8;
                }
            }
            AlphaMode::WhiteKey => {
                for pixel in bitmap.pixel_data.chunks_exact_mut(4) {
                    if pixel[..3].iter().all(|c| *c >= self.effects.white_key_threshold) {
                        pixel[3] = 0;
                    }
                }
            }
            AlphaMode::Highlight => apply_highlight(bitmap, &self.effects.highlight),
        }
    }
}

fn construct_at(container: &SpriteContainer, index: usize) -> Result<&FrameConstruct> {
    container.frame_constructs.get(index).ok_or(ContainerError::IndexOutOfBounds(
        "Construct",
        index,
        container.frame_constructs.len(),
    ))
}
