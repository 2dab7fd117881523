use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Bitmap, ConfigError};

// Legacy constants of the glow effect.
const LIFT: f64 = 0.15;
const EXTRA_LIFT: f64 = 0.2;
const EXTRA_LIFT_THRESHOLD: f64 = 1.5;
const PASS_FALLOFF: f64 = 0.1;
const MIN_PASS_INTENSITY: f64 = 0.1;

/// Parameters of the alpha mode 2 glow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Final alpha multiplier (0.0-1.0).
    pub base_alpha: f64,
    /// Brightening factor (1.0-3.0).
    pub highlight_factor: f64,
    /// Saturation multiplier around luma (1.0-3.0).
    pub saturation_boost: f64,
    /// Alpha multiplier of the first additive pass (0.0-1.0).
    pub overlay_intensity: f64,
    /// Total layer count including the base (1-5).
    pub overlay_count: u32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            base_alpha: 0.85,
            highlight_factor: 1.6,
            saturation_boost: 1.4,
            overlay_intensity: 0.4,
            overlay_count: 2,
        }
    }
}

/// Everything the compositor needs to know about blending effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParameters {
    /// Alpha multiplier for alpha mode 1.
    pub uniform_alpha: f64,
    /// Alpha mode 7 keys out pixels whose channels all reach this value.
    /// RGB555 white expands to 0xF8, so an exact `(255, 255, 255)` key never
    /// matches decoded tiles; use 0xFF to get that behavior anyway.
    pub white_key_threshold: u8,
    pub highlight: HighlightConfig,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            uniform_alpha: 0.75,
            white_key_threshold: 0xF8,
            highlight: HighlightConfig::default(),
        }
    }
}

impl EffectParameters {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Clamps every field into the range the legacy editor accepted.
    pub fn clamped(&self) -> Self {
        let h = &self.highlight;
        Self {
            uniform_alpha: self.uniform_alpha.clamp(0.0, 1.0),
            white_key_threshold: self.white_key_threshold,
            highlight: HighlightConfig {
                base_alpha: h.base_alpha.clamp(0.0, 1.0),
                highlight_factor: h.highlight_factor.clamp(1.0, 3.0),
                saturation_boost: h.saturation_boost.clamp(1.0, 3.0),
                overlay_intensity: h.overlay_intensity.clamp(0.0, 1.0),
                overlay_count: h.overlay_count.clamp(1, 5),
            },
        }
    }
}

/// Applies the glow in place: brighten and saturate, stack additive passes,
/// then scale alpha.
pub fn apply_highlight(bitmap: &mut Bitmap, config: &HighlightConfig) {
    preprocess(bitmap, config.highlight_factor, config.saturation_boost);
    if config.overlay_count > 1 {
        let base = bitmap.pixel_data.clone();
        for pass in 1..config.overlay_count {
            let intensity = (config.overlay_intensity * (1.0 - pass as f64 * PASS_FALLOFF))
                .max(MIN_PASS_INTENSITY);
            additive_pass(&mut bitmap.pixel_data, &base, intensity);
        }
    }
    scale_alpha(bitmap, config.base_alpha);
}

fn preprocess(bitmap: &mut Bitmap, highlight_factor: f64, saturation_boost: f64) {
    for pixel in bitmap.pixel_data.chunks_exact_mut(4) {
        if pixel[3] == 0 {
            continue;
        }
        if pixel[0] == 0 && pixel[1] == 0 && pixel[2] == 0 {
            pixel.copy_from_slice(&[0, 0, 0, 0]);
            continue;
        }

        let mut rgb = [0f64; 3];
        for (c, value) in rgb.iter_mut().enumerate() {
            let channel = pixel[c] as f64;
            let mut lifted =
                ((channel * highlight_factor + (255.0 - channel) * LIFT) as i64).min(255);
            if highlight_factor >= EXTRA_LIFT_THRESHOLD {
                let l = lifted as f64;
                lifted = ((l + (255.0 - l) * EXTRA_LIFT) as i64).min(255);
            }
            *value = lifted as f64;
        }

        let luma = (0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]) as i64 as f64;
        for c in 0..3 {
            let saturated = (luma + (rgb[c] - luma) * saturation_boost) as i64;
            pixel[c] = saturated.clamp(0, 255) as u8;
        }
    }
}

fn additive_pass(accumulator: &mut [u8], base: &[u8], intensity: f64) {
    for (acc, over) in accumulator.chunks_exact_mut(4).zip(base.chunks_exact(4)) {
        let over_alpha = if over[3] > 0 {
            (over[3] as f64 * intensity) as u32
        } else {
            0
        };
        for c in 0..3 {
            let added = over[c] as u32 * over_alpha / 255;
            acc[c] = (acc[c] as u32 + added).min(255) as u8;
        }
        acc[3] = acc[3].max(over_alpha as u8);
    }
}

fn scale_alpha(bitmap: &mut Bitmap, factor: f64) {
    for pixel in bitmap.pixel_data.chunks_exact_mut(4) {
        if pixel[3] > 0 {
            pixel[3] = (pixel[3] as f64 * factor) as u8;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn single(color: [u8; 4]) -> Bitmap {
        Bitmap::filled(1, 1, color)
    }

    #[test]
    fn preprocess_known_pixel() {
        // 100 * 1.6 + 155 * 0.15 = 183.25 -> 183; 183 + 72 * 0.2 = 197.4 -> 197.
        // 50 * 1.6 + 205 * 0.15 = 110.75 -> 110; 110 + 145 * 0.2 = 139.
        // 0 * 1.6 + 255 * 0.15 = 38.25 -> 38; 38 + 217 * 0.2 = 81.4 -> 81.
        // luma = 0.299 * 197 + 0.587 * 139 + 0.114 * 81 = 149.71 -> 149.
        let mut bitmap = single([100, 50, 0, 255]);
        preprocess(&mut bitmap, 1.6, 1.4);
        // 149 + 48 * 1.4 = 216.2; 149 - 10 * 1.4 = 135; 149 - 68 * 1.4 = 53.8.
        assert_eq!(Some([216, 135, 53, 255]), bitmap.pixel(0, 0));
    }

    #[test]
    fn preprocess_skips_transparent_and_clears_black() {
        let mut bitmap = Bitmap::new(2, 1);
        bitmap.set_pixel(0, 0, [50, 50, 50, 0]);
        bitmap.set_pixel(1, 0, [0, 0, 0, 200]);
        preprocess(&mut bitmap, 2.0, 2.0);
        assert_eq!(Some([50, 50, 50, 0]), bitmap.pixel(0, 0));
        assert_eq!(Some([0, 0, 0, 0]), bitmap.pixel(1, 0));
    }

    #[test]
    fn single_layer_is_preprocess_then_alpha() {
        let config = HighlightConfig {
            overlay_count: 1,
            ..Default::default()
        };
        let mut colors = Bitmap::new(3, 1);
        colors.set_pixel(0, 0, [120, 64, 200, 255]);
        colors.set_pixel(1, 0, [0, 0, 0, 255]);
        colors.set_pixel(2, 0, [248, 248, 248, 180]);

        let mut expected = colors.clone();
        preprocess(&mut expected, config.highlight_factor, config.saturation_boost);
        scale_alpha(&mut expected, config.base_alpha);

        let mut actual = colors;
        apply_highlight(&mut actual, &config);
        assert_eq!(expected, actual);
    }

    #[test]
    fn additive_passes_brighten() {
        let config = HighlightConfig {
            highlight_factor: 1.0,
            saturation_boost: 1.0,
            overlay_intensity: 0.5,
            overlay_count: 3,
            base_alpha: 1.0,
        };
        let mut bitmap = single([100, 100, 100, 255]);
        // Preprocess: 100 + 155 * 0.15 = 123.25 -> 123, gray stays 123.
        // Pass 1: k = 0.45, alpha 114, add 123 * 114 / 255 = 54.
        // Pass 2: k = 0.40, alpha 102, add 123 * 102 / 255 = 49.
        apply_highlight(&mut bitmap, &config);
        assert_eq!(Some([226, 226, 226, 255]), bitmap.pixel(0, 0));
    }

    #[test]
    fn pass_intensity_has_floor() {
        let config = HighlightConfig {
            highlight_factor: 1.0,
            saturation_boost: 1.0,
            overlay_intensity: 0.0,
            overlay_count: 2,
            base_alpha: 1.0,
        };
        let mut bitmap = single([0, 0, 200, 100]);
        // Preprocess: 0 -> 38, 200 -> 208; gray 0.299*38 + 0.587*38 + 0.114*208 = 57.38 -> 57.
        // Saturation 1.0 keeps the channels. Pass alpha 100 * 0.1 = 10.
        apply_highlight(&mut bitmap, &config);
        assert_eq!(Some([39, 39, 216, 100]), bitmap.pixel(0, 0));
    }

    #[test]
    fn highlight_is_deterministic() {
        let mut a = Bitmap::filled(4, 4, [90, 180, 30, 255]);
        let mut b = a.clone();
        let config = HighlightConfig::default();
        apply_highlight(&mut a, &config);
        apply_highlight(&mut b, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn parameters_from_json_fill_defaults() {
        let params = EffectParameters::from_json(r#"{"highlight": {"overlay_count": 4}}"#).unwrap();
        assert_eq!(0.75, params.uniform_alpha);
        assert_eq!(0xF8, params.white_key_threshold);
        assert_eq!(4, params.highlight.overlay_count);
        assert_eq!(1.6, params.highlight.highlight_factor);
        assert!(EffectParameters::from_json("{").is_err());
    }

    #[test]
    fn clamped_ranges() {
        let params = EffectParameters {
            uniform_alpha: 2.0,
            white_key_threshold: 0xF0,
            highlight: HighlightConfig {
                base_alpha: -1.0,
                highlight_factor: 0.5,
                saturation_boost: 9.0,
                overlay_intensity: 1.5,
                overlay_count: 0,
            },
        }
        .clamped();
        assert_eq!(1.0, params.uniform_alpha);
        assert_eq!(0xF0, params.white_key_threshold);
        assert_eq!(0.0, params.highlight.base_alpha);
        assert_eq!(1.0, params.highlight.highlight_factor);
        assert_eq!(3.0, params.highlight.saturation_boost);
        assert_eq!(1.0, params.highlight.overlay_intensity);
        assert_eq!(1, params.highlight.overlay_count);
    }
}
