use indexmap::IndexMap;
use log::{info, warn};

use crate::wav::{write_wav, WavFormat};
use crate::{AudioClip, AudioError, Endian, SpriteContainer};

type Result<T> = std::result::Result<T, AudioError>;

const FALLBACK_FORMAT: WavFormat = WavFormat {
    channels: 1,
    bits_per_sample: 16,
    sample_rate: 22050,
};
const PEAK_LIMIT: i32 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleQuality {
    #[default]
    Linear,
    Nearest,
}

/// The format every clip is converted to before mixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTarget {
    pub sample_rate: u16,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub quality: ResampleQuality,
}

impl From<WavFormat> for ConversionTarget {
    fn from(format: WavFormat) -> Self {
        ConversionTarget {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            quality: ResampleQuality::default(),
        }
    }
}

/// Decodes a clip to interleaved 16-bit samples in the target channel layout and rate.
pub fn convert_clip(clip: &AudioClip, target: &ConversionTarget) -> Result<Vec<i16>> {
    let pcm = clip.pcm();
    let mut samples: Vec<i16> = match clip.bits_per_sample {
        8 => pcm.iter().map(|s| (*s as i16 - 128) * 256).collect(),
        16 => pcm
            .chunks_exact(2)
            .map(|s| i16::from_le_bytes([s[0], s[1]]))
            .collect(),
        24 => pcm
            .chunks_exact(3)
            .map(|s| (i32::from_le_bytes([0, s[0], s[1], s[2]]) >> 16) as i16)
            .collect(),
        32 => pcm
            .chunks_exact(4)
            .map(|s| (i32::from_le_bytes([s[0], s[1], s[2], s[3]]) >> 16) as i16)
            .collect(),
        other => return Err(AudioError::UnsupportedBitDepth(other)),
    };

    let mut channels = clip.channels.max(1) as usize;
    if channels == 2 && target.channels == 1 {
        samples = samples
            .chunks_exact(2)
            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
            .collect();
        channels = 1;
    } else if channels == 1 && target.channels == 2 {
        samples = samples.iter().flat_map(|s| [*s, *s]).collect();
        channels = 2;
    }

    if clip.sample_rate != 0 && clip.sample_rate != target.sample_rate {
        samples = resample(
            &samples,
            channels,
            clip.sample_rate,
            target.sample_rate,
            target.quality,
        );
    }
    Ok(samples)
}

fn resample(
    samples: &[i16],
    channels: usize,
    from: u16,
    to: u16,
    quality: ResampleQuality,
) -> Vec<i16> {
    let frames = samples.len() / channels;
    let target_frames = frames * to as usize / from as usize;
    if frames == 0 || target_frames == 0 {
        return Vec::new();
    }

    let last = (frames - 1) as f64;
    let step = if target_frames > 1 {
        last / (target_frames - 1) as f64
    } else {
        0.0
    };
    let mut out = Vec::with_capacity(target_frames * channels);
    for k in 0..target_frames {
        let position = if k + 1 == target_frames && target_frames > 1 {
            last
        } else {
            k as f64 * step
        };
        for c in 0..channels {
            let at = |frame: usize| samples[frame * channels + c] as f64;
            let value = match quality {
                ResampleQuality::Nearest => at(position.round() as usize),
                ResampleQuality::Linear => {
                    let lower = position.floor() as usize;
                    if lower + 1 < frames {
                        let fraction = position - lower as f64;
                        at(lower) + (at(lower + 1) - at(lower)) * fraction
                    } else {
                        at(lower)
                    }
                }
            };
            out.push(value as i16);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineStats {
    pub total_frames: usize,
    /// Seconds.
    pub total_duration: f64,
    pub channels: u8,
    pub bits: u8,
    pub sample_rate: u16,
}

/// Audio laid out along the frame sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    /// Interleaved 16-bit samples.
    pub samples: Vec<i16>,
    pub format: WavFormat,
    pub frame_count: usize,
}

impl Timeline {
    pub fn stats(&self) -> TimelineStats {
        let channels = self.format.channels.max(1) as usize;
        let total_duration = if self.format.sample_rate == 0 {
            0.0
        } else {
            (self.samples.len() / channels) as f64 / self.format.sample_rate as f64
        };
        TimelineStats {
            total_frames: self.frame_count,
            total_duration,
            channels: self.format.channels,
            bits: self.format.bits_per_sample,
            sample_rate: self.format.sample_rate,
        }
    }

    /// PCM bytes in the timeline's bit depth: 8-bit unsigned or 16-bit little endian.
    pub fn to_pcm(&self) -> Vec<u8> {
        if self.format.bits_per_sample == 8 {
            self.samples.iter().map(|s| ((*s >> 8) + 128) as u8).collect()
        } else {
            self.samples
                .iter()
                .flat_map(|s| Endian::Little.encode_i16(*s))
                .collect()
        }
    }
}

fn timeline_format(clips: &[AudioClip]) -> WavFormat {
    clips
        .iter()
        .find(|c| c.channels > 0 && c.bits_per_sample > 0 && c.sample_rate > 0)
        .map(|c| WavFormat {
            channels: c.channels,
            bits_per_sample: if c.bits_per_sample == 8 { 8 } else { 16 },
            sample_rate: c.sample_rate,
        })
        .unwrap_or(FALLBACK_FORMAT)
}

/// Builds one slot of audio per frame: the start of the referenced clip, or silence.
pub fn build_timeline(container: &SpriteContainer, frame_duration_ms: u32) -> Result<Timeline> {
    if container.audio_clips.is_empty() {
        return Err(AudioError::NoClips);
    }
    if container.frame_parameters.is_empty() {
        return Err(AudioError::NoFrames);
    }

    let format = timeline_format(&container.audio_clips);
    let target = ConversionTarget::from(format);
    // Counted in interleaved samples, not sample frames.
    let frame_samples =
        (format.sample_rate as f64 * frame_duration_ms as f64 / 1000.0).round() as usize;

    let converted: Vec<Vec<i16>> = container
        .audio_clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            convert_clip(clip, &target).unwrap_or_else(|e| {
                warn!("Clip {} could not be converted and plays as silence: {}", i, e);
                Vec::new()
            })
        })
        .collect();

    let mut samples: Vec<i16> = Vec::with_capacity(frame_samples * container.frame_count());
    for (frame_index, frame) in container.frame_parameters.iter().enumerate() {
        let start = samples.len();
        match frame.audio_clip() {
            Some(clip) if clip < converted.len() => {
                let source = &converted[clip];
                let take = source.len().min(frame_samples);
                samples.extend_from_slice(&source[..take]);
            }
            Some(clip) => warn!(
                "Frame {} references clip {} but only {} exist",
                frame_index,
                clip,
                converted.len()
            ),
            None => {}
        }
        samples.resize(start + frame_samples, 0);
    }

    let peak = samples.iter().map(|s| (*s as i32).abs()).max().unwrap_or(0);
    if peak > PEAK_LIMIT {
        let factor = PEAK_LIMIT as f64 / peak as f64;
        for sample in samples.iter_mut() {
            *sample = (*sample as f64 * factor) as i16;
        }
        info!("Normalized timeline peak {} by {:.3}", peak, factor);
    }

    Ok(Timeline {
        samples,
        format,
        frame_count: container.frame_count(),
    })
}

/// A single clip in the legacy WAV layout.
pub fn export_clip(container: &SpriteContainer, clip_index: usize) -> Result<Vec<u8>> {
    let clip = container
        .audio_clips
        .get(clip_index)
        .ok_or(AudioError::ClipIndexOutOfBounds(clip_index, container.audio_clips.len()))?;
    let format = WavFormat {
        channels: clip.channels,
        bits_per_sample: clip.bits_per_sample,
        sample_rate: clip.sample_rate,
    };
    write_wav(&format, clip.pcm())
}

/// The frame-ordered timeline in the legacy WAV layout.
pub fn export_timeline(
    container: &SpriteContainer,
    frame_duration_ms: u32,
) -> Result<(Vec<u8>, TimelineStats)> {
    let timeline = build_timeline(container, frame_duration_ms)?;
    let stats = timeline.stats();
    let wav = write_wav(&timeline.format, &timeline.to_pcm())?;
    info!(
        "Exported {} frames of audio ({:.2}s, {}ch {}bit {}Hz)",
        stats.total_frames, stats.total_duration, stats.channels, stats.bits, stats.sample_rate
    );
    Ok((wav, stats))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClipUsage {
    pub count: usize,
    pub frames: Vec<usize>,
}

/// How often each valid clip is referenced, in order of first use.
pub fn audio_usage(container: &SpriteContainer) -> IndexMap<usize, ClipUsage> {
    let mut usage: IndexMap<usize, ClipUsage> = IndexMap::new();
    for (frame_index, frame) in container.frame_parameters.iter().enumerate() {
        if let Some(clip) = frame.audio_clip().filter(|c| *c < container.audio_clips.len()) {
            let entry = usage.entry(clip).or_default();
            entry.count += 1;
            entry.frames.push(frame_index);
        }
    }
    usage
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    Silent,
    Clip(usize),
    Invalid(i16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChange {
    pub frame: usize,
    /// `None` for the first frame.
    pub from: Option<AudioCue>,
    pub to: AudioCue,
}

pub fn audio_cue(container: &SpriteContainer, frame_index: usize) -> Option<AudioCue> {
    let frame = container.frame_parameters.get(frame_index)?;
    Some(match frame.audio_clip() {
        None => AudioCue::Silent,
        Some(clip) if clip < container.audio_clips.len() => AudioCue::Clip(clip),
        Some(_) => AudioCue::Invalid(frame.audio_index),
    })
}

/// Frames where the audio reference differs from the previous frame.
pub fn audio_changes(container: &SpriteContainer) -> Vec<AudioChange> {
    let mut changes = Vec::new();
    let mut current: Option<(i16, AudioCue)> = None;
    for (frame_index, frame) in container.frame_parameters.iter().enumerate() {
        let Some(cue) = audio_cue(container, frame_index) else {
            continue;
        };
        if current.map(|(index, _)| index) != Some(frame.audio_index) {
            changes.push(AudioChange {
                frame: frame_index,
                from: current.map(|(_, cue)| cue),
                to: cue,
            });
            current = Some((frame.audio_index, cue));
        }
    }
    changes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::{frame, mono_clip, sample_container};

    fn target(sample_rate: u16, channels: u8) -> ConversionTarget {
        ConversionTarget {
            sample_rate,
            channels,
            bits_per_sample: 16,
            quality: ResampleQuality::Linear,
        }
    }

    fn clip(channels: u8, bits: u8, rate: u16, pcm: Vec<u8>) -> AudioClip {
        AudioClip {
            channels,
            bits_per_sample: bits,
            sample_rate: rate,
            data_length: pcm.len() as u32,
            payload: pcm,
        }
    }

    #[test]
    fn decodes_bit_depths() {
        let eight = clip(1, 8, 100, vec![0, 128, 255]);
        assert_eq!(vec![-32768, 0, 32512], convert_clip(&eight, &target(100, 1)).unwrap());

        let twenty_four = clip(1, 24, 100, vec![0x00, 0x34, 0x12, 0x00, 0x00, 0x80]);
        assert_eq!(vec![0x1234, -32768], convert_clip(&twenty_four, &target(100, 1)).unwrap());

        let thirty_two = clip(1, 32, 100, (-65536i32).to_le_bytes().to_vec());
        assert_eq!(vec![-1], convert_clip(&thirty_two, &target(100, 1)).unwrap());

        let twelve = clip(1, 12, 100, vec![0; 4]);
        assert!(matches!(
            convert_clip(&twelve, &target(100, 1)),
            Err(AudioError::UnsupportedBitDepth(12))
        ));
    }

    #[test]
    fn only_declared_bytes_are_decoded() {
        let mut c = mono_clip(100, &[5, 6, 7]);
        c.data_length = 4;
        assert_eq!(vec![5, 6], convert_clip(&c, &target(100, 1)).unwrap());
    }

    #[test]
    fn channel_conversion() {
        let stereo: Vec<u8> = [10i16, 21, -10, -21, 7]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let down = convert_clip(&clip(2, 16, 100, stereo), &target(100, 1)).unwrap();
        assert_eq!(vec![15, -15], down);

        let up = convert_clip(&mono_clip(100, &[1, -2]), &target(100, 2)).unwrap();
        assert_eq!(vec![1, 1, -2, -2], up);
    }

    #[test]
    fn linear_resampling() {
        // Four frames at 100 Hz become two at 50 Hz, spanning the whole clip.
        let down = convert_clip(&mono_clip(100, &[0, 100, 200, 300]), &target(50, 1)).unwrap();
        assert_eq!(vec![0, 300], down);

        // Upsampling interpolates and truncates: positions 0, 0.6, 1.2, 1.8, 2.4, 3.
        let up = convert_clip(&mono_clip(100, &[0, 10, 20, 31]), &target(150, 1)).unwrap();
        assert_eq!(vec![0, 6, 12, 18, 24, 31], up);
    }

    #[test]
    fn nearest_resampling_per_channel() {
        let stereo: Vec<u8> = [0i16, 100, 10, 110, 20, 120, 30, 130]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut t = target(50, 2);
        t.quality = ResampleQuality::Nearest;
        let out = convert_clip(&clip(2, 16, 100, stereo), &t).unwrap();
        assert_eq!(vec![0, 100, 30, 130], out);
    }

    #[test]
    fn zero_rate_skips_resampling() {
        let out = convert_clip(&mono_clip(0, &[1, 2, 3]), &target(22050, 1)).unwrap();
        assert_eq!(vec![1, 2, 3], out);
    }

    fn timeline_container() -> SpriteContainer {
        SpriteContainer {
            frame_parameters: vec![
                frame(0, vec![]),
                frame(-1, vec![]),
                frame(5, vec![]),
                frame(1, vec![]),
            ],
            audio_clips: vec![mono_clip(1000, &[1, 2, 3]), mono_clip(1000, &[9; 20])],
            ..Default::default()
        }
    }

    #[test]
    fn timeline_layout() {
        let timeline = build_timeline(&timeline_container(), 5).unwrap();
        assert_eq!(FALLBACK_FORMAT.channels, timeline.format.channels);
        assert_eq!(1000, timeline.format.sample_rate);
        let mut expected = vec![1, 2, 3, 0, 0];
        expected.extend([0; 5]);
        expected.extend([0; 5]);
        expected.extend([9; 5]);
        assert_eq!(expected, timeline.samples);

        let stats = timeline.stats();
        assert_eq!(4, stats.total_frames);
        assert!((stats.total_duration - 0.02).abs() < 1e-9);
        assert_eq!((1, 16, 1000), (stats.channels, stats.bits, stats.sample_rate));
    }

    #[test]
    fn stereo_timeline_frames_count_interleaved_samples() {
        let pcm: Vec<u8> = (1..=8i16).flat_map(|s| s.to_le_bytes()).collect();
        let container = SpriteContainer {
            frame_parameters: vec![frame(0, vec![]), frame(-1, vec![])],
            audio_clips: vec![clip(2, 16, 1000, pcm)],
            ..Default::default()
        };
        let timeline = build_timeline(&container, 5).unwrap();
        assert_eq!(2, timeline.format.channels);
        assert_eq!(vec![1, 2, 3, 4, 5, 0, 0, 0, 0, 0], timeline.samples);
        assert_eq!(20, timeline.to_pcm().len());
    }

    #[test]
    fn timeline_is_deterministic() {
        let container = sample_container();
        assert_eq!(
            build_timeline(&container, 100).unwrap(),
            build_timeline(&container, 100).unwrap()
        );
    }

    #[test]
    fn timeline_normalizes_loud_audio() {
        let container = SpriteContainer {
            frame_parameters: vec![frame(0, vec![])],
            audio_clips: vec![mono_clip(1000, &[32000, -16000, 100])],
            ..Default::default()
        };
        let timeline = build_timeline(&container, 3).unwrap();
        assert_eq!(vec![30000, -15000, 93], timeline.samples);
    }

    #[test]
    fn timeline_uses_first_complete_format() {
        let mut container = timeline_container();
        container.audio_clips.insert(0, clip(0, 16, 8000, vec![]));
        container.audio_clips.push(clip(2, 8, 1000, vec![128; 4]));
        container.audio_clips[1] = clip(2, 8, 2000, vec![128, 255, 0, 128]);
        let timeline = build_timeline(&container, 1).unwrap();
        assert_eq!(
            WavFormat {
                channels: 2,
                bits_per_sample: 8,
                sample_rate: 2000
            },
            timeline.format
        );
        // Frame 0 plays clip 0, which has no channels and decodes to nothing.
        assert_eq!(vec![0, 0, 0, 0], timeline.samples[0..4].to_vec());
        assert_eq!(vec![128; 4], timeline.to_pcm()[0..4].to_vec());
    }

    #[test]
    fn timeline_errors() {
        let mut container = timeline_container();
        container.frame_parameters.clear();
        assert!(matches!(build_timeline(&container, 100), Err(AudioError::NoFrames)));
        container.audio_clips.clear();
        assert!(matches!(build_timeline(&container, 100), Err(AudioError::NoClips)));
    }

    #[test]
    fn unsupported_clip_plays_as_silence() {
        let container = SpriteContainer {
            frame_parameters: vec![frame(1, vec![])],
            audio_clips: vec![mono_clip(1000, &[1]), clip(1, 12, 1000, vec![1; 6])],
            ..Default::default()
        };
        let timeline = build_timeline(&container, 2).unwrap();
        assert_eq!(vec![0, 0], timeline.samples);
    }

    #[test]
    fn export_clip_writes_legacy_header() {
        let container = sample_container();
        let wav = export_clip(&container, 0).unwrap();
        assert_eq!(44 + 8, wav.len());
        assert_eq!(22050, Endian::Big.read_u16_at(&wav, 0x18).unwrap());
        assert_eq!(8, Endian::Big.read_u32_at(&wav, 0x28).unwrap());
        assert_eq!(&container.audio_clips[0].payload[..], &wav[44..]);
        assert!(matches!(export_clip(&container, 1), Err(AudioError::ClipIndexOutOfBounds(1, 1))));
    }

    #[test]
    fn export_timeline_matches_stats() {
        let (wav, stats) = export_timeline(&timeline_container(), 5).unwrap();
        assert_eq!(4, stats.total_frames);
        assert_eq!(40, Endian::Big.read_u32_at(&wav, 0x28).unwrap());
        assert_eq!(44 + 40, wav.len());
        assert_eq!(&[1, 0, 2, 0, 3, 0], &wav[44..50]);
    }

    #[test]
    fn usage_statistics() {
        let mut container = timeline_container();
        container.frame_parameters.push(frame(0, vec![]));
        let usage = audio_usage(&container);
        assert_eq!(vec![0, 1], usage.keys().copied().collect::<Vec<_>>());
        assert_eq!(
            ClipUsage {
                count: 2,
                frames: vec![0, 4]
            },
            usage[&0]
        );
        assert_eq!(1, usage[&1].count);
    }

    #[test]
    fn sequence_changes() {
        let mut container = timeline_container();
        container.frame_parameters.push(frame(1, vec![]));
        let changes = audio_changes(&container);
        assert_eq!(
            vec![
                AudioChange {
                    frame: 0,
                    from: None,
                    to: AudioCue::Clip(0)
                },
                AudioChange {
                    frame: 1,
                    from: Some(AudioCue::Clip(0)),
                    to: AudioCue::Silent
                },
                AudioChange {
                    frame: 2,
                    from: Some(AudioCue::Silent),
                    to: AudioCue::Invalid(5)
                },
                AudioChange {
                    frame: 3,
                    from: Some(AudioCue::Invalid(5)),
                    to: AudioCue::Clip(1)
                },
            ],
            changes
        );
        assert_eq!(Some(AudioCue::Clip(1)), audio_cue(&container, 4));
        assert_eq!(None, audio_cue(&container, 5));
    }

    #[test]
    fn clip_duration_from_container() {
        let container = sample_container();
        let seconds = container.audio_clips[0].duration_secs();
        assert!((seconds - 4.0 / 22050.0).abs() < 1e-12);
    }
}
