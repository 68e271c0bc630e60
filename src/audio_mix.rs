//! Offline audio mix for export. The manifest is placed from the same
//! [`Timeline`] that drives interactive playback, so the MP4 soundtrack and
//! live audio cannot drift apart. Output is interleaved stereo f32 at
//! [`MIX_SAMPLE_RATE`](crate::assets::MIX_SAMPLE_RATE).

use std::{io::Write as _, path::Path, sync::Arc};

use anyhow::Context as _;

use crate::{
    assets::{AssetBank, MIX_SAMPLE_RATE},
    audio::MUSIC_GAIN,
    error::QuizResult,
    timeline::Timeline,
};

/// One source clip placed on the output axis.
#[derive(Clone, Debug)]
pub struct MixSegment {
    /// Output frame index where the clip begins.
    pub start_frame: u64,
    pub source: Arc<Vec<f32>>,
    pub source_rate: u32,
    pub source_channels: u16,
    pub gain: f32,
}

#[derive(Clone, Debug, Default)]
pub struct AudioManifest {
    pub segments: Vec<MixSegment>,
    /// Total output length in frames.
    pub total_frames: u64,
}

pub fn ms_to_frame(ms: u64, rate: u32) -> u64 {
    ms * u64::from(rate) / 1000
}

/// Place every audible event of a session: narration at phase starts, the
/// music bed tiled across the whole run, and countdown/end cues when enabled.
pub fn build_session_manifest(
    timeline: &Timeline,
    bank: &AssetBank,
    sfx_enabled: bool,
) -> AudioManifest {
    let total_frames = ms_to_frame(timeline.total_ms(), MIX_SAMPLE_RATE);
    let mut segments = Vec::new();

    for (idx, timing) in timeline.phases().iter().enumerate() {
        if let Some(narration) = bank.narration(idx) {
            if let Some(q) = &narration.question {
                segments.push(MixSegment {
                    start_frame: ms_to_frame(timing.start, MIX_SAMPLE_RATE),
                    source: q.samples.clone(),
                    source_rate: q.sample_rate,
                    source_channels: 1,
                    gain: 1.0,
                });
            }
            if let Some(a) = &narration.answer {
                segments.push(MixSegment {
                    start_frame: ms_to_frame(timing.reveal_start, MIX_SAMPLE_RATE),
                    source: a.samples.clone(),
                    source_rate: a.sample_rate,
                    source_channels: 1,
                    gain: 1.0,
                });
            }
        }

        if sfx_enabled && let Some(cue) = bank.sfx() {
            let thinking_secs = timing.thinking_ms() / 1000;
            for j in 0..thinking_secs {
                segments.push(MixSegment {
                    start_frame: ms_to_frame(timing.thinking_start + j * 1000, MIX_SAMPLE_RATE),
                    source: cue.interleaved_f32.clone(),
                    source_rate: cue.sample_rate,
                    source_channels: cue.channels,
                    gain: 1.0,
                });
            }
            segments.push(MixSegment {
                start_frame: ms_to_frame(timing.reveal_start, MIX_SAMPLE_RATE),
                source: cue.interleaved_f32.clone(),
                source_rate: cue.sample_rate,
                source_channels: cue.channels,
                gain: 1.0,
            });
        }
    }

    if let Some(music) = bank.music() {
        let loop_frames = music.frame_count() * u64::from(MIX_SAMPLE_RATE)
            / u64::from(music.sample_rate.max(1));
        if loop_frames > 0 {
            let mut at = 0u64;
            while at < total_frames {
                segments.push(MixSegment {
                    start_frame: at,
                    source: music.interleaved_f32.clone(),
                    source_rate: music.sample_rate,
                    source_channels: music.channels,
                    gain: MUSIC_GAIN,
                });
                at += loop_frames;
            }
        }
    }

    AudioManifest {
        segments,
        total_frames,
    }
}

/// Sum all segments into one interleaved stereo buffer, resampling each
/// source by linear interpolation and clamping the sum to [-1, 1].
pub fn mix_manifest(manifest: &AudioManifest) -> Vec<f32> {
    let mut out = vec![0.0f32; manifest.total_frames as usize * 2];

    for seg in &manifest.segments {
        let ch = usize::from(seg.source_channels.max(1));
        let src_frames = seg.source.len() / ch;
        if src_frames == 0 {
            continue;
        }
        let out_frames =
            (src_frames as u64 * u64::from(MIX_SAMPLE_RATE) / u64::from(seg.source_rate.max(1)))
                .min(manifest.total_frames.saturating_sub(seg.start_frame));
        let step = f64::from(seg.source_rate) / f64::from(MIX_SAMPLE_RATE);

        for i in 0..out_frames {
            let pos = i as f64 * step;
            let i0 = pos.floor() as usize;
            let frac = (pos - pos.floor()) as f32;
            let i1 = (i0 + 1).min(src_frames - 1);
            if i0 >= src_frames {
                break;
            }

            let sample_at = |frame: usize, c: usize| seg.source[frame * ch + c.min(ch - 1)];
            let left = sample_at(i0, 0) + (sample_at(i1, 0) - sample_at(i0, 0)) * frac;
            let right = sample_at(i0, 1) + (sample_at(i1, 1) - sample_at(i0, 1)) * frac;

            let o = (seg.start_frame + i) as usize * 2;
            out[o] = (out[o] + left * seg.gain).clamp(-1.0, 1.0);
            out[o + 1] = (out[o + 1] + right * seg.gain).clamp(-1.0, 1.0);
        }
    }

    out
}

/// Write an interleaved f32 buffer as raw little-endian samples, the layout
/// ffmpeg reads back with `-f f32le -ac 2`.
pub fn write_mix_to_f32le_file(samples: &[f32], path: &Path) -> QuizResult<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("create mix file '{}'", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    for s in samples {
        writer
            .write_all(&s.to_le_bytes())
            .context("write mix samples")?;
    }
    writer.flush().context("flush mix file")?;
    Ok(())
}
