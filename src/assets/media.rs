use std::{path::Path, sync::Arc};

use crate::error::{QuizError, QuizResult};

/// Sample rate of the session mix and of decoded music/cue files.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Decoded audio stored as interleaved `f32` PCM.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Arc<Vec<f32>>,
}

impl AudioPcm {
    pub fn frame_count(&self) -> u64 {
        (self.interleaved_f32.len() / usize::from(self.channels.max(1))) as u64
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Decode an audio file (arbitrary container) to interleaved stereo f32 at
/// `sample_rate`, via the system `ffmpeg` binary.
///
/// We intentionally shell out rather than linking native FFmpeg libraries to
/// avoid dev header/lib requirements.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> QuizResult<AudioPcm> {
    if !is_ffmpeg_on_path() {
        return Err(QuizError::decode(
            "ffmpeg is required for music/cue decoding, but was not found on PATH",
        ));
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| QuizError::decode(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(QuizError::decode(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(QuizError::decode(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: Arc::new(pcm),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_frames_and_rate() {
        let pcm = AudioPcm {
            sample_rate: 48_000,
            channels: 2,
            interleaved_f32: Arc::new(vec![0.0; 96_000]),
        };
        assert_eq!(pcm.frame_count(), 48_000);
        assert!((pcm.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decode_missing_file_reports_error() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let err = decode_audio_f32_stereo(Path::new("definitely/not/here.mp3"), MIX_SAMPLE_RATE);
        assert!(err.is_err());
    }
}
