//! MP4 export through the system `ffmpeg` binary: raw RGBA frames piped on
//! stdin, the offline mix muxed in from an `f32le` side file. Shelling out
//! avoids native FFmpeg dev header/lib requirements.

use std::{
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;
use tracing::info;

use crate::{
    assets::{MIX_SAMPLE_RATE, media::is_ffmpeg_on_path},
    audio_mix::{build_session_manifest, mix_manifest, write_mix_to_f32le_file},
    composite::flatten_to_opaque_rgba8,
    compositor::FrameRGBA,
    engine::QuizEngine,
    error::{QuizError, QuizResult},
};

/// Every export lands next to its source document with this suffix.
pub const EXPORT_SUFFIX: &str = "-quiz-video.mp4";

/// Output file name for a quiz document stem.
pub fn export_file_name(stem: &str) -> String {
    format!("{stem}{EXPORT_SUFFIX}")
}

/// Raw PCM audio input muxed alongside the video stream.
#[derive(Clone, Debug)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
    pub audio: Option<AudioInputConfig>,
}

impl EncodeConfig {
    pub fn validate(&self) -> QuizResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(QuizError::validation("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(QuizError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output requires even dimensions.
            return Err(QuizError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if let Some(audio) = &self.audio {
            if audio.sample_rate == 0 || audio.channels == 0 {
                return Err(QuizError::validation(
                    "audio sample rate and channels must be non-zero",
                ));
            }
        }
        Ok(())
    }
}

pub fn ensure_parent_dir(path: &Path) -> QuizResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streaming MP4 encoder: frames go in strictly increasing timeline order,
/// `finish` waits for ffmpeg to finalize the container.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> QuizResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(QuizError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(QuizError::export(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if cfg.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = &cfg.audio {
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path)
            .args([
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-shortest",
                "-movflags",
                "+faststart",
            ]);
        } else {
            cmd.args([
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ]);
        }
        cmd.arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            QuizError::export(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| QuizError::export("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            scratch: vec![0u8; (cfg.width * cfg.height * 4) as usize],
            cfg,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &FrameRGBA) -> QuizResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(QuizError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(QuizError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(&mut self.scratch, &frame.data, [0, 0, 0]);

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(QuizError::export("ffmpeg encoder is already finalized"));
        };
        stdin
            .write_all(&self.scratch)
            .map_err(|e| QuizError::export(format!("failed to write frame to ffmpeg stdin: {e}")))?;
        Ok(())
    }

    pub fn finish(mut self) -> QuizResult<()> {
        drop(self.stdin.take());

        let mut stderr_bytes = Vec::new();
        if let Some(mut stderr) = self.child.stderr.take() {
            stderr.read_to_end(&mut stderr_bytes).ok();
        }
        let status = self
            .child
            .wait()
            .map_err(|e| QuizError::export(format!("failed to wait for ffmpeg to finish: {e}")))?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(QuizError::export(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Drives a session through the encoder frame by frame. Each captured tick
/// advances exactly one frame interval on the same timeline that powers
/// playback; the audio track is the offline mix of the same schedule.
pub struct Exporter {
    encoder: Option<FfmpegEncoder>,
    _audio_tmp: TempFileGuard,
    interval_ms: f64,
    frames_captured: u64,
    total_ms: u64,
    out_path: PathBuf,
}

impl Exporter {
    /// Open the encoder and write the mixed audio side file. The playhead is
    /// sampled from zero regardless of where playback currently sits.
    pub fn start(engine: &mut QuizEngine, out_path: impl Into<PathBuf>) -> QuizResult<Self> {
        let out_path = out_path.into();
        let config = engine.config().clone();
        let total_ms = engine.timeline().total_ms();
        if total_ms == 0 {
            return Err(QuizError::validation("cannot export an empty timeline"));
        }

        let mut audio_tmp = TempFileGuard(None);
        let manifest =
            build_session_manifest(engine.timeline(), engine.bank(), config.sfx_enabled);
        let audio = if manifest.segments.is_empty() {
            None
        } else {
            let mixed = mix_manifest(&manifest);
            let path = std::env::temp_dir().join(format!(
                "quizreel_audio_mix_{}_{}.f32le",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or(0)
            ));
            write_mix_to_f32le_file(&mixed, &path)?;
            audio_tmp.0 = Some(path.clone());
            Some(AudioInputConfig {
                path,
                sample_rate: MIX_SAMPLE_RATE,
                channels: 2,
            })
        };

        let encoder = FfmpegEncoder::new(EncodeConfig {
            width: config.width,
            height: config.height,
            fps: config.fps,
            out_path: out_path.clone(),
            overwrite: true,
            audio,
        })?;

        info!(
            total_ms,
            fps = config.fps,
            out = %out_path.display(),
            "export started"
        );

        Ok(Self {
            encoder: Some(encoder),
            _audio_tmp: audio_tmp,
            interval_ms: config.frame_interval_ms(),
            frames_captured: 0,
            total_ms,
            out_path,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Compose and pipe the next frame. Returns false once every frame up
    /// to `total_ms` has been captured.
    pub fn capture_tick(&mut self, engine: &mut QuizEngine) -> QuizResult<bool> {
        let t = self.frames_captured as f64 * self.interval_ms;
        if t >= self.total_ms as f64 && self.frames_captured > 0 {
            return Ok(false);
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| QuizError::export("exporter is already stopped"))?;

        let frame = engine.frame_at(t)?;
        encoder.encode_frame(&frame)?;
        self.frames_captured += 1;

        Ok(self.frames_captured as f64 * self.interval_ms < self.total_ms as f64)
    }

    /// Finalize the container. A stop after a partial capture still yields
    /// a playable, shorter file.
    pub fn stop(mut self) -> QuizResult<PathBuf> {
        if let Some(encoder) = self.encoder.take() {
            encoder.finish()?;
        }
        info!(
            frames = self.frames_captured,
            out = %self.out_path.display(),
            "export finished"
        );
        Ok(self.out_path.clone())
    }
}

/// Render a whole session to MP4: start, capture every frame, stop.
pub fn export_session(engine: &mut QuizEngine, out_path: impl Into<PathBuf>) -> QuizResult<PathBuf> {
    let mut exporter = Exporter::start(engine, out_path)?;
    while exporter.capture_tick(engine)? {}
    exporter.stop()
}
