use crate::error::{QuizError, QuizResult};

/// Every slide carries exactly four answer options.
pub const OPTION_COUNT: usize = 4;

/// One quiz question with its options. Immutable once constructed; decoded
/// media for a slide lives in the [`AssetBank`](crate::assets::AssetBank),
/// keyed by slide index.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Slide {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl Slide {
    pub fn validate(&self) -> QuizResult<()> {
        if self.question.trim().is_empty() {
            return Err(QuizError::validation("slide question must be non-empty"));
        }
        if self.options.len() != OPTION_COUNT {
            return Err(QuizError::validation(format!(
                "slide must have exactly {OPTION_COUNT} options, got {}",
                self.options.len()
            )));
        }
        if self.correct_answer_index >= OPTION_COUNT {
            return Err(QuizError::validation(format!(
                "correct_answer_index {} out of range 0..{OPTION_COUNT}",
                self.correct_answer_index
            )));
        }
        Ok(())
    }
}

/// Raw, still-encoded media bytes produced by the upstream generation step,
/// index-aligned with the slide list. Narration is raw 16-bit LE PCM; the
/// background image is any container the `image` crate can decode.
#[derive(Clone, Debug, Default)]
pub struct SlideMedia {
    pub background_image: Option<Vec<u8>>,
    pub question_audio: Option<Vec<u8>>,
    pub answer_audio: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutVariant {
    Cinematic,
    Broadcast,
}

/// Playback/rendering configuration for one engine session.
///
/// A thinking-time change invalidates the whole [`Timeline`](crate::timeline::Timeline);
/// see [`QuizEngine::set_thinking_time`](crate::engine::QuizEngine::set_thinking_time).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thinking_time_secs: u32,
    pub overlay_opacity: f32,
    pub sfx_enabled: bool,
    pub layout: LayoutVariant,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thinking_time_secs: 5,
            overlay_opacity: 0.45,
            sfx_enabled: true,
            layout: LayoutVariant::Cinematic,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> QuizResult<()> {
        if !(3..=15).contains(&self.thinking_time_secs) {
            return Err(QuizError::validation(
                "thinking_time_secs must be in 3..=15",
            ));
        }
        if !(0.1..=0.9).contains(&self.overlay_opacity) {
            return Err(QuizError::validation(
                "overlay_opacity must be in 0.1..=0.9",
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(QuizError::validation("canvas width/height must be > 0"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output requires even dimensions.
            return Err(QuizError::validation("canvas width/height must be even"));
        }
        if self.fps == 0 {
            return Err(QuizError::validation("fps must be > 0"));
        }
        Ok(())
    }

    pub fn thinking_ms(&self) -> u64 {
        u64::from(self.thinking_time_secs) * 1000
    }

    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / f64::from(self.fps)
    }
}

/// On-disk quiz document consumed by the CLI. Media is referenced by
/// document-relative paths and read into [`SlideMedia`] before preload.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QuizDoc {
    pub slides: Vec<SlideSource>,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_cue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SlideSource {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_audio: Option<String>,
}

impl SlideSource {
    pub fn to_slide(&self) -> Slide {
        Slide {
            question: self.question.clone(),
            options: self.options.clone(),
            correct_answer_index: self.correct_answer_index,
            difficulty: self.difficulty.clone(),
        }
    }
}

impl QuizDoc {
    pub fn validate(&self) -> QuizResult<()> {
        if self.slides.is_empty() {
            return Err(QuizError::validation("quiz document has no slides"));
        }
        self.config.validate()?;
        for (idx, src) in self.slides.iter().enumerate() {
            src.to_slide()
                .validate()
                .map_err(|e| QuizError::validation(format!("slide {idx}: {e}")))?;
            for path in [&src.background_image, &src.question_audio, &src.answer_audio]
                .into_iter()
                .flatten()
            {
                normalize_rel_path(path)?;
            }
        }
        Ok(())
    }
}

/// Normalize and validate document-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and
/// rejects absolute paths or parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> QuizResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(QuizError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(QuizError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(QuizError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(QuizError::validation("asset path must contain a file name"));
    }

    Ok(out.join("/"))
}

/// Question counts per difficulty bucket from easy/medium percentages.
///
/// Easy and medium round down; the hard bucket absorbs the rounding error
/// and is clamped at zero (percentages summing past 100 yield hard == 0).
pub fn difficulty_counts(total: u32, easy_pct: u32, medium_pct: u32) -> (u32, u32, u32) {
    let easy = total * easy_pct / 100;
    let medium = total * medium_pct / 100;
    let hard = i64::from(total) - i64::from(easy) - i64::from(medium);
    (easy, medium, hard.max(0) as u32)
}
