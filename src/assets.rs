//! Asset preparation: decodes producer-supplied bytes into renderable and
//! playable handles keyed by slide index. Preloading front-loads all IO and
//! decoding so the tick path stays deterministic and IO-free.

pub mod decode;
pub mod media;

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::warn;

use crate::{
    error::{QuizError, QuizResult},
    model::{Slide, SlideMedia},
    timeline::NarrationMs,
};

pub use media::{AudioPcm, MIX_SAMPLE_RATE};

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Decoded narration utterance: mono f32 samples at a fixed rate.
#[derive(Clone, Debug)]
pub struct NarrationClip {
    pub sample_rate: u32,
    pub samples: Arc<Vec<f32>>,
}

impl NarrationClip {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }
}

/// The question/answer narration pair for one slide. Either side may be
/// missing; downstream timing then uses the fixed fallback durations.
#[derive(Clone, Debug, Default)]
pub struct SlideNarration {
    pub question: Option<NarrationClip>,
    pub answer: Option<NarrationClip>,
}

/// Cooperative cancellation flag for an in-flight preload. Checked before
/// each decoded result is committed, so results arriving after `cancel()`
/// never populate shared state.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// All decoded assets for one session, keyed by slide index. Pure data after
/// population; per-asset decode failures leave the slot empty and are never
/// fatal to the preload as a whole.
#[derive(Clone, Debug, Default)]
pub struct AssetBank {
    images: HashMap<usize, PreparedImage>,
    narration: HashMap<usize, SlideNarration>,
    music: Option<AudioPcm>,
    sfx: Option<AudioPcm>,
    font_bytes: Option<Arc<Vec<u8>>>,
}

impl AssetBank {
    /// Decode every slide's media plus optional music/cue files and font
    /// bytes. `media` is index-aligned with `slides`; missing entries mean
    /// no media for that slide.
    pub fn preload(
        slides: &[Slide],
        media: &[SlideMedia],
        music_path: Option<&Path>,
        sfx_path: Option<&Path>,
        font_bytes: Option<Vec<u8>>,
        cancel: &CancelToken,
    ) -> QuizResult<AssetBank> {
        let mut bank = AssetBank {
            font_bytes: font_bytes.map(Arc::new),
            ..AssetBank::default()
        };

        for (idx, _slide) in slides.iter().enumerate() {
            let Some(m) = media.get(idx) else {
                continue;
            };

            if let Some(bytes) = &m.background_image {
                let decoded = decode::decode_image(bytes);
                ensure_live(cancel)?;
                match decoded {
                    Ok(img) => {
                        bank.images.insert(idx, img);
                    }
                    Err(e) => warn!(slide = idx, error = %e, "background image decode failed; using placeholder"),
                }
            }

            let mut narration = SlideNarration::default();
            if let Some(bytes) = &m.question_audio {
                let decoded = decode::decode_narration_pcm16(bytes);
                ensure_live(cancel)?;
                match decoded {
                    Ok(clip) => narration.question = Some(clip),
                    Err(e) => warn!(slide = idx, error = %e, "question narration decode failed; using fallback duration"),
                }
            }
            if let Some(bytes) = &m.answer_audio {
                let decoded = decode::decode_narration_pcm16(bytes);
                ensure_live(cancel)?;
                match decoded {
                    Ok(clip) => narration.answer = Some(clip),
                    Err(e) => warn!(slide = idx, error = %e, "answer narration decode failed; using fallback duration"),
                }
            }
            if narration.question.is_some() || narration.answer.is_some() {
                bank.narration.insert(idx, narration);
            }
        }

        if let Some(path) = music_path {
            let decoded = media::decode_audio_f32_stereo(path, media::MIX_SAMPLE_RATE);
            ensure_live(cancel)?;
            match decoded {
                Ok(pcm) if !pcm.interleaved_f32.is_empty() => bank.music = Some(pcm),
                Ok(_) => warn!(path = %path.display(), "music file decoded to no samples; ignoring"),
                Err(e) => warn!(path = %path.display(), error = %e, "music decode failed; continuing without music"),
            }
        }

        if let Some(path) = sfx_path {
            let decoded = media::decode_audio_f32_stereo(path, media::MIX_SAMPLE_RATE);
            ensure_live(cancel)?;
            match decoded {
                Ok(pcm) if !pcm.interleaved_f32.is_empty() => bank.sfx = Some(pcm),
                Ok(_) => warn!(path = %path.display(), "cue file decoded to no samples; ignoring"),
                Err(e) => warn!(path = %path.display(), error = %e, "cue decode failed; continuing without tick cues"),
            }
        }

        Ok(bank)
    }

    pub fn image(&self, slide: usize) -> Option<&PreparedImage> {
        self.images.get(&slide)
    }

    pub fn narration(&self, slide: usize) -> Option<&SlideNarration> {
        self.narration.get(&slide)
    }

    pub fn music(&self) -> Option<&AudioPcm> {
        self.music.as_ref()
    }

    pub fn sfx(&self) -> Option<&AudioPcm> {
        self.sfx.as_ref()
    }

    pub fn font_bytes(&self) -> Option<&Arc<Vec<u8>>> {
        self.font_bytes.as_ref()
    }

    /// Per-slide narration durations for the timeline builder. `None` slots
    /// select the fixed fallback durations.
    pub fn narration_ms(&self, slide_count: usize) -> Vec<NarrationMs> {
        (0..slide_count)
            .map(|idx| {
                let n = self.narration.get(&idx);
                NarrationMs {
                    question: n
                        .and_then(|n| n.question.as_ref())
                        .map(NarrationClip::duration_ms),
                    answer: n
                        .and_then(|n| n.answer.as_ref())
                        .map(NarrationClip::duration_ms),
                }
            })
            .collect()
    }
}

fn ensure_live(cancel: &CancelToken) -> QuizResult<()> {
    if cancel.is_cancelled() {
        return Err(QuizError::cancelled("asset preload superseded"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn slide() -> Slide {
        Slide {
            question: "q".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer_index: 0,
            difficulty: None,
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_raw(2, 2, vec![10u8; 16]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn preload_populates_slots_and_tolerates_bad_assets() {
        let slides = vec![slide(), slide()];
        let media = vec![
            SlideMedia {
                background_image: Some(png_bytes()),
                question_audio: Some(vec![0u8; 24_000 * 2]), // 1 s
                answer_audio: Some(vec![1u8, 2, 3]),         // odd length: decode fails
            },
            SlideMedia::default(),
        ];

        let bank = AssetBank::preload(
            &slides,
            &media,
            None,
            None,
            None,
            &CancelToken::new(),
        )
        .unwrap();

        assert!(bank.image(0).is_some());
        assert!(bank.image(1).is_none());
        let narr = bank.narration_ms(2);
        assert_eq!(narr[0].question, Some(1000));
        assert_eq!(narr[0].answer, None);
        assert_eq!(narr[1], NarrationMs::default());
    }

    #[test]
    fn cancelled_preload_returns_cancelled_and_no_bank() {
        let token = CancelToken::new();
        token.cancel();
        let media = vec![SlideMedia {
            background_image: Some(png_bytes()),
            ..SlideMedia::default()
        }];
        let err = AssetBank::preload(&[slide()], &media, None, None, None, &token);
        assert!(matches!(err, Err(QuizError::Cancelled(_))));
    }

    #[test]
    fn narration_ms_is_index_aligned() {
        let bank = AssetBank::default();
        let narr = bank.narration_ms(3);
        assert_eq!(narr.len(), 3);
        assert!(narr.iter().all(|n| n.question.is_none() && n.answer.is_none()));
    }
}
