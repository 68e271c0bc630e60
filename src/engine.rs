//! Session object tying the pieces together: one `QuizEngine` owns the
//! decoded assets, the derived timeline, the compositor, the audio
//! scheduler, and the playback clock for one quiz run.

use std::path::PathBuf;

use tracing::debug;

use crate::{
    assets::{AssetBank, CancelToken},
    audio::{AudioCommand, AudioScheduler},
    compositor::{Compositor, FrameRGBA},
    error::{QuizError, QuizResult},
    model::{EngineConfig, Slide, SlideMedia},
    playback::PlaybackClock,
    timeline::{Timeline, build_timeline},
};

/// Session-level inputs that are not per-slide.
#[derive(Clone, Debug, Default)]
pub struct SessionAssets {
    pub music_path: Option<PathBuf>,
    pub tick_cue_path: Option<PathBuf>,
    pub font_bytes: Option<Vec<u8>>,
}

/// Everything one playback tick produced.
pub struct TickUpdate {
    pub frame: FrameRGBA,
    pub audio: Vec<AudioCommand>,
    pub position_ms: f64,
    /// True exactly on the tick where playback ran off the end.
    pub just_finished: bool,
}

pub struct QuizEngine {
    slides: Vec<Slide>,
    config: EngineConfig,
    bank: AssetBank,
    timeline: Timeline,
    compositor: Compositor,
    scheduler: AudioScheduler,
    clock: PlaybackClock,
    last_slide: Option<usize>,
    closed: bool,
}

impl QuizEngine {
    pub fn new(
        slides: Vec<Slide>,
        media: Vec<SlideMedia>,
        config: EngineConfig,
        session: SessionAssets,
        cancel: &CancelToken,
    ) -> QuizResult<Self> {
        config.validate()?;
        if slides.is_empty() {
            return Err(QuizError::validation("a session needs at least one slide"));
        }
        for (idx, slide) in slides.iter().enumerate() {
            slide
                .validate()
                .map_err(|e| QuizError::validation(format!("slide {idx}: {e}")))?;
        }

        let bank = AssetBank::preload(
            &slides,
            &media,
            session.music_path.as_deref(),
            session.tick_cue_path.as_deref(),
            session.font_bytes,
            cancel,
        )?;

        let timeline = build_timeline(&bank.narration_ms(slides.len()), config.thinking_ms());
        let compositor = Compositor::new(config.clone(), &bank)?;
        let scheduler = AudioScheduler::new(&bank, slides.len(), config.sfx_enabled);

        debug!(
            slides = slides.len(),
            total_ms = timeline.total_ms(),
            "session ready"
        );

        Ok(Self {
            slides,
            config,
            bank,
            timeline,
            compositor,
            scheduler,
            clock: PlaybackClock::new(),
            last_slide: None,
            closed: false,
        })
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn bank(&self) -> &AssetBank {
        &self.bank
    }

    pub fn position_ms(&self) -> f64 {
        self.clock.position_ms()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn play(&mut self) {
        self.clock.play();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn toggle_playback(&mut self) {
        self.clock.toggle();
    }

    /// Rewind to zero and stop; playback resumes only on an explicit `play`.
    /// The commands silence anything still sounding.
    pub fn reset(&mut self) -> Vec<AudioCommand> {
        self.clock.reset();
        self.scheduler.on_seek()
    }

    /// Move the playhead; the commands stop whatever was sounding so the
    /// next tick restarts narration at the new offset.
    pub fn seek(&mut self, t_ms: f64) -> Vec<AudioCommand> {
        self.clock.seek(t_ms, self.timeline.total_ms());
        self.scheduler.on_seek()
    }

    pub fn set_muted(&mut self, muted: bool) -> Vec<AudioCommand> {
        self.scheduler.set_muted(muted)
    }

    /// Change the thinking time. The whole schedule is rebuilt in one step
    /// and the playhead re-clamped, so no tick ever sees a half-updated
    /// timeline.
    pub fn set_thinking_time(&mut self, secs: u32) -> QuizResult<()> {
        let mut config = self.config.clone();
        config.thinking_time_secs = secs;
        config.validate()?;

        let timeline = build_timeline(
            &self.bank.narration_ms(self.slides.len()),
            config.thinking_ms(),
        );
        debug!(
            thinking_secs = secs,
            total_ms = timeline.total_ms(),
            "timeline rebuilt"
        );
        self.config = config;
        self.timeline = timeline;
        self.clock
            .seek(self.clock.position_ms(), self.timeline.total_ms());
        Ok(())
    }

    /// Advance by an elapsed wall delta and produce the frame plus audio
    /// commands for the new position.
    pub fn tick(&mut self, dt_ms: f64) -> QuizResult<TickUpdate> {
        self.ensure_open()?;

        let just_finished = self.clock.advance(dt_ms, self.timeline.total_ms());
        let t = self.clock.position_ms();

        let active = self.timeline.slide_at(t);
        if active != self.last_slide {
            debug!(from = ?self.last_slide, to = ?active, t_ms = t, "slide transition");
            self.last_slide = active;
        }

        let audio = self
            .scheduler
            .tick(t, &self.timeline, self.clock.is_playing());
        let frame = self
            .compositor
            .render(t, &self.timeline, &self.slides, &self.bank)?;

        Ok(TickUpdate {
            frame,
            audio,
            position_ms: t,
            just_finished,
        })
    }

    /// Render the frame at an arbitrary playhead without touching playback
    /// state. Used by still export and the frame CLI command.
    pub fn frame_at(&mut self, t_ms: f64) -> QuizResult<FrameRGBA> {
        self.ensure_open()?;
        self.compositor
            .render(t_ms, &self.timeline, &self.slides, &self.bank)
    }

    /// The frame at the current playhead.
    pub fn render_current_frame(&mut self) -> QuizResult<FrameRGBA> {
        self.frame_at(self.clock.position_ms())
    }

    /// Tear the session down. Returns the commands that silence any audio
    /// still sounding; the engine rejects further ticks afterwards.
    pub fn close(&mut self) -> Vec<AudioCommand> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        self.clock.pause();
        self.scheduler
            .tick(self.clock.position_ms(), &self.timeline, false)
    }

    fn ensure_open(&self) -> QuizResult<()> {
        if self.closed {
            return Err(QuizError::cancelled("session is closed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slides(n: usize) -> Vec<Slide> {
        (0..n)
            .map(|i| Slide {
                question: format!("Question {i}"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer_index: 0,
                difficulty: None,
            })
            .collect()
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            width: 64,
            height: 36,
            ..EngineConfig::default()
        }
    }

    fn engine(n: usize) -> QuizEngine {
        QuizEngine::new(
            slides(n),
            vec![SlideMedia::default(); n],
            small_config(),
            SessionAssets::default(),
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn fallback_durations_shape_the_schedule() {
        let e = engine(2);
        // No narration anywhere: 3000 + 500 + 5000 + 2000 per slide.
        assert_eq!(e.timeline().total_ms(), 2 * 10_500);
    }

    #[test]
    fn tick_advances_only_while_playing_and_finishes_once() {
        let mut e = engine(1);
        let idle = e.tick(100.0).unwrap();
        assert_eq!(idle.position_ms, 0.0);

        e.play();
        let moved = e.tick(100.0).unwrap();
        assert_eq!(moved.position_ms, 100.0);
        assert!(!moved.just_finished);

        let done = e.tick(1e9).unwrap();
        assert!(done.just_finished);
        assert_eq!(done.position_ms, e.timeline().total_ms() as f64);
        assert!(!e.tick(100.0).unwrap().just_finished);
    }

    #[test]
    fn set_thinking_time_rebuilds_and_reclamps() {
        let mut e = engine(1);
        let before = e.timeline().total_ms();
        e.seek(before as f64);

        e.set_thinking_time(3).unwrap();
        let after = e.timeline().total_ms();
        assert_eq!(after, before - 2000);
        assert!(e.position_ms() <= after as f64);

        assert!(e.set_thinking_time(30).is_err());
        // Failed change leaves the schedule untouched.
        assert_eq!(e.timeline().total_ms(), after);
    }

    #[test]
    fn reset_rewinds_stops_and_keeps_the_session_usable() {
        let mut e = engine(1);
        e.play();
        e.tick(500.0).unwrap();

        e.reset();
        assert_eq!(e.position_ms(), 0.0);
        assert!(!e.is_playing());

        // Still stopped after a tick; a fresh play resumes from zero.
        assert_eq!(e.tick(100.0).unwrap().position_ms, 0.0);
        e.play();
        assert_eq!(e.tick(100.0).unwrap().position_ms, 100.0);
    }

    #[test]
    fn close_rejects_further_ticks() {
        let mut e = engine(1);
        e.play();
        e.tick(100.0).unwrap();
        e.close();
        assert!(matches!(e.tick(100.0), Err(QuizError::Cancelled(_))));
        assert!(e.close().is_empty());
    }

    #[test]
    fn invalid_inputs_are_rejected_up_front() {
        let err = QuizEngine::new(
            Vec::new(),
            Vec::new(),
            small_config(),
            SessionAssets::default(),
            &CancelToken::new(),
        );
        assert!(err.is_err());

        let mut bad = slides(1);
        bad[0].options.pop();
        let err = QuizEngine::new(
            bad,
            vec![SlideMedia::default()],
            small_config(),
            SessionAssets::default(),
            &CancelToken::new(),
        );
        assert!(matches!(err, Err(QuizError::Validation(_))));
    }
}
