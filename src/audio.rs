//! Playback audio scheduling. The scheduler owns no audio backend; each tick
//! it compares the playhead against the timeline and emits the commands that
//! would reconcile an output device with the schedule. The sounding-track
//! identity is the only coordination state, so repeated ticks inside one
//! phase are no-ops.

use crate::{
    assets::AssetBank,
    timeline::{Phase, Timeline},
};

/// Fixed music bed gain under narration.
pub const MUSIC_GAIN: f32 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Utterance {
    Question,
    Answer,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioCommand {
    StartNarration {
        slide: usize,
        utterance: Utterance,
        offset_secs: f64,
    },
    StopNarration,
    PlayTickCue {
        seconds_left: u32,
    },
    PlayEndCue,
    StartMusic {
        offset_secs: f64,
        gain: f32,
    },
    StopMusic,
    SetMasterGain(f32),
}

/// Which narration clips exist per slide, captured once at session start so
/// ticking never touches the bank.
#[derive(Clone, Copy, Debug, Default)]
struct ClipPresence {
    question: bool,
    answer: bool,
}

pub struct AudioScheduler {
    clips: Vec<ClipPresence>,
    has_music: bool,
    music_duration_secs: f64,
    has_cue: bool,
    sfx_enabled: bool,

    sounding: Option<(usize, Utterance)>,
    music_playing: bool,
    muted: bool,
    last_tick_cue: Option<(usize, u32)>,
    last_slide: Option<usize>,
    /// Slide whose reveal entry already fired the end cue. Cleared when the
    /// playhead is observed outside that slide's reveal or after a seek, so
    /// pause/resume inside one reveal never re-fires it.
    end_cue_fired: Option<usize>,
}

impl AudioScheduler {
    pub fn new(bank: &AssetBank, slide_count: usize, sfx_enabled: bool) -> Self {
        let clips = (0..slide_count)
            .map(|idx| {
                let n = bank.narration(idx);
                ClipPresence {
                    question: n.is_some_and(|n| n.question.is_some()),
                    answer: n.is_some_and(|n| n.answer.is_some()),
                }
            })
            .collect();
        Self {
            clips,
            has_music: bank.music().is_some(),
            music_duration_secs: bank.music().map(|m| m.duration_secs()).unwrap_or(0.0),
            has_cue: bank.sfx().is_some(),
            sfx_enabled,
            sounding: None,
            music_playing: false,
            muted: false,
            last_tick_cue: None,
            last_slide: None,
            end_cue_fired: None,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Flip the single master gain. Idempotent; the toggle affects every bus
    /// at once so narration, music, and cues stay in lockstep.
    pub fn set_muted(&mut self, muted: bool) -> Vec<AudioCommand> {
        if self.muted == muted {
            return Vec::new();
        }
        self.muted = muted;
        vec![AudioCommand::SetMasterGain(if muted { 0.0 } else { 1.0 })]
    }

    /// Clear the sounding-track marker after a seek so the next tick
    /// restarts narration at the new playhead offset. A seek also counts as
    /// a fresh reveal entry.
    pub fn on_seek(&mut self) -> Vec<AudioCommand> {
        let mut out = Vec::new();
        self.stop_narration(&mut out);
        self.end_cue_fired = None;
        out
    }

    /// Reconcile audio with the playhead. Call on every playback tick and
    /// after every seek.
    pub fn tick(&mut self, t_ms: f64, timeline: &Timeline, playing: bool) -> Vec<AudioCommand> {
        let mut out = Vec::new();

        let active = if playing { timeline.slide_at(t_ms) } else { None };
        let Some(slide) = active else {
            // Paused, or past the end of the run.
            self.stop_narration(&mut out);
            self.stop_music(&mut out);
            return out;
        };

        if self.has_music && !self.music_playing {
            let offset = if self.music_duration_secs > 0.0 {
                (t_ms / 1000.0) % self.music_duration_secs
            } else {
                0.0
            };
            out.push(AudioCommand::StartMusic {
                offset_secs: offset,
                gain: MUSIC_GAIN,
            });
            self.music_playing = true;
        }

        let timing = timeline.phases()[slide];
        let phase = timing.phase_at(t_ms);
        if self.last_slide != Some(slide) {
            self.last_tick_cue = None;
            self.last_slide = Some(slide);
        }

        match phase {
            Phase::Reading => {
                self.end_cue_fired = None;
                if self.clips.get(slide).is_some_and(|c| c.question) {
                    self.start_narration(
                        &mut out,
                        slide,
                        Utterance::Question,
                        (t_ms - timing.start as f64) / 1000.0,
                    );
                } else {
                    self.stop_narration(&mut out);
                }
            }
            Phase::Thinking => {
                self.end_cue_fired = None;
                self.stop_narration(&mut out);
                let seconds_left = timing.view(t_ms).time_left_secs;
                if self.sfx_enabled
                    && self.has_cue
                    && seconds_left > 0
                    && self.last_tick_cue != Some((slide, seconds_left))
                {
                    out.push(AudioCommand::PlayTickCue { seconds_left });
                    self.last_tick_cue = Some((slide, seconds_left));
                }
            }
            Phase::Revealing => {
                if self.end_cue_fired != Some(slide) {
                    if self.sfx_enabled && self.has_cue {
                        out.push(AudioCommand::PlayEndCue);
                    }
                    self.end_cue_fired = Some(slide);
                }
                if self.clips.get(slide).is_some_and(|c| c.answer) {
                    self.start_narration(
                        &mut out,
                        slide,
                        Utterance::Answer,
                        (t_ms - timing.reveal_start as f64) / 1000.0,
                    );
                } else {
                    self.stop_narration(&mut out);
                }
            }
        }

        out
    }

    fn start_narration(
        &mut self,
        out: &mut Vec<AudioCommand>,
        slide: usize,
        utterance: Utterance,
        offset_secs: f64,
    ) {
        if self.sounding == Some((slide, utterance)) {
            return;
        }
        self.stop_narration(out);
        out.push(AudioCommand::StartNarration {
            slide,
            utterance,
            offset_secs: offset_secs.max(0.0),
        });
        self.sounding = Some((slide, utterance));
    }

    fn stop_narration(&mut self, out: &mut Vec<AudioCommand>) {
        if self.sounding.take().is_some() {
            out.push(AudioCommand::StopNarration);
        }
    }

    fn stop_music(&mut self, out: &mut Vec<AudioCommand>) {
        if self.music_playing {
            out.push(AudioCommand::StopMusic);
            self.music_playing = false;
        }
    }
}
