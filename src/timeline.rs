//! Timeline synthesis: per-slide phase boundaries on one shared millisecond
//! axis, derived once from narration durations and the configured thinking
//! time. The timeline is immutable after construction; any input change
//! rebuilds it in full.

/// Fallback duration when a slide has no question narration.
pub const QUESTION_FALLBACK_MS: u64 = 3000;
/// Fixed pause between the end of question narration and the thinking phase.
pub const POST_QUESTION_PAUSE_MS: u64 = 500;
/// Minimum reveal-phase length; a slide with no answer narration gets
/// exactly this.
pub const REVEAL_FLOOR_MS: u64 = 2000;
/// The reveal must outlast the answer narration by this much.
pub const REVEAL_TAIL_MS: u64 = 1000;
/// Length of the cross-dissolve from countdown to checkmark after reveal.
pub const REVEAL_DISSOLVE_MS: f64 = 500.0;

/// Narration durations for one slide. A missing question selects the
/// fallback; a missing answer leaves the reveal at its floor length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NarrationMs {
    pub question: Option<u64>,
    pub answer: Option<u64>,
}

/// Phase boundaries for one slide, all on the shared axis.
///
/// Invariant: `start <= thinking_start <= reveal_start <= end`, and adjacent
/// slides are contiguous (`phases[i].end == phases[i+1].start`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PhaseTiming {
    pub start: u64,
    pub question_ms: u64,
    pub thinking_start: u64,
    pub reveal_start: u64,
    /// Answer narration length, 0 when the slide has none.
    pub answer_ms: u64,
    pub end: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Thinking,
    Revealing,
}

/// The three timing quantities both layout variants consume, computed in one
/// place so layouts differ only in drawing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseView {
    pub phase: Phase,
    /// Whole seconds remaining in the thinking phase (the full thinking time
    /// while still reading, 0 once revealed).
    pub time_left_secs: u32,
    /// Countdown sweep/depletion, 0 at thinking start to 1 at reveal.
    pub progress: f64,
    /// 0..1 over the first [`REVEAL_DISSOLVE_MS`] of the reveal phase.
    pub reveal_progress: f64,
}

impl PhaseTiming {
    pub fn thinking_ms(&self) -> u64 {
        self.reveal_start - self.thinking_start
    }

    pub fn phase_at(&self, t_ms: f64) -> Phase {
        if t_ms < self.thinking_start as f64 {
            Phase::Reading
        } else if t_ms < self.reveal_start as f64 {
            Phase::Thinking
        } else {
            Phase::Revealing
        }
    }

    pub fn view(&self, t_ms: f64) -> PhaseView {
        let phase = self.phase_at(t_ms);
        let thinking_ms = self.thinking_ms() as f64;

        let (time_left_secs, progress, reveal_progress) = match phase {
            Phase::Reading => ((thinking_ms / 1000.0).ceil() as u32, 0.0, 0.0),
            Phase::Thinking => {
                let remaining = self.reveal_start as f64 - t_ms;
                let left = (remaining / 1000.0).ceil().max(0.0) as u32;
                let progress = if thinking_ms > 0.0 {
                    ((t_ms - self.thinking_start as f64) / thinking_ms).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                (left, progress, 0.0)
            }
            Phase::Revealing => {
                let dissolve =
                    ((t_ms - self.reveal_start as f64) / REVEAL_DISSOLVE_MS).clamp(0.0, 1.0);
                (0, 1.0, dissolve)
            }
        };

        PhaseView {
            phase,
            time_left_secs,
            progress,
            reveal_progress,
        }
    }
}

/// The full schedule for one run: phase boundaries for every slide plus the
/// grand total. Rebuilt whole whenever slides, narration, or thinking time
/// change; readers never see a partially built one.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    phases: Vec<PhaseTiming>,
    total_ms: u64,
}

impl Timeline {
    pub fn phases(&self) -> &[PhaseTiming] {
        &self.phases
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn slide_count(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Index of the slide whose `[start, end)` contains the playhead, or
    /// `None` once the playhead has passed the last slide's end.
    pub fn slide_at(&self, t_ms: f64) -> Option<usize> {
        if t_ms < 0.0 {
            return self.phases.first().map(|_| 0);
        }
        self.phases
            .iter()
            .position(|p| t_ms >= p.start as f64 && t_ms < p.end as f64)
    }
}

/// Compute the full schedule. Pure: depends only on its arguments, and every
/// slide's derived boundaries depend only on that slide's own durations plus
/// the shared thinking time.
pub fn build_timeline(narration: &[NarrationMs], thinking_ms: u64) -> Timeline {
    let mut phases = Vec::with_capacity(narration.len());
    let mut cursor = 0u64;

    for n in narration {
        let q = n.question.unwrap_or(QUESTION_FALLBACK_MS);
        let a = n.answer.unwrap_or(0);
        let reveal_ms = REVEAL_FLOOR_MS.max(a + REVEAL_TAIL_MS);

        let start = cursor;
        let thinking_start = start + q + POST_QUESTION_PAUSE_MS;
        let reveal_start = thinking_start + thinking_ms;
        let end = reveal_start + reveal_ms;

        phases.push(PhaseTiming {
            start,
            question_ms: q,
            thinking_start,
            reveal_start,
            answer_ms: a,
            end,
        });
        cursor = end;
    }

    Timeline {
        phases,
        total_ms: cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narration(q: Option<u64>, a: Option<u64>) -> NarrationMs {
        NarrationMs {
            question: q,
            answer: a,
        }
    }

    #[test]
    fn reference_scenario_boundaries_are_exact() {
        let tl = build_timeline(
            &[
                narration(Some(4000), Some(1500)),
                narration(Some(3000), None),
                narration(Some(5000), Some(3000)),
            ],
            5000,
        );

        let p = tl.phases();
        assert_eq!((p[0].start, p[0].thinking_start), (0, 4500));
        assert_eq!((p[0].reveal_start, p[0].end), (9500, 12000));

        assert_eq!((p[1].start, p[1].thinking_start), (12000, 15500));
        assert_eq!((p[1].reveal_start, p[1].end), (20500, 22500));

        assert_eq!((p[2].start, p[2].thinking_start), (22500, 28000));
        assert_eq!((p[2].reveal_start, p[2].end), (33000, 37000));

        assert_eq!(tl.total_ms(), 37000);
    }

    #[test]
    fn slides_are_contiguous_from_zero() {
        let tl = build_timeline(
            &[
                narration(Some(1234), Some(10)),
                narration(None, Some(4321)),
                narration(Some(999), None),
                narration(None, None),
            ],
            7000,
        );
        let p = tl.phases();
        assert_eq!(p[0].start, 0);
        for pair in p.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for t in p {
            assert!(t.start <= t.thinking_start);
            assert!(t.thinking_start <= t.reveal_start);
            assert!(t.reveal_start <= t.end);
            assert_eq!(t.thinking_start - t.start, t.question_ms + 500);
            assert_eq!(t.reveal_start - t.thinking_start, 7000);
            assert_eq!(t.end - t.reveal_start, 2000.max(t.answer_ms + 1000));
        }
        assert_eq!(tl.total_ms(), p.last().unwrap().end);
    }

    #[test]
    fn missing_answer_reveal_is_exactly_the_floor() {
        let tl = build_timeline(&[narration(Some(1000), None)], 4000);
        let p = tl.phases()[0];
        assert_eq!(p.answer_ms, 0);
        assert_eq!(p.end - p.reveal_start, REVEAL_FLOOR_MS);
    }

    #[test]
    fn rebuild_with_same_inputs_is_identical() {
        let narr = [narration(Some(2500), None), narration(None, Some(800))];
        assert_eq!(build_timeline(&narr, 4000), build_timeline(&narr, 4000));
    }

    #[test]
    fn empty_input_yields_empty_timeline() {
        let tl = build_timeline(&[], 5000);
        assert!(tl.is_empty());
        assert_eq!(tl.total_ms(), 0);
        assert_eq!(tl.slide_at(0.0), None);
    }

    #[test]
    fn slide_at_uses_half_open_ranges() {
        let tl = build_timeline(&[narration(Some(1000), None); 2], 5000);
        let first_end = tl.phases()[0].end as f64;
        assert_eq!(tl.slide_at(0.0), Some(0));
        assert_eq!(tl.slide_at(first_end - 0.5), Some(0));
        assert_eq!(tl.slide_at(first_end), Some(1));
        assert_eq!(tl.slide_at(tl.total_ms() as f64), None);
    }

    #[test]
    fn view_quantities_track_the_phases() {
        let tl = build_timeline(&[narration(Some(2000), Some(1000))], 5000);
        let p = tl.phases()[0];

        let reading = p.view(100.0);
        assert_eq!(reading.phase, Phase::Reading);
        assert_eq!(reading.time_left_secs, 5);
        assert_eq!(reading.progress, 0.0);

        let entry = p.view(p.thinking_start as f64);
        assert_eq!(entry.phase, Phase::Thinking);
        assert_eq!(entry.time_left_secs, 5);

        let mid = p.view(p.thinking_start as f64 + 2500.0);
        assert_eq!(mid.time_left_secs, 3);
        assert!((mid.progress - 0.5).abs() < 1e-9);

        let reveal = p.view(p.reveal_start as f64 + 250.0);
        assert_eq!(reveal.phase, Phase::Revealing);
        assert_eq!(reveal.time_left_secs, 0);
        assert_eq!(reveal.progress, 1.0);
        assert!((reveal.reveal_progress - 0.5).abs() < 1e-9);

        let settled = p.view(p.reveal_start as f64 + 800.0);
        assert_eq!(settled.reveal_progress, 1.0);
    }
}
