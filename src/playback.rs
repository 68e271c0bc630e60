//! Playback clock: a playhead in milliseconds plus a playing flag. The clock
//! never reads wall time itself; the owner feeds it elapsed deltas, which
//! keeps interactive playback and deterministic tests on the same code path.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackClock {
    position_ms: f64,
    playing: bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            position_ms: 0.0,
            playing: false,
        }
    }

    pub fn position_ms(&self) -> f64 {
        self.position_ms
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_finished(&self, total_ms: u64) -> bool {
        total_ms > 0 && self.position_ms >= total_ms as f64
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
    }

    /// Jump the playhead, clamped into `[0, total_ms]`. Seeking does not
    /// change the playing flag.
    pub fn seek(&mut self, t_ms: f64, total_ms: u64) {
        self.position_ms = t_ms.clamp(0.0, total_ms as f64);
    }

    /// Rewind to zero and stop. Resuming is an explicit `play`.
    pub fn reset(&mut self) {
        self.position_ms = 0.0;
        self.playing = false;
    }

    /// Advance by an elapsed delta while playing. Reaching the end pins the
    /// playhead at `total_ms` and stops; returns true when that stop just
    /// happened.
    pub fn advance(&mut self, dt_ms: f64, total_ms: u64) -> bool {
        if !self.playing || dt_ms <= 0.0 {
            return false;
        }
        self.position_ms += dt_ms;
        if self.position_ms >= total_ms as f64 {
            self.position_ms = total_ms as f64;
            self.playing = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_only_moves_while_playing() {
        let mut clock = PlaybackClock::new();
        clock.advance(100.0, 10_000);
        assert_eq!(clock.position_ms(), 0.0);

        clock.play();
        clock.advance(100.0, 10_000);
        assert_eq!(clock.position_ms(), 100.0);

        clock.pause();
        clock.advance(100.0, 10_000);
        assert_eq!(clock.position_ms(), 100.0);
    }

    #[test]
    fn reaching_the_end_pins_and_stops() {
        let mut clock = PlaybackClock::new();
        clock.play();
        assert!(!clock.advance(900.0, 1000));
        assert!(clock.advance(500.0, 1000));
        assert_eq!(clock.position_ms(), 1000.0);
        assert!(!clock.is_playing());
        assert!(clock.is_finished(1000));

        // A further advance is inert.
        assert!(!clock.advance(100.0, 1000));
        assert_eq!(clock.position_ms(), 1000.0);
    }

    #[test]
    fn seek_clamps_into_range_and_keeps_play_state() {
        let mut clock = PlaybackClock::new();
        clock.play();
        clock.seek(-50.0, 1000);
        assert_eq!(clock.position_ms(), 0.0);
        clock.seek(5000.0, 1000);
        assert_eq!(clock.position_ms(), 1000.0);
        assert!(clock.is_playing());
    }

    #[test]
    fn reset_rewinds_and_stops() {
        let mut clock = PlaybackClock::new();
        clock.play();
        clock.advance(400.0, 1000);
        clock.reset();
        assert_eq!(clock.position_ms(), 0.0);
        assert!(!clock.is_playing());
    }
}
