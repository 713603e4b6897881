//! Playback transport - the state machine over the audio clock

use crate::decoder::Track;

/// Playback state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not playing, offset reset to zero
    #[default]
    Stopped,
    /// Audibly running against the clock
    Playing,
    /// Not playing, offset retained for resume
    Paused,
}

/// Transport state machine.
///
/// All timing is in frames of the audio clock, which the caller owns and
/// advances (the output callback, or a test loop). While Playing the offset
/// into the track is always derived as `clock - start_reference`, never
/// stored; only Paused and Stopped keep an explicit offset.
pub struct Transport {
    track: Option<Track>,
    state: PlaybackState,
    /// Offset into the track in frames; authoritative while not Playing.
    /// May exceed the track length after playing past the end; play()
    /// normalizes it modulo the track length.
    paused_offset: i64,
    /// Clock frame at which offset zero started; meaningful while Playing
    start_reference: i64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self {
            track: None,
            state: PlaybackState::Stopped,
            paused_offset: 0,
            start_reference: 0,
        }
    }

    /// Replace the current track. Playback halts first and the offset
    /// resets; the new track sits at the top, Stopped.
    pub fn install(&mut self, track: Track) {
        self.stop();
        self.track = Some(track);
    }

    /// Drop the current track and halt. Used when a new load begins,
    /// before its decode has produced anything.
    pub fn clear(&mut self) {
        self.stop();
        self.track = None;
    }

    /// Whether a track is installed
    pub fn is_loaded(&self) -> bool {
        self.track.is_some()
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The installed track, if any
    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Start or resume playback.
    ///
    /// No-op while already Playing or with no track. The stored offset is
    /// normalized modulo the track length, so an offset left beyond the end
    /// by a previous pause wraps around instead of pointing past the data.
    pub fn play(&mut self, clock: i64) {
        if self.state == PlaybackState::Playing || !self.is_loaded() {
            return;
        }
        let frames = self.track_frames();
        let offset = if frames > 0 {
            self.paused_offset.rem_euclid(frames)
        } else {
            0
        };
        self.start_reference = clock - offset;
        self.state = PlaybackState::Playing;
    }

    /// Pause playback, capturing the elapsed offset.
    ///
    /// No-op unless Playing. The captured offset is not normalized here;
    /// play() owns that, and an oversized offset is a valid resume point.
    pub fn pause(&mut self, clock: i64) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.paused_offset = clock - self.start_reference;
        self.state = PlaybackState::Paused;
    }

    /// Halt playback and reset the offset to the top.
    /// Unconditional and idempotent; stopping while already Stopped is fine.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.paused_offset = 0;
    }

    /// Toggle play/pause
    pub fn toggle(&mut self, clock: i64) {
        match self.state {
            PlaybackState::Playing => self.pause(clock),
            PlaybackState::Paused | PlaybackState::Stopped => self.play(clock),
        }
    }

    /// Jump to a position in seconds, clamped to the track bounds
    pub fn seek(&mut self, clock: i64, position_secs: f64) {
        let Some(track) = &self.track else {
            return;
        };
        let frames = self.track_frames();
        let target = (position_secs.max(0.0) * track.sample_rate as f64) as i64;
        let target = target.clamp(0, frames.saturating_sub(1).max(0));
        match self.state {
            PlaybackState::Playing => self.start_reference = clock - target,
            _ => self.paused_offset = target,
        }
    }

    /// Offset into the track in frames at the given clock.
    ///
    /// Derived while Playing, stored otherwise. Can exceed the track length
    /// once playback runs past the end; the caller renders silence there.
    pub fn offset_frames(&self, clock: i64) -> i64 {
        match self.state {
            PlaybackState::Playing => clock - self.start_reference,
            _ => self.paused_offset,
        }
    }

    /// Offset in seconds at the given clock
    pub fn position_secs(&self, clock: i64) -> f64 {
        match &self.track {
            Some(track) if track.sample_rate > 0 => {
                self.offset_frames(clock) as f64 / track.sample_rate as f64
            }
            _ => 0.0,
        }
    }

    /// Duration of the installed track in seconds, 0 when empty
    pub fn duration_secs(&self) -> f64 {
        self.track.as_ref().map_or(0.0, |t| t.duration_secs())
    }

    fn track_frames(&self) -> i64 {
        self.track.as_ref().map_or(0, |t| t.frames())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const RATE: u32 = 48000;

    /// Silent stereo track of the given length in seconds
    fn track(seconds: f64) -> Track {
        let frames = (seconds * RATE as f64) as usize;
        Track {
            samples: Arc::new(vec![0.0; frames * 2]),
            sample_rate: RATE,
            source_channels: 2,
            name: "test".into(),
        }
    }

    fn secs(frames: i64) -> f64 {
        frames as f64 / RATE as f64
    }

    #[test]
    fn test_play_without_track_is_a_no_op() {
        let mut t = Transport::new();
        t.play(1000);
        assert_eq!(t.state(), PlaybackState::Stopped);
        assert_eq!(t.offset_frames(1000), 0);
    }

    #[test]
    fn test_install_lands_stopped_at_the_top() {
        let mut t = Transport::new();
        t.install(track(2.0));
        t.play(0);
        t.pause(5000);

        t.install(track(3.0));
        assert_eq!(t.state(), PlaybackState::Stopped);
        assert_eq!(t.offset_frames(99999), 0);
        assert!((t.duration_secs() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_round_trips_the_offset() {
        let mut t = Transport::new();
        t.install(track(10.0));

        t.play(1000);
        let half_second = (RATE / 2) as i64;
        t.pause(1000 + half_second);

        assert_eq!(t.state(), PlaybackState::Paused);
        assert!((t.position_secs(1000 + half_second) - 0.5).abs() < 1e-9);

        // Resume much later; position picks up where it left off
        t.play(500_000);
        assert!((t.position_secs(500_000) - 0.5).abs() < 1e-9);
        assert!((t.position_secs(500_000 + half_second) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_play_while_playing_keeps_the_reference() {
        let mut t = Transport::new();
        t.install(track(10.0));

        t.play(0);
        t.play(24000);

        // A redundant play() must not restart or shift the timeline
        assert!((t.position_secs(24000) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pause_while_not_playing_is_a_no_op() {
        let mut t = Transport::new();
        t.install(track(4.0));

        t.pause(777);
        assert_eq!(t.state(), PlaybackState::Stopped);

        t.play(0);
        t.pause(4800);
        t.pause(20000);
        assert!((t.position_secs(20000) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_stop_resets_and_repeats_safely() {
        let mut t = Transport::new();
        t.install(track(4.0));

        t.play(0);
        t.stop();
        assert_eq!(t.state(), PlaybackState::Stopped);
        assert_eq!(t.offset_frames(12345), 0);

        // Second stop on an already-halted transport
        t.stop();
        assert_eq!(t.state(), PlaybackState::Stopped);

        // play() after stop() restarts from the top
        t.play(96000);
        assert!((t.position_secs(96000)).abs() < 1e-9);
    }

    #[test]
    fn test_offset_wraps_modulo_duration() {
        // Track of exactly 2.0s: pause at 0.5s, play 1.6s more, pause,
        // and the next play resumes at (0.5 + 1.6) mod 2.0 = 0.1s
        let mut t = Transport::new();
        t.install(track(2.0));
        let s = |x: f64| (x * RATE as f64) as i64;

        t.play(0);
        t.pause(s(0.5));
        assert!((t.position_secs(s(0.5)) - 0.5).abs() < 1e-9);

        t.play(s(0.5));
        t.pause(s(0.5) + s(1.6));
        // Recorded offset exceeds the duration and stays that way
        assert!((t.position_secs(s(2.1)) - 2.1).abs() < 1e-6);

        t.play(s(2.1));
        assert!((t.position_secs(s(2.1)) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_stale_offset_wraps_against_a_shorter_track() {
        let mut t = Transport::new();
        t.install(track(2.0));
        t.play(0);
        t.pause((2.5 * RATE as f64) as i64);

        // 2.5s is beyond the 2.0s track; resume wraps to 0.5s
        t.play(0);
        assert!((t.position_secs(0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_toggle_cycles_through_states() {
        let mut t = Transport::new();
        t.install(track(4.0));

        t.toggle(0);
        assert_eq!(t.state(), PlaybackState::Playing);
        t.toggle(4800);
        assert_eq!(t.state(), PlaybackState::Paused);
        t.toggle(9600);
        assert_eq!(t.state(), PlaybackState::Playing);
        assert!((t.position_secs(9600) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_seek_clamps_to_track_bounds() {
        let mut t = Transport::new();
        t.install(track(2.0));

        t.seek(0, -5.0);
        assert_eq!(t.offset_frames(0), 0);

        t.seek(0, 100.0);
        assert_eq!(t.offset_frames(0), 2 * RATE as i64 - 1);

        t.play(0);
        t.seek(4800, 1.0);
        assert!((t.position_secs(4800) - 1.0).abs() < 1e-9);
        assert_eq!(t.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_seek_without_track_is_a_no_op() {
        let mut t = Transport::new();
        t.seek(0, 1.0);
        assert_eq!(t.offset_frames(0), 0);
        assert_eq!(t.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_position_keeps_counting_past_the_end() {
        let mut t = Transport::new();
        t.install(track(1.0));

        t.play(0);
        let clock = (1.5 * RATE as f64) as i64;
        assert!((t.position_secs(clock) - 1.5).abs() < 1e-9);
        assert_eq!(t.state(), PlaybackState::Playing);
        assert!(secs(t.offset_frames(clock)) > t.duration_secs());
    }
}
