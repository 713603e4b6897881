//! Engine state driven by the output callback, plus its control handle

use crate::decoder::{self, DecodeError, Track};
use crate::transport::{PlaybackState, Transport};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use phosphor_analysis::TapFeed;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

/// Events sent from the engine to the host shell
#[derive(Debug, Clone)]
pub enum AudioEvent {
    /// A decode finished and its track is installed, Stopped, at the top
    TrackLoaded { name: String, duration_secs: f64 },
    /// A decode failed; the transport is Stopped with no track
    LoadFailed { message: String },
}

/// Snapshot of the observable engine state.
///
/// Produced under the engine lock, so a snapshot taken right after a
/// transition already reflects it.
#[derive(Debug, Clone, Default)]
pub struct TransportStatus {
    pub state: PlaybackState,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub track_name: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub volume: f32,
}

impl TransportStatus {
    /// Convenience for hosts that only care about the binary question
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// Maximum frames per callback the mono scratch buffer is pre-sized for
const MAX_BUFFER_FRAMES: usize = 2048;

/// Event channel capacity; load completions are rare, this is headroom
const EVENT_BUFFER: usize = 64;

/// Engine state held behind the shared mutex.
///
/// The output callback drives process(); everything else goes through the
/// [`AudioEngine`] handle, which takes the same lock for every transition.
pub struct EngineState {
    transport: Transport,
    feed: TapFeed,
    sample_rate: u32,
    /// Frames the output stream has consumed since startup. Advances every
    /// callback in every state; the only drift-free timing reference.
    clock_frames: i64,
    /// Master volume target
    volume: f32,
    /// Smoothed master volume (interpolates toward volume to prevent clicks)
    smoothed_volume: f32,
    is_loading: bool,
    /// Bumped per load; a stale decode result is discarded by generation
    load_generation: u64,
    error: Option<String>,
    /// Pre-allocated mono mix buffer to avoid allocation in process()
    mono_buffer: Vec<f32>,
}

impl EngineState {
    /// Smoothing coefficient for master volume (~5ms at 48kHz)
    const VOLUME_SMOOTH_COEFF: f32 = 0.995;

    pub fn new(sample_rate: u32, feed: TapFeed) -> Self {
        Self {
            transport: Transport::new(),
            feed,
            sample_rate,
            clock_frames: 0,
            volume: 1.0,
            smoothed_volume: 1.0,
            is_loading: false,
            load_generation: 0,
            error: None,
            mono_buffer: vec![0.0; MAX_BUFFER_FRAMES],
        }
    }

    /// Render one output buffer of interleaved stereo.
    ///
    /// Always runs to completion: silence when not Playing or past the end
    /// of the track, the pre-volume mono mix into the analysis feed, the
    /// smoothed volume stage, and the clock advance.
    pub fn process(&mut self, output: &mut [f32]) {
        let frames = output.len() / 2;

        self.render(output);

        // The tap observes the signal before the volume stage
        if frames > self.mono_buffer.len() {
            self.mono_buffer.resize(frames, 0.0);
        }
        for (i, frame) in output.chunks_exact(2).enumerate() {
            self.mono_buffer[i] = (frame[0] + frame[1]) * 0.5;
        }
        self.feed.push(&self.mono_buffer[..frames]);

        // Smoothed master volume, per frame, to prevent clicks
        for frame in output.chunks_exact_mut(2) {
            self.smoothed_volume = Self::VOLUME_SMOOTH_COEFF * self.smoothed_volume
                + (1.0 - Self::VOLUME_SMOOTH_COEFF) * self.volume;
            frame[0] *= self.smoothed_volume;
            frame[1] *= self.smoothed_volume;
        }

        self.clock_frames += frames as i64;
    }

    fn render(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if self.transport.state() != PlaybackState::Playing {
            return;
        }
        let Some(track) = self.transport.track() else {
            return;
        };
        let track_frames = track.frames();
        let samples = &track.samples;
        let offset = self.transport.offset_frames(self.clock_frames);

        for (i, frame) in output.chunks_exact_mut(2).enumerate() {
            let pos = offset + i as i64;
            // Past either end of the track the output stays silent
            if pos < 0 || pos >= track_frames {
                continue;
            }
            let idx = pos as usize * 2;
            frame[0] = samples[idx];
            frame[1] = samples[idx + 1];
        }
    }

    pub fn play(&mut self) {
        self.transport.play(self.clock_frames);
    }

    pub fn pause(&mut self) {
        self.transport.pause(self.clock_frames);
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn toggle(&mut self) {
        self.transport.toggle(self.clock_frames);
    }

    pub fn seek(&mut self, position_secs: f64) {
        self.transport.seek(self.clock_frames, position_secs);
    }

    /// Set the master volume target (0.0 to 2.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 2.0);
    }

    /// Install a decoded track directly, bypassing the async load path.
    /// Lands Stopped at the top with any previous error cleared.
    pub fn install_track(&mut self, track: Track) {
        self.error = None;
        self.is_loading = false;
        self.transport.install(track);
    }

    /// Begin a load: halt playback, discard the old track, mark loading.
    /// Returns the generation the eventual completion must present.
    pub fn begin_load(&mut self) -> u64 {
        self.transport.clear();
        self.is_loading = true;
        self.error = None;
        self.load_generation += 1;
        self.load_generation
    }

    /// Complete a load started with [`begin_load`](Self::begin_load).
    ///
    /// A result from a superseded generation is dropped without effect.
    /// Returns the event the host should see, if any.
    pub fn finish_load(
        &mut self,
        generation: u64,
        result: Result<Track, DecodeError>,
    ) -> Option<AudioEvent> {
        if generation != self.load_generation {
            return None;
        }
        self.is_loading = false;
        match result {
            Ok(track) => {
                let name = track.name.clone();
                let duration_secs = track.duration_secs();
                self.transport.install(track);
                Some(AudioEvent::TrackLoaded {
                    name,
                    duration_secs,
                })
            }
            Err(e) => {
                let message = e.to_string();
                self.error = Some(message.clone());
                self.transport.clear();
                Some(AudioEvent::LoadFailed { message })
            }
        }
    }

    /// Observable state snapshot
    pub fn status(&self) -> TransportStatus {
        TransportStatus {
            state: self.transport.state(),
            position_secs: self.transport.position_secs(self.clock_frames),
            duration_secs: self.transport.duration_secs(),
            track_name: self.transport.track().map(|t| t.name.clone()),
            is_loading: self.is_loading,
            error: self.error.clone(),
            volume: self.volume,
        }
    }
}

/// Handle to the engine for the host shell.
///
/// Transitions lock the shared state directly, so the observable status is
/// already updated when the call returns. The output callback holds the
/// lock only through try_lock and never waits on it.
pub struct AudioEngine {
    state: Arc<Mutex<EngineState>>,
    sample_rate: u32,
    event_tx: Sender<AudioEvent>,
    event_rx: Receiver<AudioEvent>,
    shutdown: Arc<AtomicBool>,
}

impl AudioEngine {
    pub fn new(sample_rate: u32, feed: TapFeed) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_BUFFER);
        Self {
            state: Arc::new(Mutex::new(EngineState::new(sample_rate, feed))),
            sample_rate,
            event_tx,
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared state for the output callback
    pub fn callback_state(&self) -> Arc<Mutex<EngineState>> {
        Arc::clone(&self.state)
    }

    /// The sample rate the engine renders and decodes at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn play(&self) {
        self.state.lock().play();
    }

    pub fn pause(&self) {
        self.state.lock().pause();
    }

    pub fn stop(&self) {
        self.state.lock().stop();
    }

    pub fn toggle(&self) {
        self.state.lock().toggle();
    }

    pub fn seek(&self, position_secs: f64) {
        self.state.lock().seek(position_secs);
    }

    pub fn set_volume(&self, volume: f32) {
        self.state.lock().set_volume(volume);
    }

    /// Nudge the master volume by a delta
    pub fn adjust_volume(&self, delta: f32) {
        let mut state = self.state.lock();
        let volume = state.status().volume;
        state.set_volume(volume + delta);
    }

    /// Observable state snapshot
    pub fn status(&self) -> TransportStatus {
        self.state.lock().status()
    }

    /// Load a track from disk on a worker thread.
    ///
    /// Playback halts and the old track is gone before this returns; the
    /// decode result arrives later as an [`AudioEvent`].
    pub fn load(&self, path: PathBuf) {
        let generation = self.state.lock().begin_load();
        info!(path = %path.display(), "loading track");

        let state = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();
        let sample_rate = self.sample_rate;
        thread::spawn(move || {
            let result = decoder::decode_file(&path, sample_rate);
            if let Err(e) = &result {
                warn!(error = %e, "track load failed");
            }
            if let Some(event) = state.lock().finish_load(generation, result) {
                let _ = event_tx.try_send(event);
            }
        });
    }

    /// Load a track from an in-memory encoded byte buffer.
    /// Same contract as [`load`](Self::load).
    pub fn load_bytes(&self, bytes: Vec<u8>, hint_ext: Option<String>, name: String) {
        let generation = self.state.lock().begin_load();
        info!(name = %name, bytes = bytes.len(), "loading track from bytes");

        let state = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();
        let sample_rate = self.sample_rate;
        thread::spawn(move || {
            let result = decoder::decode_bytes(bytes, hint_ext.as_deref(), name, sample_rate);
            if let Err(e) = &result {
                warn!(error = %e, "track load failed");
            }
            if let Some(event) = state.lock().finish_load(generation, result) {
                let _ = event_tx.try_send(event);
            }
        });
    }

    /// Receiver for load completions
    pub fn events(&self) -> &Receiver<AudioEvent> {
        &self.event_rx
    }

    /// Clone of the shutdown flag, for the thread that owns the stream
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Request shutdown; the audio thread exits and drops its stream
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
