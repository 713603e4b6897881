//! Audio engine for phosphor - decoding, transport, and output state
//!
//! This crate provides the playback half of the application:
//! - Decoder: encoded bytes to a stereo f32 sample buffer
//! - Transport: play/pause/stop state machine over the audio clock
//! - EngineState: per-callback rendering, analysis feed, master volume
//! - AudioEngine: the control handle the host shell talks to

mod decoder;
mod engine;
mod transport;

pub use decoder::{decode_bytes, decode_file, DecodeError, Track};
pub use engine::{AudioEngine, AudioEvent, EngineState, TransportStatus};
pub use transport::{PlaybackState, Transport};
