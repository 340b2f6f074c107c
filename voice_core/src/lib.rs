//! Voice library metadata and the neural engine boundary.
//!
//! The TTS/VC model itself is a black box behind [`engine::SynthesisEngine`]
//! and [`engine::VoiceConverter`]; this crate only knows how to find voices
//! and how to hand audio across the process boundary.

pub mod engine;
pub mod library;

pub use engine::{CommandEngine, EngineError, EngineParams, SynthesisEngine, VoiceConverter};
pub use library::{VoiceEntry, VoiceLibrary};
