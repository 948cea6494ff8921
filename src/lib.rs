// src/lib.rs
//
// Breathwork session engine: a drift-corrected phase timer driving ambient
// loops, binaural tones and transition chimes.

mod audio_buffer;
mod command;
mod engine;
mod graph;
mod node;
mod nodes;

pub mod ambient;
pub mod assets;
pub mod binaural;
pub mod bridge;
pub mod chime;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod event;
pub mod host;
pub mod output;
pub mod param;
pub mod technique;
pub mod timer;

// Re-export key types for Rust consumers
pub use ambient::{AmbientMixer, AmbientState, LoadedSound, PendingLoad};
pub use assets::{AssetSource, FileAssets, MemoryAssets, SoundId};
pub use binaural::{BinauralGenerator, BinauralState, BrainwavePreset};
pub use bridge::{AudioContext, ContextState};
pub use chime::ChimeScheduler;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::EngineConfig;
pub use coordinator::SessionCoordinator;
pub use driver::{SessionCommand, SessionHandle, SessionSnapshot, spawn_session};
pub use error::{AudioError, ConfigError, TechniqueError};
pub use event::TimerEvent;
pub use host::{AudioGraphHost, HostLease};
pub use output::{NoOutput, OfflineOutput, OutputBackend};
pub use technique::{Phase, Technique};
pub use timer::{PhaseTimer, SessionState};

#[cfg(feature = "device")]
pub use output::DeviceOutput;
