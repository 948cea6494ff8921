// src/error.rs
//
// Error taxonomy.
//
// Audio errors never reach the phase timer: every audio operation catches
// its own failure, logs it and carries on without sound.

use std::path::PathBuf;

use thiserror::Error;

use crate::assets::SoundId;
use crate::technique::Phase;

/// A technique that cannot drive a session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TechniqueError {
    #[error("technique has no phase with a positive duration")]
    NoTimedPhase,

    #[error("technique must run at least one cycle")]
    ZeroCycles,

    #[error("{phase} duration must be a finite, non-negative number of seconds (got {seconds})")]
    InvalidDuration { phase: Phase, seconds: f64 },

    #[error("unknown technique '{0}'")]
    UnknownTechnique(String),
}

/// Failures in the audio layer. Treated as "feature unavailable".
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio context is closed")]
    Closed,

    #[error("audio output unavailable: {0}")]
    Backend(String),

    #[error("could not fetch '{sound}': {source}")]
    Asset {
        sound: SoundId,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode '{sound}': {reason}")]
    Decode { sound: SoundId, reason: String },
}

/// Failures loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Technique(#[from] TechniqueError),
}
