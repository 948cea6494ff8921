//! Thread-safe bridge between the session and the audio thread.
//!
//! - **Control side** owns [`AudioContext`] (shared by every audio component)
//! - **Audio thread** owns [`Renderer`] with the [`Engine`]
//! - Communication uses an MPSC channel for commands and atomics for readback
//!
//! ```ignore
//! let (context, mut renderer) = create_context(48_000.0, 512);
//!
//! // Control side: schedule
//! let id = context.add_voice(voice)?;
//! context.stop_at(id, context.current_time() + 1.0);
//!
//! // Audio thread: drain commands and render
//! renderer.render(&mut interleaved);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
    mpsc::{self, Receiver, Sender, TryRecvError},
};

use log::debug;

use crate::command::{Command, VoiceId};
use crate::engine::Engine;
use crate::error::AudioError;
use crate::graph::Voice;
use crate::param::{Automation, Curve};

/// Length of the ramp `release` applies before a voice is dropped.
pub const DECLICK_SECS: f64 = 0.01;

/// Lifecycle of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

impl ContextState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ContextState::Running,
            2 => ContextState::Closed,
            _ => ContextState::Suspended,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ContextState::Suspended => 0,
            ContextState::Running => 1,
            ContextState::Closed => 2,
        }
    }
}

/// Lock-free shared state for engine -> control readback.
struct SharedReadback {
    sample_position: AtomicU64,
    active_voices: AtomicU64,
    /// Requested [`ContextState`], written by the control side.
    state: AtomicU8,
}

impl SharedReadback {
    fn new() -> Self {
        Self {
            sample_position: AtomicU64::new(0),
            active_voices: AtomicU64::new(0),
            state: AtomicU8::new(ContextState::Suspended.as_u8()),
        }
    }
}

/// Create a linked context/renderer pair. The context starts suspended.
pub fn create_context(sample_rate: f64, max_block: usize) -> (AudioContext, Renderer) {
    let (command_tx, command_rx) = mpsc::channel();
    let readback = Arc::new(SharedReadback::new());

    let context = AudioContext {
        command_tx,
        readback: Arc::clone(&readback),
        next_voice: AtomicU64::new(1),
        sample_rate,
    };

    let renderer = Renderer {
        engine: Engine::new(sample_rate, max_block),
        command_rx,
        readback,
    };

    (context, renderer)
}

// ═══════════════════════════════════════════════════════════════════
// AudioContext - control side
// ═══════════════════════════════════════════════════════════════════

/// Control handle for one audio context.
///
/// All methods schedule work on the audio thread and return immediately.
pub struct AudioContext {
    command_tx: Sender<Command>,
    readback: Arc<SharedReadback>,
    next_voice: AtomicU64,
    sample_rate: f64,
}

impl AudioContext {
    fn send(&self, cmd: Command) {
        // A dropped renderer means the output is gone; nothing to schedule.
        if self.command_tx.send(cmd).is_err() {
            debug!("audio renderer gone, command dropped");
        }
    }

    /// Context time in seconds, as last published by the renderer.
    pub fn current_time(&self) -> f64 {
        self.readback.sample_position.load(Ordering::Acquire) as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.readback.state.load(Ordering::Acquire))
    }

    pub fn active_voices(&self) -> usize {
        self.readback.active_voices.load(Ordering::Relaxed) as usize
    }

    pub fn resume(&self) {
        if self.state() == ContextState::Suspended {
            self.readback
                .state
                .store(ContextState::Running.as_u8(), Ordering::Release);
            self.send(Command::Resume);
        }
    }

    pub fn suspend(&self) {
        if self.state() == ContextState::Running {
            self.readback
                .state
                .store(ContextState::Suspended.as_u8(), Ordering::Release);
            self.send(Command::Suspend);
        }
    }

    /// Close the context. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let previous = self
            .readback
            .state
            .swap(ContextState::Closed.as_u8(), Ordering::AcqRel);
        if ContextState::from_u8(previous) == ContextState::Closed {
            return false;
        }
        self.send(Command::Close);
        true
    }

    /// Hand a voice to the audio thread.
    pub fn add_voice(&self, voice: Voice) -> Result<VoiceId, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        let id = self.next_voice.fetch_add(1, Ordering::Relaxed);
        self.send(Command::AddVoice { id, voice });
        Ok(id)
    }

    pub fn automate(&self, id: VoiceId, automation: Automation) {
        self.send(Command::Automate { id, automation });
    }

    pub fn set_param(&self, id: VoiceId, param_id: u32, value: f32) {
        self.send(Command::SetParam {
            id,
            param_id,
            value,
        });
    }

    pub fn stop_at(&self, id: VoiceId, time: f64) {
        self.send(Command::StopAt { id, time });
    }

    pub fn remove(&self, id: VoiceId) {
        self.send(Command::Remove { id });
    }

    /// Ramp a voice to silence over [`DECLICK_SECS`], then drop it.
    /// Use instead of `remove` for anything that may still be audible.
    pub fn release(&self, id: VoiceId) {
        let now = self.current_time();
        let end = now + DECLICK_SECS;
        self.automate(
            id,
            Automation::RampFromCurrent {
                target: 0.0,
                start: now,
                end,
                curve: Curve::Linear,
            },
        );
        self.stop_at(id, end);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Renderer - audio thread
// ═══════════════════════════════════════════════════════════════════

/// Audio-thread side of a context.
pub struct Renderer {
    engine: Engine,
    command_rx: Receiver<Command>,
    readback: Arc<SharedReadback>,
}

impl Renderer {
    /// Apply every pending command.
    pub fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.engine.apply(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Control side dropped without closing.
                    if !self.engine.is_closed() {
                        self.engine.apply(Command::Close);
                    }
                    break;
                }
            }
        }
    }

    /// Drain commands, fill an interleaved stereo slice, publish readback.
    pub fn render(&mut self, out: &mut [f32]) {
        self.process_commands();
        self.engine.render(out);
        self.readback
            .sample_position
            .store(self.engine.sample_position(), Ordering::Release);
        self.readback
            .active_voices
            .store(self.engine.active_voices() as u64, Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> f64 {
        self.engine.sample_rate()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
