// src/command.rs
//
// Commands sent from the control side to the audio thread.
//
// Everything a component does to the mix (start a voice, fade it, retune
// it, schedule its release) is one of these. The control side never
// touches the voice graph directly.

use crate::graph::Voice;
use crate::param::Automation;

/// Identifies one voice in the mix for its whole lifetime.
pub type VoiceId = u64;

pub enum Command {
    // ═══════════════════════════════════════════════════════════════
    // Voice lifecycle
    // ═══════════════════════════════════════════════════════════════
    /// Insert a voice. Its node is prepared on arrival.
    AddVoice { id: VoiceId, voice: Voice },

    /// Release the voice once context time reaches `time`.
    StopAt { id: VoiceId, time: f64 },

    /// Release the voice now.
    Remove { id: VoiceId },

    // ═══════════════════════════════════════════════════════════════
    // Parameters
    // ═══════════════════════════════════════════════════════════════
    /// Change the voice's gain automation.
    Automate { id: VoiceId, automation: Automation },

    /// Set a node parameter (e.g. oscillator frequency).
    SetParam {
        id: VoiceId,
        param_id: u32,
        value: f32,
    },

    // ═══════════════════════════════════════════════════════════════
    // Context
    // ═══════════════════════════════════════════════════════════════
    Suspend,
    Resume,
    Close,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::AddVoice { id, .. } => write!(f, "AddVoice({id})"),
            Command::StopAt { id, time } => write!(f, "StopAt({id}, {time:.3})"),
            Command::Remove { id } => write!(f, "Remove({id})"),
            Command::Automate { id, automation } => write!(f, "Automate({id}, {automation:?})"),
            Command::SetParam {
                id,
                param_id,
                value,
            } => write!(f, "SetParam({id}, {param_id}, {value})"),
            Command::Suspend => f.write_str("Suspend"),
            Command::Resume => f.write_str("Resume"),
            Command::Close => f.write_str("Close"),
        }
    }
}
