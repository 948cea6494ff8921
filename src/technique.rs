// src/technique.rs
//
// Breathing techniques: four phase durations plus a cycle count.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TechniqueError;

/// One step of a breathing cycle, in cyclic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Inhale,
    HoldIn,
    Exhale,
    HoldOut,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Inhale, Phase::HoldIn, Phase::Exhale, Phase::HoldOut];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Wraps modulo 4.
    pub fn from_index(index: usize) -> Phase {
        Phase::ALL[index % 4]
    }

    pub fn next(self) -> Phase {
        Phase::from_index(self.index() + 1)
    }

    /// Tone used for the transition chime into this phase.
    pub fn chime_frequency(self) -> f32 {
        match self {
            Phase::Inhale => 523.25,
            Phase::HoldIn => 659.25,
            Phase::Exhale => 392.0,
            Phase::HoldOut => 440.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Inhale => "inhale",
            Phase::HoldIn => "holdIn",
            Phase::Exhale => "exhale",
            Phase::HoldOut => "holdOut",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated technique. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technique {
    durations: [Duration; 4],
    cycles: u32,
}

impl Technique {
    /// Build from seconds. At least one phase must be timed.
    pub fn new(durations_secs: [f64; 4], cycles: u32) -> Result<Self, TechniqueError> {
        if cycles == 0 {
            return Err(TechniqueError::ZeroCycles);
        }

        let mut durations = [Duration::ZERO; 4];
        for (phase, (&seconds, slot)) in Phase::ALL
            .into_iter()
            .zip(durations_secs.iter().zip(durations.iter_mut()))
        {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(TechniqueError::InvalidDuration { phase, seconds });
            }
            *slot = Duration::try_from_secs_f64(seconds)
                .map_err(|_| TechniqueError::InvalidDuration { phase, seconds })?;
        }

        if durations.iter().all(Duration::is_zero) {
            return Err(TechniqueError::NoTimedPhase);
        }
        Ok(Self { durations, cycles })
    }

    /// A built-in technique by name (case-insensitive).
    pub fn preset(name: &str) -> Result<Self, TechniqueError> {
        let name = name.trim();
        PRESETS
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TechniqueError::UnknownTechnique(name.to_string()))
            .and_then(|p| Technique::new(p.durations, p.cycles))
    }

    pub fn presets() -> &'static [TechniquePreset] {
        PRESETS
    }

    pub fn duration(&self, phase: Phase) -> Duration {
        self.durations[phase.index()]
    }

    pub fn durations(&self) -> [Duration; 4] {
        self.durations
    }

    pub fn duration_secs(&self) -> [f64; 4] {
        self.durations.map(|d| d.as_secs_f64())
    }

    pub fn total_cycles(&self) -> u32 {
        self.cycles
    }

    /// Length of one full cycle.
    pub fn cycle_length(&self) -> Duration {
        self.durations.iter().sum()
    }

    pub fn session_length(&self) -> Duration {
        self.cycle_length() * self.cycles
    }
}

/// Named entry in the built-in catalog.
#[derive(Debug, Clone, Copy)]
pub struct TechniquePreset {
    pub name: &'static str,
    pub label: &'static str,
    pub durations: [f64; 4],
    pub cycles: u32,
}

const PRESETS: &[TechniquePreset] = &[
    TechniquePreset {
        name: "box",
        label: "Box breathing",
        durations: [4.0, 4.0, 4.0, 4.0],
        cycles: 4,
    },
    TechniquePreset {
        name: "relaxing",
        label: "4-7-8 relaxing breath",
        durations: [4.0, 7.0, 8.0, 0.0],
        cycles: 4,
    },
    TechniquePreset {
        name: "coherent",
        label: "Coherent breathing",
        durations: [5.0, 0.0, 5.0, 0.0],
        cycles: 6,
    },
    TechniquePreset {
        name: "calm",
        label: "Calming breath",
        durations: [4.0, 0.0, 6.0, 0.0],
        cycles: 6,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_cycle_in_order() {
        assert_eq!(Phase::Inhale.next(), Phase::HoldIn);
        assert_eq!(Phase::HoldOut.next(), Phase::Inhale);
        assert_eq!(Phase::from_index(6), Phase::Exhale);
        assert_eq!(Phase::HoldIn.to_string(), "holdIn");
    }

    #[test]
    fn validation() {
        assert_eq!(
            Technique::new([0.0; 4], 3),
            Err(TechniqueError::NoTimedPhase)
        );
        assert_eq!(
            Technique::new([4.0, 0.0, 4.0, 0.0], 0),
            Err(TechniqueError::ZeroCycles)
        );
        assert!(matches!(
            Technique::new([4.0, -1.0, 4.0, 0.0], 1),
            Err(TechniqueError::InvalidDuration { phase: Phase::HoldIn, .. })
        ));
        assert!(matches!(
            Technique::new([f64::NAN, 1.0, 1.0, 1.0], 1),
            Err(TechniqueError::InvalidDuration { phase: Phase::Inhale, .. })
        ));
    }

    #[test]
    fn built_ins_are_valid() {
        for preset in Technique::presets() {
            let technique = Technique::preset(preset.name).unwrap();
            assert_eq!(technique.total_cycles(), preset.cycles);
        }

        let relaxing = Technique::preset("Relaxing").unwrap();
        assert_eq!(relaxing.duration(Phase::HoldIn), Duration::from_secs(7));
        assert_eq!(relaxing.cycle_length(), Duration::from_secs(19));
        assert_eq!(relaxing.session_length(), Duration::from_secs(76));

        assert_eq!(
            Technique::preset("square"),
            Err(TechniqueError::UnknownTechnique("square".into()))
        );
    }

    #[test]
    fn fractional_seconds_survive() {
        let technique = Technique::new([1.5, 0.25, 2.0, 0.0], 1).unwrap();
        assert_eq!(technique.duration(Phase::HoldIn), Duration::from_millis(250));
        assert_eq!(technique.duration_secs(), [1.5, 0.25, 2.0, 0.0]);
    }
}
