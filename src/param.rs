// src/param.rs
//
// Automatable parameter (gain envelopes, fades).
//
// Times are absolute context seconds. Ramps queue back to back: each new
// ramp starts from where the previous one ends.

use std::collections::VecDeque;

/// Smallest value an exponential ramp may touch.
const EXP_FLOOR: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    pub start: f64,
    pub end: f64,
    pub from: f32,
    pub to: f32,
    pub curve: Curve,
}

impl Ramp {
    #[inline]
    fn value_at(&self, time: f64) -> f32 {
        let span = self.end - self.start;
        if span <= 0.0 {
            return self.to;
        }
        let t = ((time - self.start) / span).clamp(0.0, 1.0) as f32;
        match self.curve {
            Curve::Linear => self.from + (self.to - self.from) * t,
            Curve::Exponential => {
                let from = self.from.max(EXP_FLOOR);
                let to = self.to.max(EXP_FLOOR);
                from * (to / from).powf(t)
            }
        }
    }
}

/// Automation change sent across the bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    /// Jump to a value now, dropping any pending ramps.
    Set(f32),
    /// Freeze at the current value, then ramp to `target` over `[start, end]`.
    RampFromCurrent {
        target: f32,
        start: f64,
        end: f64,
        curve: Curve,
    },
}

/// A scalar parameter with a queue of scheduled ramps.
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f32,
    ramps: VecDeque<Ramp>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            ramps: VecDeque::new(),
        }
    }

    /// Set immediately, cancelling all ramps.
    #[inline]
    pub fn set_value(&mut self, value: f32) {
        self.ramps.clear();
        self.value = value;
    }

    /// Where the last queued ramp ends (or the current value).
    fn tail(&self) -> (f32, Option<f64>) {
        match self.ramps.back() {
            Some(r) => (r.to, Some(r.end)),
            None => (self.value, None),
        }
    }

    fn push(&mut self, target: f32, start: f64, end: f64, curve: Curve) {
        let (from, prev_end) = self.tail();
        let start = prev_end.map_or(start, |e| e.max(start));
        self.ramps.push_back(Ramp {
            start,
            end: end.max(start),
            from,
            to: target,
            curve,
        });
    }

    /// Queue a linear ramp reaching `target` at `end`.
    pub fn linear_ramp_to(&mut self, target: f32, start: f64, end: f64) {
        self.push(target, start, end, Curve::Linear);
    }

    /// Queue an exponential ramp reaching `target` at `end`.
    pub fn exponential_ramp_to(&mut self, target: f32, start: f64, end: f64) {
        self.push(target, start, end, Curve::Exponential);
    }

    /// Drop pending ramps, holding whatever value is current at `time`.
    pub fn cancel_and_hold(&mut self, time: f64) {
        self.value = self.value_at(time);
        self.ramps.clear();
    }

    pub fn apply(&mut self, automation: Automation) {
        match automation {
            Automation::Set(value) => self.set_value(value),
            Automation::RampFromCurrent {
                target,
                start,
                end,
                curve,
            } => {
                self.cancel_and_hold(start);
                self.push(target, start, end, curve);
            }
        }
    }

    /// Evaluate at `time`, retiring ramps that have finished.
    #[inline]
    pub fn value_at(&mut self, time: f64) -> f32 {
        while let Some(front) = self.ramps.front() {
            if time >= front.end {
                self.value = front.to;
                self.ramps.pop_front();
            } else {
                break;
            }
        }
        match self.ramps.front() {
            Some(ramp) if time >= ramp.start => ramp.value_at(time),
            _ => self.value,
        }
    }

    /// True once no ramps remain and the value is effectively zero.
    pub fn is_settled_silent(&self) -> bool {
        self.ramps.is_empty() && self.value.abs() < EXP_FLOOR
    }
}
