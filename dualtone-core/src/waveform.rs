//! Waveform generator: phase (radians) → sample in [-1, 1].
//!
//! Stateless. The phase is owned by a [`PhaseAccumulator`](crate::phase::PhaseAccumulator);
//! these functions only shape it.
//!
//! The square wave exists in two flavours that must not be confused:
//! - a **bipolar** tone (`±1`) used as an audible carrier, and
//! - a **unipolar gate** (`1/0`) used to switch an isochronic carrier on and off.
//!
//! [`square`] and [`gate`] are separate functions so that no caller that
//! assumes a bipolar signal ever receives a gate.

use crate::dsp::{fast_sin, m_floor, m_sin, TAU};

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Waveform {
    #[default]
    Sine = 0,
    Square = 1,
    Triangle = 2,
    Sawtooth = 3,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [Self::Sine, Self::Square, Self::Triangle, Self::Sawtooth];

    /// Decode a stored discriminant. Unknown values fall back to sine.
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Square,
            2 => Self::Triangle,
            3 => Self::Sawtooth,
            _ => Self::Sine,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 { self as u8 }

    /// Short label used in status lines.
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::Sine => "Sine",
            Self::Square => "Sqr",
            Self::Triangle => "Tri",
            Self::Sawtooth => "Saw",
        }
    }

    /// Bipolar sample of this waveform at `phase`.
    #[inline]
    pub fn sample(self, phase: f64) -> f64 {
        match self {
            Self::Sine => sine(phase),
            Self::Square => square(phase),
            Self::Triangle => triangle(phase),
            Self::Sawtooth => sawtooth(phase),
        }
    }
}

/// How a square wave is being used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SquareRole {
    /// Audible tone, `{-1, +1}`.
    Bipolar,
    /// On/off modulation gate, `{0, 1}`.
    Gate,
}

impl SquareRole {
    #[inline]
    pub fn square(self, phase: f64) -> f64 {
        match self {
            Self::Bipolar => square(phase),
            Self::Gate => gate(phase),
        }
    }
}

#[inline]
pub fn sine(phase: f64) -> f64 {
    fast_sin(phase)
}

/// `+1` while `sin(phase) >= 0`, else `-1`.
#[inline]
pub fn square(phase: f64) -> f64 {
    if m_sin(phase) >= 0.0 { 1.0 } else { -1.0 }
}

/// `1` while `sin(phase) >= 0`, else `0` (50% duty cycle).
#[inline]
pub fn gate(phase: f64) -> f64 {
    if m_sin(phase) >= 0.0 { 1.0 } else { 0.0 }
}

/// Linear rise -1 → +1 over the first half cycle, fall +1 → -1 over the second.
#[inline]
pub fn triangle(phase: f64) -> f64 {
    let x = phase / TAU;
    if x < 0.5 { 4.0 * x - 1.0 } else { 3.0 - 4.0 * x }
}

/// Ramp from -1 at phase 0 to +1 at the end of the cycle, instantaneous reset.
///
/// This is `2·(y - floor(y + 0.5))` with `y` taken half a cycle ahead, which
/// puts the reset at the cycle boundary instead of mid-cycle.
#[inline]
pub fn sawtooth(phase: f64) -> f64 {
    let y = phase / TAU + 0.5;
    2.0 * (y - m_floor(y + 0.5))
}
