//! The per-frame tone kernel shared by every rendering strategy.
//!
//! Given one set of tone parameters and a [`PhasePair`], [`render_frames`]
//! writes interleaved stereo 16-bit frames and advances the phases. Buffered
//! and streaming playback differ only in *when* and *how much* they call it.

use crate::phase::PhasePair;
use crate::pcm::{to_i16, CHANNELS};
use crate::waveform::{gate, SquareRole, Waveform};

/// Signal routing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ToneMode {
    /// Independent left/right tones; the ears hear `right - left` as a beat.
    #[default]
    Binaural = 0,
    /// One carrier, gated on/off at the pulse rate, identical on both channels.
    Isochronic = 1,
    /// Plain dual tone; routed like binaural, usually with left == right.
    Generator = 2,
}

/// Starting frequencies for a mode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModeDefaults {
    pub left_hz: f64,
    pub right_hz: f64,
    pub pulse_hz: f64,
}

impl ToneMode {
    pub const ALL: [ToneMode; 3] = [Self::Binaural, Self::Isochronic, Self::Generator];

    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Isochronic,
            2 => Self::Generator,
            _ => Self::Binaural,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 { self as u8 }

    #[inline]
    pub fn is_isochronic(self) -> bool { matches!(self, Self::Isochronic) }

    /// Short tag used in status lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Binaural => "BIN",
            Self::Isochronic => "ISO",
            Self::Generator => "GEN",
        }
    }

    /// Square-wave semantics in this mode: a gate for isochronic, a tone otherwise.
    #[inline]
    pub fn square_role(self) -> SquareRole {
        if self.is_isochronic() { SquareRole::Gate } else { SquareRole::Bipolar }
    }

    /// Frequencies a controller applies when switching into this mode.
    pub fn defaults(self) -> ModeDefaults {
        match self {
            Self::Binaural => ModeDefaults { left_hz: 360.0, right_hz: 367.83, pulse_hz: 7.83 },
            Self::Isochronic => ModeDefaults { left_hz: 360.0, right_hz: 360.0, pulse_hz: 7.83 },
            Self::Generator => ModeDefaults { left_hz: 360.0, right_hz: 360.0, pulse_hz: 7.83 },
        }
    }
}

/// Square sample at `phase` with the semantics `mode` gives it.
#[inline]
pub fn square_for_mode(phase: f64, mode: ToneMode) -> f64 {
    mode.square_role().square(phase)
}

/// Carrier sample of `wave` at `phase` as heard in `mode`.
///
/// Only the square changes meaning: an isochronic square carrier is `{0, 1}`.
#[inline]
pub fn carrier_sample(wave: Waveform, phase: f64, mode: ToneMode) -> f64 {
    match wave {
        Waveform::Square => square_for_mode(phase, mode),
        w => w.sample(phase),
    }
}

/// One read of the tone parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoiceParams {
    /// Left tone, or the carrier in isochronic mode.
    pub left_hz: f64,
    /// Right tone; ignored in isochronic mode.
    pub right_hz: f64,
    /// Gate rate in isochronic mode.
    pub pulse_hz: f64,
    pub waveform: Waveform,
    pub amplitude: f64,
    pub mode: ToneMode,
}

impl Default for VoiceParams {
    fn default() -> Self {
        let d = ToneMode::Binaural.defaults();
        Self {
            left_hz: d.left_hz,
            right_hz: d.right_hz,
            pulse_hz: d.pulse_hz,
            waveform: Waveform::Sine,
            amplitude: 0.3,
            mode: ToneMode::Binaural,
        }
    }
}

/// Fill `out` (interleaved stereo) from `params`, advancing `phases`.
///
/// The phases are retuned first, never reset, so consecutive calls with
/// different frequencies join without a discontinuity. A trailing partial
/// frame in `out` is left untouched.
pub fn render_frames(params: &VoiceParams, phases: &mut PhasePair, sample_rate: f64, out: &mut [i16]) {
    let amp = params.amplitude;
    let wave = params.waveform;

    if params.mode.is_isochronic() {
        phases.retune(params.left_hz, params.pulse_hz, sample_rate);
        for frame in out.chunks_exact_mut(CHANNELS) {
            let carrier = carrier_sample(wave, phases.a.phase(), ToneMode::Isochronic);
            let s = to_i16(carrier * gate(phases.b.phase()) * amp);
            frame[0] = s;
            frame[1] = s;
            phases.advance();
        }
    } else {
        phases.retune(params.left_hz, params.right_hz, sample_rate);
        for frame in out.chunks_exact_mut(CHANNELS) {
            frame[0] = to_i16(wave.sample(phases.a.phase()) * amp);
            frame[1] = to_i16(wave.sample(phases.b.phase()) * amp);
            phases.advance();
        }
    }
}
