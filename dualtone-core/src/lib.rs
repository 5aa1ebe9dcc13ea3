#![cfg_attr(not(feature = "std"), no_std)]
//! Dualtone Core — no_std-ready tone primitives for binaural, isochronic and
//! plain dual-tone synthesis.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm` as the math backend
//! - `fast-math`: polynomial sine for the sine waveform
//!
//! Modules
//! - [`dsp`]      : math backend, constants, phase increment, peak meter
//! - [`waveform`] : stateless phase → sample shapes (sine/square/triangle/saw, gate)
//! - [`phase`]    : wrapped phase accumulators
//! - [`pcm`]      : 16-bit conversion, gain, linear edge fades
//! - [`voice`]    : tone modes and the per-frame stereo kernel
//!
//! No heap allocations anywhere in this crate.

pub mod dsp;
pub mod pcm;
pub mod phase;
pub mod voice;
pub mod waveform;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{clamp, phase_increment, PeakMeter, TAU};
    pub use crate::pcm::{apply_edge_fades, apply_gain, fade_frames, to_i16, CHANNELS};
    pub use crate::phase::{PhaseAccumulator, PhasePair};
    pub use crate::voice::{render_frames, square_for_mode, ModeDefaults, ToneMode, VoiceParams};
    pub use crate::waveform::{SquareRole, Waveform};
}
