//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` sine approximation for the hot path
//! - Side-effect free helpers that are easy to test
//!
//! All tone math runs in `f64`: a five minute block at 192 kHz is ~58M
//! samples and the phase accumulator must not drift audibly over it.

#![allow(clippy::excessive_precision)]

use core::f64::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f64) -> f64 { libm::sin(x) }
        #[inline] pub(crate) fn m_floor(x: f64) -> f64 { libm::floor(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f64) -> f64 { x.sin() }
        #[inline] pub(crate) fn m_floor(x: f64) -> f64 { x.floor() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π, one full waveform cycle in radians.
pub const TAU: f64 = 2.0 * PI;

/// Full-scale value used for float → 16-bit conversion.
pub const I16_SCALE: f64 = 32767.0;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

/// Per-sample phase increment in radians for `freq_hz` at `sample_rate`.
#[inline]
pub fn phase_increment(freq_hz: f64, sample_rate: f64) -> f64 {
    TAU * freq_hz / sample_rate
}

// --------------------------------- Fast trig -------------------------------------

/// Sine used by the sine waveform.
///
/// With `fast-math` this is a range-reduced 7th-order odd polynomial
/// (max abs error ~2e-4); otherwise the exact backend.
#[inline]
pub fn fast_sin(x: f64) -> f64 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = m_floor(x / TAU + 0.5);
            let mut xr = x - k * TAU;
            // fold into [-π/2, π/2] where the series converges fast
            if xr > 0.5 * PI { xr = PI - xr; } else if xr < -0.5 * PI { xr = -PI - xr; }
            let x2 = xr * xr;
            let x3 = x2 * xr;
            xr + (-1.0 / 6.0) * x3 + (1.0 / 120.0) * x3 * x2 + (-1.0 / 5040.0) * x3 * x2 * x2
        } else {
            m_sin(x)
        }
    }
}

// --------------------------------- Peak meter ------------------------------------

/// Running absolute peak over 16-bit samples, normalized to [0, 1].
///
/// `take()` returns the peak seen since the last `take()` and resets it, so a
/// consumer polling at UI rate sees the loudest sample of each interval.
#[derive(Copy, Clone, Debug, Default)]
pub struct PeakMeter {
    peak: u16,
}

impl PeakMeter {
    #[inline]
    pub fn new() -> Self { Self { peak: 0 } }

    #[inline]
    pub fn reset(&mut self) { self.peak = 0; }

    #[inline]
    pub fn tick(&mut self, s: i16) {
        let a = s.unsigned_abs();
        if a > self.peak { self.peak = a; }
    }

    #[inline]
    pub fn scan(&mut self, block: &[i16]) {
        for &s in block { self.tick(s); }
    }

    /// Raw 16-bit magnitude of the current peak.
    #[inline]
    pub fn raw(&self) -> u16 { self.peak }

    /// Current peak without resetting.
    #[inline]
    pub fn peak(&self) -> f64 {
        f64::from(self.peak) / I16_SCALE
    }

    #[inline]
    pub fn take(&mut self) -> f64 {
        let p = self.peak();
        self.peak = 0;
        p
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_covers_one_cycle_per_period() {
        let sr = 44_100.0;
        let inc = phase_increment(441.0, sr);
        // 100 samples of a 441 Hz tone at 44.1 kHz is exactly one cycle.
        assert!((inc * 100.0 - TAU).abs() < 1e-12);
    }

    #[test]
    fn fast_sin_tracks_exact_sin() {
        let mut x = -3.0 * TAU;
        while x < 3.0 * TAU {
            let err = (fast_sin(x) - x.sin()).abs();
            assert!(err < 1e-3, "x={x} err={err}");
            x += 0.01;
        }
    }

    #[test]
    fn peak_meter_take_resets() {
        let mut m = PeakMeter::new();
        m.scan(&[100, -32767, 5]);
        assert!((m.take() - 1.0).abs() < 1e-9);
        assert_eq!(m.peak(), 0.0);
        m.tick(i16::MIN);
        assert!(m.peak() > 1.0, "i16::MIN magnitude exceeds full scale");
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }
}
