//! Live parameter store shared between the controller and the audio producer.
//!
//! Every field is its own atomic: a reader always sees a whole old value or a
//! whole new value, never a torn one. There is no multi-field consistency;
//! a reader may see a new left frequency alongside an old right frequency
//! for one callback, which is inaudible at callback granularity.
//!
//! Writes validate first and leave the stored value alone on rejection.
//!
//! The store also carries a few diagnostic fields that flow the other way
//! (audio → controller): the current phases and the output peak.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use dualtone_core::dsp::clamp;
use dualtone_core::voice::{ToneMode, VoiceParams};
use dualtone_core::waveform::Waveform;

use crate::error::{Channel, ParamError};

pub const MIN_FREQUENCY: f64 = 20.0;
pub const MAX_FREQUENCY: f64 = 20_000.0;
pub const MIN_PULSE: f64 = 0.5;
pub const MAX_PULSE: f64 = 100.0;
pub const MIN_BEAT: f64 = 0.01;
pub const MAX_BEAT: f64 = 100.0;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_VOLUME: f64 = 0.15;

/// `f64` stored as its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(v: f64) -> Self { Self(AtomicU64::new(v.to_bits())) }

    #[inline]
    pub fn load(&self) -> f64 { f64::from_bits(self.0.load(Ordering::Relaxed)) }

    #[inline]
    pub fn store(&self, v: f64) { self.0.store(v.to_bits(), Ordering::Relaxed) }
}

#[inline]
fn in_range(x: f64, lo: f64, hi: f64) -> bool {
    x >= lo && x <= hi
}

#[derive(Debug)]
pub struct ParameterStore {
    left_hz: AtomicF64,
    right_hz: AtomicF64,
    pulse_hz: AtomicF64,
    amplitude: AtomicF64,
    volume: AtomicF64,
    waveform: AtomicU8,
    mode: AtomicU8,
    sample_rate: AtomicU32,

    // audio → controller
    phase_a: AtomicF64,
    phase_b: AtomicF64,
    peak: AtomicU32,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(&VoiceParams::default(), DEFAULT_SAMPLE_RATE, DEFAULT_VOLUME)
    }
}

impl ParameterStore {
    /// Unvalidated construction; use [`ParameterStore::validated`] for
    /// caller-supplied values.
    pub fn new(voice: &VoiceParams, sample_rate: u32, volume: f64) -> Self {
        Self {
            left_hz: AtomicF64::new(voice.left_hz),
            right_hz: AtomicF64::new(voice.right_hz),
            pulse_hz: AtomicF64::new(voice.pulse_hz),
            amplitude: AtomicF64::new(voice.amplitude),
            volume: AtomicF64::new(volume),
            waveform: AtomicU8::new(voice.waveform.as_u8()),
            mode: AtomicU8::new(voice.mode.as_u8()),
            sample_rate: AtomicU32::new(sample_rate),
            phase_a: AtomicF64::new(0.0),
            phase_b: AtomicF64::new(0.0),
            peak: AtomicU32::new(0),
        }
    }

    /// Build a store, running every value through its setter.
    pub fn validated(voice: &VoiceParams, sample_rate: u32, volume: f64) -> Result<Self, ParamError> {
        let store = Self::default();
        store.set_mode(voice.mode);
        store.set_left_hz(voice.left_hz)?;
        store.set_right_hz(voice.right_hz)?;
        store.set_pulse_hz(voice.pulse_hz)?;
        store.set_amplitude(voice.amplitude)?;
        store.set_waveform(voice.waveform);
        store.set_volume(volume)?;
        store.set_sample_rate(sample_rate)?;
        Ok(store)
    }

    // ------------------------------ reads ------------------------------------

    #[inline] pub fn left_hz(&self) -> f64 { self.left_hz.load() }
    #[inline] pub fn right_hz(&self) -> f64 { self.right_hz.load() }
    #[inline] pub fn pulse_hz(&self) -> f64 { self.pulse_hz.load() }
    #[inline] pub fn amplitude(&self) -> f64 { self.amplitude.load() }
    #[inline] pub fn volume(&self) -> f64 { self.volume.load() }
    #[inline] pub fn waveform(&self) -> Waveform { Waveform::from_u8(self.waveform.load(Ordering::Relaxed)) }
    #[inline] pub fn mode(&self) -> ToneMode { ToneMode::from_u8(self.mode.load(Ordering::Relaxed)) }
    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate.load(Ordering::Relaxed) }

    /// `right - left`, signed.
    #[inline]
    pub fn beat_hz(&self) -> f64 { self.right_hz() - self.left_hz() }

    /// One read of every tone field. Fields are read independently.
    #[inline]
    pub fn snapshot(&self) -> VoiceParams {
        VoiceParams {
            left_hz: self.left_hz(),
            right_hz: self.right_hz(),
            pulse_hz: self.pulse_hz(),
            waveform: self.waveform(),
            amplitude: self.amplitude(),
            mode: self.mode(),
        }
    }

    // ------------------------------ writes -----------------------------------

    pub fn set_left_hz(&self, hz: f64) -> Result<(), ParamError> {
        if !in_range(hz, MIN_FREQUENCY, MAX_FREQUENCY) {
            return Err(ParamError::InvalidFrequency { channel: Channel::Left, hz });
        }
        self.left_hz.store(hz);
        Ok(())
    }

    /// In isochronic mode the right tone is not played, so any finite value
    /// is accepted.
    pub fn set_right_hz(&self, hz: f64) -> Result<(), ParamError> {
        let ok = if self.mode().is_isochronic() {
            hz.is_finite()
        } else {
            in_range(hz, MIN_FREQUENCY, MAX_FREQUENCY)
        };
        if !ok {
            return Err(ParamError::InvalidFrequency { channel: Channel::Right, hz });
        }
        self.right_hz.store(hz);
        Ok(())
    }

    pub fn set_pulse_hz(&self, hz: f64) -> Result<(), ParamError> {
        if !in_range(hz, MIN_PULSE, MAX_PULSE) {
            return Err(ParamError::InvalidPulseFrequency(hz));
        }
        self.pulse_hz.store(hz);
        Ok(())
    }

    pub fn set_amplitude(&self, amp: f64) -> Result<(), ParamError> {
        if !in_range(amp, 0.0, 1.0) {
            return Err(ParamError::InvalidAmplitude(amp));
        }
        self.amplitude.store(amp);
        Ok(())
    }

    /// Output gain clamps into [0, 1]; only non-finite input is rejected.
    /// Returns the value actually stored.
    pub fn set_volume(&self, v: f64) -> Result<f64, ParamError> {
        if !v.is_finite() {
            return Err(ParamError::InvalidVolume(v));
        }
        let v = clamp(v, 0.0, 1.0);
        self.volume.store(v);
        Ok(v)
    }

    pub fn set_sample_rate(&self, hz: u32) -> Result<(), ParamError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&hz) {
            return Err(ParamError::InvalidSampleRate(hz));
        }
        self.sample_rate.store(hz, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    pub fn set_waveform(&self, w: Waveform) {
        self.waveform.store(w.as_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub fn set_mode(&self, m: ToneMode) {
        self.mode.store(m.as_u8(), Ordering::Relaxed);
    }

    // --------------------------- diagnostics ---------------------------------

    #[inline]
    pub fn phases(&self) -> (f64, f64) { (self.phase_a.load(), self.phase_b.load()) }

    #[inline]
    pub fn publish_phases(&self, (a, b): (f64, f64)) {
        self.phase_a.store(a);
        self.phase_b.store(b);
    }

    /// Raise the held peak to at least `peak` (16-bit magnitude).
    #[inline]
    pub fn publish_peak(&self, peak: u16) {
        self.peak.fetch_max(u32::from(peak), Ordering::Relaxed);
    }

    /// Peak since the last call, normalized to [0, 1]; resets it.
    pub fn take_peak(&self) -> f64 {
        let p = self.peak.swap(0, Ordering::Relaxed);
        (f64::from(p) / 32767.0).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn left_frequency_round_trips_and_rejects() {
        let s = ParameterStore::default();
        s.set_left_hz(1000.0).unwrap();
        assert_eq!(s.left_hz(), 1000.0);
        let err = s.set_left_hz(5.0).unwrap_err();
        assert_eq!(err, ParamError::InvalidFrequency { channel: Channel::Left, hz: 5.0 });
        assert_eq!(s.left_hz(), 1000.0);
        assert!(s.set_left_hz(f64::NAN).is_err());
        assert_eq!(s.left_hz(), 1000.0);
    }

    #[test]
    fn right_frequency_validation_depends_on_mode() {
        let s = ParameterStore::default();
        assert!(s.set_right_hz(3.0).is_err());
        s.set_mode(ToneMode::Isochronic);
        s.set_right_hz(3.0).unwrap();
        assert_eq!(s.right_hz(), 3.0);
        assert!(s.set_right_hz(f64::INFINITY).is_err());
    }

    #[test]
    fn beat_is_signed_difference() {
        let s = ParameterStore::default();
        s.set_left_hz(200.0).unwrap();
        s.set_right_hz(208.0).unwrap();
        assert_eq!(s.beat_hz(), 8.0);
        s.set_left_hz(210.0).unwrap();
        assert_eq!(s.beat_hz(), -2.0);
    }

    #[test]
    fn volume_clamps_amplitude_rejects() {
        let s = ParameterStore::default();
        assert_eq!(s.set_volume(1.7).unwrap(), 1.0);
        assert_eq!(s.set_volume(-0.2).unwrap(), 0.0);
        assert!(s.set_volume(f64::NAN).is_err());
        assert!(s.set_volume(f64::INFINITY).is_err());
        assert_eq!(s.volume(), 0.0);

        s.set_amplitude(0.5).unwrap();
        assert!(s.set_amplitude(1.5).is_err());
        assert_eq!(s.amplitude(), 0.5);
    }

    #[test]
    fn pulse_and_sample_rate_domains() {
        let s = ParameterStore::default();
        assert!(s.set_pulse_hz(0.4).is_err());
        assert!(s.set_pulse_hz(100.5).is_err());
        s.set_pulse_hz(0.5).unwrap();
        assert!(s.set_sample_rate(7_999).is_err());
        assert!(s.set_sample_rate(192_001).is_err());
        s.set_sample_rate(48_000).unwrap();
        assert_eq!(s.sample_rate(), 48_000);
    }

    #[test]
    fn validated_rejects_bad_config() {
        let bad = VoiceParams { amplitude: 2.0, ..VoiceParams::default() };
        assert_eq!(
            ParameterStore::validated(&bad, 44_100, 0.5).unwrap_err(),
            ParamError::InvalidAmplitude(2.0)
        );
        let iso = VoiceParams { mode: ToneMode::Isochronic, right_hz: 0.0, ..VoiceParams::default() };
        assert!(ParameterStore::validated(&iso, 44_100, 0.5).is_ok());
    }

    #[test]
    fn concurrent_reads_never_tear() {
        let s = Arc::new(ParameterStore::default());
        let writer = {
            let s = s.clone();
            thread::spawn(move || {
                for i in 0..20_000 {
                    let hz = if i % 2 == 0 { 111.111 } else { 9_876.543 };
                    s.set_left_hz(hz).unwrap();
                }
            })
        };
        for _ in 0..20_000 {
            let v = s.left_hz();
            assert!(v == 111.111 || v == 9_876.543 || v == 360.0, "torn read: {v}");
        }
        writer.join().unwrap();
    }

    #[test]
    fn peak_is_max_then_reset() {
        let s = ParameterStore::default();
        s.publish_peak(100);
        s.publish_peak(32767);
        s.publish_peak(5);
        assert_eq!(s.take_peak(), 1.0);
        assert_eq!(s.take_peak(), 0.0);
    }
}
