//! C ABI wrapper for the Dualtone engine.
//!
//! Exposes functions to create/destroy an engine, start/stop it, change tone
//! parameters, and pull interleaved 16-bit stereo audio.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `DualtoneEngine` (heap-allocated; you own/delete it).
//! - Audio is pulled by the host with `dualtone_render_interleaved_i16`; the
//!   engine never opens a hardware device through this interface.
//! - Status codes: `0` ok, `-1` null pointer, `-2` value rejected, `-3`
//!   playback could not start.
//!
//! Threading
//! - The object is NOT thread-safe; call all functions from the same thread.

use std::cell::RefCell;
use std::os::raw::c_char;
use std::rc::Rc;

use dualtone_engine::{
    DynEngine, Engine, EngineConfig, EngineError, EngineEvent, OfflineDevice, RenderStrategy, ToneMode, Waveform,
};

pub const DUALTONE_OK: i32 = 0;
pub const DUALTONE_ERR_NULL: i32 = -1;
pub const DUALTONE_ERR_REJECTED: i32 = -2;
pub const DUALTONE_ERR_START: i32 = -3;

pub const DUALTONE_STRATEGY_BUFFERED: u32 = 0;
pub const DUALTONE_STRATEGY_STREAMING: u32 = 1;

/// Opaque engine wrapper we hand to C.
pub struct DualtoneEngine {
    inner: DynEngine,
    device: OfflineDevice,
    last_error: Rc<RefCell<String>>,
}

impl DualtoneEngine {
    fn new(sample_rate: u32, strategy: RenderStrategy) -> Result<Self, EngineError> {
        let device = OfflineDevice::new();
        let config = EngineConfig::default()
            .with_strategy(strategy)
            .with_sample_rate(sample_rate)
            .with_session_minutes(None);
        let mut inner = Engine::with_strategy(config, Box::new(device.clone()))?;

        let last_error = Rc::new(RefCell::new(String::new()));
        let sink = last_error.clone();
        inner.subscribe(move |ev: &EngineEvent| {
            if let EngineEvent::ErrorOccurred(m) | EngineEvent::AudioDeviceError(m) = ev {
                sink.replace(m.clone());
            }
        });
        Ok(Self { inner, device, last_error })
    }
}

fn status(r: Result<(), EngineError>) -> i32 {
    match r {
        Ok(()) => DUALTONE_OK,
        Err(_) => DUALTONE_ERR_REJECTED,
    }
}

/// Run `f` on a live handle, or return `null_value` for a null pointer.
fn with_engine<T>(engine: *mut DualtoneEngine, null_value: T, f: impl FnOnce(&mut DualtoneEngine) -> T) -> T {
    if engine.is_null() {
        return null_value;
    }
    let e = unsafe { &mut *engine };
    f(e)
}

// --- Creation / destruction -------------------------------------------------------

/// Create a stopped engine with default tone settings.
///
/// `strategy` is `DUALTONE_STRATEGY_BUFFERED` or `DUALTONE_STRATEGY_STREAMING`.
/// Returns null for an unknown strategy or an unsupported sample rate.
#[no_mangle]
pub extern "C" fn dualtone_create(sample_rate: u32, strategy: u32) -> *mut DualtoneEngine {
    let strategy = match strategy {
        DUALTONE_STRATEGY_BUFFERED => RenderStrategy::Buffered,
        DUALTONE_STRATEGY_STREAMING => RenderStrategy::Streaming,
        _ => return std::ptr::null_mut(),
    };
    match DualtoneEngine::new(sample_rate, strategy) {
        Ok(e) => Box::into_raw(Box::new(e)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Destroy an engine previously returned by `dualtone_create`.
#[no_mangle]
pub extern "C" fn dualtone_destroy(engine: *mut DualtoneEngine) {
    if !engine.is_null() {
        unsafe { drop(Box::from_raw(engine)); }
    }
}

// --- Transport -------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn dualtone_start(engine: *mut DualtoneEngine) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| match e.inner.start() {
        Ok(()) => DUALTONE_OK,
        Err(_) => DUALTONE_ERR_START,
    })
}

#[no_mangle]
pub extern "C" fn dualtone_stop(engine: *mut DualtoneEngine) {
    with_engine(engine, (), |e| e.inner.stop());
}

#[no_mangle]
pub extern "C" fn dualtone_is_playing(engine: *const DualtoneEngine) -> bool {
    with_engine(engine.cast_mut(), false, |e| e.inner.is_playing())
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` interleaved stereo frames into `out` (`2 * frames` samples).
/// Output is silence while stopped. Returns the number of frames written
/// (0 on error).
#[no_mangle]
pub extern "C" fn dualtone_render_interleaved_i16(engine: *mut DualtoneEngine, out: *mut i16, frames: u32) -> u32 {
    if out.is_null() || frames == 0 {
        return 0;
    }
    with_engine(engine, 0, |e| {
        let out = unsafe { std::slice::from_raw_parts_mut(out, frames as usize * 2) };
        e.device.pull_into(out);
        e.inner.service();
        frames
    })
}

// --- Tone parameters -------------------------------------------------------------

#[no_mangle]
pub extern "C" fn dualtone_set_left_frequency(engine: *mut DualtoneEngine, hz: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_left_frequency(hz)))
}

#[no_mangle]
pub extern "C" fn dualtone_set_right_frequency(engine: *mut DualtoneEngine, hz: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_right_frequency(hz)))
}

/// Sets right = left + `hz`.
#[no_mangle]
pub extern "C" fn dualtone_set_beat_frequency(engine: *mut DualtoneEngine, hz: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_beat_frequency(hz)))
}

/// Sets both sides to `hz`.
#[no_mangle]
pub extern "C" fn dualtone_set_carrier_frequency(engine: *mut DualtoneEngine, hz: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_carrier_frequency(hz)))
}

#[no_mangle]
pub extern "C" fn dualtone_set_pulse_frequency(engine: *mut DualtoneEngine, hz: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_pulse_frequency(hz)))
}

/// 0 sine, 1 square, 2 triangle, 3 sawtooth.
#[no_mangle]
pub extern "C" fn dualtone_set_waveform(engine: *mut DualtoneEngine, waveform: u8) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| match Waveform::ALL.get(usize::from(waveform)) {
        Some(&w) => status(e.inner.set_waveform(w)),
        None => DUALTONE_ERR_REJECTED,
    })
}

#[no_mangle]
pub extern "C" fn dualtone_set_amplitude(engine: *mut DualtoneEngine, amplitude: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_amplitude(amplitude)))
}

/// Output gain; values outside [0, 1] are clamped.
#[no_mangle]
pub extern "C" fn dualtone_set_volume(engine: *mut DualtoneEngine, volume: f64) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_volume(volume)))
}

/// Rejected while playing.
#[no_mangle]
pub extern "C" fn dualtone_set_sample_rate(engine: *mut DualtoneEngine, sample_rate: u32) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| status(e.inner.set_sample_rate(sample_rate)))
}

/// 0 binaural, 1 isochronic, 2 generator. Stops playback.
#[no_mangle]
pub extern "C" fn dualtone_set_mode(engine: *mut DualtoneEngine, mode: u8) -> i32 {
    with_engine(engine, DUALTONE_ERR_NULL, |e| match ToneMode::ALL.get(usize::from(mode)) {
        Some(&m) => {
            e.inner.set_mode(m);
            DUALTONE_OK
        }
        None => DUALTONE_ERR_REJECTED,
    })
}

#[no_mangle]
pub extern "C" fn dualtone_set_muted(engine: *mut DualtoneEngine, muted: bool) {
    with_engine(engine, (), |e| if muted { e.inner.mute() } else { e.inner.unmute() });
}

// --- Reads -----------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn dualtone_get_left_frequency(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.left_frequency())
}

#[no_mangle]
pub extern "C" fn dualtone_get_right_frequency(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.right_frequency())
}

#[no_mangle]
pub extern "C" fn dualtone_get_beat_frequency(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.beat_frequency())
}

#[no_mangle]
pub extern "C" fn dualtone_get_pulse_frequency(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.pulse_frequency())
}

#[no_mangle]
pub extern "C" fn dualtone_get_amplitude(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.amplitude())
}

#[no_mangle]
pub extern "C" fn dualtone_get_volume(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.volume())
}

#[no_mangle]
pub extern "C" fn dualtone_get_sample_rate(engine: *const DualtoneEngine) -> u32 {
    with_engine(engine.cast_mut(), 0, |e| e.inner.sample_rate())
}

/// Output peak in [0, 1] as of the last render call.
#[no_mangle]
pub extern "C" fn dualtone_get_level(engine: *const DualtoneEngine) -> f64 {
    with_engine(engine.cast_mut(), 0.0, |e| e.inner.peak_level())
}

/// Copy the most recent error message into `buf` as a NUL-terminated string,
/// truncating to `len - 1` bytes. Returns the untruncated message length.
#[no_mangle]
pub extern "C" fn dualtone_last_error(engine: *const DualtoneEngine, buf: *mut c_char, len: usize) -> usize {
    with_engine(engine.cast_mut(), 0, |e| {
        let msg = e.last_error.borrow();
        if !buf.is_null() && len > 0 {
            let n = msg.len().min(len - 1);
            unsafe {
                std::ptr::copy_nonoverlapping(msg.as_ptr().cast::<c_char>(), buf, n);
                *buf.add(n) = 0;
            }
        }
        msg.len()
    })
}
