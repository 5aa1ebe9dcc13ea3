//! Output device boundary.
//!
//! A device is a sink that does one of two things at a time:
//! - plays a finite, engine-owned block of interleaved 16-bit stereo once,
//!   then reports [`DeviceEvent::Idle`], or
//! - repeatedly pulls frames from a [`PullSource`] on its own thread.
//!
//! Devices never touch engine state. Anything they need to say (idle,
//! underrun, stopped, errors) goes through the [`DeviceNotifier`] handed to
//! them at `open`, and the engine drains it on the controller thread.
//!
//! [`OfflineDevice`] is the in-memory implementation used for tests and
//! offline rendering. The hardware implementation lives in `realtime`.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use dualtone_core::pcm::{apply_gain, CHANNELS};
use tracing::{debug, trace};

use crate::error::DeviceError;

/// Capacity of the device → engine notification queue. Sends never block.
pub const NOTIFY_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
}

/// What the engine asks the device for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub fn stereo_i16(sample_rate: u32) -> Self {
        Self { sample_rate, channels: CHANNELS as u16, sample_format: SampleFormat::I16 }
    }
}

/// Device → engine notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The submitted block has been fully played.
    Idle,
    Underrun,
    /// The device stopped on its own.
    Stopped,
    Error(DeviceError),
}

/// Non-blocking sender for [`DeviceEvent`]s; safe to call from an audio callback.
#[derive(Clone, Debug)]
pub struct DeviceNotifier {
    tx: Sender<DeviceEvent>,
}

impl DeviceNotifier {
    pub fn channel() -> (Self, Receiver<DeviceEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(NOTIFY_CAPACITY);
        (Self { tx }, rx)
    }

    /// Drop the event if the queue is full; the controller is behind anyway.
    #[inline]
    pub fn notify(&self, event: DeviceEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(ev)) => trace!(?ev, "device notification dropped"),
        }
    }
}

/// Produces audio on demand, on the device's thread.
///
/// `fill` receives interleaved stereo frames and must not block or allocate.
pub trait PullSource: Send {
    fn fill(&mut self, out: &mut [i16]);
}

/// An audio output.
pub trait OutputDevice {
    /// Prepare for `format`. Fails with `NoDevice` / `FormatNotSupported`.
    fn open(&mut self, format: AudioFormat, notifier: DeviceNotifier) -> Result<(), DeviceError>;

    /// Play `block` from its start. Replaces whatever was playing.
    fn play_buffer(&mut self, block: Arc<[i16]>) -> Result<(), DeviceError>;

    /// Start pulling from `source`. Replaces whatever was playing.
    fn play_stream(&mut self, source: Box<dyn PullSource>) -> Result<(), DeviceError>;

    /// Stop synchronously. Idempotent.
    fn stop(&mut self);

    /// Post-synthesis gain in [0, 1].
    fn set_gain(&mut self, gain: f64);
}

// ------------------------------- Playback state -----------------------------------

/// What a device is currently playing. Shared by every device implementation
/// so buffer/stream semantics are identical offline and on hardware.
pub(crate) enum Playback {
    Buffer { block: Arc<[i16]>, cursor: usize, idle_sent: bool },
    Stream(Box<dyn PullSource>),
}

impl Playback {
    pub(crate) fn buffer(block: Arc<[i16]>) -> Self {
        Self::Buffer { block, cursor: 0, idle_sent: false }
    }

    /// Write the next `out.len()` samples. A finished buffer yields silence
    /// and reports `Idle` once.
    pub(crate) fn render(&mut self, out: &mut [i16], notifier: Option<&DeviceNotifier>) {
        match self {
            Self::Stream(src) => src.fill(out),
            Self::Buffer { block, cursor, idle_sent } => {
                let n = out.len().min(block.len() - *cursor);
                out[..n].copy_from_slice(&block[*cursor..*cursor + n]);
                out[n..].fill(0);
                *cursor += n;
                if *cursor == block.len() && !*idle_sent {
                    *idle_sent = true;
                    if let Some(notifier) = notifier {
                        notifier.notify(DeviceEvent::Idle);
                    }
                }
            }
        }
    }
}

// ------------------------------- Offline device -----------------------------------

struct OfflineState {
    max_sample_rate: Option<u32>,
    available: bool,
    format: Option<AudioFormat>,
    notifier: Option<DeviceNotifier>,
    content: Option<Playback>,
    gain: f64,
    submissions: usize,
}

/// In-memory device driven by explicit [`OfflineDevice::pull`] calls.
///
/// Cloning gives another handle to the same device, so a test or renderer
/// can keep one while the engine owns the other.
#[derive(Clone)]
pub struct OfflineDevice {
    state: Arc<Mutex<OfflineState>>,
}

impl Default for OfflineDevice {
    fn default() -> Self { Self::new() }
}

impl core::fmt::Debug for OfflineDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = self.lock();
        f.debug_struct("OfflineDevice")
            .field("format", &s.format)
            .field("running", &s.content.is_some())
            .field("gain", &s.gain)
            .finish()
    }
}

impl OfflineDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OfflineState {
                max_sample_rate: None,
                available: true,
                format: None,
                notifier: None,
                content: None,
                gain: 1.0,
                submissions: 0,
            })),
        }
    }

    /// A device that reports no hardware on `open`.
    pub fn unavailable() -> Self {
        let d = Self::new();
        d.lock().available = false;
        d
    }

    /// Reject formats above `hz`.
    pub fn with_max_sample_rate(self, hz: u32) -> Self {
        self.lock().max_sample_rate = Some(hz);
        self
    }

    fn lock(&self) -> MutexGuard<'_, OfflineState> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn format(&self) -> Option<AudioFormat> { self.lock().format }
    pub fn gain(&self) -> f64 { self.lock().gain }
    pub fn is_running(&self) -> bool { self.lock().content.is_some() }

    /// How many times content was handed over (`play_buffer` + `play_stream`).
    pub fn submissions(&self) -> usize { self.lock().submissions }

    /// Push an event as if the hardware raised it.
    pub fn inject(&self, event: DeviceEvent) {
        if let Some(n) = &self.lock().notifier {
            n.notify(event);
        }
    }

    /// Produce `frames` interleaved frames with the device gain applied.
    ///
    /// Buffer content plays to its end, then yields silence and raises
    /// `Idle` once. Without content the output is silence.
    pub fn pull(&self, frames: usize) -> Vec<i16> {
        let mut out = vec![0i16; frames * CHANNELS];
        self.pull_into(&mut out);
        out
    }

    pub fn pull_into(&self, out: &mut [i16]) {
        out.fill(0);
        let mut guard = self.lock();
        let s = &mut *guard;
        if let Some(content) = &mut s.content {
            content.render(out, s.notifier.as_ref());
        }
        apply_gain(out, s.gain);
    }
}

impl OutputDevice for OfflineDevice {
    fn open(&mut self, format: AudioFormat, notifier: DeviceNotifier) -> Result<(), DeviceError> {
        let mut s = self.lock();
        if !s.available {
            return Err(DeviceError::NoDevice);
        }
        if s.max_sample_rate.is_some_and(|max| format.sample_rate > max) {
            return Err(DeviceError::FormatNotSupported);
        }
        debug!(?format, "offline device opened");
        s.content = None;
        s.format = Some(format);
        s.notifier = Some(notifier);
        Ok(())
    }

    fn play_buffer(&mut self, block: Arc<[i16]>) -> Result<(), DeviceError> {
        let mut s = self.lock();
        if s.format.is_none() {
            return Err(DeviceError::Open("device not opened".into()));
        }
        s.submissions += 1;
        s.content = Some(Playback::buffer(block));
        Ok(())
    }

    fn play_stream(&mut self, source: Box<dyn PullSource>) -> Result<(), DeviceError> {
        let mut s = self.lock();
        if s.format.is_none() {
            return Err(DeviceError::Open("device not opened".into()));
        }
        s.submissions += 1;
        s.content = Some(Playback::Stream(source));
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().content = None;
    }

    fn set_gain(&mut self, gain: f64) {
        self.lock().gain = gain;
    }
}
