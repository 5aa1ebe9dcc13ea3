//! Engine notifications and the observers that receive them.
//!
//! Observers run on the controller thread, inside whichever engine call
//! produced the event (a setter, `start`, `stop`, or `service`). They are
//! never invoked from the audio thread.

use crossbeam_channel::{Sender, TrySendError};
use dualtone_core::voice::ToneMode;
use dualtone_core::waveform::Waveform;
use tracing::trace;

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    PlaybackStarted,
    PlaybackStopped,
    LeftFrequencyChanged(f64),
    RightFrequencyChanged(f64),
    BeatFrequencyChanged(f64),
    PulseFrequencyChanged(f64),
    WaveformChanged(Waveform),
    AmplitudeChanged(f64),
    VolumeChanged(f64),
    ModeChanged(ToneMode),
    MuteChanged(bool),
    /// Buffered content was re-synthesized for new parameters while playing.
    ParametersUpdated,
    /// Peak output level in [0, 1] since the previous report.
    AudioLevelChanged(f64),
    /// The session timer ran out and playback was stopped.
    SessionCompleted,
    ErrorOccurred(String),
    AudioDeviceError(String),
    BufferUnderrun,
}

/// Anything that wants engine notifications.
pub trait EngineObserver {
    fn notify(&mut self, event: &EngineEvent);
}

impl<F> EngineObserver for F
where
    F: FnMut(&EngineEvent),
{
    fn notify(&mut self, event: &EngineEvent) {
        self(event)
    }
}

/// Forwards events into a channel. A full or disconnected receiver is ignored.
#[derive(Clone, Debug)]
pub struct ChannelObserver(pub Sender<EngineEvent>);

impl EngineObserver for ChannelObserver {
    fn notify(&mut self, event: &EngineEvent) {
        match self.0.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(ev)) => trace!(?ev, "engine event dropped"),
        }
    }
}

/// Registered observers, notified in registration order.
#[derive(Default)]
pub struct Observers {
    list: Vec<Box<dyn EngineObserver>>,
}

impl Observers {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&mut self, observer: Box<dyn EngineObserver>) {
        self.list.push(observer);
    }

    pub fn len(&self) -> usize { self.list.len() }

    pub fn is_empty(&self) -> bool { self.list.is_empty() }

    pub fn emit(&mut self, event: &EngineEvent) {
        for o in &mut self.list {
            o.notify(event);
        }
    }
}

impl core::fmt::Debug for Observers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observers").field("len", &self.list.len()).finish()
    }
}
