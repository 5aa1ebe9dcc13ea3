//! The tone engine: a two-state (Stopped / Playing) controller over a
//! parameter store, a renderer and an output device.
//!
//! All methods run on the controller thread. The audio side only ever sees
//! the [`ParameterStore`] (streaming) or an immutable block (buffered).
//!
//! `Engine<R>` is generic over the rendering strategy so the strategy can be
//! fixed at compile time; [`Engine::with_strategy`] picks one at runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use dualtone_core::voice::{ToneMode, VoiceParams};
use dualtone_core::waveform::Waveform;
use tracing::{debug, error, info, trace, warn};

use crate::buffered::BufferedRenderer;
use crate::config::EngineConfig;
use crate::device::{AudioFormat, DeviceEvent, DeviceNotifier, OutputDevice};
use crate::error::{DeviceError, EngineError, ParamError};
use crate::events::{EngineEvent, EngineObserver, Observers};
use crate::params::{ParameterStore, MAX_BEAT, MIN_BEAT};
use crate::render::{RenderStrategy, Renderer};
use crate::session::SessionTimer;
use crate::status::ToneSummary;
use crate::streaming::StreamingRenderer;

pub type BufferedEngine = Engine<BufferedRenderer>;
pub type StreamingEngine = Engine<StreamingRenderer>;
/// Strategy chosen at runtime.
pub type DynEngine = Engine<Box<dyn Renderer>>;

pub struct Engine<R: Renderer> {
    config: EngineConfig,
    store: Arc<ParameterStore>,
    renderer: R,
    device: Box<dyn OutputDevice>,
    notifier: DeviceNotifier,
    device_events: Receiver<DeviceEvent>,
    observers: Observers,
    session: SessionTimer,
    /// Device events that arrived while the block was being replaced.
    deferred: Vec<DeviceEvent>,
    playing: bool,
    muted: bool,
    level: f64,
}

impl Engine<BufferedRenderer> {
    /// Looping-block engine. `config.strategy` is ignored.
    pub fn buffered(config: EngineConfig, device: impl OutputDevice + 'static) -> Result<Self, EngineError> {
        let renderer = BufferedRenderer::new(config.buffer_duration, config.fade_ms);
        Self::new(config, renderer, Box::new(device))
    }
}

impl Engine<StreamingRenderer> {
    /// Pull-callback engine. `config.strategy` is ignored.
    pub fn streaming(config: EngineConfig, device: impl OutputDevice + 'static) -> Result<Self, EngineError> {
        Self::new(config, StreamingRenderer::new(), Box::new(device))
    }
}

impl Engine<Box<dyn Renderer>> {
    /// Engine whose renderer follows `config.strategy`.
    pub fn with_strategy(config: EngineConfig, device: Box<dyn OutputDevice>) -> Result<Self, EngineError> {
        let renderer: Box<dyn Renderer> = match config.strategy {
            RenderStrategy::Buffered => Box::new(BufferedRenderer::new(config.buffer_duration, config.fade_ms)),
            RenderStrategy::Streaming => Box::new(StreamingRenderer::new()),
        };
        Self::new(config, renderer, device)
    }

    /// Engine on the system's default output device.
    #[cfg(feature = "realtime")]
    pub fn default_output(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_strategy(config, Box::new(crate::realtime::CpalDevice::new()))
    }
}

impl<R: Renderer> Engine<R> {
    /// Validates every value in `config`.
    pub fn new(config: EngineConfig, renderer: R, device: Box<dyn OutputDevice>) -> Result<Self, EngineError> {
        let store = ParameterStore::validated(&config.voice, config.sample_rate, config.volume)?;
        let mut session = SessionTimer::unlimited();
        session.set_minutes(config.session_minutes)?;
        let (notifier, device_events) = DeviceNotifier::channel();

        debug!(strategy = %renderer.strategy(), sample_rate = config.sample_rate, "engine created");
        Ok(Self {
            config,
            store: Arc::new(store),
            renderer,
            device,
            notifier,
            device_events,
            observers: Observers::new(),
            session,
            deferred: Vec::new(),
            playing: false,
            muted: false,
            level: 0.0,
        })
    }

    pub fn subscribe(&mut self, observer: impl EngineObserver + 'static) {
        self.observers.subscribe(Box::new(observer));
    }

    fn emit(&mut self, event: EngineEvent) {
        trace!(?event, "emit");
        self.observers.emit(&event);
    }

    /// Report a rejected write and hand the error back.
    fn reject<T>(&mut self, e: impl Into<EngineError>) -> Result<T, EngineError> {
        let e = e.into();
        warn!(error = %e, "rejected");
        self.emit(EngineEvent::ErrorOccurred(e.to_string()));
        Err(e)
    }

    /// Report a failure during playback and force the Stopped state.
    fn fail(&mut self, e: EngineError) -> EngineError {
        error!(error = %e, "playback failed");
        match &e {
            EngineError::Device(_) => self.emit(EngineEvent::AudioDeviceError(e.to_string())),
            _ => self.emit(EngineEvent::ErrorOccurred(e.to_string())),
        }
        self.stop();
        e
    }

    fn output_gain(&self) -> f64 {
        if self.muted { 0.0 } else { self.store.volume() }
    }

    // ------------------------------ transport --------------------------------

    /// Stopped → Playing. A no-op while already playing.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.playing {
            return Ok(());
        }
        // Leftovers from the previous run (a late idle, say) mean nothing now.
        for ev in self.device_events.try_iter() {
            trace!(?ev, "discarding stale device event");
        }
        self.deferred.clear();

        let format = AudioFormat::stereo_i16(self.store.sample_rate());
        if let Err(e) = self.device.open(format, self.notifier.clone()) {
            return self.reject(e);
        }

        if let Err(e) = self.renderer.begin(&self.store, &mut *self.device) {
            self.device.stop();
            self.renderer.halt(&self.store);
            error!(error = %e, "could not start playback");
            let event = match &e {
                EngineError::Device(_) => EngineEvent::AudioDeviceError(e.to_string()),
                _ => EngineEvent::ErrorOccurred(e.to_string()),
            };
            self.emit(event);
            return Err(e);
        }

        let gain = self.output_gain();
        self.device.set_gain(gain);
        self.session.arm(Instant::now());
        self.playing = true;
        self.level = 0.0;

        info!(
            strategy = %self.renderer.strategy(),
            sample_rate = format.sample_rate,
            tone = %self.summary(),
            "playback started"
        );
        self.emit(EngineEvent::PlaybackStarted);
        Ok(())
    }

    /// Playing → Stopped. Synchronous and idempotent; phases return to zero.
    pub fn stop(&mut self) {
        let was_playing = self.playing;
        self.device.stop();
        self.renderer.halt(&self.store);
        self.session.disarm();
        self.playing = false;
        self.level = 0.0;
        if was_playing {
            info!("playback stopped");
            self.emit(EngineEvent::PlaybackStopped);
        }
    }

    pub fn is_playing(&self) -> bool { self.playing }

    // ------------------------------- setters ---------------------------------

    /// Tone parameters changed: let the renderer catch up.
    fn params_changed(&mut self) -> Result<(), EngineError> {
        self.renderer.invalidate();
        if !self.playing {
            return Ok(());
        }
        match self.renderer.refresh(&self.store, &mut *self.device) {
            Ok(true) => {
                self.drop_stale_idles();
                self.emit(EngineEvent::ParametersUpdated);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn set_left_frequency(&mut self, hz: f64) -> Result<(), EngineError> {
        if let Err(e) = self.store.set_left_hz(hz) {
            return self.reject(e);
        }
        self.emit(EngineEvent::LeftFrequencyChanged(hz));
        self.emit(EngineEvent::BeatFrequencyChanged(self.store.beat_hz()));
        self.params_changed()
    }

    pub fn set_right_frequency(&mut self, hz: f64) -> Result<(), EngineError> {
        if let Err(e) = self.store.set_right_hz(hz) {
            return self.reject(e);
        }
        self.emit(EngineEvent::RightFrequencyChanged(hz));
        self.emit(EngineEvent::BeatFrequencyChanged(self.store.beat_hz()));
        self.params_changed()
    }

    /// `right := left + hz`.
    pub fn set_beat_frequency(&mut self, hz: f64) -> Result<(), EngineError> {
        if !(MIN_BEAT..=MAX_BEAT).contains(&hz) {
            return self.reject(ParamError::InvalidBeatFrequency(hz));
        }
        let left = self.store.left_hz();
        self.set_right_frequency(left + hz)
    }

    /// Both sides to `hz`; in isochronic mode this is the carrier.
    pub fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), EngineError> {
        if let Err(e) = self.store.set_left_hz(hz) {
            return self.reject(e);
        }
        if let Err(e) = self.store.set_right_hz(hz) {
            return self.reject(e);
        }
        self.emit(EngineEvent::LeftFrequencyChanged(hz));
        self.emit(EngineEvent::RightFrequencyChanged(hz));
        self.emit(EngineEvent::BeatFrequencyChanged(0.0));
        self.params_changed()
    }

    pub fn set_pulse_frequency(&mut self, hz: f64) -> Result<(), EngineError> {
        if let Err(e) = self.store.set_pulse_hz(hz) {
            return self.reject(e);
        }
        self.emit(EngineEvent::PulseFrequencyChanged(hz));
        self.params_changed()
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), EngineError> {
        self.store.set_waveform(waveform);
        self.emit(EngineEvent::WaveformChanged(waveform));
        self.params_changed()
    }

    pub fn set_amplitude(&mut self, amp: f64) -> Result<(), EngineError> {
        if let Err(e) = self.store.set_amplitude(amp) {
            return self.reject(e);
        }
        self.emit(EngineEvent::AmplitudeChanged(amp));
        self.params_changed()
    }

    /// Output gain, applied after synthesis. Out-of-range values clamp.
    pub fn set_volume(&mut self, volume: f64) -> Result<(), EngineError> {
        let v = match self.store.set_volume(volume) {
            Ok(v) => v,
            Err(e) => return self.reject(e),
        };
        if !self.muted {
            self.device.set_gain(v);
        }
        self.emit(EngineEvent::VolumeChanged(v));
        Ok(())
    }

    /// Only while stopped; the device format is fixed for a run.
    pub fn set_sample_rate(&mut self, hz: u32) -> Result<(), EngineError> {
        if self.playing {
            return self.reject(ParamError::SampleRateLocked);
        }
        if let Err(e) = self.store.set_sample_rate(hz) {
            return self.reject(e);
        }
        self.config.sample_rate = hz;
        self.renderer.invalidate();
        Ok(())
    }

    /// Switch routing. Stops playback first; frequencies are left as they are.
    pub fn set_mode(&mut self, mode: ToneMode) {
        if mode == self.store.mode() {
            return;
        }
        if self.playing {
            self.stop();
        }
        self.store.set_mode(mode);
        self.renderer.discard();
        debug!(mode = mode.tag(), "mode changed");
        self.emit(EngineEvent::ModeChanged(mode));
    }

    /// Load the current mode's starting frequencies.
    pub fn apply_mode_defaults(&mut self) -> Result<(), EngineError> {
        let d = self.store.mode().defaults();
        if let Err(e) = self
            .store
            .set_left_hz(d.left_hz)
            .and_then(|()| self.store.set_right_hz(d.right_hz))
            .and_then(|()| self.store.set_pulse_hz(d.pulse_hz))
        {
            return self.reject(e);
        }
        self.emit(EngineEvent::LeftFrequencyChanged(d.left_hz));
        self.emit(EngineEvent::RightFrequencyChanged(d.right_hz));
        self.emit(EngineEvent::BeatFrequencyChanged(self.store.beat_hz()));
        self.emit(EngineEvent::PulseFrequencyChanged(d.pulse_hz));
        self.params_changed()
    }

    /// Session length in minutes, `None` for unlimited. Restarts the
    /// countdown if playing.
    pub fn set_session_minutes(&mut self, minutes: Option<u32>) -> Result<(), EngineError> {
        if let Err(e) = self.session.set_minutes(minutes) {
            return self.reject(e);
        }
        self.config.session_minutes = minutes;
        if self.playing {
            self.session.arm(Instant::now());
        }
        Ok(())
    }

    pub fn mute(&mut self) {
        if self.muted {
            return;
        }
        self.muted = true;
        self.device.set_gain(0.0);
        self.emit(EngineEvent::MuteChanged(true));
    }

    pub fn unmute(&mut self) {
        if !self.muted {
            return;
        }
        self.muted = false;
        let gain = self.store.volume();
        self.device.set_gain(gain);
        self.emit(EngineEvent::MuteChanged(false));
    }

    pub fn is_muted(&self) -> bool { self.muted }

    /// Throw away prepared content; re-render now if playing.
    pub fn force_regeneration(&mut self) -> Result<(), EngineError> {
        self.renderer.discard();
        self.params_changed()
    }

    // ------------------------------- servicing -------------------------------

    /// A fresh block was just submitted: an `Idle` still queued belongs to the
    /// block it replaced. Everything else is kept for the next `service`.
    fn drop_stale_idles(&mut self) {
        for ev in self.device_events.try_iter() {
            match ev {
                DeviceEvent::Idle => trace!("discarding idle from the replaced block"),
                other => self.deferred.push(other),
            }
        }
    }

    /// Drain device notifications, report the output level and check the
    /// session timer. Call periodically from the controller.
    pub fn service(&mut self) {
        self.service_at(Instant::now());
    }

    /// [`Engine::service`] with an explicit clock.
    pub fn service_at(&mut self, now: Instant) {
        for ev in std::mem::take(&mut self.deferred) {
            self.handle_device_event(ev);
        }
        while let Ok(ev) = self.device_events.try_recv() {
            self.handle_device_event(ev);
        }

        if self.playing {
            self.level = self.renderer.take_level(&self.store);
            self.emit(EngineEvent::AudioLevelChanged(self.level));
        }

        if self.playing && self.session.expired(now) {
            info!("session complete");
            self.stop();
            self.emit(EngineEvent::SessionCompleted);
        }
    }

    fn handle_device_event(&mut self, ev: DeviceEvent) {
        match ev {
            DeviceEvent::Idle => {
                if !self.playing {
                    return;
                }
                debug!("block exhausted, looping");
                if let Err(e) = self.renderer.rewind(&mut *self.device) {
                    self.fail(e);
                }
            }
            DeviceEvent::Underrun => {
                warn!("buffer underrun");
                self.emit(EngineEvent::BufferUnderrun);
                self.emit(EngineEvent::AudioDeviceError(DeviceError::Underrun.to_string()));
            }
            DeviceEvent::Stopped => {
                if self.playing {
                    warn!("device stopped on its own");
                    self.stop();
                }
            }
            DeviceEvent::Error(e) => {
                error!(error = %e, "device error");
                self.emit(EngineEvent::AudioDeviceError(e.to_string()));
                if e.is_fatal() {
                    self.stop();
                }
            }
        }
    }

    // -------------------------------- reads ----------------------------------

    pub fn left_frequency(&self) -> f64 { self.store.left_hz() }
    pub fn right_frequency(&self) -> f64 { self.store.right_hz() }
    pub fn beat_frequency(&self) -> f64 { self.store.beat_hz() }
    pub fn pulse_frequency(&self) -> f64 { self.store.pulse_hz() }
    pub fn waveform(&self) -> Waveform { self.store.waveform() }
    pub fn amplitude(&self) -> f64 { self.store.amplitude() }
    pub fn volume(&self) -> f64 { self.store.volume() }
    pub fn sample_rate(&self) -> u32 { self.store.sample_rate() }
    pub fn mode(&self) -> ToneMode { self.store.mode() }
    pub fn strategy(&self) -> RenderStrategy { self.renderer.strategy() }
    pub fn voice(&self) -> VoiceParams { self.store.snapshot() }

    /// Diagnostic: phases as last published by the renderer.
    pub fn current_phases(&self) -> (f64, f64) { self.store.phases() }

    pub fn buffer_duration(&self) -> Option<Duration> { self.renderer.buffer_duration() }

    /// Level reported by the last `service` call.
    pub fn peak_level(&self) -> f64 { self.level }

    pub fn summary(&self) -> ToneSummary { ToneSummary(self.store.snapshot()) }

    pub fn session_remaining(&self) -> Option<Duration> { self.session.remaining(Instant::now()) }

    pub fn session_countdown(&self) -> String { self.session.countdown(Instant::now()) }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Shared store, for readers on other threads.
    pub fn store(&self) -> &Arc<ParameterStore> { &self.store }

    pub fn renderer(&self) -> &R { &self.renderer }
}

impl<R: Renderer> Drop for Engine<R> {
    fn drop(&mut self) {
        self.device.stop();
    }
}
