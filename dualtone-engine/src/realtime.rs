//! Hardware output through CPAL.
//!
//! Each submission (`play_buffer` / `play_stream`) builds a fresh output
//! stream and drops the previous one, so the callback owns its content
//! outright and never shares a lock with the controller. Gain is the only
//! value the controller changes under a running stream; it lives in an
//! atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use dualtone_core::pcm::apply_gain;
use tracing::{debug, info, warn};

use crate::device::{AudioFormat, DeviceEvent, DeviceNotifier, OutputDevice, Playback, PullSource};
use crate::error::DeviceError;

/// Scratch size reserved up front; hosts rarely ask for more per callback.
const SCRATCH_SAMPLES: usize = 8192;

/// Preference when a device offers several sample formats at our rate.
const FORMAT_PREFERENCE: [cpal::SampleFormat; 3] =
    [cpal::SampleFormat::I16, cpal::SampleFormat::F32, cpal::SampleFormat::U16];

/// Default system output device.
pub struct CpalDevice {
    device_name: Option<String>,
    device: Option<cpal::Device>,
    config: Option<cpal::StreamConfig>,
    sample_format: cpal::SampleFormat,
    notifier: Option<DeviceNotifier>,
    stream: Option<cpal::Stream>,
    gain: Arc<AtomicU64>,
}

impl Default for CpalDevice {
    fn default() -> Self { Self::new() }
}

impl CpalDevice {
    /// Use the host's default output.
    pub fn new() -> Self {
        Self {
            device_name: None,
            device: None,
            config: None,
            sample_format: cpal::SampleFormat::I16,
            notifier: None,
            stream: None,
            gain: Arc::new(AtomicU64::new(1.0f64.to_bits())),
        }
    }

    /// Use the output device with this exact name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { device_name: Some(name.into()), ..Self::new() }
    }

    /// Names of every output device on the default host.
    pub fn output_device_names() -> Result<Vec<String>, DeviceError> {
        let host = cpal::default_host();
        let devices = host.output_devices().map_err(|e| DeviceError::Open(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn pick_device(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        if let Some(name) = &self.device_name {
            let mut devices = host.output_devices().map_err(|e| DeviceError::Open(e.to_string()))?;
            return devices
                .find(|d| d.name().is_ok_and(|n| n == *name))
                .ok_or(DeviceError::NoDevice);
        }
        host.default_output_device().ok_or(DeviceError::NoDevice)
    }

    fn submit(&mut self, playback: Playback) -> Result<(), DeviceError> {
        self.stop();
        let (Some(device), Some(config), Some(notifier)) = (&self.device, &self.config, &self.notifier) else {
            return Err(DeviceError::Open("device not opened".into()));
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(device, config, playback, notifier, &self.gain)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(device, config, playback, notifier, &self.gain)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(device, config, playback, notifier, &self.gain)?,
            _ => return Err(DeviceError::FormatNotSupported),
        };
        stream.play().map_err(|e| DeviceError::Io(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl OutputDevice for CpalDevice {
    fn open(&mut self, format: AudioFormat, notifier: DeviceNotifier) -> Result<(), DeviceError> {
        self.stop();
        let device = self.pick_device()?;
        let sr = format.sample_rate;

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| DeviceError::Open(e.to_string()))?
            .filter(|r| {
                r.channels() == format.channels
                    && (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&sr)
            })
            .collect();

        let range = FORMAT_PREFERENCE
            .iter()
            .find_map(|f| ranges.iter().find(|r| r.sample_format() == *f))
            .ok_or(DeviceError::FormatNotSupported)?;

        let supported = range.clone().with_sample_rate(cpal::SampleRate(sr));
        self.sample_format = supported.sample_format();
        self.config = Some(supported.config());

        info!(
            device = %device.name().unwrap_or_else(|_| "<unnamed>".into()),
            sample_rate = sr,
            sample_format = ?self.sample_format,
            "output device opened"
        );
        self.device = Some(device);
        self.notifier = Some(notifier);
        Ok(())
    }

    fn play_buffer(&mut self, block: Arc<[i16]>) -> Result<(), DeviceError> {
        debug!(samples = block.len(), "submitting buffer");
        self.submit(Playback::buffer(block))
    }

    fn play_stream(&mut self, source: Box<dyn PullSource>) -> Result<(), DeviceError> {
        debug!("starting pull stream");
        self.submit(Playback::Stream(source))
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!(error = %e, "pause before drop failed");
            }
        }
    }

    fn set_gain(&mut self, gain: f64) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

fn map_stream_error(e: cpal::StreamError) -> DeviceEvent {
    match e {
        cpal::StreamError::DeviceNotAvailable => {
            DeviceEvent::Error(DeviceError::Fatal("device no longer available".into()))
        }
        cpal::StreamError::BackendSpecific { err } => {
            if err.description.to_ascii_lowercase().contains("underrun") {
                DeviceEvent::Underrun
            } else {
                DeviceEvent::Error(DeviceError::Io(err.description))
            }
        }
        #[allow(unreachable_patterns)]
        other => DeviceEvent::Error(DeviceError::Io(other.to_string())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut playback: Playback,
    notifier: &DeviceNotifier,
    gain: &Arc<AtomicU64>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<i16> + Send + 'static,
{
    let data_notifier = notifier.clone();
    let err_notifier = notifier.clone();
    let gain = gain.clone();
    let mut scratch = vec![0i16; SCRATCH_SAMPLES];

    let stream = device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                if scratch.len() < output.len() {
                    scratch.resize(output.len(), 0);
                }
                let buf = &mut scratch[..output.len()];
                playback.render(buf, Some(&data_notifier));
                apply_gain(buf, f64::from_bits(gain.load(Ordering::Relaxed)));
                for (dst, &s) in output.iter_mut().zip(buf.iter()) {
                    *dst = T::from_sample(s);
                }
            },
            move |e| {
                warn!(error = %e, "output stream error");
                err_notifier.notify(map_stream_error(e));
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => DeviceError::NoDevice,
            cpal::BuildStreamError::StreamConfigNotSupported => DeviceError::FormatNotSupported,
            other => DeviceError::Open(other.to_string()),
        })?;

    Ok(stream)
}
