//! Error taxonomy.
//!
//! - [`ParamError`]: a write outside its domain. The store keeps the old value.
//! - [`DeviceError`]: the output device failed to open or misbehaved.
//! - [`EngineError`]: either of the above, plus engine-level failures.
//!
//! None of these are fatal to the process. The engine returns them *and*
//! reports them to observers.

use thiserror::Error;

/// Which side a frequency write targeted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Channel::Left => "left",
            Channel::Right => "right",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("Invalid {channel} frequency: {hz} Hz")]
    InvalidFrequency { channel: Channel, hz: f64 },

    #[error("Invalid beat frequency: {0} Hz")]
    InvalidBeatFrequency(f64),

    #[error("Invalid pulse frequency: {0} Hz")]
    InvalidPulseFrequency(f64),

    #[error("Invalid amplitude: {0}")]
    InvalidAmplitude(f64),

    #[error("Invalid volume: {0}")]
    InvalidVolume(f64),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Cannot change sample rate while playing")]
    SampleRateLocked,

    #[error("Invalid session length: {0} min")]
    InvalidSessionLength(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("No device available for audio output")]
    NoDevice,

    #[error("Audio format not supported by device")]
    FormatNotSupported,

    #[error("Audio open error: {0}")]
    Open(String),

    #[error("Audio I/O error: {0}")]
    Io(String),

    #[error("Audio buffer underrun")]
    Underrun,

    #[error("Fatal audio error: {0}")]
    Fatal(String),
}

impl DeviceError {
    /// Errors after which the device cannot keep playing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoDevice | Self::FormatNotSupported | Self::Open(_) | Self::Fatal(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Failed to generate audio buffer")]
    EmptyBuffer,
}
