//! Dualtone Engine — live binaural / isochronic / dual-tone playback.
//!
//! Crate layout:
//! - [`params`]    : lock-free parameter store shared with the audio thread
//! - [`engine`]    : `Engine<R>` state machine (start/stop, setters, events)
//! - [`render`]    : `Renderer` trait and the strategy selector
//! - [`buffered`]  : looping pre-rendered block
//! - [`streaming`] : pull callback computed from live parameters
//! - [`device`]    : output device trait and the in-memory offline device
//! - [`realtime`]  : CPAL output device (feature `realtime`)
//! - [`events`]    : engine notifications and observers
//! - [`session`]   : auto-stop timer
//! - [`status`]    : compact tone summary
//! - [`config`]    : construction defaults
//! - [`error`]     : error taxonomy
//!
//! Only the parameter store is shared between the controller and the audio
//! producer. Phase state belongs to the active renderer.

pub mod buffered;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod params;
#[cfg(feature = "realtime")]
pub mod realtime;
pub mod render;
pub mod session;
pub mod status;
pub mod streaming;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use config::EngineConfig;
pub use device::{AudioFormat, DeviceEvent, OfflineDevice, OutputDevice, PullSource};
pub use dualtone_core::voice::{ToneMode, VoiceParams};
pub use dualtone_core::waveform::Waveform;
pub use engine::{BufferedEngine, DynEngine, Engine, StreamingEngine};
pub use error::{Channel, DeviceError, EngineError, ParamError};
pub use events::{ChannelObserver, EngineEvent, EngineObserver};
pub use params::ParameterStore;
#[cfg(feature = "realtime")]
pub use realtime::CpalDevice;
pub use render::{RenderStrategy, Renderer};
pub use status::ToneSummary;
