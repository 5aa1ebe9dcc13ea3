//! Rendering strategies.
//!
//! The engine state machine is the same for both delivery models; what
//! differs is how audio reaches the device:
//! - [`BufferedRenderer`](crate::buffered::BufferedRenderer) synthesizes a
//!   long block on the controller thread and loops it,
//! - [`StreamingRenderer`](crate::streaming::StreamingRenderer) hands the
//!   device a pull source that computes every callback from live parameters.
//!
//! A renderer owns the phase state of whatever it produces. The controller
//! never reads or writes phases except through the diagnostic fields of the
//! [`ParameterStore`].

use std::sync::Arc;
use std::time::Duration;

use crate::device::OutputDevice;
use crate::error::EngineError;
use crate::params::ParameterStore;

/// Which delivery model an engine uses. Fixed at construction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderStrategy {
    /// Pre-rendered looping block; re-synthesized when parameters change.
    #[default]
    Buffered,
    /// On-demand generation in the device callback.
    Streaming,
}

impl RenderStrategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::Streaming => "streaming",
        }
    }
}

impl core::fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A delivery model, driven by the engine on the controller thread.
pub trait Renderer {
    fn strategy(&self) -> RenderStrategy;

    /// Give an opened device something to play.
    fn begin(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<(), EngineError>;

    /// Parameters changed while playing. Returns `true` if the device was
    /// handed new content.
    fn refresh(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<bool, EngineError>;

    /// The device finished what it was given; play it again from the start.
    fn rewind(&mut self, device: &mut dyn OutputDevice) -> Result<(), EngineError>;

    /// Mark any prepared content as out of date.
    fn invalidate(&mut self);

    /// Drop prepared content entirely.
    fn discard(&mut self);

    /// Playback stopped: reset phases to zero.
    fn halt(&mut self, store: &ParameterStore);

    /// Peak output level since the last call, in [0, 1].
    fn take_level(&mut self, store: &ParameterStore) -> f64;

    /// Length of the looped block, if this renderer uses one.
    fn buffer_duration(&self) -> Option<Duration>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn strategy(&self) -> RenderStrategy { (**self).strategy() }

    fn begin(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<(), EngineError> {
        (**self).begin(store, device)
    }

    fn refresh(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<bool, EngineError> {
        (**self).refresh(store, device)
    }

    fn rewind(&mut self, device: &mut dyn OutputDevice) -> Result<(), EngineError> {
        (**self).rewind(device)
    }

    fn invalidate(&mut self) { (**self).invalidate() }
    fn discard(&mut self) { (**self).discard() }
    fn halt(&mut self, store: &ParameterStore) { (**self).halt(store) }
    fn take_level(&mut self, store: &ParameterStore) -> f64 { (**self).take_level(store) }
    fn buffer_duration(&self) -> Option<Duration> { (**self).buffer_duration() }
}
