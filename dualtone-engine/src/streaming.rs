//! Streaming rendering: compute every device callback from live parameters.
//!
//! The device owns a [`StreamSource`] for as long as it plays. Each `fill`
//! reads the parameter store once, renders straight into the device's buffer
//! and publishes the resulting phases and peak back to the store. Nothing is
//! allocated or locked on this path.

use std::sync::Arc;
use std::time::Duration;

use dualtone_core::dsp::PeakMeter;
use dualtone_core::phase::PhasePair;
use dualtone_core::voice::render_frames;
use tracing::debug;

use crate::device::{OutputDevice, PullSource};
use crate::error::EngineError;
use crate::params::ParameterStore;
use crate::render::{RenderStrategy, Renderer};

/// Pull callback handed to the device.
pub struct StreamSource {
    store: Arc<ParameterStore>,
    phases: PhasePair,
    meter: PeakMeter,
}

impl StreamSource {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self { store, phases: PhasePair::new(), meter: PeakMeter::new() }
    }

    pub fn phases(&self) -> (f64, f64) { self.phases.phases() }
}

impl PullSource for StreamSource {
    fn fill(&mut self, out: &mut [i16]) {
        let params = self.store.snapshot();
        let sr = f64::from(self.store.sample_rate());
        render_frames(&params, &mut self.phases, sr, out);

        self.meter.reset();
        self.meter.scan(out);
        self.store.publish_peak(self.meter.raw());
        self.store.publish_phases(self.phases.phases());
    }
}

/// Hands a fresh [`StreamSource`] to the device on every start.
#[derive(Debug, Default)]
pub struct StreamingRenderer;

impl StreamingRenderer {
    pub fn new() -> Self { Self }
}

impl Renderer for StreamingRenderer {
    fn strategy(&self) -> RenderStrategy { RenderStrategy::Streaming }

    fn begin(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<(), EngineError> {
        debug!("handing pull source to device");
        device.play_stream(Box::new(StreamSource::new(store.clone())))?;
        Ok(())
    }

    /// Live values are picked up by the next callback; nothing to do.
    fn refresh(&mut self, _store: &Arc<ParameterStore>, _device: &mut dyn OutputDevice) -> Result<bool, EngineError> {
        Ok(false)
    }

    fn rewind(&mut self, _device: &mut dyn OutputDevice) -> Result<(), EngineError> { Ok(()) }

    fn invalidate(&mut self) {}

    fn discard(&mut self) {}

    fn halt(&mut self, store: &ParameterStore) {
        // The source and its phases went away with the device content.
        store.publish_phases((0.0, 0.0));
    }

    fn take_level(&mut self, store: &ParameterStore) -> f64 { store.take_peak() }

    fn buffer_duration(&self) -> Option<Duration> { None }
}
