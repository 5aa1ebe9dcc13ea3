//! Buffered rendering: synthesize a long block once, loop it.
//!
//! Synthesis runs on the controller thread. The block is faded in and out at
//! its edges so the loop seam is amplitude-continuous; the phase at the seam
//! is not matched. The block is kept after a stop and replayed on the next
//! start unless parameters changed in between.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dualtone_core::dsp::PeakMeter;
use dualtone_core::pcm::{apply_edge_fades, fade_frames, CHANNELS};
use dualtone_core::phase::PhasePair;
use dualtone_core::voice::render_frames;
use tracing::debug;

use crate::device::OutputDevice;
use crate::error::EngineError;
use crate::params::ParameterStore;
use crate::render::{RenderStrategy, Renderer};

#[derive(Debug)]
pub struct BufferedRenderer {
    duration: Duration,
    fade_ms: u32,
    phases: PhasePair,
    block: Option<Arc<[i16]>>,
    stale: bool,
    peak: f64,
}

impl BufferedRenderer {
    pub fn new(duration: Duration, fade_ms: u32) -> Self {
        Self { duration, fade_ms, phases: PhasePair::new(), block: None, stale: true, peak: 0.0 }
    }

    /// The cached block, if one has been synthesized.
    pub fn block(&self) -> Option<&Arc<[i16]>> { self.block.as_ref() }

    pub fn is_stale(&self) -> bool { self.stale || self.block.is_none() }

    /// Render a fresh block from the current parameters, continuing from the
    /// current phases.
    pub fn synthesize(&mut self, store: &ParameterStore) -> Result<Arc<[i16]>, EngineError> {
        let params = store.snapshot();
        let sr = store.sample_rate();
        let frames = (self.duration.as_secs_f64() * f64::from(sr)) as usize;
        if frames == 0 {
            return Err(EngineError::EmptyBuffer);
        }

        let t0 = Instant::now();
        let mut block = vec![0i16; frames * CHANNELS];
        render_frames(&params, &mut self.phases, f64::from(sr), &mut block);
        apply_edge_fades(&mut block, fade_frames(sr, self.fade_ms));

        let mut meter = PeakMeter::new();
        meter.scan(&block);
        self.peak = meter.peak().min(1.0);
        store.publish_phases(self.phases.phases());

        debug!(
            frames,
            sample_rate = sr,
            mode = params.mode.tag(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "buffer synthesized"
        );

        let block: Arc<[i16]> = Arc::from(block);
        self.block = Some(block.clone());
        self.stale = false;
        Ok(block)
    }

    fn current_or_new(&mut self, store: &ParameterStore) -> Result<Arc<[i16]>, EngineError> {
        match &self.block {
            Some(b) if !self.stale => Ok(b.clone()),
            _ => self.synthesize(store),
        }
    }
}

impl Renderer for BufferedRenderer {
    fn strategy(&self) -> RenderStrategy { RenderStrategy::Buffered }

    fn begin(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<(), EngineError> {
        let block = self.current_or_new(store)?;
        device.play_buffer(block)?;
        Ok(())
    }

    fn refresh(&mut self, store: &Arc<ParameterStore>, device: &mut dyn OutputDevice) -> Result<bool, EngineError> {
        if !self.is_stale() {
            return Ok(false);
        }
        device.stop();
        let block = self.synthesize(store)?;
        device.play_buffer(block)?;
        Ok(true)
    }

    fn rewind(&mut self, device: &mut dyn OutputDevice) -> Result<(), EngineError> {
        if let Some(block) = &self.block {
            device.play_buffer(block.clone())?;
        }
        Ok(())
    }

    fn invalidate(&mut self) { self.stale = true; }

    fn discard(&mut self) {
        self.block = None;
        self.stale = true;
        self.peak = 0.0;
    }

    fn halt(&mut self, store: &ParameterStore) {
        self.phases.reset();
        store.publish_phases((0.0, 0.0));
    }

    fn take_level(&mut self, _store: &ParameterStore) -> f64 { self.peak }

    fn buffer_duration(&self) -> Option<Duration> { Some(self.duration) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AudioFormat, DeviceNotifier, OfflineDevice};

    fn opened() -> (OfflineDevice, crossbeam_channel::Receiver<crate::device::DeviceEvent>) {
        let mut dev = OfflineDevice::new();
        let (n, rx) = DeviceNotifier::channel();
        dev.open(AudioFormat::stereo_i16(8_000), n).unwrap();
        (dev, rx)
    }

    fn store() -> Arc<ParameterStore> {
        let s = ParameterStore::default();
        s.set_sample_rate(8_000).unwrap();
        Arc::new(s)
    }

    #[test]
    fn block_has_requested_length_and_faded_edges() {
        let s = store();
        let mut r = BufferedRenderer::new(Duration::from_millis(500), 50);
        let block = r.synthesize(&s).unwrap();
        assert_eq!(block.len(), 4_000 * CHANNELS);
        assert_eq!(&block[..2], &[0, 0]);
        let last = &block[block.len() - 2..];
        assert!(last.iter().all(|s| s.abs() < 400), "{last:?}");
        assert!(r.take_level(&s) > 0.2);
    }

    #[test]
    fn cached_block_is_reused_until_invalidated() {
        let s = store();
        let (mut dev, _rx) = opened();
        let mut r = BufferedRenderer::new(Duration::from_millis(100), 10);

        r.begin(&s, &mut dev).unwrap();
        let first = r.block().cloned().unwrap();
        r.halt(&s);
        r.begin(&s, &mut dev).unwrap();
        assert!(Arc::ptr_eq(&first, r.block().unwrap()));

        r.invalidate();
        r.begin(&s, &mut dev).unwrap();
        assert!(!Arc::ptr_eq(&first, r.block().unwrap()));
        assert_eq!(dev.submissions(), 3);
    }

    #[test]
    fn refresh_only_when_stale() {
        let s = store();
        let (mut dev, _rx) = opened();
        let mut r = BufferedRenderer::new(Duration::from_millis(100), 10);
        r.begin(&s, &mut dev).unwrap();
        assert!(!r.refresh(&s, &mut dev).unwrap());

        s.set_left_hz(440.0).unwrap();
        r.invalidate();
        let before = s.phases();
        assert!(r.refresh(&s, &mut dev).unwrap());
        assert_ne!(s.phases(), (0.0, 0.0));
        assert_ne!(s.phases(), before, "new block continues from the old phases");
        assert_eq!(dev.submissions(), 2);
    }

    #[test]
    fn halt_zeroes_phases() {
        let s = store();
        let mut r = BufferedRenderer::new(Duration::from_millis(10), 1);
        r.synthesize(&s).unwrap();
        assert_ne!(s.phases(), (0.0, 0.0));
        r.halt(&s);
        assert_eq!(s.phases(), (0.0, 0.0));
    }

    #[test]
    fn zero_length_block_is_an_error() {
        let s = store();
        let mut r = BufferedRenderer::new(Duration::ZERO, 50);
        assert_eq!(r.synthesize(&s).unwrap_err(), EngineError::EmptyBuffer);
    }

    #[test]
    fn rewind_resubmits_the_same_block() {
        let s = store();
        let (mut dev, rx) = opened();
        let mut r = BufferedRenderer::new(Duration::from_millis(10), 1);
        r.begin(&s, &mut dev).unwrap();
        dev.pull(80);
        assert_eq!(rx.try_recv(), Ok(crate::device::DeviceEvent::Idle));
        r.rewind(&mut dev).unwrap();
        assert_eq!(dev.submissions(), 2);
        assert!(dev.pull(1).iter().all(|&x| x == 0), "block restarts at its faded head");
    }
}
