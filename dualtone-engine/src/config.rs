//! Engine construction parameters.

use std::time::Duration;

use dualtone_core::voice::VoiceParams;

use crate::params::{DEFAULT_SAMPLE_RATE, DEFAULT_VOLUME};
use crate::render::RenderStrategy;
use crate::session::DEFAULT_SESSION_MINUTES;

/// Length of the looped block in buffered mode.
pub const DEFAULT_BUFFER_DURATION: Duration = Duration::from_secs(300);

/// Edge fade applied to each buffered block.
pub const DEFAULT_FADE_MS: u32 = 50;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub strategy: RenderStrategy,
    pub sample_rate: u32,
    pub buffer_duration: Duration,
    pub fade_ms: u32,
    /// Initial tone, including the mode.
    pub voice: VoiceParams,
    pub volume: f64,
    /// `None` plays until stopped.
    pub session_minutes: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: RenderStrategy::Buffered,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_duration: DEFAULT_BUFFER_DURATION,
            fade_ms: DEFAULT_FADE_MS,
            voice: VoiceParams::default(),
            volume: DEFAULT_VOLUME,
            session_minutes: Some(DEFAULT_SESSION_MINUTES),
        }
    }
}

impl EngineConfig {
    pub fn streaming() -> Self {
        Self { strategy: RenderStrategy::Streaming, ..Self::default() }
    }

    pub fn with_strategy(mut self, strategy: RenderStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = hz;
        self
    }

    pub fn with_buffer_duration(mut self, d: Duration) -> Self {
        self.buffer_duration = d;
        self
    }

    pub fn with_voice(mut self, voice: VoiceParams) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_volume(mut self, v: f64) -> Self {
        self.volume = v;
        self
    }

    pub fn with_session_minutes(mut self, minutes: Option<u32>) -> Self {
        self.session_minutes = minutes;
        self
    }
}
