//! One-line description of what the engine is set to play.

use core::fmt;

use dualtone_core::voice::{ToneMode, VoiceParams};

/// `BIN:<beat>:<wave>`, `ISO:<pulse>:<wave>` or `GEN:L:<left>/R:<right>:<wave>`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToneSummary(pub VoiceParams);

impl fmt::Display for ToneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.0;
        let wave = p.waveform.abbrev();
        match p.mode {
            ToneMode::Binaural => write!(f, "BIN:{:.2}:{wave}", p.right_hz - p.left_hz),
            ToneMode::Isochronic => write!(f, "ISO:{:.1}:{wave}", p.pulse_hz),
            ToneMode::Generator => write!(f, "GEN:L:{:.2}/R:{:.2}:{wave}", p.left_hz, p.right_hz),
        }
    }
}
