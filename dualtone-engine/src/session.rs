//! Session timer: stop playback after a fixed number of minutes.
//!
//! The timer holds no thread of its own. It is armed with an [`Instant`] on
//! start and polled by the engine's `service` call.

use std::time::{Duration, Instant};

use crate::error::ParamError;

pub const MIN_SESSION_MINUTES: u32 = 1;
pub const MAX_SESSION_MINUTES: u32 = 45;
pub const DEFAULT_SESSION_MINUTES: u32 = 45;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTimer {
    length: Option<Duration>,
    deadline: Option<Instant>,
}

impl Default for SessionTimer {
    fn default() -> Self { Self::unlimited() }
}

impl SessionTimer {
    /// A timer that never expires.
    pub fn unlimited() -> Self {
        Self { length: None, deadline: None }
    }

    pub fn minutes(minutes: u32) -> Result<Self, ParamError> {
        let mut t = Self::unlimited();
        t.set_minutes(Some(minutes))?;
        Ok(t)
    }

    /// Change the session length. Takes effect on the next `arm`.
    pub fn set_minutes(&mut self, minutes: Option<u32>) -> Result<(), ParamError> {
        self.length = match minutes {
            None => None,
            Some(m) if (MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&m) => {
                Some(Duration::from_secs(u64::from(m) * 60))
            }
            Some(m) => return Err(ParamError::InvalidSessionLength(m)),
        };
        Ok(())
    }

    pub fn length(&self) -> Option<Duration> { self.length }

    pub fn is_armed(&self) -> bool { self.deadline.is_some() }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = self.length.map(|l| now + l);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Time left, or `None` when not armed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// `MM:SS` of the time left; `--:--` when not armed.
    pub fn countdown(&self, now: Instant) -> String {
        match self.remaining(now) {
            Some(r) => {
                let s = r.as_secs();
                format!("{:02}:{:02}", s / 60, s % 60)
            }
            None => "--:--".to_owned(),
        }
    }
}
