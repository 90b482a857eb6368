use crate::error::{Phase, ProviderError};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// One bounded provider call: the phase it is in and the deadline it must meet
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    phase: Phase,
    started: Instant,
    deadline: Instant,
}

impl Attempt {
    pub fn new(phase: Phase, deadline: Instant) -> Self {
        Self {
            phase,
            started: Instant::now(),
            deadline,
        }
    }

    /// Same deadline, later phase
    pub fn enter(self, phase: Phase) -> Self {
        Self { phase, ..self }
    }

    pub fn remaining(&self) -> Result<Duration, ProviderError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            Err(self.timed_out())
        } else {
            Ok(remaining)
        }
    }

    pub fn timed_out(&self) -> ProviderError {
        ProviderError::Timeout {
            phase: self.phase,
            after: self.started.elapsed(),
        }
    }

    /// Errors raised after the deadline passed are reported as timeouts
    pub fn fail(&self, message: impl fmt::Display) -> ProviderError {
        if Instant::now() >= self.deadline {
            self.timed_out()
        } else {
            ProviderError::Failed {
                phase: self.phase,
                message: message.to_string(),
            }
        }
    }

    /// Sleep for `wait`, or fail if the deadline comes first
    pub async fn pause(&self, wait: Duration) -> Result<(), ProviderError> {
        let remaining = self.remaining()?;
        if wait > remaining {
            sleep(remaining).await;
            return Err(self.timed_out());
        }
        sleep(wait).await;
        Ok(())
    }
}
