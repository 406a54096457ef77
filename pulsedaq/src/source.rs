//! Burst sources for running without hardware

use pulsetools::acquisition::{BurstSource, CancellationToken};
use pulsetools::codec::RawWord;
use pulsetools::error::FetchError;
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Hands out recorded bursts one per fetch, as the device would have.
pub struct ReplaySource {
    bursts: VecDeque<Vec<RawWord>>,
    period: Duration,
    stop_at_end: Option<CancellationToken>,
}

impl ReplaySource {
    pub fn new(bursts: Vec<Vec<RawWord>>, period: Duration) -> Self {
        ReplaySource {
            bursts: bursts.into(),
            period,
            stop_at_end: None,
        }
    }

    /// Cancel `token` once the recording is exhausted
    pub fn stop_at_end(mut self, token: CancellationToken) -> Self {
        self.stop_at_end = Some(token);
        self
    }

    pub fn remaining(&self) -> usize {
        self.bursts.len()
    }
}

impl BurstSource for ReplaySource {
    fn fetch_burst(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, FetchError> {
        match self.bursts.pop_front() {
            Some(burst) => {
                if !self.period.is_zero() {
                    thread::sleep(self.period.min(timeout));
                }
                let bytes = burst.iter().flat_map(|w| w.to_le_bytes()).collect();
                Ok(Some(bytes))
            },
            None => {
                match &self.stop_at_end {
                    Some(token) if !token.is_cancelled() => {
                        info!("end of recording");
                        token.cancel();
                    },
                    Some(_) => {},
                    // Idle like a device with nothing in its buffer
                    None => thread::sleep(timeout),
                }
                Ok(None)
            },
        }
    }
}
