//! The acquisition poll loop and its collaborators
//!
//! The loop is single-threaded: fetch a burst (the only blocking call, bounded
//! by the fetch timeout), process it completely, maybe emit a rate report,
//! then check for cancellation. Cancellation never interrupts a burst.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::cfg::{Run, RunLimit};
use crate::codec::RawWord;
use crate::engine::{Engine, RunSnapshot};
use crate::error::{AcquisitionError, ConfigError, FetchError};
use crate::rate::RateReport;

/// Supplier of raw bursts, e.g. a digitizer readout or a recording
pub trait BurstSource {
    /// Wait at most `timeout` for the next burst. `Ok(None)` and an empty
    /// buffer both mean no data yet; an error is a fatal device fault.
    fn fetch_burst(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Consumer of read-only results
pub trait Sink {
    fn report(&mut self, report: &RateReport);
    /// Called exactly once per run with the final snapshot, including when
    /// the run stops on a fetch failure.
    fn finish(&mut self, snapshot: &RunSnapshot);
}

/// Cooperative cancellation flag shared between the loop and whoever stops it
#[derive(Clone, Default, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Little-endian words of a byte buffer, plus the count of trailing bytes
/// that do not fill a whole word.
pub fn words_from_bytes(bytes: &[u8]) -> (Vec<RawWord>, usize) {
    let chunks = bytes.chunks_exact(4);
    let rest = chunks.remainder().len();
    let words = chunks
        .map(|c| RawWord::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    (words, rest)
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum StopReason {
    Cancelled,
    LimitReached,
}

pub struct Acquisition<S, K> {
    engine: Engine,
    source: S,
    sink: K,
    token: CancellationToken,
    limit: Option<RunLimit>,
    fetch_timeout: Duration,
    bursts: u64,
}

impl<S: BurstSource, K: Sink> Acquisition<S, K> {
    pub fn new(
        cfg: &Run,
        source: S,
        sink: K,
        token: CancellationToken,
    ) -> Result<Self, ConfigError> {
        Ok(Acquisition {
            engine: Engine::new(cfg)?,
            source,
            sink,
            token,
            limit: cfg.limit.clone(),
            fetch_timeout: cfg.fetch_timeout,
            bursts: 0,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn into_parts(self) -> (Engine, S, K) {
        (self.engine, self.source, self.sink)
    }

    fn limit_reached(&self, start: Instant) -> bool {
        match self.limit {
            Some(RunLimit::Duration(d)) => start.elapsed() >= d,
            Some(RunLimit::Bursts(n)) => self.bursts >= n,
            Some(RunLimit::AcceptedLimit(ch, n)) => self.engine.accepted(ch) >= n,
            None => false,
        }
    }

    /// Run until cancelled or a limit is reached. The final snapshot is
    /// handed to the sink in every case before returning.
    pub fn run(&mut self) -> Result<StopReason, AcquisitionError> {
        let start = Instant::now();
        self.bursts = 0;
        self.engine.on_run_start(start);
        info!("run started on {} channels", self.engine.channels().len());

        let reason = loop {
            if self.token.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.limit_reached(start) {
                break StopReason::LimitReached;
            }
            match self.source.fetch_burst(self.fetch_timeout) {
                Ok(Some(bytes)) if !bytes.is_empty() => {
                    let (words, rest) = words_from_bytes(&bytes);
                    if rest > 0 {
                        self.engine.count_malformed(1);
                    }
                    self.engine.process_burst(&words);
                    self.bursts += 1;
                },
                Ok(_) => {
                    self.engine.process_burst(&[]);
                },
                Err(e) => {
                    error!("burst fetch failed: {}", e);
                    let snapshot = self.engine.on_run_end();
                    self.sink.finish(&snapshot);
                    return Err(AcquisitionError::BurstFetchFailure(e));
                },
            }
            if let Some(report) = self.engine.poll_report(Instant::now()) {
                self.sink.report(&report);
            }
        };

        let snapshot = self.engine.on_run_end();
        info!("run stopped ({:?}) after {} bursts", reason, self.bursts);
        self.sink.finish(&snapshot);
        Ok(reason)
    }
}
