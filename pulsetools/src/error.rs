//! Error taxonomy of the acquisition core
//!
//! Only [`AcquisitionError`] ever leaves the poll loop. Everything in
//! [`Anomaly`] is absorbed where it happens: logged, counted in the burst
//! diagnostics, and skipped.

use thiserror::Error;

use crate::codec::RawWord;
use crate::Channel;

/// Recoverable decode and assembly faults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    #[error("malformed word {word:#010x} at index {index}")]
    MalformedWord { index: usize, word: RawWord },
    #[error("truncated burst: frame declared {declared} words, consumed {consumed}")]
    TruncatedBurst { declared: u32, consumed: u32 },
    #[error("frame opened at index {index} while another frame was open")]
    UnterminatedFrame { index: usize },
    #[error("slot {slot} on channel {channel} exceeds capacity {capacity}")]
    SlotOverflow { channel: Channel, slot: usize, capacity: usize },
}

/// A value that does not fit the word it would be encoded into
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} {value} exceeds its {max} maximum")]
    FieldOverflow { field: &'static str, value: u64, max: u64 },
    #[error("channel {channel} is out of range for a {channels}-channel module")]
    ChannelOutOfRange { channel: Channel, channels: usize },
}

/// Invalid run configuration, rejected before the run starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("channel {channel} is out of range for a {channels}-channel module")]
    ChannelOutOfRange { channel: Channel, channels: usize },
    #[error("reference channel {0} is also a signal channel")]
    ReferenceIsSignal(Channel),
    #[error("correlation requires at least one reference and one signal channel")]
    EmptyCorrelation,
    #[error("capacity must be nonzero")]
    ZeroCapacity,
    #[error("invalid histogram: {0}")]
    Histogram(#[from] HistogramError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    #[error("bin count must be nonzero")]
    NoBins,
    #[error("range [{low}, {high}) is empty")]
    EmptyRange { low: f64, high: f64 },
}

/// Fault reported by a burst source
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("device fault: {0}")]
    Device(String),
    #[error("burst source i/o")]
    Io(#[from] std::io::Error),
}

/// The one fatal condition that stops acquisition
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("burst fetch failed")]
    BurstFetchFailure(#[source] FetchError),
}
