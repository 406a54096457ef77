//! Windowed rate and pile-up reports on a fixed wall-clock cadence

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::acceptance::ChannelCounters;
use crate::assembler::AssemblyStats;
use crate::Channel;

/// Burst-level tallies, kept per report window and per run
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct BurstDiagnostics {
    pub bursts: u64,
    pub empty_bursts: u64,
    pub words: u64,
    pub malformed_words: u64,
    pub truncated_bursts: u64,
    pub clamped_measurements: u64,
    pub slot_overflows: u64,
    pub disabled_channel_hits: u64,
}

impl BurstDiagnostics {
    pub fn add_assembly(&mut self, stats: &AssemblyStats) {
        self.words += stats.words;
        self.malformed_words += stats.malformed;
        self.clamped_measurements += stats.clamped;
        self.disabled_channel_hits += stats.disabled;
    }

    pub fn add(&mut self, other: &BurstDiagnostics) {
        self.bursts += other.bursts;
        self.empty_bursts += other.empty_bursts;
        self.words += other.words;
        self.malformed_words += other.malformed_words;
        self.truncated_bursts += other.truncated_bursts;
        self.clamped_measurements += other.clamped_measurements;
        self.slot_overflows += other.slot_overflows;
        self.disabled_channel_hits += other.disabled_channel_hits;
    }

    pub fn reset(&mut self) {
        *self = BurstDiagnostics::default();
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChannelRate {
    pub channel: Channel,
    /// Accepted pulses per millisecond
    pub accepted_rate: f64,
    /// Triggers per millisecond
    pub trigger_rate: f64,
    pub in_window_pileup_pct: f64,
    pub out_window_pileup_pct: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RateReport {
    pub elapsed_ms: f64,
    pub channels: Vec<ChannelRate>,
    pub diagnostics: BurstDiagnostics,
}

/// `num / den`, or zero when there is nothing to divide by
fn ratio(num: u64, den: f64) -> f64 {
    if den > 0.0 {
        num as f64 / den
    } else {
        0.0
    }
}

impl ChannelRate {
    pub fn new(channel: Channel, cts: &ChannelCounters, elapsed_ms: f64) -> Self {
        let trig = cts.trigger as f64;
        ChannelRate {
            channel,
            accepted_rate: ratio(cts.accepted, elapsed_ms),
            trigger_rate: ratio(cts.trigger, elapsed_ms),
            in_window_pileup_pct: 100.0 * ratio(cts.in_window_pileup, trig),
            out_window_pileup_pct: 100.0 * ratio(cts.out_window_pileup, trig),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateReporter {
    interval: Duration,
    previous: Instant,
}

impl RateReporter {
    pub fn new(interval: Duration, now: Instant) -> Self {
        RateReporter { interval, previous: now }
    }

    pub fn restart(&mut self, now: Instant) {
        self.previous = now;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.previous) >= self.interval
    }

    /// Emit a report over `channels` once the interval has elapsed, then
    /// zero every window counter and restart the window at `now`.
    pub fn report(
        &mut self,
        now: Instant,
        channels: &[Channel],
        counters: &mut [ChannelCounters],
        diagnostics: &mut BurstDiagnostics,
    ) -> Option<RateReport> {
        if !self.due(now) {
            return None;
        }
        let elapsed_ms = now.saturating_duration_since(self.previous).as_secs_f64() * 1e3;
        let rates = channels
            .iter()
            .filter_map(|&ch| {
                counters
                    .get(ch as usize)
                    .map(|cts| ChannelRate::new(ch, cts, elapsed_ms))
            })
            .collect();
        let report = RateReport {
            elapsed_ms,
            channels: rates,
            diagnostics: *diagnostics,
        };
        for cts in counters.iter_mut() {
            cts.reset();
        }
        diagnostics.reset();
        self.previous = now;
        Some(report)
    }
}
