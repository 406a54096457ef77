//! One acquisition engine, parameterized by a [`Run`] declaration
//!
//! A burst flows through the assembler, the per-channel acceptance rules,
//! the energy histograms and the slot table, and finally the correlator, all
//! before `process_burst` returns. Nothing here blocks or does I/O.

use chrono::{offset::Local, DateTime};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::acceptance::{self, ChannelCounters, Outcome};
use crate::assembler::Assembler;
use crate::bit;
use crate::cfg::{ChannelCounts, Run};
use crate::codec::{Family, RawWord};
use crate::correlate::Correlator;
use crate::error::ConfigError;
use crate::hist::Histogram;
use crate::rate::{BurstDiagnostics, RateReport, RateReporter};
use crate::slots::SlotTable;
use crate::Channel;

/// Wall-clock bounds of a run; `stop` is set once and never changes
#[derive(Clone, Copy, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct RunWindow {
    pub start: Option<DateTime<Local>>,
    pub stop: Option<DateTime<Local>>,
}

/// What one call to [`Engine::process_burst`] did
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug)]
pub struct BurstSummary {
    pub measurements: u64,
    pub accepted: u64,
    pub correlated: u64,
    pub truncated: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChannelHistogram {
    pub channel: Channel,
    pub histogram: Histogram,
}

/// Read-only copy of everything a sink may want to persist or display
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub window: RunWindow,
    pub totals: Vec<ChannelCounts>,
    pub energy: Vec<ChannelHistogram>,
    pub time: Vec<ChannelHistogram>,
    pub diagnostics: BurstDiagnostics,
}

pub struct Engine {
    family: Family,
    channels: Vec<Channel>,
    thresholds: Vec<u32>,
    max_value: u32,
    assembler: Assembler,
    slots: SlotTable,
    correlator: Option<Correlator>,
    energy: Vec<Histogram>,
    window: Vec<ChannelCounters>,
    totals: Vec<ChannelCounters>,
    window_diag: BurstDiagnostics,
    total_diag: BurstDiagnostics,
    reporter: RateReporter,
    run: RunWindow,
}

impl Engine {
    pub fn new(cfg: &Run) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let n = cfg.channels();
        let enabled = cfg.enabled_mask();
        let energy = cfg.energy_histogram.build()?;
        let correlator = match &cfg.correlation {
            Some(c) => Some(Correlator::new(
                c.references.clone(),
                c.signals.clone(),
                c.fine_time_unit,
                c.tick_scale,
                c.histogram.build()?,
            )),
            None => None,
        };
        Ok(Engine {
            family: cfg.family,
            channels: bit::mask_to_chans(enabled),
            thresholds: cfg.thresholds(),
            max_value: cfg.max_value(),
            assembler: Assembler::new(cfg.family, enabled, cfg.channel_capacity),
            slots: SlotTable::new(cfg.slot_capacity, n),
            correlator,
            energy: vec![energy; n],
            window: vec![ChannelCounters::default(); n],
            totals: vec![ChannelCounters::default(); n],
            window_diag: BurstDiagnostics::default(),
            total_diag: BurstDiagnostics::default(),
            reporter: RateReporter::new(cfg.report_interval, Instant::now()),
            run: RunWindow::default(),
        })
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Enabled channels, ascending
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Clear every counter, histogram and slot, forget the hardware clock
    /// history and open a new run window.
    pub fn on_run_start(&mut self, now: Instant) {
        for c in self.window.iter_mut().chain(self.totals.iter_mut()) {
            c.reset();
        }
        for h in self.energy.iter_mut() {
            h.reset();
        }
        if let Some(c) = self.correlator.as_mut() {
            c.reset();
        }
        self.slots.clear();
        self.assembler.reset_clock();
        self.window_diag.reset();
        self.total_diag.reset();
        self.reporter.restart(now);
        self.run = RunWindow { start: Some(Local::now()), stop: None };
    }

    /// Close the run window and return the final snapshot
    pub fn on_run_end(&mut self) -> RunSnapshot {
        if self.run.stop.is_none() {
            self.run.stop = Some(Local::now());
        }
        self.snapshot()
    }

    /// Process one burst to completion.
    pub fn process_burst(&mut self, burst: &[RawWord]) -> BurstSummary {
        let mut summary = BurstSummary::default();
        let mut diag = BurstDiagnostics { bursts: 1, ..Default::default() };

        if burst.is_empty() {
            diag.empty_bursts = 1;
            self.absorb(&diag);
            return summary;
        }

        // Anything the correlator never saw from the last burst goes now
        self.slots.drain();

        match self.assembler.assemble(burst) {
            Ok(stats) => diag.add_assembly(&stats),
            Err(anomaly) => {
                warn!("discarding burst of {} words: {}", burst.len(), anomaly);
                diag.words = burst.len() as u64;
                diag.truncated_bursts = 1;
                summary.truncated = true;
                self.absorb(&diag);
                return summary;
            },
        }

        for ch in 0..self.assembler.channels() {
            for m in self.assembler.records(ch) {
                let outcome = acceptance::classify(m, self.thresholds[ch], self.max_value);
                self.window[ch].record(outcome);
                self.totals[ch].record(outcome);
                summary.measurements += 1;
                if outcome != Outcome::Accepted {
                    continue;
                }
                summary.accepted += 1;
                self.energy[ch].fill(m.amplitude as f64);
                if let Some(c) = &self.correlator {
                    let signal = c.is_signal(m.channel);
                    if signal || c.is_reference(m.channel) {
                        match self.slots.insert(*m) {
                            Ok(()) if signal => self.slots.mark_good(m.slot),
                            Ok(()) => {},
                            Err(anomaly) => {
                                debug!("{}", anomaly);
                                diag.slot_overflows += 1;
                            },
                        }
                    }
                }
            }
        }

        if let Some(c) = self.correlator.as_mut() {
            summary.correlated = c.correlate(&mut self.slots);
        }

        self.absorb(&diag);
        summary
    }

    /// Count words that never reached the decoder, e.g. a partial word at
    /// the end of a byte buffer.
    pub fn count_malformed(&mut self, n: u64) {
        self.absorb(&BurstDiagnostics { malformed_words: n, ..Default::default() });
    }

    fn absorb(&mut self, diag: &BurstDiagnostics) {
        self.window_diag.add(diag);
        self.total_diag.add(diag);
    }

    /// Emit a rate report if the reporting interval has elapsed at `now`.
    pub fn poll_report(&mut self, now: Instant) -> Option<RateReport> {
        let report = self.reporter.report(
            now,
            &self.channels,
            &mut self.window,
            &mut self.window_diag,
        );
        if let Some(r) = &report {
            debug!("rate report over {:.1} ms", r.elapsed_ms);
        }
        report
    }

    /// Run total of accepted pulses on `ch`
    pub fn accepted(&self, ch: Channel) -> u64 {
        self.totals.get(ch as usize).map(|c| c.accepted).unwrap_or(0)
    }

    /// Run total counters, indexed by channel
    pub fn totals(&self) -> &[ChannelCounters] {
        &self.totals
    }

    /// Counters of the current report window, indexed by channel
    pub fn window_counters(&self) -> &[ChannelCounters] {
        &self.window
    }

    pub fn diagnostics(&self) -> BurstDiagnostics {
        self.total_diag
    }

    pub fn energy_histogram(&self, ch: Channel) -> Option<&Histogram> {
        self.energy.get(ch as usize)
    }

    pub fn time_histogram(&self, ch: Channel) -> Option<&Histogram> {
        self.correlator.as_ref().and_then(|c| c.histogram(ch))
    }

    pub fn is_good(&self, slot: usize) -> bool {
        self.slots.is_good(slot)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let totals = self
            .channels
            .iter()
            .map(|&channel| ChannelCounts { channel, counters: self.totals[channel as usize] })
            .collect();
        let energy = self
            .channels
            .iter()
            .map(|&channel| ChannelHistogram {
                channel,
                histogram: self.energy[channel as usize].clone(),
            })
            .collect();
        let time = match &self.correlator {
            Some(c) => c
                .histograms()
                .map(|(channel, h)| ChannelHistogram { channel, histogram: h.clone() })
                .collect(),
            None => Vec::new(),
        };
        RunSnapshot {
            window: self.run,
            totals,
            energy,
            time,
            diagnostics: self.total_diag,
        }
    }
}
