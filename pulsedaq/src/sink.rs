//! Console sink: rate reports go to the log, the final snapshot is kept
//! for saving

use pulsetools::acquisition::Sink;
use pulsetools::engine::RunSnapshot;
use pulsetools::rate::RateReport;
use tracing::{info, warn};

#[derive(Default)]
pub struct LogSink {
    reports: u64,
    last: Option<RunSnapshot>,
}

impl LogSink {
    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Final snapshot of the run, once it has ended
    pub fn take_snapshot(&mut self) -> Option<RunSnapshot> {
        self.last.take()
    }
}

impl Sink for LogSink {
    fn report(&mut self, report: &RateReport) {
        self.reports += 1;
        for ch in report.channels.iter() {
            info!(
                "ch {:2}: {:8.3} accepted/ms {:8.3} triggers/ms, pile-up {:5.1}% in window {:5.1}% out",
                ch.channel,
                ch.accepted_rate,
                ch.trigger_rate,
                ch.in_window_pileup_pct,
                ch.out_window_pileup_pct,
            );
        }
        let d = &report.diagnostics;
        if d.malformed_words > 0 || d.truncated_bursts > 0 {
            warn!(
                "{} malformed words, {} truncated bursts in the last {:.0} ms",
                d.malformed_words,
                d.truncated_bursts,
                report.elapsed_ms,
            );
        }
        if d.clamped_measurements > 0 || d.slot_overflows > 0 {
            warn!(
                "{} measurements clamped, {} slot overflows",
                d.clamped_measurements,
                d.slot_overflows,
            );
        }
    }

    fn finish(&mut self, snapshot: &RunSnapshot) {
        let d = &snapshot.diagnostics;
        info!(
            "run finished: {} bursts ({} empty), {} words, {} malformed",
            d.bursts,
            d.empty_bursts,
            d.words,
            d.malformed_words,
        );
        self.last = Some(snapshot.clone());
    }
}
