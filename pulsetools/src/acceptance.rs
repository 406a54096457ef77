//! Threshold and coincidence acceptance of single measurements

use serde::{Deserialize, Serialize};

use crate::{Coincidence, Measurement};

/// Fate of one measurement
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Outcome {
    Accepted,
    InWindowPileup,
    OutWindowPileup,
}

/// Classify a measurement against its channel threshold and the saturation
/// ceiling.
///
/// The amplitude is checked first: an amplitude at or below threshold, or at
/// or above `max_value`, is pile-up whatever its timing, and lands in-window
/// only if it was tagged as matched. An in-range amplitude is accepted only
/// when it is matched.
#[inline]
pub fn classify(m: &Measurement, threshold: u32, max_value: u32) -> Outcome {
    let matched = m.coincidence == Coincidence::Matched;
    if m.amplitude <= threshold || m.amplitude >= max_value {
        if matched {
            Outcome::InWindowPileup
        } else {
            Outcome::OutWindowPileup
        }
    } else if matched {
        Outcome::Accepted
    } else {
        Outcome::OutWindowPileup
    }
}

/// Per-channel event counters
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChannelCounters {
    pub trigger: u64,
    pub accepted: u64,
    pub in_window_pileup: u64,
    pub out_window_pileup: u64,
    pub pileup: u64,
}

impl ChannelCounters {
    pub fn record(&mut self, outcome: Outcome) {
        self.trigger += 1;
        match outcome {
            Outcome::Accepted => self.accepted += 1,
            Outcome::InWindowPileup => {
                self.in_window_pileup += 1;
                self.pileup += 1;
            },
            Outcome::OutWindowPileup => {
                self.out_window_pileup += 1;
                self.pileup += 1;
            },
        }
    }

    pub fn add(&mut self, other: &ChannelCounters) {
        self.trigger += other.trigger;
        self.accepted += other.accepted;
        self.in_window_pileup += other.in_window_pileup;
        self.out_window_pileup += other.out_window_pileup;
        self.pileup += other.pileup;
    }

    pub fn reset(&mut self) {
        *self = ChannelCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meas(amplitude: u32, coincidence: Coincidence) -> Measurement {
        Measurement {
            channel: 0,
            slot: 0,
            amplitude,
            coarse_time: 0,
            fine_time: 0,
            coincidence,
            overflow: false,
        }
    }

    #[test]
    fn amplitude_checked_before_coincidence() {
        use Coincidence::*;
        let c = |a, f| classify(&meas(a, f), 100, 16383);
        assert_eq!(Outcome::Accepted, c(500, Matched));
        assert_eq!(Outcome::InWindowPileup, c(50, Matched));
        assert_eq!(Outcome::InWindowPileup, c(100, Matched));
        assert_eq!(Outcome::InWindowPileup, c(16383, Matched));
        assert_eq!(Outcome::OutWindowPileup, c(50, Unmatched));
        assert_eq!(Outcome::OutWindowPileup, c(500, Unmatched));
        assert_eq!(Outcome::OutWindowPileup, c(500, Neither));
        assert_eq!(Outcome::Accepted, c(101, Matched));
        assert_eq!(Outcome::Accepted, c(16382, Matched));
    }

    #[test]
    fn counters_partition_triggers() {
        let mut cts = ChannelCounters::default();
        for o in [Outcome::Accepted, Outcome::InWindowPileup, Outcome::OutWindowPileup, Outcome::Accepted] {
            cts.record(o);
        }
        assert_eq!(4, cts.trigger);
        assert_eq!(2, cts.accepted);
        assert_eq!(cts.trigger, cts.accepted + cts.pileup);
        assert_eq!(cts.pileup, cts.in_window_pileup + cts.out_window_pileup);
    }
}
