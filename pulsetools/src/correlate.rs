//! Reference/signal time differences over good slots

use crate::hist::Histogram;
use crate::slots::SlotTable;
use crate::Channel;

/// Fills one time-difference histogram per signal channel.
#[derive(Clone, Debug)]
pub struct Correlator {
    references: Vec<Channel>,
    signals: Vec<Channel>,
    fine_unit: f64,
    tick_scale: f64,
    histograms: Vec<Histogram>,
}

impl Correlator {
    /// `histogram` is the empty template cloned for every signal channel.
    pub fn new(
        references: Vec<Channel>,
        signals: Vec<Channel>,
        fine_unit: f64,
        tick_scale: f64,
        histogram: Histogram,
    ) -> Self {
        let histograms = signals.iter().map(|_| histogram.clone()).collect();
        Correlator { references, signals, fine_unit, tick_scale, histograms }
    }

    pub fn is_reference(&self, ch: Channel) -> bool {
        self.references.contains(&ch)
    }

    pub fn is_signal(&self, ch: Channel) -> bool {
        self.signals.contains(&ch)
    }

    pub fn signals(&self) -> &[Channel] {
        &self.signals
    }

    /// Visit every good slot once, then clear it. Returns the number of
    /// time differences filled.
    ///
    /// The first configured reference that fired in a slot is its time
    /// origin; a good slot without any reference contributes nothing.
    pub fn correlate(&mut self, table: &mut SlotTable) -> u64 {
        let mut fills = 0;
        for slot in table.good_slots() {
            let t_ref = self
                .references
                .iter()
                .find_map(|&r| table.get(slot, r))
                .map(|m| m.time(self.fine_unit));
            if let Some(t_ref) = t_ref {
                for (i, &sig) in self.signals.iter().enumerate() {
                    if let Some(m) = table.get(slot, sig) {
                        let dt = (m.time(self.fine_unit) - t_ref) * self.tick_scale;
                        self.histograms[i].fill(dt);
                        fills += 1;
                    }
                }
            }
            table.clear_slot(slot);
        }
        return fills;
    }

    pub fn histogram(&self, ch: Channel) -> Option<&Histogram> {
        self.signals
            .iter()
            .position(|&s| s == ch)
            .map(|i| &self.histograms[i])
    }

    pub fn histograms(&self) -> impl Iterator<Item = (Channel, &Histogram)> {
        self.signals.iter().copied().zip(self.histograms.iter())
    }

    pub fn reset(&mut self) {
        for h in self.histograms.iter_mut() {
            h.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coincidence, Measurement};

    fn meas(channel: Channel, slot: usize, coarse_time: u64, fine_time: u16) -> Measurement {
        Measurement {
            channel,
            slot,
            amplitude: 1000,
            coarse_time,
            fine_time,
            coincidence: Coincidence::Matched,
            overflow: false,
        }
    }

    fn correlator(references: Vec<Channel>, signals: Vec<Channel>) -> Correlator {
        let h = Histogram::new(200, -100.0, 100.0).unwrap();
        Correlator::new(references, signals, 0.001, 1.0, h)
    }

    #[test]
    fn slot_without_reference_is_dropped() {
        let mut c = correlator(vec![4], vec![0]);
        let mut t = SlotTable::new(8, 8);
        t.insert(meas(0, 2, 10, 0)).unwrap();
        t.mark_good(2);
        assert_eq!(0, c.correlate(&mut t));
        assert!(!t.is_good(2));
        assert!(t.get(2, 0).is_none());
    }

    #[test]
    fn first_configured_reference_wins() {
        let mut c = correlator(vec![6, 4], vec![0]);
        let mut t = SlotTable::new(8, 8);
        t.insert(meas(4, 1, 100, 0)).unwrap();
        t.insert(meas(6, 1, 90, 0)).unwrap();
        t.insert(meas(0, 1, 95, 0)).unwrap();
        t.mark_good(1);
        assert_eq!(1, c.correlate(&mut t));
        let h = c.histogram(0).unwrap();
        // 95 - 90 = +5, not 95 - 100
        assert_eq!(1, h.counts()[h.index(5.0).unwrap()]);
    }

    #[test]
    fn only_good_slots_are_visited() {
        let mut c = correlator(vec![4], vec![0, 1]);
        let mut t = SlotTable::new(8, 8);
        t.insert(meas(4, 3, 100, 0)).unwrap();
        t.insert(meas(0, 3, 101, 0)).unwrap();
        t.insert(meas(4, 5, 100, 0)).unwrap();
        t.insert(meas(1, 5, 102, 0)).unwrap();
        t.mark_good(5);
        assert_eq!(1, c.correlate(&mut t));
        assert_eq!(0, c.histogram(0).unwrap().entries());
        assert_eq!(1, c.histogram(1).unwrap().entries());
        // Slot 3 was never good and stays put until drained
        assert!(t.get(3, 0).is_some());
    }
}
