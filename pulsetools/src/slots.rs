//! Slot table associating same-event measurements across channels

use crate::error::Anomaly;
use crate::{Channel, Measurement};

/// Bounded `(slot, channel) -> Measurement` table.
///
/// Slots are marked good when a signal channel is accepted in them. Every
/// slot written since the last drain is tracked, so whatever the correlator
/// does not visit can be wiped before the next burst reuses the index space.
#[derive(Debug)]
pub struct SlotTable {
    capacity: usize,
    channels: usize,
    cells: Vec<Option<Measurement>>,
    good: Vec<bool>,
    listed: Vec<bool>,
    touched: Vec<usize>,
}

impl SlotTable {
    pub fn new(capacity: usize, channels: usize) -> Self {
        SlotTable {
            capacity,
            channels,
            cells: vec![None; capacity * channels],
            good: vec![false; capacity],
            listed: vec![false; capacity],
            touched: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a measurement at its own slot index, replacing whatever the
    /// same channel had there.
    pub fn insert(&mut self, m: Measurement) -> Result<(), Anomaly> {
        let ch = m.channel as usize;
        if m.slot >= self.capacity || ch >= self.channels {
            return Err(Anomaly::SlotOverflow {
                channel: m.channel,
                slot: m.slot,
                capacity: self.capacity,
            });
        }
        if !self.listed[m.slot] {
            self.listed[m.slot] = true;
            self.touched.push(m.slot);
        }
        self.cells[m.slot * self.channels + ch] = Some(m);
        Ok(())
    }

    pub fn get(&self, slot: usize, channel: Channel) -> Option<&Measurement> {
        if slot >= self.capacity || channel as usize >= self.channels {
            return None;
        }
        self.cells[slot * self.channels + channel as usize].as_ref()
    }

    pub fn mark_good(&mut self, slot: usize) {
        if slot < self.capacity {
            self.good[slot] = true;
            if !self.listed[slot] {
                self.listed[slot] = true;
                self.touched.push(slot);
            }
        }
    }

    pub fn is_good(&self, slot: usize) -> bool {
        slot < self.capacity && self.good[slot]
    }

    /// Good slots in the order they were first written
    pub fn good_slots(&self) -> Vec<usize> {
        self.touched.iter().copied().filter(|&s| self.good[s]).collect()
    }

    /// Remove every record in `slot` and reset its good flag
    pub fn clear_slot(&mut self, slot: usize) {
        if slot >= self.capacity {
            return;
        }
        self.good[slot] = false;
        let channels = self.channels;
        for c in self.cells[slot * channels..(slot + 1) * channels].iter_mut() {
            *c = None;
        }
    }

    /// Wipe every slot written since the last drain
    pub fn drain(&mut self) {
        let touched = std::mem::take(&mut self.touched);
        for &slot in touched.iter() {
            self.clear_slot(slot);
            self.listed[slot] = false;
        }
        self.touched = touched;
        self.touched.clear();
    }

    pub fn clear(&mut self) {
        for c in self.cells.iter_mut() {
            *c = None;
        }
        for g in self.good.iter_mut() {
            *g = false;
        }
        for l in self.listed.iter_mut() {
            *l = false;
        }
        self.touched.clear();
    }
}
