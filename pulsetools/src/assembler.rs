//! Grouping of one burst's measurements into per-channel sequences

use tracing::debug;

use crate::bit::BitOps;
use crate::codec::{Decoded, Family, Field, Hit, RawWord};
use crate::error::Anomaly;
use crate::Measurement;

/// Word tallies for one assembled burst
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug)]
pub struct AssemblyStats {
    pub words: u64,
    pub malformed: u64,
    /// Measurements dropped because their channel was already full
    pub clamped: u64,
    /// Measurements from channels outside the enabled mask
    pub disabled: u64,
}

/// Splits a burst into `records[channel][n]`.
///
/// Framing words are only used to check that every frame is exactly as long
/// as it claims to be. Frames on the MQDC-32 are events: their measurements
/// share the event ordinal as slot and take the end-of-event timestamp as
/// coarse time. DPP-PHA aggregates carry no event ordinal, so a measurement's
/// slot is its position in its channel's sequence, and its coarse time is the
/// most recent time tag.
///
/// On the MQDC-32 a data word outside any event belongs to no slot; it is
/// counted as malformed and dropped. Hardware timestamps roll over at their
/// field width and are extended to 64 bits across bursts until
/// [`Assembler::reset_clock`].
#[derive(Debug)]
pub struct Assembler {
    family: Family,
    enabled: u32,
    capacity: usize,
    records: Vec<Vec<Measurement>>,
    pending: Vec<(Hit, u64)>,
    stats: AssemblyStats,
    clock: Clock,
}

/// Unwraps a rolling hardware counter. A step back by more than half the
/// counter period is taken as a rollover.
#[derive(Clone, Copy, Debug)]
struct Clock {
    period: u64,
    epoch: u64,
    last: Option<u64>,
}

impl Clock {
    fn new(field: Field) -> Self {
        Clock { period: 1u64 << field.width, epoch: 0, last: None }
    }

    fn extend(&mut self, raw: u64) -> u64 {
        if let Some(last) = self.last {
            if raw < last && last - raw > self.period / 2 {
                self.epoch += self.period;
            }
        }
        self.last = Some(raw);
        self.epoch + raw
    }

    fn reset(&mut self) {
        self.epoch = 0;
        self.last = None;
    }
}

struct Frame {
    start: usize,
    declared: Option<u32>,
}

impl Assembler {
    pub fn new(family: Family, enabled: u32, capacity: usize) -> Self {
        let records = (0..family.channels())
            .map(|_| Vec::with_capacity(capacity))
            .collect();
        Assembler {
            family,
            enabled,
            capacity,
            records,
            pending: Vec::new(),
            stats: AssemblyStats::default(),
            clock: Clock::new(family.clock()),
        }
    }

    /// Forget the timestamp history, e.g. when a new run starts
    pub fn reset_clock(&mut self) {
        self.clock.reset();
    }

    /// Decode a whole burst. On a framing fault the burst is dropped in its
    /// entirety and no records remain.
    pub fn assemble(&mut self, burst: &[RawWord]) -> Result<AssemblyStats, Anomaly> {
        self.clear();
        self.stats.words = burst.len() as u64;

        let explicit_slots = self.family == Family::Mqdc32;
        let mut frame: Option<Frame> = None;
        let mut coarse = 0u64;
        let mut event = 0usize;

        for (index, &word) in burst.iter().enumerate() {
            match self.family.decode(word) {
                Decoded::Header { frame_len } => {
                    if frame.is_some() {
                        self.clear();
                        return Err(Anomaly::UnterminatedFrame { index });
                    }
                    frame = Some(Frame { start: index, declared: frame_len });
                },
                Decoded::Measurement(hit) => {
                    if frame.is_some() {
                        self.pending.push((hit, coarse));
                    } else if explicit_slots {
                        debug!("{} outside any event", Anomaly::MalformedWord { index, word });
                        self.stats.malformed += 1;
                    } else {
                        self.push(hit, coarse, event, explicit_slots);
                    }
                },
                Decoded::TriggerTime(t) => {
                    coarse = self.clock.extend(t);
                },
                Decoded::Trailer { frame_len, timestamp } => {
                    let (start, declared) = match frame.take() {
                        Some(f) => (f.start, frame_len.or(f.declared)),
                        None => (index, frame_len),
                    };
                    let consumed = (index - start + 1) as u32;
                    if let Some(declared) = declared {
                        if declared != consumed {
                            self.clear();
                            return Err(Anomaly::TruncatedBurst { declared, consumed });
                        }
                    }
                    let stamp = timestamp.map(|t| self.clock.extend(t));
                    if let Some(t) = stamp {
                        coarse = t;
                    }
                    let pending = std::mem::take(&mut self.pending);
                    for &(hit, t) in pending.iter() {
                        self.push(hit, stamp.unwrap_or(t), event, explicit_slots);
                    }
                    self.pending = pending;
                    self.pending.clear();
                    event += 1;
                },
                Decoded::Error => {
                    debug!("{}", Anomaly::MalformedWord { index, word });
                    self.stats.malformed += 1;
                },
            }
        }

        if let Some(f) = frame {
            let consumed = (burst.len() - f.start) as u32;
            self.clear();
            return Err(Anomaly::TruncatedBurst {
                declared: f.declared.unwrap_or(0),
                consumed,
            });
        }

        Ok(self.stats)
    }

    fn push(&mut self, hit: Hit, coarse: u64, event: usize, explicit_slots: bool) {
        let ch = hit.channel as usize;
        if ch >= self.records.len() || !self.enabled.check(ch) {
            self.stats.disabled += 1;
            return;
        }
        let list = &mut self.records[ch];
        if list.len() >= self.capacity {
            self.stats.clamped += 1;
            return;
        }
        let slot = if explicit_slots { event } else { list.len() };
        list.push(Measurement {
            channel: hit.channel,
            slot,
            amplitude: hit.amplitude,
            coarse_time: coarse,
            fine_time: hit.fine_time,
            coincidence: hit.coincidence,
            overflow: hit.overflow,
        });
    }

    fn clear(&mut self) {
        for list in self.records.iter_mut() {
            list.clear();
        }
        self.pending.clear();
        self.stats = AssemblyStats::default();
    }

    /// Measurements of `channel` from the last burst, in arrival order
    pub fn records(&self, channel: usize) -> &[Measurement] {
        self.records.get(channel).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Number of measurements per channel from the last burst
    pub fn num_events(&self) -> Vec<usize> {
        self.records.iter().map(|v| v.len()).collect()
    }

    pub fn channels(&self) -> usize {
        self.records.len()
    }
}
