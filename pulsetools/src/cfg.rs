//! Configuration tools: formats for declaring and recording runs

use chrono::{offset::Local, DateTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::acceptance::ChannelCounters;
use crate::bit::BitOps;
use crate::codec::Family;
use crate::error::ConfigError;
use crate::hist::Histogram;
use crate::Channel;

/// Acquisition run specification for both declaring and recording runs in
/// text files. We use JSON as the text file format.
///
/// ## Declaring a run
///
/// Every field has a default, so a declaration only needs what differs from
/// it: typically the hardware `family`, per-channel thresholds, and which
/// channels are references and signals for timing. The `name` field is free;
/// set it to a useful value to help keep track of what was done. A `limit`
/// ends the run on its own; without one the run continues until cancelled.
///
/// ## Recording a run
///
/// A run is recorded in the same format as the declaration, with the start
/// `timestamp`, the `duration` in milliseconds and the final per-channel
/// `counts` filled in. All channel settings are recorded as resolved.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct Run {
    pub name:               String,
    pub timestamp:          Option<DateTime<Local>>,
    pub family:             Family,
    pub limit:              Option<RunLimit>,
    #[serde(with = "humantime_serde")]
    pub report_interval:    Duration,
    #[serde(with = "humantime_serde")]
    pub fetch_timeout:      Duration,
    pub duration:           Option<u64>,
    /// Saturation ceiling; the family's full scale if unset
    pub max_value:          Option<u32>,
    pub channel_capacity:   usize,
    pub slot_capacity:      usize,
    #[serde(default = "emptyvec", skip_serializing_if = "Vec::is_empty")]
    pub channel_settings:   Vec<ChannelSettings>,
    pub energy_histogram:   HistogramSettings,
    pub correlation:        Option<Correlation>,
    #[serde(default = "emptyvec", skip_serializing_if = "Vec::is_empty")]
    pub counts:             Vec<ChannelCounts>,
}

/// Either a fixed time duration, a number of bursts, or a number of accepted
/// pulses on one channel. Duration is parsed as in
/// [humantime](https://docs.rs/humantime/), e.g. `15days 2min 2s`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub enum RunLimit {
    #[serde(with = "humantime_serde")]
    Duration(Duration),
    Bursts(u64),
    AcceptedLimit(Channel, u64),
}

/// All software-controlled settings for a given channel
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct ChannelSettings {
    pub channel:    Channel,
    pub enabled:    Option<bool>,
    pub threshold:  Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct HistogramSettings {
    pub bins:   usize,
    pub low:    f64,
    pub high:   f64,
}

/// Timing correlation between reference and signal channels
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct Correlation {
    pub references:     Vec<Channel>,
    pub signals:        Vec<Channel>,
    /// Fine time step as a fraction of one coarse tick
    pub fine_time_unit: f64,
    /// Physical time per coarse tick, e.g. ns
    pub tick_scale:     f64,
    pub histogram:      HistogramSettings,
}

/// Run totals of one channel, recorded at run end
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct ChannelCounts {
    pub channel:    Channel,
    #[serde(flatten)]
    pub counters:   ChannelCounters,
}

fn emptyvec<T>() -> Vec<T> {
    Vec::new()
}

impl HistogramSettings {
    pub fn build(&self) -> Result<Histogram, ConfigError> {
        Ok(Histogram::new(self.bins, self.low, self.high)?)
    }
}

/// Full 14-bit energy range, one channel per bin
impl Default for HistogramSettings {
    fn default() -> Self {
        HistogramSettings { bins: 16384, low: 0.0, high: 16384.0 }
    }
}

impl Default for Correlation {
    fn default() -> Self {
        Correlation {
            references:     Vec::new(),
            signals:        Vec::new(),
            fine_time_unit: 0.001,
            tick_scale:     1.0,
            histogram:      HistogramSettings { bins: 2000, low: -1000.0, high: 1000.0 },
        }
    }
}

/// Creates an empty Run for the pulse-height digitizer with every channel
/// enabled at zero threshold.
impl Default for Run {
    fn default() -> Self {
        Run {
            name:               String::new(),
            timestamp:          None,
            family:             Family::DppPha,
            limit:              None,
            report_interval:    Duration::from_secs(1),
            fetch_timeout:      Duration::from_millis(100),
            duration:           None,
            max_value:          None,
            channel_capacity:   1024,
            slot_capacity:      1024,
            channel_settings:   Vec::new(),
            energy_histogram:   HistogramSettings::default(),
            correlation:        None,
            counts:             Vec::new(),
        }
    }
}

impl Run {
    pub fn channels(&self) -> usize {
        self.family.channels()
    }

    pub fn max_value(&self) -> u32 {
        self.max_value.unwrap_or_else(|| self.family.full_scale())
    }

    /// Channels start enabled unless switched off in `channel_settings`
    pub fn enabled_mask(&self) -> u32 {
        let mut m = 0u32;
        for ch in 0..self.channels() {
            m.set(ch);
        }
        for s in self.channel_settings.iter() {
            if let Some(e) = s.enabled {
                if (s.channel as usize) < self.channels() {
                    m.change(s.channel as usize, e);
                }
            }
        }
        return m;
    }

    /// Threshold for every channel of the module, zero if unset
    pub fn thresholds(&self) -> Vec<u32> {
        let mut thr = vec![0; self.channels()];
        for s in self.channel_settings.iter() {
            if let (Some(t), Some(slot)) = (s.threshold, thr.get_mut(s.channel as usize)) {
                *slot = t;
            }
        }
        return thr;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let channels = self.channels();
        let check = |channel: Channel| {
            if channel as usize >= channels {
                Err(ConfigError::ChannelOutOfRange { channel, channels })
            } else {
                Ok(())
            }
        };
        for s in self.channel_settings.iter() {
            check(s.channel)?;
        }
        if self.channel_capacity == 0 || self.slot_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.energy_histogram.build()?;
        if let Some(c) = &self.correlation {
            if c.references.is_empty() || c.signals.is_empty() {
                return Err(ConfigError::EmptyCorrelation);
            }
            for &ch in c.references.iter().chain(c.signals.iter()) {
                check(ch)?;
            }
            if let Some(&r) = c.references.iter().find(|&&r| c.signals.contains(&r)) {
                return Err(ConfigError::ReferenceIsSignal(r));
            }
            c.histogram.build()?;
        }
        if let Some(RunLimit::AcceptedLimit(ch, _)) = self.limit {
            check(ch)?;
        }
        Ok(())
    }
}
