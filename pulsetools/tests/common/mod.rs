#![allow(dead_code)]

use pulsetools::cfg::{ChannelSettings, Correlation, HistogramSettings, Run};
use pulsetools::codec::{dpp_pha, mqdc32, Family, RawWord, Record};
use pulsetools::{Channel, Coincidence, Measurement};

pub const THRESHOLD: u32 = 100;

/// A DPP-PHA pulse word
pub fn pulse(channel: Channel, energy: u32, coincidence: Coincidence, fine_time: u16) -> RawWord {
    dpp_pha::Pulse { channel, coincidence, energy, fine_time }.to_word()
}

pub fn time_tag(ticks: u32) -> RawWord {
    dpp_pha::TimeTag { ticks }.to_word()
}

pub fn pha_header() -> RawWord {
    dpp_pha::Header { board_id: 0, aggregate: 0 }.to_word()
}

pub fn pha_trailer(word_count: u32) -> RawWord {
    dpp_pha::Trailer { board_id: 0, word_count }.to_word()
}

pub fn qdc_data(channel: Channel, adc: u32) -> RawWord {
    mqdc32::Data { channel, adc, overflow: false }.to_word()
}

pub fn qdc_header(num_words: u32) -> RawWord {
    mqdc32::Header { num_words, fill: 0, module_id: 0, subheader: 0 }.to_word()
}

pub fn qdc_eoe(timestamp: u32) -> RawWord {
    mqdc32::EndOfEvent { timestamp }.to_word()
}

pub fn measurement(channel: Channel, slot: usize, amplitude: u32, coarse_time: u64, fine_time: u16) -> Measurement {
    Measurement {
        channel,
        slot,
        amplitude,
        coarse_time,
        fine_time,
        coincidence: Coincidence::Matched,
        overflow: false,
    }
}

/// Every channel at the common threshold, 14-bit ceiling of 16384
pub fn pha_run() -> Run {
    Run {
        name: String::from("test"),
        family: Family::DppPha,
        max_value: Some(16384),
        channel_settings: (0..8)
            .map(|channel| ChannelSettings { channel, enabled: None, threshold: Some(THRESHOLD) })
            .collect(),
        ..Default::default()
    }
}

/// `pha_run` with channel 4 as reference and channel 0 as signal
pub fn timing_run(tick_scale: f64) -> Run {
    Run {
        correlation: Some(Correlation {
            references: vec![4],
            signals: vec![0],
            fine_time_unit: 0.001,
            tick_scale,
            histogram: HistogramSettings { bins: 200, low: -50.0, high: 50.0 },
        }),
        ..pha_run()
    }
}
