//! Classification and decoding of raw readout words
//!
//! Every supported module family emits fixed-format 32-bit words. A word is
//! classified into exactly one [`WordKind`] by its signature bits; anything
//! that matches no entry in the family's table is [`WordKind::Error`]. All
//! fields are pulled out with the shared [`bit::extract`] primitive, so each
//! layout below is nothing more than a table of `(width, offset)` pairs.

use serde::{Deserialize, Serialize};

use crate::error::EncodeError;
use crate::{bit, Channel, Coincidence, Measurement};

/// One word as read from a hardware FIFO
pub type RawWord = u32;

/// Supported hardware families
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Mesytec MQDC-32 charge-integrating VME QDC
    Mqdc32,
    /// CAEN digitizer running DPP-PHA pulse-height firmware
    DppPha,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum WordKind {
    Header,
    Measurement,
    /// End of frame; on the MQDC-32 this is the end-of-event word
    Trailer,
    Error,
    GlobalTriggerTime,
}

/// A fixed bit range within a word
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Field {
    pub width: u32,
    pub offset: u32,
}

impl Field {
    pub const fn new(width: u32, offset: u32) -> Self {
        Field { width, offset }
    }

    #[inline]
    pub fn get(self, word: RawWord) -> u32 {
        bit::extract(word, self.width, self.offset)
    }

    #[inline]
    pub fn put(self, word: RawWord, value: u32) -> RawWord {
        bit::insert(word, value, self.width, self.offset)
    }

    /// Largest value the field can hold
    pub fn max(self) -> u32 {
        bit::extract(u32::MAX, self.width, 0)
    }
}

/// A typed record decodable from exactly one kind of word of one family
pub trait Record: Sized {
    const FAMILY: Family;
    const KIND: WordKind;

    /// Pull the fields out of `word` without checking its kind
    fn from_word(word: RawWord) -> Self;

    /// Build a word of this record's kind; field values are truncated to
    /// their widths.
    fn to_word(&self) -> RawWord;
}

/// Decode `word` as a `T`, or `None` if the word is of a different kind.
pub fn decode<T: Record>(word: RawWord) -> Option<T> {
    if T::FAMILY.classify(word) == T::KIND {
        Some(T::from_word(word))
    } else {
        None
    }
}

/// Pulse fields common to every family
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Hit {
    pub channel: Channel,
    pub amplitude: u32,
    pub fine_time: u16,
    pub coincidence: Coincidence,
    pub overflow: bool,
}

/// Family-agnostic view of one word, as used by the event assembler
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Decoded {
    /// Start of frame; `frame_len` counts header through trailer if known
    Header { frame_len: Option<u32> },
    Measurement(Hit),
    Trailer { frame_len: Option<u32>, timestamp: Option<u64> },
    /// Coarse time for every following measurement
    TriggerTime(u64),
    Error,
}

impl std::str::FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mqdc32" => Ok(Family::Mqdc32),
            "dpp_pha" => Ok(Family::DppPha),
            _ => Err(format!("unknown family {}, expected mqdc32 or dpp_pha", s)),
        }
    }
}

impl Family {
    /// Classify a word. Pure: the same word always gives the same kind.
    pub fn classify(self, word: RawWord) -> WordKind {
        match self {
            Family::Mqdc32 => mqdc32::classify(word),
            Family::DppPha => dpp_pha::classify(word),
        }
    }

    pub fn decode(self, word: RawWord) -> Decoded {
        match self {
            Family::Mqdc32 => mqdc32::decode(word),
            Family::DppPha => dpp_pha::decode(word),
        }
    }

    /// Number of input channels on one module
    pub fn channels(self) -> usize {
        match self {
            Family::Mqdc32 => 32,
            Family::DppPha => 8,
        }
    }

    /// Saturation ceiling of the amplitude field
    pub fn full_scale(self) -> u32 {
        match self {
            Family::Mqdc32 => mqdc32::ADC.max(),
            Family::DppPha => dpp_pha::ENERGY.max(),
        }
    }

    /// The coarse-time counter field, which rolls over at its width
    pub fn clock(self) -> Field {
        match self {
            Family::Mqdc32 => mqdc32::TIMESTAMP,
            Family::DppPha => dpp_pha::TIME_TAG,
        }
    }

    /// Check that every field of `m` fits this family's words
    pub fn check(self, m: &Measurement) -> Result<(), EncodeError> {
        if m.channel as usize >= self.channels() {
            return Err(EncodeError::ChannelOutOfRange {
                channel: m.channel,
                channels: self.channels(),
            });
        }
        let fine_max = match self {
            Family::Mqdc32 => 0,
            Family::DppPha => dpp_pha::FINE_TIME.max(),
        };
        for &(field, value, max) in [
            ("amplitude", m.amplitude, self.full_scale()),
            ("fine time", m.fine_time as u32, fine_max),
        ].iter() {
            if value > max {
                return Err(EncodeError::FieldOverflow {
                    field,
                    value: value as u64,
                    max: max as u64,
                });
            }
        }
        Ok(())
    }
}

/// Build the words a module of `family` would emit for `pulses`.
///
/// DPP-PHA pulses go into a single aggregate, with a time tag word whenever
/// the coarse time changes. MQDC-32 pulses sharing a slot form one event,
/// stamped with the coarse time of the first of them; events are emitted in
/// ascending slot order. Coarse times wrap at the width of the hardware
/// counter, like the counter itself. Any other value too wide for its field
/// is an error.
pub fn encode_burst(family: Family, pulses: &[Measurement]) -> Result<Vec<RawWord>, EncodeError> {
    for p in pulses.iter() {
        family.check(p)?;
    }
    let clock = family.clock();
    let mut words = Vec::new();
    match family {
        Family::DppPha => {
            words.push(dpp_pha::Header { board_id: 0, aggregate: 0 }.to_word());
            let mut coarse = None;
            for p in pulses.iter() {
                if coarse != Some(p.coarse_time) {
                    coarse = Some(p.coarse_time);
                    let ticks = (p.coarse_time & clock.max() as u64) as u32;
                    words.push(dpp_pha::TimeTag { ticks }.to_word());
                }
                words.push(dpp_pha::Pulse {
                    channel: p.channel,
                    coincidence: p.coincidence,
                    energy: p.amplitude,
                    fine_time: p.fine_time,
                }.to_word());
            }
            let word_count = words.len() as u64 + 1;
            if word_count > dpp_pha::WORD_COUNT.max() as u64 {
                return Err(EncodeError::FieldOverflow {
                    field: "aggregate length",
                    value: word_count,
                    max: dpp_pha::WORD_COUNT.max() as u64,
                });
            }
            words.push(dpp_pha::Trailer { board_id: 0, word_count: word_count as u32 }.to_word());
        },
        Family::Mqdc32 => {
            let mut sorted: Vec<&Measurement> = pulses.iter().collect();
            sorted.sort_by_key(|p| p.slot);
            let mut rest = sorted.as_slice();
            while let Some(first) = rest.first() {
                let n = rest.iter().take_while(|p| p.slot == first.slot).count();
                let (event, tail) = rest.split_at(n);
                let num_words = n as u64 + 1;
                if num_words > mqdc32::NUM_WORDS.max() as u64 {
                    return Err(EncodeError::FieldOverflow {
                        field: "event length",
                        value: num_words,
                        max: mqdc32::NUM_WORDS.max() as u64,
                    });
                }
                words.push(mqdc32::Header {
                    num_words: num_words as u32,
                    fill: 0,
                    module_id: 0,
                    subheader: 0,
                }.to_word());
                for p in event.iter() {
                    words.push(mqdc32::Data {
                        channel: p.channel,
                        adc: p.amplitude,
                        overflow: p.overflow,
                    }.to_word());
                }
                let timestamp = (first.coarse_time & clock.max() as u64) as u32;
                words.push(mqdc32::EndOfEvent { timestamp }.to_word());
                rest = tail;
            }
        },
    }
    Ok(words)
}

/// Mesytec MQDC-32 word layout
///
/// | kind         | bits                                                       |
/// |--------------|------------------------------------------------------------|
/// | header       | `01` [31:30], subheader [29:24], module id [23:16], fill [14:12], words [11:0] |
/// | data         | `00` [31:30], `0x020` [29:21], channel [20:16], overflow [15], adc [11:0] |
/// | end of event | `11` [31:30], timestamp [29:0]                             |
///
/// The timestamp is a 30-bit counter that rolls over; the event assembler
/// extends it to 64 bits.
pub mod mqdc32 {
    use super::{Decoded, Family, Field, Hit, RawWord, Record, WordKind};
    use crate::Coincidence;

    pub const SIGNATURE: Field = Field::new(2, 30);
    pub const HEADER_SIGNATURE: u32 = 0b01;
    pub const DATA_SIGNATURE: u32 = 0b00;
    pub const EOE_SIGNATURE: u32 = 0b11;

    pub const NUM_WORDS: Field = Field::new(12, 0);
    pub const FILL: Field = Field::new(3, 12);
    pub const MODULE_ID: Field = Field::new(8, 16);
    pub const SUBHEADER: Field = Field::new(6, 24);

    pub const ADC: Field = Field::new(12, 0);
    pub const OVERFLOW: Field = Field::new(1, 15);
    pub const CHANNEL: Field = Field::new(5, 16);
    pub const FIX: Field = Field::new(9, 21);
    pub const DATA_FIX: u32 = 32;

    pub const TIMESTAMP: Field = Field::new(30, 0);

    pub fn classify(word: RawWord) -> WordKind {
        match SIGNATURE.get(word) {
            HEADER_SIGNATURE => WordKind::Header,
            DATA_SIGNATURE if FIX.get(word) == DATA_FIX => WordKind::Measurement,
            EOE_SIGNATURE => WordKind::Trailer,
            _ => WordKind::Error,
        }
    }

    pub fn decode(word: RawWord) -> Decoded {
        match classify(word) {
            WordKind::Header => {
                let h = Header::from_word(word);
                // num_words counts what follows the header
                Decoded::Header { frame_len: Some(h.num_words + 1) }
            },
            WordKind::Measurement => {
                let d = Data::from_word(word);
                // Conversions only happen inside the gate
                Decoded::Measurement(Hit {
                    channel: d.channel,
                    amplitude: d.adc,
                    fine_time: 0,
                    coincidence: Coincidence::Matched,
                    overflow: d.overflow,
                })
            },
            WordKind::Trailer => {
                let e = EndOfEvent::from_word(word);
                Decoded::Trailer { frame_len: None, timestamp: Some(e.timestamp as u64) }
            },
            _ => Decoded::Error,
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct Header {
        pub num_words: u32,
        pub fill: u32,
        pub module_id: u32,
        pub subheader: u32,
    }

    impl Record for Header {
        const FAMILY: Family = Family::Mqdc32;
        const KIND: WordKind = WordKind::Header;

        fn from_word(word: RawWord) -> Self {
            Header {
                num_words: NUM_WORDS.get(word),
                fill: FILL.get(word),
                module_id: MODULE_ID.get(word),
                subheader: SUBHEADER.get(word),
            }
        }

        fn to_word(&self) -> RawWord {
            let mut w = SIGNATURE.put(0, HEADER_SIGNATURE);
            w = NUM_WORDS.put(w, self.num_words);
            w = FILL.put(w, self.fill);
            w = MODULE_ID.put(w, self.module_id);
            SUBHEADER.put(w, self.subheader)
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct Data {
        pub channel: u8,
        pub adc: u32,
        pub overflow: bool,
    }

    impl Record for Data {
        const FAMILY: Family = Family::Mqdc32;
        const KIND: WordKind = WordKind::Measurement;

        fn from_word(word: RawWord) -> Self {
            Data {
                channel: CHANNEL.get(word) as u8,
                adc: ADC.get(word),
                overflow: OVERFLOW.get(word) == 1,
            }
        }

        fn to_word(&self) -> RawWord {
            let mut w = SIGNATURE.put(0, DATA_SIGNATURE);
            w = FIX.put(w, DATA_FIX);
            w = CHANNEL.put(w, self.channel as u32);
            w = ADC.put(w, self.adc);
            OVERFLOW.put(w, self.overflow as u32)
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct EndOfEvent {
        pub timestamp: u32,
    }

    impl Record for EndOfEvent {
        const FAMILY: Family = Family::Mqdc32;
        const KIND: WordKind = WordKind::Trailer;

        fn from_word(word: RawWord) -> Self {
            EndOfEvent { timestamp: TIMESTAMP.get(word) }
        }

        fn to_word(&self) -> RawWord {
            TIMESTAMP.put(SIGNATURE.put(0, EOE_SIGNATURE), self.timestamp)
        }
    }
}

/// CAEN DPP-PHA list-mode word layout
///
/// | kind     | bits                                                              |
/// |----------|-------------------------------------------------------------------|
/// | pulse    | `000` [31:29], channel [28:26], coincidence [25:24], energy [23:10], fine [9:0] |
/// | header   | `010` [31:29], board [28:21], aggregate counter [20:0]            |
/// | time tag | `100` [31:29], coarse ticks [28:0]                                |
/// | trailer  | `110` [31:29], board [28:21], words in aggregate [20:0]           |
///
/// Time tags count 29 bits and roll over; the event assembler extends them
/// to 64 bits. The aggregate word count includes header and trailer.
pub mod dpp_pha {
    use super::{Decoded, Family, Field, Hit, RawWord, Record, WordKind};
    use crate::Coincidence;

    pub const SIGNATURE: Field = Field::new(3, 29);
    pub const PULSE_SIGNATURE: u32 = 0b000;
    pub const HEADER_SIGNATURE: u32 = 0b010;
    pub const TIME_TAG_SIGNATURE: u32 = 0b100;
    pub const TRAILER_SIGNATURE: u32 = 0b110;

    pub const FINE_TIME: Field = Field::new(10, 0);
    pub const ENERGY: Field = Field::new(14, 10);
    pub const COINCIDENCE: Field = Field::new(2, 24);
    pub const CHANNEL: Field = Field::new(3, 26);

    pub const AGGREGATE: Field = Field::new(21, 0);
    pub const BOARD_ID: Field = Field::new(8, 21);
    pub const TIME_TAG: Field = Field::new(29, 0);
    pub const WORD_COUNT: Field = Field::new(21, 0);

    pub fn classify(word: RawWord) -> WordKind {
        match SIGNATURE.get(word) {
            PULSE_SIGNATURE => WordKind::Measurement,
            HEADER_SIGNATURE => WordKind::Header,
            TIME_TAG_SIGNATURE => WordKind::GlobalTriggerTime,
            TRAILER_SIGNATURE => WordKind::Trailer,
            _ => WordKind::Error,
        }
    }

    pub fn decode(word: RawWord) -> Decoded {
        match classify(word) {
            WordKind::Measurement => {
                let p = Pulse::from_word(word);
                Decoded::Measurement(Hit {
                    channel: p.channel,
                    amplitude: p.energy,
                    fine_time: p.fine_time,
                    coincidence: p.coincidence,
                    overflow: false,
                })
            },
            WordKind::Header => Decoded::Header { frame_len: None },
            WordKind::GlobalTriggerTime => {
                Decoded::TriggerTime(TimeTag::from_word(word).ticks as u64)
            },
            WordKind::Trailer => {
                let t = Trailer::from_word(word);
                Decoded::Trailer { frame_len: Some(t.word_count), timestamp: None }
            },
            _ => Decoded::Error,
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct Pulse {
        pub channel: u8,
        pub coincidence: Coincidence,
        pub energy: u32,
        pub fine_time: u16,
    }

    impl Record for Pulse {
        const FAMILY: Family = Family::DppPha;
        const KIND: WordKind = WordKind::Measurement;

        fn from_word(word: RawWord) -> Self {
            Pulse {
                channel: CHANNEL.get(word) as u8,
                coincidence: Coincidence::from_bits(COINCIDENCE.get(word)),
                energy: ENERGY.get(word),
                fine_time: FINE_TIME.get(word) as u16,
            }
        }

        fn to_word(&self) -> RawWord {
            let mut w = SIGNATURE.put(0, PULSE_SIGNATURE);
            w = CHANNEL.put(w, self.channel as u32);
            w = COINCIDENCE.put(w, self.coincidence.to_bits());
            w = ENERGY.put(w, self.energy);
            FINE_TIME.put(w, self.fine_time as u32)
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct Header {
        pub board_id: u32,
        pub aggregate: u32,
    }

    impl Record for Header {
        const FAMILY: Family = Family::DppPha;
        const KIND: WordKind = WordKind::Header;

        fn from_word(word: RawWord) -> Self {
            Header { board_id: BOARD_ID.get(word), aggregate: AGGREGATE.get(word) }
        }

        fn to_word(&self) -> RawWord {
            let w = SIGNATURE.put(0, HEADER_SIGNATURE);
            AGGREGATE.put(BOARD_ID.put(w, self.board_id), self.aggregate)
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct TimeTag {
        pub ticks: u32,
    }

    impl Record for TimeTag {
        const FAMILY: Family = Family::DppPha;
        const KIND: WordKind = WordKind::GlobalTriggerTime;

        fn from_word(word: RawWord) -> Self {
            TimeTag { ticks: TIME_TAG.get(word) }
        }

        fn to_word(&self) -> RawWord {
            TIME_TAG.put(SIGNATURE.put(0, TIME_TAG_SIGNATURE), self.ticks)
        }
    }

    #[derive(Clone, Copy, Eq, PartialEq, Debug)]
    pub struct Trailer {
        pub board_id: u32,
        pub word_count: u32,
    }

    impl Record for Trailer {
        const FAMILY: Family = Family::DppPha;
        const KIND: WordKind = WordKind::Trailer;

        fn from_word(word: RawWord) -> Self {
            Trailer { board_id: BOARD_ID.get(word), word_count: WORD_COUNT.get(word) }
        }

        fn to_word(&self) -> RawWord {
            let w = SIGNATURE.put(0, TRAILER_SIGNATURE);
            WORD_COUNT.put(BOARD_ID.put(w, self.board_id), self.word_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_max() {
        assert_eq!(4095, mqdc32::ADC.max());
        assert_eq!(16383, dpp_pha::ENERGY.max());
        assert_eq!(1, mqdc32::OVERFLOW.max());
    }

    #[test]
    fn mqdc32_reference_words() {
        // Header: module 7, 3 words follow
        assert_eq!(WordKind::Header, Family::Mqdc32.classify(0x4007_0003));
        // Data: channel 2, adc 0x123, fix = 32
        let w = 0x0402_0123;
        assert_eq!(WordKind::Measurement, Family::Mqdc32.classify(w));
        let d: mqdc32::Data = decode(w).unwrap();
        assert_eq!((2, 0x123, false), (d.channel, d.adc, d.overflow));
        // Signature 00 without the fixed pattern is filler
        assert_eq!(WordKind::Error, Family::Mqdc32.classify(0x0000_0000));
        assert_eq!(WordKind::Error, Family::Mqdc32.classify(0x8000_0000));
        assert_eq!(WordKind::Trailer, Family::Mqdc32.classify(0xc000_0042));
    }

    #[test]
    fn decode_rejects_other_kinds() {
        assert_eq!(None, decode::<mqdc32::Data>(0x4007_0003));
        assert_eq!(None, decode::<dpp_pha::Pulse>(0xe000_0000));
        assert!(decode::<dpp_pha::TimeTag>(0x8000_0001).is_some());
    }

    #[test]
    fn dpp_pha_error_signatures() {
        for sig in [0b001u32, 0b011, 0b101, 0b111] {
            let w = dpp_pha::SIGNATURE.put(0x0abc_def0, sig);
            assert_eq!(WordKind::Error, Family::DppPha.classify(w));
            assert_eq!(Decoded::Error, Family::DppPha.decode(w));
        }
    }

    #[test]
    fn mqdc32_frame_length_includes_header() {
        let h = mqdc32::Header { num_words: 4, fill: 0, module_id: 1, subheader: 0 };
        assert_eq!(
            Decoded::Header { frame_len: Some(5) },
            Family::Mqdc32.decode(h.to_word()),
        );
    }
}
