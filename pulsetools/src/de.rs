//! Deserialization of bursts and pulse tables, supporting `.bursts.zst` and `.tsv`

use anyhow::{bail, Context, Result};
use std::io::{BufReader, Read};
use zstd::stream;

use crate::codec::{Family, RawWord};
use crate::{Bin, Coincidence, Measurement};

/// Deserialize from .bursts format: zstd-compressed, length-prefixed bursts
///
/// Since `unzstd(m1.z + m2.z) == m1 + m2`, a recording appended to in several
/// batches decompresses in one pass.
pub fn bursts(rdr: impl Read) -> Result<Vec<Vec<RawWord>>> {
    let mut zrdr = stream::read::Decoder::new(rdr)?;
    let bursts = bursts_uncompressed(&mut zrdr)?;
    Ok(bursts)
}

/// Deserialize uncompressed length-prefixed bursts
pub fn bursts_uncompressed(rdr: &mut impl Read) -> Result<Vec<Vec<RawWord>>> {
    let mut brdr = BufReader::new(rdr);
    let mut bursts = Vec::new();
    while let Some(len) = try_read_word(&mut brdr)? {
        let mut burst = Vec::with_capacity(len as usize);
        for _ in 0..len {
            match try_read_word(&mut brdr)? {
                Some(w) => burst.push(w),
                None => bail!("recording ends inside a burst of {} words", len),
            }
        }
        bursts.push(burst);
    }
    Ok(bursts)
}

/// One little-endian word, or `None` at a clean end of stream
fn try_read_word(rdr: &mut impl Read) -> Result<Option<RawWord>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        let n = rdr.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(RawWord::from_le_bytes(buf))),
        _ => bail!("recording ends inside a word"),
    }
}

/// Deserialize pulses from tab-separated values
/// (burst, channel, coarse, fine, amplitude, coincidence[, event]), where
/// coincidence is `m` (matched), `u` (unmatched) or anything else for
/// neither. The optional event column is taken as the slot; without it, a
/// pulse's slot is its ordinal on its channel within the burst, so the n-th
/// pulses of all channels share an event. Every row must fit the words of
/// `family`.
pub fn pulses_tsv(
    rdr: &mut csv::Reader<impl Read>,
    family: Family,
) -> Result<Vec<(u64, Measurement)>> {
    let mut pulses = Vec::new();
    let mut last: Option<u64> = None;
    let mut ordinals = vec![0usize; family.channels()];
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() < 6 {
            bail!("row {}: expected 6 columns, found {}", row, record.len());
        }
        let burst = record[0].parse::<u64>()?;
        if last != Some(burst) {
            last = Some(burst);
            ordinals.iter_mut().for_each(|n| *n = 0);
        }
        let coincidence = match &record[5] {
            "m" => Coincidence::Matched,
            "u" => Coincidence::Unmatched,
            _ => Coincidence::Neither,
        };
        let mut m = Measurement {
            channel: record[1].parse()?,
            slot: 0,
            amplitude: record[4].parse()?,
            coarse_time: record[2].parse()?,
            fine_time: record[3].parse()?,
            coincidence,
            overflow: false,
        };
        family.check(&m).with_context(|| format!("row {}", row))?;
        m.slot = match record.get(6) {
            Some(event) if !event.is_empty() => event.parse()?,
            _ => {
                let n = &mut ordinals[m.channel as usize];
                *n += 1;
                *n - 1
            },
        };
        pulses.push((burst, m));
    }
    Ok(pulses)
}

/// Deserialize a tab-separated histogram file of (x,y) records, such as one
/// written by [`crate::ser::histogram_tsv`]. Rows that do not parse are
/// skipped.
pub fn histogram_tsv<T, U>(rdr: &mut csv::Reader<impl Read>) -> Result<Vec<Bin<T, U>>>
where
    T: std::str::FromStr,
    U: std::str::FromStr,
{
    let mut bins = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if let (Some(x), Some(y)) = (record.get(0), record.get(1)) {
            if let (Ok(x), Ok(y)) = (x.parse::<T>(), y.parse::<U>()) {
                bins.push(Bin { x, y });
            }
        }
    }
    Ok(bins)
}
