//! Serialization of bursts and histograms, supporting `.bursts.zst` and `.tsv`

use anyhow::Result;
use std::io::Write;
use zstd::stream;

use crate::codec::{Decoded, Family, RawWord};
use crate::hist::Histogram;

/// Serialize to .bursts format: zstd-compressed, length-prefixed bursts
///
/// Like many compressors, `zstd`'s API is linear under concatenation, in that
/// `zstd(m1 + m2) == zstd(m1) + zstd(m2)` (ignoring that the compressed bytes
/// will actually differ). So a recording may be appended to one batch of
/// bursts at a time.
pub fn bursts(wtr: &mut impl Write, bursts: &[Vec<RawWord>]) -> Result<()> {
    let mut zwtr = stream::write::Encoder::new(wtr, 0)?;
    bursts_uncompressed(&mut zwtr, bursts)?;
    zwtr.finish()?;
    Ok(())
}

/// Serialize to uncompressed bursts: each burst is its word count followed
/// by its words, all little-endian `u32`.
pub fn bursts_uncompressed(wtr: &mut impl Write, bursts: &[Vec<RawWord>]) -> Result<()> {
    for burst in bursts.iter() {
        wtr.write_all(&(burst.len() as u32).to_le_bytes())?;
        for w in burst.iter() {
            wtr.write_all(&w.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Serialize decoded words to tab-separated values
/// (burst, index, word, kind, channel, amplitude, time, fine, coincidence).
/// Columns that do not apply to a kind are left empty.
pub fn words_tsv(
    wtr: &mut csv::Writer<impl Write>,
    family: Family,
    burst: usize,
    words: &[RawWord],
) -> Result<()> {
    for (i, &w) in words.iter().enumerate() {
        let kind = format!("{:?}", family.classify(w));
        let mut rec = vec![burst.to_string(), i.to_string(), format!("{:08x}", w), kind];
        let rest: [String; 5] = match family.decode(w) {
            Decoded::Measurement(h) => [
                h.channel.to_string(),
                h.amplitude.to_string(),
                String::new(),
                h.fine_time.to_string(),
                format!("{:?}", h.coincidence),
            ],
            Decoded::Header { frame_len } | Decoded::Trailer { frame_len, timestamp: None } => [
                String::new(),
                frame_len.map(|n| n.to_string()).unwrap_or_default(),
                String::new(),
                String::new(),
                String::new(),
            ],
            Decoded::Trailer { timestamp: Some(t), .. } | Decoded::TriggerTime(t) => [
                String::new(),
                String::new(),
                t.to_string(),
                String::new(),
                String::new(),
            ],
            Decoded::Error => Default::default(),
        };
        rec.extend(rest);
        wtr.write_record(&rec)?;
    }
    Ok(())
}

/// Serialize a histogram to tab-separated values (bin center, count).
pub fn histogram_tsv(wtr: &mut csv::Writer<impl Write>, h: &Histogram) -> Result<()> {
    for bin in h.bins() {
        wtr.write_record(&[bin.x.to_string(), bin.y.to_string()])?;
    }
    Ok(())
}
