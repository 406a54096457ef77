//! Writing the run record and its histograms next to the run file

use anyhow::{Context, Result};
use pulsetools::bit;
use pulsetools::cfg::{ChannelSettings, Run};
use pulsetools::engine::{ChannelHistogram, RunSnapshot};
use pulsetools::ser;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Fill a copy of the declaration with what the run actually did
pub fn record(config: &Run, snapshot: &RunSnapshot) -> Run {
    let duration = match (snapshot.window.start, snapshot.window.stop) {
        (Some(a), Some(b)) => Some((b - a).num_milliseconds().max(0) as u64),
        _ => None,
    };
    let enabled = bit::mask_to_chans(config.enabled_mask());
    let thresholds = config.thresholds();
    let channel_settings = (0..config.channels())
        .map(|ch| ChannelSettings {
            channel:    ch as u8,
            enabled:    Some(enabled.contains(&(ch as u8))),
            threshold:  Some(thresholds[ch]),
        })
        .collect();
    Run {
        timestamp:          snapshot.window.start,
        duration,
        max_value:          Some(config.max_value()),
        channel_settings,
        counts:             snapshot.totals.clone(),
        ..config.clone()
    }
}

/// Stem of the output files: the run file's stem and the save time
pub fn stem(cfg_path: &Path, ts: &chrono::DateTime<chrono::Local>) -> String {
    let mut stem = cfg_path
        .file_stem()
        .unwrap_or_else(|| std::ffi::OsStr::new("data"))
        .to_string_lossy()
        .to_string();
    stem.push('_');
    stem.push_str(&ts.format("%F_%H-%M-%S").to_string());
    stem
}

/// Save the run record as `<stem>.json` in `dir`, followed by one
/// `<stem>_energy_ch<n>.tsv` per enabled channel and one
/// `<stem>_time_ch<n>.tsv` per correlated signal. Returns the record path.
pub fn save_run(dir: &Path, stem: &str, record: &Run, snapshot: &RunSnapshot) -> Result<PathBuf> {
    let mut rcd_path = dir.join(stem);
    rcd_path.set_extension("json");
    {
        let f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&rcd_path)
            .with_context(|| format!("could not create {}", rcd_path.display()))?;
        let mut wtr = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut wtr, record)?;
        wtr.flush()?;
    }
    write_histograms(dir, stem, "energy", &snapshot.energy)?;
    write_histograms(dir, stem, "time", &snapshot.time)?;
    Ok(rcd_path)
}

fn write_histograms(dir: &Path, stem: &str, what: &str, hists: &[ChannelHistogram]) -> Result<()> {
    for ch in hists.iter() {
        let path = dir.join(format!("{}_{}_ch{}.tsv", stem, what, ch.channel));
        let f = File::create(&path)
            .with_context(|| format!("could not create {}", path.display()))?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_writer(BufWriter::new(f));
        ser::histogram_tsv(&mut wtr, &ch.histogram)?;
        wtr.flush()?;
    }
    Ok(())
}
