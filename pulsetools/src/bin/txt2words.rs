//! `txt2words [--family F] [-o OUT] [INPUT...]`
//!
//! Encode synthetic pulses stored as tab-separated values
//! (burst, channel, coarse, fine, amplitude, coincidence[, event]) into the words a
//! module would emit, in .bursts.zst format. Useful to build replay
//! recordings for `pulsedaq` without hardware.

use argh::FromArgs;
use anyhow::{bail, Result};
use either::{Left, Right};
use std::fs::{self, File};
use std::io::{stdin, stdout, BufReader, BufWriter, Read, Write};

use pulsetools::codec::{self, Family};
use pulsetools::{de, ser, Measurement};

const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");

#[derive(Debug, FromArgs, Clone)]
/// Encode pulses stored as tab-separated values to the .bursts.zst
/// compressed binary format. Note: on Windows -o must be specified as the
/// encoded data is not valid UTF-8 and thus cannot be written to stdout
pub struct CliArgs {
    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,
    /// word layout: dpp_pha (default) or mqdc32
    #[argh(option, default = "Family::DppPha")]
    pub family: Family,
    /// file to write output to (writes to standard output by default)
    #[argh(option, short = 'o')]
    pub out: Option<String>,
    /// with no input or when input is '-', read from standard input
    #[argh(positional)]
    pub input: Vec<String>,
}

/// Group rows into bursts by their burst column, in order of appearance
fn group(pulses: Vec<(u64, Measurement)>, family: Family) -> Result<Vec<Vec<u32>>> {
    let mut bursts = Vec::new();
    let mut current: Vec<Measurement> = Vec::new();
    let mut id = None;
    for (b, m) in pulses {
        if id.is_some() && id != Some(b) {
            bursts.push(codec::encode_burst(family, &current)?);
            current.clear();
        }
        id = Some(b);
        current.push(m);
    }
    if !current.is_empty() {
        bursts.push(codec::encode_burst(family, &current)?);
    }
    Ok(bursts)
}

fn read_pulses(rdr: impl Read, family: Family) -> Result<Vec<(u64, Measurement)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b'\t')
        .from_reader(rdr);
    de::pulses_tsv(&mut rdr, family)
}

fn main() -> Result<()> {
    let args: CliArgs = argh::from_env();
    if args.version {
        let stdout = stdout();
        let mut stdout = stdout.lock();
        writeln!(
            stdout,
            concat!(
                env!("CARGO_BIN_NAME"),
                " ",
                "{}",
            ),
            GIT_VERSION,
        )?;
        return Ok(())
    }

    let family = args.family;

    // Collect inputs
    let mut inputs = Vec::new();
    if args.input.is_empty() {
        inputs.push(Left(()));
    } else {
        for i in args.input {
            if i == "-" {
                inputs.push(Left(()));
            } else if fs::metadata(&i)?.is_file() {
                inputs.push(Right(i));
            } else {
                bail!("{} is not a file", &i);
            }
        }
    }

    let stdout = stdout();
    let mut wtr: Box<dyn Write> = match args.out {
        None => {
            Box::new(stdout.lock())
        },
        Some(p) => {
            let f = File::create(p)?;
            Box::new(BufWriter::new(f))
        },
    };

    for i in inputs {
        let pulses = match i {
            Left(()) => {
                let stdin = stdin();
                let stdin = stdin.lock();
                read_pulses(BufReader::new(stdin), family)?
            },
            Right(path) => read_pulses(BufReader::new(File::open(path)?), family)?,
        };
        ser::bursts(&mut wtr, &group(pulses, family)?)?;
    }
    wtr.flush()?;
    Ok(())
}
