//! `wordcat [--family F] [INPUT...]`
//!
//! Decode bursts in .bursts.zst compressed binary format and output one
//! tab-separated row per word. `wordcat` is named in analogy to programs
//! like `zcat` that output (cf. `cat`) the decompressed content of a file.
//!
//!     wordcat --family mqdc32 run.bursts.zst > run.tsv

use argh::FromArgs;
use anyhow::{bail, Result};
use either::{Left, Right};
use std::fs::{self, File};
use std::io::{stdin, stdout, BufReader, Write};

use pulsetools::codec::Family;
use pulsetools::{de, ser};

const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");

#[derive(Debug, FromArgs, Clone)]
/// Decode bursts in .bursts.zst compressed binary format and print
/// tab-separated words to standard output: burst, index, word, kind,
/// channel, amplitude, time, fine time and coincidence.
pub struct CliArgs {
    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,
    /// word layout: dpp_pha (default) or mqdc32
    #[argh(option, default = "Family::DppPha")]
    pub family: Family,
    /// with no input or when input is '-', read from standard input
    #[argh(positional)]
    pub input: Vec<String>,
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
        let mut contains_stdin = false;
        for i in args.input {
            if i == "-" {
                if contains_stdin {
                    bail!("cannot specify '-' for stdin twice");
                }
                contains_stdin = true;
                inputs.push(Left(()));
            } else {
                match fs::metadata(&i) {
                    Ok(m) => {
                        if m.is_file() {
                            inputs.push(Right(i));
                        } else {
                            bail!("{} is not a file", &i);
                        }
                    },
                    Err(e) => bail!(e),
                }
            }
        }
    }

    let stdout = stdout();
    let stdout = stdout.lock();
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(stdout);

    let mut n = 0;
    for i in inputs {
        let bursts = match i {
            Left(()) => {
                let stdin = stdin();
                let stdin = stdin.lock();
                de::bursts(BufReader::new(stdin))?
            },
            Right(path) => {
                let f = File::open(path)?;
                de::bursts(BufReader::new(f))?
            },
        };
        for burst in bursts.iter() {
            ser::words_tsv(&mut wtr, family, n, burst)?;
            n += 1;
        }
    }
    wtr.flush()?;
    Ok(())
}
