//! `checkrun myrun.json`
//!
//! Parse and validate `myrun.json`. No output and an exit code of 0 indicates
//! success.

use anyhow::{bail, Result};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use pulsetools::cfg::Run;

fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();
    let path = match args.get(1) {
        Some(p) => PathBuf::from(p),
        None => bail!("usage: checkrun RUNFILE"),
    };
    let file = File::open(&path)?;
    let rdr = BufReader::new(file);
    let run: Run = serde_json::from_reader(rdr)?;
    run.validate()?;

    Ok(())
}
