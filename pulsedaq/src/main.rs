use anyhow::{bail, Result};
use chrono::Local;
use pulsedaq::sink::LogSink;
use pulsedaq::source::ReplaySource;
use pulsedaq::{save, CliArgs};
use pulsetools::acquisition::{Acquisition, CancellationToken};
use pulsetools::{cfg, de};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, span, Level};

const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: CliArgs = argh::from_env();

    if args.version {
        println!(
            concat!(
                env!("CARGO_BIN_NAME"),
                " ",
                "{}",
            ),
            GIT_VERSION,
        );
        return Ok(())
    }

    tracing_subscriber::fmt::init();

    // Load the run file
    let cfg_path;
    let config: cfg::Run;
    match &args.config {
        Some(c) => {
            cfg_path = PathBuf::from(c);
            let f = File::open(cfg_path.as_path())?;
            config = serde_json::from_reader(BufReader::new(f))?;
        },
        None => {
            cfg_path = PathBuf::from("data");
            config = cfg::Run::default();
        },
    }

    // Load the recording to replay
    let bursts = match &args.replay {
        Some(r) => de::bursts(BufReader::new(File::open(r)?))?,
        None => bail!("no burst recording provided"),
    };
    info!("replaying {} bursts as {:?}", bursts.len(), config.family);

    let token = CancellationToken::new();
    let mut source = ReplaySource::new(bursts, Duration::from_millis(args.period));
    if !args.follow {
        source = source.stop_at_end(token.clone());
    }
    let mut acq = Acquisition::new(&config, source, LogSink::default(), token.clone())?;

    // Stop cleanly on ctrl-c; the loop finishes its current burst first
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let span = span!(Level::INFO, "ctrl_c signal");
                let _enter = span.enter();
                info!("Manual shutdown signal received. Goodbye!");
                ctrl_c_token.cancel();
            },
            Err(e) => {
                let span = span!(Level::ERROR, "ctrl_c signal");
                let _enter = span.enter();
                error!("Unable to listen to shutdown signal: {}", e);
            },
        }
    });

    let (acq, result) = tokio::task::spawn_blocking(move || {
        let result = acq.run();
        (acq, result)
    })
    .await?;

    // Save whatever was collected, even if the device failed
    let (_, _, mut sink) = acq.into_parts();
    if let Some(snapshot) = sink.take_snapshot() {
        let record = save::record(&config, &snapshot);
        let dir = match cfg_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = save::stem(&cfg_path, &Local::now());
        let path = save::save_run(&dir, &stem, &record, &snapshot)?;
        info!("run record saved to {}", path.display());
    }

    let reason = result?;
    info!("stopped: {:?}", reason);
    Ok(())
}
