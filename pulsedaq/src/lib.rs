use argh::FromArgs;

#[derive(Debug, FromArgs, Clone)]
/// Run an acquisition from a burst recording, logging rate reports and
/// saving the run record and histograms next to the run file
pub struct CliArgs {
    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,
    /// run file path
    #[argh(option)]
    pub config: Option<String>,
    /// burst recording to replay (.bursts.zst)
    #[argh(option)]
    pub replay: Option<String>,
    /// delay between replayed bursts in ms
    #[argh(option, default = "0")]
    pub period: u64,
    /// keep polling after the recording ends, until interrupted
    #[argh(switch)]
    pub follow: bool,
}

pub mod save;
pub mod sink;
pub mod source;
