use std::time::Duration;

use clap::{Args, Subcommand};
use tokio::runtime::Runtime;

use crate::config::LinkArgs;
use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod poll;
pub mod ports;
pub mod probe;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one command and print the response.
    Send(SendArgs),
    /// Execute a command repeatedly until interrupted.
    Poll(PollArgs),
    /// Check that the device answers the empty-command probe.
    Probe(ProbeArgs),
    /// List serial ports.
    Ports,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, link, format),
        Command::Poll(args) => poll::run(args, link, format),
        Command::Probe(args) => probe::run(args, link, format),
        Command::Ports => ports::run(format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command text, without line ending (e.g. "*pow=?#").
    pub command: String,
    /// Per-attempt response timeout (e.g. 500ms, 10s).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Maximum time to wait for the link to synchronize.
    #[arg(long, default_value = "30s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Command text to repeat.
    pub command: String,
    /// Time between polls.
    #[arg(long, default_value = "6000ms")]
    pub interval: String,
    /// Stop after N successful responses.
    #[arg(long)]
    pub count: Option<usize>,
    /// Per-attempt response timeout.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Maximum time to wait for the first synchronization.
    #[arg(long, default_value = "30s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}
