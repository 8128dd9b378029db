use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use iotdcp_frame::Profile;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod probe;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a device on a UDP port.
    Serve(ServeArgs),
    /// Query a device and describe its interfaces.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Device manifest (settings and catalog). Default: built-in sample lamp.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
    /// Address to bind.
    #[arg(long, env = "IOTDCP_BIND", default_value = "0.0.0.0:2570")]
    pub bind: String,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Device address (host or host:port, default port 2570).
    pub target: String,
    /// Time to wait for each response (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
    /// Framing profile the device speaks.
    #[arg(long, value_enum, default_value = "escaped")]
    pub profile: ProfileArg,
    /// Resend a request this many times before giving up.
    #[arg(long, default_value = "2")]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    Escaped,
    Unescaped,
}

impl From<ProfileArg> for Profile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Escaped => Profile::Escaped,
            ProfileArg::Unescaped => Profile::Unescaped,
        }
    }
}

pub(crate) fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
