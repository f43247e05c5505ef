//! ksync - drive and watch the kernel synchronization engine.
//!
//! Every invocation starts a transport, runs one subcommand through its
//! request API and stops it again.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kernsync::{Config, Transport};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{AddressCmd, LinkCmd, MonitorCmd, RouteCmd};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "ksync", version, about = "Kernel link, address and route synchronization tool")]
struct Cli {
    /// Load engine settings from a JSON file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log every netlink frame.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Show records the engine normally hides (loopback, local routes).
    #[arg(long, global = true)]
    no_filter: bool,

    /// Output JSON.
    #[arg(short, long, global = true)]
    json: bool,

    /// Operate inside the network namespace bound at PATH.
    #[arg(long, value_name = "PATH", global = true)]
    netns: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Network device configuration.
    #[command(visible_alias = "l")]
    Link(LinkCmd),

    /// IPv4 address management.
    #[command(visible_alias = "a", visible_alias = "addr")]
    Address(AddressCmd),

    /// Main-table route management.
    #[command(visible_alias = "r")]
    Route(RouteCmd),

    /// Print kernel change notifications.
    #[command(visible_alias = "mon")]
    Monitor(MonitorCmd),
}

impl Cli {
    fn engine_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        if self.debug {
            config.debug = true;
        }
        if self.no_filter {
            config.filter = false;
        }
        if let Some(netns) = &self.netns {
            config.netns = Some(netns.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let transport = Transport::new(cli.engine_config()?);
    transport.start().context("starting transport")?;

    let result = match cli.command {
        Command::Link(cmd) => cmd.run(&transport, format).await,
        Command::Address(cmd) => cmd.run(&transport, format).await,
        Command::Route(cmd) => cmd.run(&transport, format).await,
        Command::Monitor(cmd) => cmd.run(&transport, format).await,
    };

    let stopped = transport.stop();

    if let Err(e) = outcome(result, stopped) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// The subcommand's own error is what gets reported; a failed stop behind
/// it is only logged.
fn outcome(result: anyhow::Result<()>, stopped: kernsync::Result<()>) -> anyhow::Result<()> {
    match (result, stopped) {
        (Err(e), Err(stop)) => {
            tracing::warn!(error = %stop, "transport did not stop cleanly");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(stop)) => Err(anyhow::Error::new(stop).context("stopping transport")),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernsync::Error;

    #[test]
    fn test_command_error_reported_over_stop_error() {
        let err = outcome(
            Err(anyhow::anyhow!("cannot find device \"eth9\"")),
            Err(Error::InvalidState("command thread panicked".into())),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot find device \"eth9\"");
    }

    #[test]
    fn test_stop_error_reported_alone() {
        let err = outcome(
            Ok(()),
            Err(Error::InvalidState("notification thread panicked".into())),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("stopping transport"));
        assert!(format!("{:#}", err).contains("notification thread panicked"));
    }

    #[test]
    fn test_clean_run() {
        assert!(outcome(Ok(()), Ok(())).is_ok());
    }
}
