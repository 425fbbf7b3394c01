//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::control::ControlCommand;

/// st - manager module self-test harness
#[derive(Parser)]
#[command(
    name = "st",
    about = "Self-test harness for manager modules with background workloads",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the self-test daemon
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Send a self-test command to the running daemon
    #[command(name = "self-test")]
    SelfTest {
        #[command(subcommand)]
        command: SelfTestCommand,
    },

    /// List the background workloads the daemon accepts
    Workloads,

    /// Internal: Run as daemon process (used by `daemon start`)
    #[command(hide = true)]
    RunDaemon,
}

/// Daemon management subcommands
#[derive(Debug, Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon
    Start {
        /// Don't fork to background (run in foreground)
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the daemon
    Stop,

    /// Show daemon status and workload counters
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Ping the daemon to check if it's alive and responsive
    Ping,
}

/// Self-test subcommands, one per control command
#[derive(Debug, Subcommand)]
pub enum SelfTestCommand {
    /// Run the host API self-test
    Run,

    /// Start or stop a background workload
    Background {
        #[command(subcommand)]
        command: BackgroundCommand,
    },

    /// Read module config
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Exercise cross-module calls
    Remote,
}

#[derive(Debug, Subcommand)]
pub enum BackgroundCommand {
    /// Start a workload, replacing any running one
    Start {
        /// Workload name (see `st workloads`)
        workload: String,
    },

    /// Stop the running workload
    Stop,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Module-wide value
    Get { key: String },

    /// Value for this manager instance, falling back to the module-wide one
    #[command(name = "get-localized", alias = "get_localized")]
    GetLocalized { key: String },
}

impl From<SelfTestCommand> for ControlCommand {
    fn from(command: SelfTestCommand) -> Self {
        debug!(?command, "ControlCommand::from: called");
        match command {
            SelfTestCommand::Run => ControlCommand::SelfTestRun,
            SelfTestCommand::Background {
                command: BackgroundCommand::Start { workload },
            } => ControlCommand::BackgroundStart { workload },
            SelfTestCommand::Background {
                command: BackgroundCommand::Stop,
            } => ControlCommand::BackgroundStop,
            SelfTestCommand::Config {
                command: ConfigCommand::Get { key },
            } => ControlCommand::ConfigGet { key },
            SelfTestCommand::Config {
                command: ConfigCommand::GetLocalized { key },
            } => ControlCommand::ConfigGetLocalized { key },
            SelfTestCommand::Remote => ControlCommand::Remote,
        }
    }
}

/// Output format for status
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("selftest")
        .join("logs")
        .join("selftest.log")
}
