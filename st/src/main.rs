//! st - manager module self-test harness
//!
//! CLI entry point for the self-test daemon and its control commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use mgrhost::{HostConfig, MemoryHost, MgrHost};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use selftest::cli::{Cli, Command, DaemonCommand, OutputFormat, SelfTestCommand, get_log_path};
use selftest::config::Config;
use selftest::control::ControlCommand;
use selftest::daemon::{DaemonManager, VERSION};
use selftest::ipc::{self, DaemonClient};
use selftest::service::SelfTestService;
use selftest::workload::WORKLOADS;

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Daemon { command } => match command {
            DaemonCommand::Start { foreground } => cmd_start(&config, cli.config.as_ref(), foreground).await,
            DaemonCommand::Stop => cmd_stop(&config).await,
            DaemonCommand::Status { format } => cmd_status(&config, format).await,
            DaemonCommand::Ping => cmd_ping(&config).await,
        },
        Command::SelfTest { command } => cmd_self_test(&config, command).await,
        Command::Workloads => {
            cmd_workloads();
            Ok(())
        }
        Command::RunDaemon => run_daemon(&config).await,
    }
}

fn client(config: &Config) -> DaemonClient {
    DaemonClient::with_socket_path(config.ipc.socket_path())
}

/// Start the daemon
async fn cmd_start(config: &Config, config_path: Option<&PathBuf>, foreground: bool) -> Result<()> {
    debug!(foreground, "cmd_start: called");
    let daemon = DaemonManager::new();

    if let Some(pid) = daemon.running_pid() {
        println!("Self-test daemon is already running (PID: {})", pid);
        if !daemon.version_matches() {
            let running = daemon.read_version().unwrap_or_else(|| "unknown".to_string());
            println!(
                "{} daemon version {} differs from CLI version {}",
                "Warning:".yellow(),
                running,
                VERSION
            );
        }
        return Ok(());
    }

    if foreground {
        println!("Starting self-test daemon in foreground mode...");
        run_daemon(config).await
    } else {
        let pid = daemon.start(config_path.map(PathBuf::as_path))?;
        println!("Self-test daemon started (PID: {})", pid);
        Ok(())
    }
}

/// Stop the daemon
///
/// Tries IPC shutdown first, falls back to SIGTERM.
async fn cmd_stop(config: &Config) -> Result<()> {
    debug!("cmd_stop: called");
    let daemon = DaemonManager::new();

    let Some(pid) = daemon.running_pid() else {
        println!("Self-test daemon is not running");
        return Ok(());
    };

    let client = client(config);
    if client.socket_exists() {
        match client.shutdown().await {
            Ok(()) => {
                let mut attempts = 0;
                while daemon.is_running() && attempts < 50 {
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    attempts += 1;
                }
                if !daemon.is_running() {
                    println!("Self-test daemon stopped gracefully via IPC (was PID: {})", pid);
                    return Ok(());
                }
                debug!("cmd_stop: IPC shutdown timed out, falling back to SIGTERM");
            }
            Err(e) => debug!(error = %e, "cmd_stop: IPC shutdown failed, falling back to SIGTERM"),
        }
    }

    daemon.stop()?;
    println!("Self-test daemon stopped (was PID: {})", pid);
    Ok(())
}

/// Ping the daemon via IPC to check if it's alive and responsive
async fn cmd_ping(config: &Config) -> Result<()> {
    debug!("cmd_ping: called");
    if !DaemonManager::new().is_running() {
        println!("Self-test daemon is not running");
        return Ok(());
    }

    match client(config).ping().await {
        Ok(version) => {
            println!("Daemon is alive and responsive");
            println!("Version: {}", version);
        }
        Err(e) => {
            println!("Daemon PID file exists but not responding to IPC");
            println!("Error: {}", e);
        }
    }
    Ok(())
}

/// Show daemon status, plus coordinator state when the daemon answers
async fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_status: called");
    let status = DaemonManager::new().status();
    let report = if status.running {
        match client(config).status().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "cmd_status: daemon did not report status");
                None
            }
        }
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "daemon": status,
                "workloads": report,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Self-test Daemon Status");
            println!("-----------------------");
            match status.pid {
                Some(pid) => println!("Status: {} (PID {})", "running".green(), pid),
                None => println!("Status: {}", "stopped".red()),
            }
            println!("PID file: {}", status.pid_file.display());

            if let Some(report) = report {
                println!();
                println!("Version: {}", report.version);
                println!("Coordinator: {:?}", report.state);
                println!("Desired workload: {}", report.desired.name());
                if let Some(fault) = &report.fault {
                    println!("Fault: {}", fault.red());
                }
                let m = &report.metrics;
                println!(
                    "Commands: {} submitted, {} completed, {} failed ({} iterations)",
                    m.commands_submitted, m.commands_completed, m.commands_failed, m.spam_iterations
                );
            }
        }
    }
    Ok(())
}

/// Send a self-test command to the daemon and print its reply
async fn cmd_self_test(config: &Config, command: SelfTestCommand) -> Result<()> {
    let command = ControlCommand::from(command);
    debug!(prefix = command.prefix(), "cmd_self_test: called");

    let reply = client(config)
        .command(&command)
        .await
        .context("Is the daemon running? Start it with `st daemon start`")?;

    if !reply.stdout.is_empty() {
        println!("{}", reply.stdout);
    }
    if reply.is_success() {
        if !reply.stderr.is_empty() {
            eprintln!("{}", reply.stderr);
        }
        Ok(())
    } else {
        Err(eyre!("{} failed ({}): {}", command.prefix(), reply.code, reply.stderr))
    }
}

fn cmd_workloads() {
    println!("Background workloads:");
    for workload in WORKLOADS {
        println!("  {:<18} {}", workload.name().cyan(), workload.description());
    }
}

/// Run as the daemon process (hidden command used by `daemon start`)
async fn run_daemon(config: &Config) -> Result<()> {
    info!(version = VERSION, "Daemon starting...");
    let daemon = DaemonManager::new();
    daemon.register_self()?;

    let mut host_config: HostConfig = config.host.clone();
    host_config
        .store_path
        .get_or_insert_with(HostConfig::default_store_path);
    let host: Arc<dyn MgrHost> = Arc::new(MemoryHost::new(host_config).context("Failed to create simulated host")?);
    info!(version = %host.version(), mgr_id = %host.mgr_id(), "Host ready");

    let (listener, socket_path) = ipc::listener::create_listener_at(&config.ipc.socket_path())?;
    info!(?socket_path, "IPC socket listening");

    let service = SelfTestService::start(host, config.workload.clone(), config.control.clone());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let signals = tokio::spawn(forward_shutdown_signals(shutdown_tx));

    let result = service.run(listener, shutdown_rx).await;

    signals.abort();
    ipc::listener::cleanup_socket(&socket_path);
    daemon.unregister_self()?;
    info!("Daemon stopped");
    result
}

/// Turn SIGINT/SIGTERM into a shutdown request
async fn forward_shutdown_signals(shutdown_tx: mpsc::Sender<()>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => warn!("SIGINT received"),
        _ = sigterm.recv() => warn!("SIGTERM received"),
    }
    if shutdown_tx.send(()).await.is_err() {
        debug!("forward_shutdown_signals: service already stopped");
    }
    Ok(())
}
