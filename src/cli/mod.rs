//! Command-line interface for the ICM console.
//!
//! Provides the live console (`watch`) plus one-shot commands for the
//! process control endpoints and the resolved configuration.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapters::{ControlApi, HttpControlApi};
use crate::config::{self, ResolvedConfig};
use crate::core::shell::{Command, CommandSender, Console};
use crate::notify::toast::ToastId;
use crate::transport::{TransportClient, TransportSettings};

/// icm-console - live process status for the ICM batch system
#[derive(Parser, Debug)]
#[command(name = "icm-console")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend API url (overrides the config file)
    #[arg(long, global = true, env = "ICM_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the live console
    Watch {
        /// Start a run as soon as the console is up
        #[arg(long)]
        start: bool,
    },

    /// Print the server's current process state
    State,

    /// Start a run
    Start,

    /// Acknowledge a finished run on the server
    Reset,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;
        let api_url = self.api_url.unwrap_or_else(|| cfg.api_url.clone());

        match self.command {
            Commands::Watch { start } => watch(cfg, &api_url, start).await,
            Commands::State => show_state(&api_url).await,
            Commands::Start => start_run(&api_url).await,
            Commands::Reset => reset_state(&api_url).await,
            Commands::Config => show_config(cfg, &api_url),
        }
    }
}

fn control_api(api_url: &str) -> Result<HttpControlApi> {
    HttpControlApi::new(api_url).context("Failed to build HTTP client")
}

/// Run the live console until `quit` or Ctrl-C
async fn watch(cfg: &ResolvedConfig, api_url: &str, start: bool) -> Result<()> {
    let api: Arc<dyn ControlApi> = Arc::new(control_api(api_url)?);
    let (mut console, inbox) = Console::new(api, cfg.console_settings());
    let commands = console.commands();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let settings = TransportSettings {
        url: crate::transport::protocol::hub_url(api_url, &cfg.hub_path),
        ..cfg.transport_settings()
    };
    eprintln!("Connecting to {}", settings.url);
    let transport = TransportClient::new(settings, events_tx).spawn();
    console.attach_transport(transport.control());

    spawn_stdin_reader(commands.clone());
    let on_interrupt = commands.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.send(Command::Shutdown);
        }
    });

    if start {
        commands.send(Command::StartRun);
    }

    let clear_screen = io::stdout().is_terminal();
    console
        .run(inbox, events_rx, |view| {
            let mut out = io::stdout().lock();
            if clear_screen {
                let _ = write!(out, "\x1b[2J\x1b[H");
            } else {
                let _ = writeln!(out, "----");
            }
            let _ = write!(out, "{view}");
            let _ = out.flush();
        })
        .await;

    transport.stop().await.context("Transport task failed")?;
    Ok(())
}

/// Forward operator commands typed on stdin. Runs on its own thread since
/// stdin reads block.
fn spawn_stdin_reader(commands: CommandSender) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(Ok(command)) => {
                    debug!(?command, "Operator command");
                    if !commands.send(command) {
                        break;
                    }
                }
                Some(Err(e)) => eprintln!("{e}"),
                None => {}
            }
        }
    });
}

/// Parse one stdin line. Blank lines are `None`.
pub fn parse_command(line: &str) -> Option<std::result::Result<Command, String>> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;

    let command = match verb {
        "start" => Ok(Command::StartRun),
        "ack" | "new" => Ok(Command::Acknowledge),
        "clear" => Ok(Command::ClearToasts),
        "reconnect" => Ok(Command::Reconnect),
        "quit" | "exit" => Ok(Command::Shutdown),
        "close" => match words.next() {
            Some(id) => id
                .trim_start_matches("toast-")
                .parse::<u64>()
                .map(|n| Command::CloseToast(ToastId::from(n)))
                .map_err(|_| format!("Not a toast id: {id}")),
            None => Err("Usage: close <toast-id>".to_string()),
        },
        other => Err(format!(
            "Unknown command '{other}' (start, ack, close <id>, clear, reconnect, quit)"
        )),
    };
    Some(command)
}

/// Print the authoritative process state once
async fn show_state(api_url: &str) -> Result<()> {
    let api = control_api(api_url)?;
    let snapshot = api
        .process_state()
        .await
        .context("Failed to fetch process state")?;

    println!("Running: {}", snapshot.is_running);
    println!(
        "Started: {}",
        snapshot
            .start_time
            .map(|t| t.date_time_label())
            .unwrap_or_else(|| "-".to_string())
    );
    match snapshot.success {
        Some(true) => println!("Result:  succeeded"),
        Some(false) => println!("Result:  failed"),
        None => println!("Result:  (none held)"),
    }
    if let Some(message) = &snapshot.finish_message {
        println!("Message: {}", message);
    }

    if !snapshot.steps.is_empty() {
        println!("\nSteps:");
        for step in &snapshot.steps {
            println!(
                "  {} {:<32} {:<12} {}",
                step.status.marker(),
                step.step_name,
                step.status,
                step.message
            );
        }
    }
    Ok(())
}

/// Ask the server to start a run
async fn start_run(api_url: &str) -> Result<()> {
    let api = control_api(api_url)?;
    api.start_run().await.context("Failed to start ICM run")?;
    eprintln!("Start request accepted");
    Ok(())
}

/// Acknowledge a finished run
async fn reset_state(api_url: &str) -> Result<()> {
    let api = control_api(api_url)?;
    if let Err(e) = api.reset_process_state().await {
        warn!(error = %e, "Reset failed");
        return Err(e).context("Failed to reset process state");
    }
    eprintln!("Process state reset");
    Ok(())
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig, api_url: &str) -> Result<()> {
    println!("ICM Console Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Endpoints:");
    println!("  API:  {}", api_url);
    println!("  Hub:  {}", crate::transport::protocol::hub_url(api_url, &cfg.hub_path));
    println!();
    println!("Transport:");
    println!("  Reconnect delays: {:?}", cfg.reconnect.delays);
    println!(
        "  Max attempts:     {}",
        cfg.reconnect
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unlimited".to_string())
    );
    println!("  Retry after close: {:?}", cfg.reconnect.retry_after_close);
    println!("  Keep-alive:       {:?}", cfg.keepalive);
    println!("  Server timeout:   {:?}", cfg.server_timeout);
    println!();
    println!("Toasts:");
    println!("  Max live:         {}", cfg.toasts.max_live);
    println!("  Default duration: {:?}", cfg.toasts.default_duration);
    println!("  Exit transition:  {:?}", cfg.toasts.exit_transition);
    println!();
    println!("Badge hide after:   {:?}", cfg.badge_hide_after);
    println!("Announce acknowledged runs: {}", cfg.announce_acknowledged);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("start"), Some(Ok(Command::StartRun)));
        assert_eq!(parse_command("  ack "), Some(Ok(Command::Acknowledge)));
        assert_eq!(
            parse_command("close toast-3"),
            Some(Ok(Command::CloseToast(ToastId::from(3))))
        );
        assert_eq!(parse_command("close 7"), Some(Ok(Command::CloseToast(ToastId::from(7)))));
        assert_eq!(parse_command("reconnect"), Some(Ok(Command::Reconnect)));
        assert_eq!(parse_command(""), None);
        assert!(matches!(parse_command("close"), Some(Err(_))));
        assert!(matches!(parse_command("dance"), Some(Err(_))));
    }

    #[test]
    fn test_cli_parses_watch() {
        let cli = Cli::try_parse_from(["icm-console", "watch", "--start"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch { start: true }));
    }
}
