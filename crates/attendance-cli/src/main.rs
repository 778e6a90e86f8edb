use anyhow::Result;
use attendance_core::{AttendanceLedger, AttendeeName};
use attendance_hw::Camera;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod artifact;
mod capture;
mod config;
mod workflow;

use config::Config;
use workflow::AttendanceError;

#[derive(Parser)]
#[command(name = "attendance", about = "Capture your face and mark attendance")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture your face and mark attendance (the default)
    Mark,
    /// Print recorded attendance
    History {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// List video capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Mark) {
        Commands::Mark => {
            // Every path of the mark flow exits 0; failures are reported as text.
            if let Err(e) = mark(cli.config).await {
                println!("{}", workflow::unexpected_error_line(&e));
            }
        }
        Commands::History { json } => {
            let config = Config::load(cli.config.as_deref())?;
            history(&config, json)?;
        }
        Commands::Devices => devices(),
    }

    Ok(())
}

async fn mark(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    tracing::debug!(?config, "configuration");

    println!("=== Simple Attendance System ===");
    let mut lines = spawn_stdin_reader()?;

    print!("Please enter your name: ");
    std::io::stdout().flush()?;
    let raw = lines.recv().await.unwrap_or_default();

    let name = match AttendeeName::parse(&raw) {
        Ok(name) => name,
        Err(e) => {
            let e = AttendanceError::from(e);
            for line in workflow::error_lines(&e).unwrap_or_default() {
                println!("{line}");
            }
            return Ok(());
        }
    };

    let run_name = name.clone();
    let result = tokio::task::spawn_blocking(move || {
        workflow::run_with_hardware(&config, &run_name, &mut lines)
    })
    .await?;

    for line in workflow::report_lines(&name, result)? {
        println!("{line}");
    }
    Ok(())
}

/// Forward stdin lines into a channel from a dedicated thread, so the
/// blocking capture loop can poll for commands without waiting on input.
fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("attendance-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn history(config: &Config, json: bool) -> Result<()> {
    let ledger = AttendanceLedger::new(&config.ledger_path);
    let records = ledger.records()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No attendance recorded in {}", ledger.path().display());
    } else {
        for record in &records {
            println!(
                "{:<24} {} {}",
                record.name,
                record.date.format("%Y-%m-%d"),
                record.time.format("%H:%M:%S")
            );
        }
    }
    Ok(())
}

fn devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No video capture devices found");
        return;
    }
    for dev in devices {
        println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
    }
}
