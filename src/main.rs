use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::HeartbeatController;
use cli::commands::Commands;
use cli::printer::{finish_printer, spawn_event_printer};
use loopwarden::shutdown::close_on_shutdown;
use loopwarden::{Config, DisposeReport, LoopOwner};

fn setup_logging(verbose: bool) -> Result<()> {
    if verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .init();
        return Ok(());
    }

    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loopwarden")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("loopwarden.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    match &cli.command {
        None => handle_run_command(None, false, config).await,
        Some(Commands::Run { duration, events }) => {
            handle_run_command(*duration, *events, config).await
        }
        Some(Commands::Config) => handle_config_command(config),
    }
}

async fn handle_run_command(duration: Option<u64>, events: bool, config: &Config) -> Result<()> {
    let controller = HeartbeatController::new(config.engine.clone());

    let rx = controller.loop_engine().subscribe();
    let printer = events.then(|| spawn_event_printer(rx));

    let started = match controller.start(&config.heartbeats).await {
        Ok(started) => started,
        Err(e) => {
            controller.close().await;
            return Err(e).context("Failed to start heartbeat loops");
        }
    };
    println!("{} {} loop(s)", "Running:".green(), started);
    match duration {
        Some(secs) => println!("  stopping after {}s", secs),
        None => println!("  press Ctrl-C to stop"),
    }

    let report = close_on_shutdown(&controller, duration.map(Duration::from_secs))
        .await
        .context("Failed to wait for shutdown signal")?;

    if let Some(printer) = printer {
        finish_printer(printer).await;
    }

    print_report(&report, controller.beats());
    Ok(())
}

fn print_report(report: &DisposeReport, beats: u64) {
    println!(
        "{} {} loop(s) stopped, {} beat(s)",
        "Disposed:".cyan(),
        report.stopped,
        beats
    );
    for id in &report.detached {
        println!(
            "  {} {} did not stop within the grace period",
            "Detached:".red(),
            id
        );
    }
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render config")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config)
        .await
        .context("Application failed")?;

    Ok(())
}
