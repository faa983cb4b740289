//! Mutecut command line entry point: submits jobs to the orchestrator, follows
//! them to completion and writes their output locally.

use anyhow::{Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mutecut::cli::{Args, Commands};
use mutecut::config::Config;
use mutecut::jobs::{JobSnapshot, JobStatus, JobType, Orchestrator};
use mutecut::request::{CaptionBurnRequest, SilenceRemovalRequest, SrtRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::RemoveSilence {
            url,
            noise_level,
            min_duration,
            output,
        } => {
            let spec = SilenceRemovalRequest {
                video_url: Some(url),
                noise_level,
                min_duration: min_duration.map(Value::from),
            }
            .validate(&config.silence)?;

            let orchestrator = Orchestrator::from_config(&config)?;
            orchestrator.check_engine().await?;

            let job_id = orchestrator.submit_silence_removal(spec);
            let snapshot = follow_job(&orchestrator, &job_id).await?;
            save_output(&orchestrator, &snapshot, JobType::SilenceRemoval, &output).await?;
        }
        Commands::BurnCaptions {
            url,
            words,
            words_per_line,
            caption_style,
            all_caps,
            style_preset,
            style,
            output,
        } => {
            let spec = CaptionBurnRequest {
                video_url: Some(url),
                words: Some(read_json(&words)?),
                words_per_line: words_per_line.map(Value::from),
                caption_style,
                all_caps: Some(Value::Bool(all_caps)),
                style_preset,
                style: style.map(Value::String),
            }
            .validate(&config.captions)?;

            let orchestrator = Orchestrator::from_config(&config)?;
            orchestrator.check_engine().await?;

            let job_id = orchestrator.submit_caption_burn(spec);
            let snapshot = follow_job(&orchestrator, &job_id).await?;
            save_output(&orchestrator, &snapshot, JobType::CaptionBurn, &output).await?;
        }
        Commands::Info {
            url,
            noise_level,
            min_duration,
        } => {
            let spec = SilenceRemovalRequest {
                video_url: Some(url),
                noise_level,
                min_duration: min_duration.map(Value::from),
            }
            .validate(&config.silence)?;

            let orchestrator = Orchestrator::from_config(&config)?;
            orchestrator.check_engine().await?;

            let report = orchestrator.probe_silence(&spec).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Srt {
            words,
            words_per_line,
            caption_style,
            all_caps,
            output,
        } => {
            let spec = SrtRequest {
                words: Some(read_json(&words)?),
                words_per_line: words_per_line.map(Value::from),
                caption_style,
                all_caps: Some(Value::Bool(all_caps)),
            }
            .validate(&config.captions)?;

            tokio::fs::write(&output, spec.render()?).await?;
            info!("Wrote {}", output.display());
        }
    }

    Ok(())
}

/// Poll a job until it finishes, showing its progress label on a spinner.
async fn follow_job(orchestrator: &Orchestrator, job_id: &str) -> Result<JobSnapshot> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    loop {
        let snapshot = orchestrator.status(job_id)?;
        spinner.set_message(snapshot.progress.clone());

        if snapshot.status.is_terminal() {
            spinner.finish_with_message(format!("{} ({})", snapshot.progress, snapshot.status));
            return Ok(snapshot);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn save_output(
    orchestrator: &Orchestrator,
    snapshot: &JobSnapshot,
    job_type: JobType,
    output: &Path,
) -> Result<()> {
    match snapshot.status {
        JobStatus::Completed => {
            let download = orchestrator.download(&snapshot.job_id, job_type).await?;
            let mut file = tokio::fs::File::create(output).await?;
            let bytes = download.copy_to(&mut file).await?;
            info!("Saved {} ({} bytes)", output.display(), bytes);
            println!("{}", serde_json::to_string_pretty(snapshot)?);
            Ok(())
        }
        JobStatus::NoSilence => {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
            Ok(())
        }
        _ => bail!(
            "{}",
            snapshot.error.as_deref().unwrap_or("job finished without output")
        ),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".mutecut").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "mutecut.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("mutecut.log").display()
    );

    Ok(())
}
