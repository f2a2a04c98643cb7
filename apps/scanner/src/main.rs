use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scan_core::{
    DropPayload, FileHandle, FileIntake, FileSelected, HttpInferenceClient, ScannerView,
    SubmitDecision, UploadOrchestrator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod input;
mod render;

use config::load_settings;
use input::{parse_console_line, ConsoleCommand, ConsoleLine};
use render::render_view;

#[derive(Parser, Debug)]
#[command(name = "scanner", about = "Submit LiDAR point clouds to a remote classifier")]
struct Cli {
    /// TOML settings file (defaults to ./scanner.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the inference service.
    #[arg(long, global = true)]
    inference_url: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one file and print the outcome.
    Scan {
        path: PathBuf,
        /// Print the scan result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Read paths (or pasted drops) from stdin, one scan at a time.
    Interactive,
}

enum ConsoleEvent {
    Line(std::io::Result<Option<String>>),
    Settled,
    Interrupt,
}

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "Enter a path to scan it, or paste several (a drop; only the first is used).\n\
                    Commands: :status  :cancel  :quit  :help";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    settings.apply_overrides(cli.inference_url, cli.timeout_secs);
    let base_url = settings.validated_inference_url()?;
    let timeout = settings.request_timeout()?;
    info!(%base_url, timeout_secs = timeout.as_secs(), "inference service configured");

    let client = HttpInferenceClient::with_timeout(&base_url, timeout)
        .context("failed to build inference client")?;
    let orchestrator = UploadOrchestrator::new(Arc::new(client)).with_timeout(timeout);

    match cli.command {
        Command::Scan { path, json } => run_scan(orchestrator, path, json).await,
        Command::Interactive => run_interactive(orchestrator).await,
    }
}

async fn run_scan(
    mut orchestrator: UploadOrchestrator,
    path: PathBuf,
    json: bool,
) -> Result<ExitCode> {
    let mut intake = FileIntake::new();
    let Some(selected) = intake.on_file_chosen(Some(FileHandle::from_path(path))) else {
        return Ok(ExitCode::FAILURE);
    };
    orchestrator.submit(selected.file);
    if !json {
        print!("{}", render_view(&ScannerView::capture(&orchestrator, &intake)));
    }

    let interrupted = tokio::select! {
        _ = orchestrator.settle_next() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        orchestrator.cancel();
    }

    let view = ScannerView::capture(&orchestrator, &intake);
    if json {
        match view.result() {
            Some(result) => println!("{}", serde_json::to_string_pretty(result)?),
            None => {
                if let Some(error) = view.error() {
                    eprintln!("{}", serde_json::to_string(error)?);
                }
            }
        }
    } else {
        print!("{}", render_view(&view));
    }

    Ok(if view.result().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_interactive(mut orchestrator: UploadOrchestrator) -> Result<ExitCode> {
    let mut intake = FileIntake::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    print!("{}", render_view(&ScannerView::capture(&orchestrator, &intake)));

    loop {
        let scanning = orchestrator.is_scanning();
        let event = tokio::select! {
            line = lines.next_line() => ConsoleEvent::Line(line),
            _ = orchestrator.settle_next(), if scanning => ConsoleEvent::Settled,
            _ = tokio::signal::ctrl_c() => ConsoleEvent::Interrupt,
        };

        let flow = match event {
            ConsoleEvent::Line(Ok(Some(line))) => {
                handle_line(&line, &mut intake, &mut orchestrator)
            }
            ConsoleEvent::Line(Ok(None)) => {
                // stdin closed: let the in-flight scan finish before leaving.
                if orchestrator.settle_next().await.is_some() {
                    print!("{}", render_view(&ScannerView::capture(&orchestrator, &intake)));
                }
                Flow::Quit
            }
            ConsoleEvent::Line(Err(err)) => return Err(err).context("failed to read stdin"),
            ConsoleEvent::Settled => {
                print!("{}", render_view(&ScannerView::capture(&orchestrator, &intake)));
                Flow::Continue
            }
            ConsoleEvent::Interrupt => {
                if orchestrator.cancel() {
                    print!("{}", render_view(&ScannerView::capture(&orchestrator, &intake)));
                    Flow::Continue
                } else {
                    Flow::Quit
                }
            }
        };

        if let Flow::Quit = flow {
            return Ok(ExitCode::SUCCESS);
        }
    }
}

fn handle_line(
    line: &str,
    intake: &mut FileIntake,
    orchestrator: &mut UploadOrchestrator,
) -> Flow {
    let selected = match parse_console_line(line) {
        ConsoleLine::Empty => intake.on_file_chosen(None),
        ConsoleLine::Command(command) => return handle_command(command, intake, orchestrator),
        ConsoleLine::Paths(paths) => select_from_paths(paths, intake),
    };

    if let Some(selected) = selected {
        match orchestrator.submit(selected.file) {
            SubmitDecision::Accepted { .. } => {
                print!("{}", render_view(&ScannerView::capture(orchestrator, intake)));
            }
            SubmitDecision::IgnoredWhileScanning => {
                println!("A scan is already in progress; wait for it or :cancel it.");
            }
        }
    }
    Flow::Continue
}

fn select_from_paths(paths: Vec<PathBuf>, intake: &mut FileIntake) -> Option<FileSelected> {
    if paths.len() == 1 {
        return intake.on_file_chosen(paths.into_iter().next().map(FileHandle::from_path));
    }

    intake.on_drag_enter();
    let files = paths.into_iter().map(FileHandle::from_path).collect();
    intake.on_drop(DropPayload::new(files)).selected
}

fn handle_command(
    command: ConsoleCommand,
    intake: &FileIntake,
    orchestrator: &mut UploadOrchestrator,
) -> Flow {
    match command {
        ConsoleCommand::Status => {
            print!("{}", render_view(&ScannerView::capture(orchestrator, intake)));
        }
        ConsoleCommand::Cancel => {
            if orchestrator.cancel() {
                print!("{}", render_view(&ScannerView::capture(orchestrator, intake)));
            } else {
                println!("Nothing to cancel.");
            }
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Flow::Quit,
        ConsoleCommand::Unknown(other) => println!("Unknown command ':{other}'. {HELP}"),
    }
    Flow::Continue
}
