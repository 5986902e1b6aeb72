use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::Parser;
use fdmhost::{
    default_config_path, init_logging, Config, JobState, MarlinController, PrinterStatus,
    StatusListener, BUILD_DATE, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Serial print host for Marlin-based FDM printers
#[derive(Parser, Debug)]
#[command(name = "fdmhost", version, about)]
struct Args {
    /// Settings file (.toml or .json); defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port to use instead of auto-detection
    #[arg(short, long)]
    port: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// G-code file to print
    #[arg(value_name = "GCODE_FILE")]
    gcode: Option<PathBuf>,
}

/// Logs progress in 10% steps
#[derive(Default)]
struct ProgressLogger {
    last_decile: AtomicU8,
}

#[async_trait]
impl StatusListener for ProgressLogger {
    async fn on_progress(&self, status: &PrinterStatus) {
        let decile = status.progress / 10;
        if self.last_decile.swap(decile, Ordering::Relaxed) != decile {
            tracing::info!(
                "Progress {}% ({}/{}) hotend {:.1}/{:.1} bed {:.1}/{:.1}",
                status.progress,
                status.current_line,
                status.total_lines,
                status.temperature.hotend,
                status.temperature.hotend_target,
                status.temperature.bed,
                status.temperature.bed_target
            );
        }
    }

    async fn on_job_finished(&self, outcome: JobState, status: &PrinterStatus) {
        tracing::info!("Job {} at line {}/{}", outcome, status.current_line, status.total_lines);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("fdmhost {} (built {})", VERSION, BUILD_DATE);

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let settings = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let controller = MarlinController::with_serial(settings.controller_config());

    if args.list_ports {
        for port in controller.list_ports().await? {
            println!("{}\t{}", port.port_name, port.description);
        }
        return Ok(());
    }

    let port = args
        .port
        .or_else(|| settings.connection.port().map(str::to_string));
    controller.connect(port.as_deref()).await?;

    let Some(gcode) = args.gcode else {
        let status = controller.status();
        println!(
            "Connected on {}: hotend {:.1}/{:.1} bed {:.1}/{:.1}",
            status.port.as_deref().unwrap_or("?"),
            status.temperature.hotend,
            status.temperature.hotend_target,
            status.temperature.bed,
            status.temperature.bed_target
        );
        controller.disconnect().await;
        return Ok(());
    };

    controller.load_file(&gcode)?;
    controller.register_listener(Arc::new(ProgressLogger::default()));
    controller.start()?;

    let finished = controller.wait_for_job();
    tokio::pin!(finished);
    let mut stopping = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut finished => break outcome,
            _ = tokio::signal::ctrl_c(), if !stopping => {
                tracing::warn!("Interrupted, stopping print");
                stopping = true;
                controller.stop();
            }
        }
    };

    let status = controller.status();
    controller.disconnect().await;

    match outcome {
        JobState::Completed => Ok(()),
        JobState::Stopped => {
            tracing::info!("Print stopped at line {}", status.current_line);
            Ok(())
        }
        other => bail!("print ended {}: {}", other, status.error),
    }
}
