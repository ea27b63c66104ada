use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use palsy_core::pipeline::infrastructure::in_process_executor::InProcessExecutor;
use palsy_core::pipeline::infrastructure::isolated_process_executor::IsolatedProcessExecutor;
use palsy_core::pipeline::infrastructure::worker_protocol;
use palsy_core::pipeline::pipeline_executor::{AnalysisRequest, PipelineExecutor};
use palsy_core::shared::constants::{DEFAULT_ARTEFACT_NAME, DEFAULT_VIDEO_NAME};
use palsy_core::shared::settings::Settings;

/// Facial palsy screening from a short face video.
#[derive(Parser)]
#[command(name = "palsy-screen")]
struct Cli {
    /// Video to analyze.
    #[arg(default_value = DEFAULT_VIDEO_NAME)]
    video: PathBuf,

    /// Classifier artefact (base64 booster + threshold + feature columns).
    #[arg(long, default_value = DEFAULT_ARTEFACT_NAME)]
    artefact: PathBuf,

    /// Frame sampling rate [default: 10, or the settings file's target_fps].
    #[arg(long)]
    fps: Option<f64>,

    /// Run the pipeline in this process instead of a crash-isolated worker.
    #[arg(long)]
    no_isolate: bool,

    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the ONNX face models.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Serve one request from stdin (used by the isolated executor).
    #[arg(long, hide = true)]
    worker: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.worker {
        process::exit(run_worker());
    }
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&cli)?;
    let executor: Box<dyn PipelineExecutor> = if cli.no_isolate {
        Box::new(InProcessExecutor::unisolated())
    } else {
        Box::new(IsolatedProcessExecutor::current_exe()?)
    };

    let request = AnalysisRequest {
        video: cli.video,
        artefact: cli.artefact,
        settings,
    };
    let report = executor.execute(&request)?;

    println!("Video: {}", report.video);
    println!("Probability: {:.3}", report.probability);
    println!("Label: {} (1 = suspected, 0 = normal)", report.label);
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(fps) = cli.fps {
        settings.target_fps = fps;
    }
    if let Some(dir) = &cli.model_dir {
        settings.model_dir = Some(dir.clone());
    }
    settings.validate()?;
    Ok(settings)
}

/// Exit code 0 once a reply was written, whatever the analysis outcome.
fn run_worker() -> i32 {
    let stdin = io::stdin();
    let stdout = io::stdout();
    match worker_protocol::serve(stdin.lock(), stdout.lock(), &InProcessExecutor::new()) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Worker could not reply: {e}");
            2
        }
    }
}
