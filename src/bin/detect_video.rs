//! detect_video - run the detection pipeline over a recorded video and write
//! the per-frame detections and statistics as JSON.

use anyhow::Result;
use clap::Parser;
use roadwatch::ui::Ui;
use roadwatch::{run_detection, ConfigOverrides, PipelineConfig};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Pipeline config file (JSON, or TOML by extension).
    #[arg(long, env = "ROADWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Input video path or stub:// locator.
    #[arg(long)]
    input: Option<String>,
    /// Output path for the result document.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Model artifact (.onnx, or .json recording).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Minimum detection confidence (inclusive).
    #[arg(long)]
    conf: Option<f32>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load config");
        PipelineConfig::load(
            args.config.as_deref(),
            ConfigOverrides {
                input: args.input,
                output_json: args.output,
                model: args.model,
                confidence_threshold: args.conf,
                ..ConfigOverrides::default()
            },
        )?
    };

    let doc = {
        let _stage = ui.stage("Detect objects");
        run_detection(
            &config,
            ui.frame_progress("detect", config.progress_interval),
        )?
    };

    println!("Results saved to {}", config.output_json.display());
    println!("Total frames: {}", doc.statistics.total_frames);
    for tally in &doc.statistics.classes {
        println!(
            "{}: {} detections in {} frames",
            tally.class_name, tally.detections, tally.frames_with
        );
    }
    Ok(())
}
