//! track_video - overlay tracked vehicle boxes and identities on a recorded
//! video and write the annotated frames.

use anyhow::Result;
use clap::Parser;
use roadwatch::ui::Ui;
use roadwatch::{run_tracking, ConfigOverrides, PipelineConfig};
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
    /// Output video file, or a directory for a PNG sequence.
    #[arg(long)]
    output_video: Option<PathBuf>,
    /// Recorded track file (.json).
    #[arg(long)]
    model: Option<PathBuf>,
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
                output_video: args.output_video,
                model: args.model,
                ..ConfigOverrides::default()
            },
        )?
    };

    let summary = {
        let _stage = ui.stage("Track and annotate");
        run_tracking(&config, ui.frame_progress("track", config.progress_interval))?
    };

    println!("Video saved to {}", config.output_video.display());
    println!(
        "Frames written: {} ({} annotated, {} boxes)",
        summary.frames_written, summary.frames_annotated, summary.labels_drawn
    );
    Ok(())
}
