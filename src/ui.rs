use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Per-frame progress for a processing loop. Log lines are emitted every
    /// `interval` frames regardless of mode; the bar is only drawn when pretty.
    pub fn frame_progress(&self, label: &str, interval: u64) -> FrameProgress {
        let mut progress = FrameProgress::logging(label, interval);
        if self.use_pretty() {
            let bar = ProgressBar::hidden();
            bar.set_draw_target(ProgressDrawTarget::stderr());
            progress.bar = Some(bar);
        }
        progress
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Frame counter driving periodic progress logs and an optional bar.
pub struct FrameProgress {
    label: String,
    interval: u64,
    total: Option<u64>,
    done: u64,
    bar: Option<ProgressBar>,
}

impl FrameProgress {
    /// Log-only progress; `interval == 0` disables the log lines.
    pub fn logging(label: &str, interval: u64) -> Self {
        Self {
            label: label.to_string(),
            interval,
            total: None,
            done: 0,
            bar: None,
        }
    }

    pub fn start(&mut self, total: Option<u64>) {
        self.total = total;
        self.done = 0;
        if let Some(bar) = &self.bar {
            let style = match total {
                Some(len) => {
                    bar.set_length(len);
                    ProgressStyle::with_template("{bar:40} {pos}/{len} frames {msg}")
                }
                None => ProgressStyle::with_template("{spinner} {pos} frames {msg}"),
            };
            if let Ok(style) = style {
                bar.set_style(style);
            }
            bar.set_message(self.label.clone());
        }
    }

    pub fn advance(&mut self) {
        self.done += 1;
        if let Some(bar) = &self.bar {
            bar.set_position(self.done);
        }
        if self.interval > 0 && self.done % self.interval == 0 {
            match self.total {
                Some(total) => log::info!("{}: processed {}/{} frames", self.label, self.done, total),
                None => log::info!("{}: processed {} frames", self.label, self.done),
            }
        }
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        log::info!("{}: {} frames", self.label, self.done);
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
