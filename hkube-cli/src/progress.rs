//! Terminal rendering of per-node progress.

use anyhow::Result;
use hkube_core::ProgressSink;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// One progress bar per node, stacked under a spinner shown until nodes register.
pub struct NodeProgress {
    multi: MultiProgress,
    style: ProgressStyle,
    spinner: Mutex<Option<ProgressBar>>,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl NodeProgress {
    pub fn new() -> Result<Self> {
        let style = ProgressStyle::with_template("{prefix:>22.bold} [{bar:30.cyan/blue}] {pos:>2}/{len:2} {msg}")?
            .progress_chars("=> ");
        Ok(Self { multi: MultiProgress::new(), style, spinner: Mutex::new(None), bars: Mutex::new(HashMap::new()) })
    }

    /// Show a spinner with `message` until the first node registers.
    pub fn start(&self, message: &str) {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        *self.spinner.lock() = Some(spinner);
    }

    pub fn finish(&self) {
        self.clear_spinner();
        for bar in self.bars.lock().values() {
            bar.finish();
        }
    }

    /// Leave bars where they stopped.
    pub fn abandon(&self) {
        self.clear_spinner();
        for bar in self.bars.lock().values() {
            bar.abandon();
        }
    }

    fn clear_spinner(&self) {
        if let Some(spinner) = self.spinner.lock().take() {
            spinner.finish_and_clear();
        }
    }
}

impl ProgressSink for NodeProgress {
    fn on_register(&self, node: &str, total_steps: usize) {
        self.clear_spinner();

        let bar = self.multi.add(ProgressBar::new(total_steps as u64));
        bar.set_style(self.style.clone());
        bar.set_prefix(node.to_string());
        bar.set_message("pending");
        self.bars.lock().insert(node.to_string(), bar);
    }

    fn on_event(&self, node: &str, label: &str, completed: usize, total_steps: usize) {
        if let Some(bar) = self.bars.lock().get(node) {
            bar.set_position(completed as u64);
            if completed >= total_steps {
                bar.finish_with_message(label.to_string());
            } else {
                bar.set_message(label.to_string());
            }
        }
    }
}
