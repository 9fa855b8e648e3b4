//! Terminal progress for genesis and snapshot downloads.

use indicatif::{ProgressBar, ProgressStyle};
use poolstats_core::storage::TransferProgress;
use std::sync::Mutex;

const BAR_TEMPLATE: &str =
    "{prefix:<10} [{bar:40}] {bytes}/{total_bytes} {bytes_per_sec} eta {eta}";
const SPINNER_TEMPLATE: &str = "{spinner} {prefix:<10} {bytes} {bytes_per_sec}";

/// One bar per transfer, replaced on each `on_start`.
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

fn new_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => ProgressBar::new(len).with_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        ),
        None => ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        ),
    }
}

impl TransferProgress for BarProgress {
    fn on_start(&self, label: &str, total: Option<u64>) {
        let bar = new_bar(total).with_prefix(label.to_string());
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(bar) {
                old.abandon();
            }
        }
    }

    fn on_bytes(&self, written: u64) {
        self.with_bar(|bar| bar.inc(written));
    }

    fn on_finish(&self, label: &str, total_written: u64) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_with_message(format!("{label}: {total_written} bytes"));
            }
        }
    }
}
