//! Progress reporting for pipeline runs.
//!
//! Stage transitions are a side channel for UI feedback, not part of the run
//! result. The orchestrator emits them through [`ProgressObserver`]; the CLI
//! plugs in a spinner, tests plug in a recorder.

use crate::pipeline::PipelineStep;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Observer for `{step, message}` progress events.
pub trait ProgressObserver: Send + Sync {
    fn on_step(&self, step: PipelineStep, message: &str);
}

/// Observer that discards all events.
pub struct NullProgress;

impl ProgressObserver for NullProgress {
    fn on_step(&self, _step: PipelineStep, _message: &str) {}
}

/// Console spinner that tracks the current stage.
pub struct ConsoleProgress {
    spinner: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_step(&self, step: PipelineStep, message: &str) {
        if step == PipelineStep::Done {
            self.spinner.finish_with_message(message.to_string());
        } else {
            self.spinner.set_message(format!("[{step}] {message}"));
        }
    }
}

/// Observer that records events for assertions.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(PipelineStep, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> Vec<PipelineStep> {
        self.events
            .lock()
            .expect("progress lock poisoned")
            .iter()
            .map(|(step, _)| *step)
            .collect()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_step(&self, step: PipelineStep, message: &str) {
        self.events
            .lock()
            .expect("progress lock poisoned")
            .push((step, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_event_order() {
        let progress = RecordingProgress::new();
        progress.on_step(PipelineStep::LoadingData, "loading");
        progress.on_step(PipelineStep::Done, "done");
        assert_eq!(
            progress.steps(),
            vec![PipelineStep::LoadingData, PipelineStep::Done]
        );
    }
}
