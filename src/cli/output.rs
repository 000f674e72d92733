//! CLI output formatting

use crate::core::{ManifestDestination, SubmissionReport};
use crate::execution::PipelineEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner for long-running stages
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Prints pipeline events above a spinner showing the active stage
#[derive(Clone)]
pub struct EventPrinter {
    spinner: ProgressBar,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self {
            spinner: create_spinner(),
        }
    }

    pub fn handle(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::StageStarted { stage } => {
                self.spinner.set_message(stage.label());
            }
            PipelineEvent::ReadinessPoll {
                attempt,
                max_attempts,
            } => {
                self.spinner.set_message(format!(
                    "Waiting for JobSet webhook ({}/{})",
                    attempt, max_attempts
                ));
            }
            _ => {}
        }

        if let Some(line) = format_pipeline_event(&event) {
            self.spinner.println(line);
        }

        if matches!(
            event,
            PipelineEvent::PipelineCompleted { .. } | PipelineEvent::PipelineFailed { .. }
        ) {
            self.spinner.finish_and_clear();
        }
    }
}

impl Default for EventPrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a pipeline event for display. Progress-only events yield `None`.
pub fn format_pipeline_event(event: &PipelineEvent) -> Option<String> {
    let line = match event {
        PipelineEvent::PipelineStarted { run_id } => format!(
            "{} Submitting workload ({})",
            ROCKET,
            style(short_id(run_id)).dim()
        ),
        PipelineEvent::StageStarted { .. }
        | PipelineEvent::ReadinessPoll { .. }
        | PipelineEvent::QuotaReconciled { .. } => return None,
        PipelineEvent::StageCompleted { stage, detail } => format!(
            "{} {}: {}",
            CHECK,
            style(stage.label()).green(),
            style(detail).dim()
        ),
        PipelineEvent::Warning { stage, warning } => format!(
            "{} {}: {}",
            WARN,
            style(stage.label()).yellow(),
            warning
        ),
        PipelineEvent::ControllerObserved { state } => format!(
            "{} JobSet controller is {}",
            INFO,
            style(state).cyan()
        ),
        PipelineEvent::ControllerInstalling { documents } => format!(
            "{} Installing JobSet controller ({} documents)",
            SPINNER,
            style(documents).cyan()
        ),
        PipelineEvent::PipelineCompleted {
            run_id,
            workload_name,
        } => format!(
            "{} Workload {} submitted ({})",
            CHECK,
            style(workload_name).bold(),
            style(short_id(run_id)).dim()
        ),
        PipelineEvent::PipelineFailed {
            run_id,
            stage,
            error,
        } => format!(
            "{} {} failed ({}): {}",
            CROSS,
            style(stage.label()).red(),
            style(short_id(run_id)).dim(),
            error
        ),
    };
    Some(line)
}

/// Format the final report for display
pub fn format_report(report: &SubmissionReport) -> String {
    let accelerator = if report.accelerator.is_empty() {
        "none (CPU-only)"
    } else {
        report.accelerator.as_str()
    };
    let destination = match &report.destination {
        ManifestDestination::Applied => "applied to cluster".to_string(),
        ManifestDestination::Written(path) => format!("written to {}", path.display()),
    };

    let rows = [
        ("Workload", report.workload_name.clone()),
        ("Project", report.project_id.clone()),
        ("Queue", report.queue.clone()),
        ("Accelerator", accelerator.to_string()),
        ("Image", report.image.clone()),
        ("Controller", report.controller.to_string()),
        ("Quota", report.quota.to_string()),
        ("Manifest", destination),
        ("Elapsed", format!("{:.1}s", report.elapsed_secs())),
    ];

    rows.iter()
        .map(|(label, value)| format!("  {:<12} {}", style(label).bold(), value))
        .collect::<Vec<_>>()
        .join("\n")
}
