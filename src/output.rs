//! Run report rendering
//!
//! Human-readable text for terminals and pretty JSON for scripts.

use std::time::Duration;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::harvester::HarvestWarning;
use crate::pipeline::{RunOutcome, RunReport};

/// Formats a [`RunReport`] for stdout
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Force colors on or off regardless of the terminal
    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_report(&self, report: &RunReport) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(report)?;
                json.push('\n');
                Ok(json)
            }
            OutputFormat::Human => Ok(self.format_human(report)),
        }
    }

    fn format_human(&self, report: &RunReport) -> String {
        let mut output = String::new();

        match self.verbosity {
            VerbosityLevel::Quiet => {
                // Warnings are already in the log
                if let RunOutcome::NothingToProcess { reason } = &report.outcome {
                    output.push_str(&format!("Nothing to process: {}\n", reason));
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                output.push_str(&self.format_outcome(&report.outcome));
                output.push_str(&self.format_summary(report));

                if !report.warnings.is_empty() {
                    output.push_str(&format!(
                        "\n{} ({}):\n",
                        self.colorize("Warnings", "33"),
                        report.warnings.len()
                    ));
                    for warning in &report.warnings {
                        output.push_str(&format!("  {}\n", self.format_warning(warning)));
                    }
                }
            }
        }

        output
    }

    fn format_outcome(&self, outcome: &RunOutcome) -> String {
        match outcome {
            RunOutcome::Generated { schema, documents } => format!(
                "{}  {} from {} document{}\n",
                self.colorize("✓ GENERATED", "32"),
                schema.display(),
                documents,
                if *documents == 1 { "" } else { "s" }
            ),
            RunOutcome::NothingToProcess { reason } => format!(
                "{}  {}\n",
                self.colorize("- NOTHING TO PROCESS", "36"),
                reason
            ),
        }
    }

    fn format_summary(&self, report: &RunReport) -> String {
        let mut output = String::new();
        output.push_str("\nRun Summary:\n");
        output.push_str(&format!("  Staged documents: {}\n", report.staged_documents));
        output.push_str(&format!("  Local documents: {}\n", report.local_documents));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(Duration::from_millis(report.duration_ms))
        ));

        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!("  Engine: {}\n", report.engine));
            output.push_str(&format!("  Filtered out: {}\n", report.filtered_out));
            output.push_str(&format!(
                "  Started: {}\n",
                report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        output
    }

    fn format_warning(&self, warning: &HarvestWarning) -> String {
        let label = match warning {
            HarvestWarning::FolderFailed(_) => self.colorize("⚠ FOLDER", "33"),
            HarvestWarning::ResourceSkipped(_) => self.colorize("- SKIPPED", "36"),
            HarvestWarning::LocalDocumentMissing { .. } => self.colorize("⚠ MISSING", "33"),
        };
        format!("{}  {}", label, warning)
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
