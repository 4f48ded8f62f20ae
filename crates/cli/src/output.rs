//! Terminal output: status lines, builder spinners and error reporting.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pybundle_core::BundleError;
use pybundle_engine::{BuildEvent, BuildReport, RelocationReport};

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Prints an informational message.
pub fn info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), message);
}

/// Prints `<ErrorKind>: <message>` on stderr.
pub fn failure(error: &BundleError) {
    eprintln!(
        "{}: {}",
        style(error.kind()).for_stderr().red().bold(),
        error
    );
}

/// Prints a section header.
pub fn section_header(title: &str) {
    println!("\n{}", style(format!("── {} ──", title)).bold());
}

/// Prints a list item.
pub fn list_item(text: &str) {
    println!("  {} {}", style("•").dim(), text);
}

/// Prints a key-value pair.
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

// ============================================================================
// Build progress
// ============================================================================

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Renders [`BuildEvent`]s as one spinner per running builder.
#[derive(Default)]
pub struct BuildProgress {
    current: Option<ProgressBar>,
}

impl BuildProgress {
    pub fn on_event(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::ProjectStarted { project } => {
                println!(
                    "\n{} {}",
                    style("▶").cyan().bold(),
                    style(project).cyan().bold()
                );
            }
            BuildEvent::BuilderStarted {
                builder, product, ..
            } => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(spinner_style("{spinner:.cyan} {msg}"));
                spinner.set_message(format!("{} {}", builder, style(product).dim()));
                spinner.enable_steady_tick(Duration::from_millis(80));
                self.current = Some(spinner);
            }
            BuildEvent::BuilderFinished {
                builder,
                download_skipped,
                ..
            } => {
                let note = if *download_skipped {
                    format!(" {}", style("(download skipped)").dim())
                } else {
                    String::new()
                };
                self.finish(format!("{} {}{}", style("✓").green(), builder, note));
            }
            BuildEvent::BuilderFailed { builder, error, .. } => {
                self.finish(format!(
                    "{} {} - {}",
                    style("✗").red(),
                    style(builder).red(),
                    error
                ));
            }
        }
    }

    fn finish(&mut self, message: String) {
        match self.current.take() {
            Some(spinner) if !spinner.is_hidden() => {
                spinner.set_style(spinner_style("{msg}"));
                spinner.finish_with_message(message);
            }
            Some(spinner) => {
                spinner.finish_and_clear();
                println!("{}", message);
            }
            None => println!("{}", message),
        }
    }
}

/// Prints the totals of a build.
pub fn build_summary(report: &BuildReport) {
    println!();
    if report.is_success() {
        println!(
            "{}: {} built, {} downloads skipped in {}ms",
            style("SUCCESS").green().bold(),
            report.executed.len(),
            report.skipped_downloads.len(),
            report.duration_ms
        );
    } else {
        println!(
            "{}: {} built, {} failed in {}ms",
            style("FAILED").red().bold(),
            report.executed.len(),
            report.failed.len(),
            report.duration_ms
        );
    }
}

/// Prints commands recorded during a dry run.
pub fn transcript(lines: &[String]) {
    section_header("Commands");
    for line in lines {
        println!("  {}", style(line).dim());
    }
}

// ============================================================================
// Relocation
// ============================================================================

/// Prints what a relocation copied and rewrote.
pub fn relocation_summary(report: &RelocationReport) {
    if !report.copied.is_empty() {
        section_header("Copied");
        for path in &report.copied {
            list_item(&path.display().to_string());
        }
    }

    if !report.plan.is_empty() {
        section_header("Rewrites");
        for (binary, rewrites) in report.plan.iter() {
            println!("  {}", style(binary.display()).bold());
            for rewrite in rewrites {
                println!(
                    "    {} {} {}",
                    rewrite.old_ref(),
                    style("→").dim(),
                    rewrite.new_ref()
                );
            }
        }
    }

    println!();
    success(&format!(
        "{} binaries examined, {} libraries copied, {} edits",
        report.visited.len(),
        report.copied.len(),
        report.plan.len()
    ));
}
