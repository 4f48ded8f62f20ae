//! Sequential recipe executor.

use std::time::Instant;

use pybundle_core::Result;
use serde::Serialize;

use crate::recipe::Recipe;
use crate::runner::Shell;

/// Progress notifications emitted while a recipe builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// A project is about to build its builders.
    ProjectStarted { project: String },

    /// A builder's predecessors are installed and its steps are starting.
    BuilderStarted {
        project: String,
        builder: String,
        product: String,
    },

    /// A builder installed its product.
    BuilderFinished {
        project: String,
        builder: String,
        download_skipped: bool,
    },

    /// A builder failed; the run stops after this event.
    BuilderFailed {
        project: String,
        builder: String,
        error: String,
    },
}

/// Callback invoked for every [`BuildEvent`].
pub type BuildCallback = Box<dyn FnMut(&BuildEvent)>;

/// Summary of a recipe run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Builders that completed, as `project/builder`.
    pub executed: Vec<String>,

    /// Builders whose product already existed, so the download was skipped.
    pub skipped_downloads: Vec<String>,

    /// Builders that failed, with their error message.
    pub failed: Vec<(String, String)>,

    /// Total execution time in milliseconds.
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::ProjectStarted { .. } | BuildEvent::BuilderStarted { .. } => {}
            BuildEvent::BuilderFinished {
                project,
                builder,
                download_skipped,
            } => {
                let name = format!("{}/{}", project, builder);
                if *download_skipped {
                    self.skipped_downloads.push(name.clone());
                }
                self.executed.push(name);
            }
            BuildEvent::BuilderFailed {
                project,
                builder,
                error,
            } => {
                self.failed
                    .push((format!("{}/{}", project, builder), error.clone()));
            }
        }
    }
}

/// Runs the projects of a recipe in declared order, halting on the first failure.
pub struct Executor<'a> {
    shell: &'a Shell,
    callback: Option<BuildCallback>,
    report: BuildReport,
}

impl<'a> Executor<'a> {
    pub fn new(shell: &'a Shell) -> Self {
        Self {
            shell,
            callback: None,
            report: BuildReport::default(),
        }
    }

    /// Sets a callback for build events.
    pub fn with_callback(mut self, callback: BuildCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Builds every project of `recipe`.
    ///
    /// On failure the partial report stays available through [`Executor::report`].
    pub fn execute(&mut self, recipe: &mut Recipe) -> Result<BuildReport> {
        let start = Instant::now();
        let shell = self.shell;
        let report = &mut self.report;
        let callback = &mut self.callback;
        *report = BuildReport::default();

        let mut emit = |event: BuildEvent| {
            report.record(&event);
            if let Some(callback) = callback.as_mut() {
                callback(&event);
            }
        };

        let mut outcome = Ok(());
        for project in recipe.projects_mut() {
            emit(BuildEvent::ProjectStarted {
                project: project.name().to_string(),
            });
            if let Err(e) = project.build(shell, &mut emit) {
                outcome = Err(e);
                break;
            }
        }

        self.report.duration_ms = start.elapsed().as_millis() as u64;
        outcome.map(|()| self.report.clone())
    }

    /// Report of the last run, complete or not.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_events() {
        let mut report = BuildReport::default();
        report.record(&BuildEvent::BuilderFinished {
            project: "python".into(),
            builder: "xz".into(),
            download_skipped: true,
        });
        report.record(&BuildEvent::BuilderFailed {
            project: "python".into(),
            builder: "python".into(),
            error: "boom".into(),
        });

        assert_eq!(report.executed, vec!["python/xz"]);
        assert_eq!(report.skipped_downloads, vec!["python/xz"]);
        assert_eq!(
            report.failed,
            vec![("python/python".to_string(), "boom".to_string())]
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_serializes() {
        let report = BuildReport {
            executed: vec!["p/a".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["executed"][0], "p/a");
        assert_eq!(json["duration_ms"], 0);
    }
}
