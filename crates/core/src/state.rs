//! Builder lifecycle steps and states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A lifecycle hook of a builder, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Download,
    PreBuild,
    Build,
    PostBuild,
    Install,
}

impl Step {
    /// All steps in the order a builder runs them.
    pub const ALL: [Step; 5] = [
        Step::Download,
        Step::PreBuild,
        Step::Build,
        Step::PostBuild,
        Step::Install,
    ];

    /// State a builder is in once this step has completed.
    pub fn completed_state(self) -> BuildState {
        match self {
            Step::Download => BuildState::Downloaded,
            Step::PreBuild => BuildState::Configured,
            Step::Build | Step::PostBuild => BuildState::Built,
            Step::Install => BuildState::Installed,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Download => "download",
            Step::PreBuild => "pre_build",
            Step::Build => "build",
            Step::PostBuild => "post_build",
            Step::Install => "install",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a builder.
///
/// States only move forward: `Pending → Downloaded → Configured → Built →
/// Installed`, or to `Failed` from anywhere. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Pending,
    Downloaded,
    Configured,
    Built,
    Installed,
    Failed,
}

impl BuildState {
    fn rank(self) -> Option<u8> {
        match self {
            BuildState::Pending => Some(0),
            BuildState::Downloaded => Some(1),
            BuildState::Configured => Some(2),
            BuildState::Built => Some(3),
            BuildState::Installed => Some(4),
            BuildState::Failed => None,
        }
    }

    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_advance_to(self, next: BuildState) -> bool {
        match (self.rank(), next.rank()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(next)) => next >= current,
        }
    }

    /// Moves to `next`, returning false (and staying put) on a backward move.
    pub fn advance(&mut self, next: BuildState) -> bool {
        if self.can_advance_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Installed | BuildState::Failed)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Pending => "PENDING",
            BuildState::Downloaded => "DOWNLOADED",
            BuildState::Configured => "CONFIGURED",
            BuildState::Built => "BUILT",
            BuildState::Installed => "INSTALLED",
            BuildState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
