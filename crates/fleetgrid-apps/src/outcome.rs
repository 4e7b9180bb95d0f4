//! Results of operations that contain best-effort steps.

use std::fmt;

use fleet_core::PluginError;

/// A best-effort step whose failure does not abort the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ConfigIndex,
    SecretIndex,
    History,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::ConfigIndex => f.write_str("config index refresh"),
            Step::SecretIndex => f.write_str("secret index refresh"),
            Step::History => f.write_str("history record"),
        }
    }
}

/// A swallowed collaborator failure.
#[derive(Debug)]
pub struct Warning {
    pub step: Step,
    pub error: PluginError,
}

/// The value produced by an operation plus any best-effort failures.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Whether any best-effort step failed.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether the given step failed.
    pub fn failed(&self, step: Step) -> bool {
        self.warnings.iter().any(|w| w.step == step)
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub(crate) fn warn(&mut self, step: Step, error: PluginError) {
        self.warnings.push(Warning { step, error });
    }
}
