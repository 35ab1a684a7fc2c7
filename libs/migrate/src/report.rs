//! Outcome of a conversion or upgrade run

use std::fmt;

use tracing::warn;

/// A setting that could not be migrated. The rest of the run proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationWarning {
    pub key: String,
    pub message: String,
}

impl MigrationWarning {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Set by the in-place upgrade when the tree differs from its input.
    pub changed: bool,
    pub warnings: Vec<MigrationWarning>,
    /// External component items to be stored in the import file.
    pub external_items: Vec<String>,
}

impl MigrationReport {
    pub(crate) fn warn(&mut self, key: impl Into<String>, message: impl Into<String>) {
        let warning = MigrationWarning::new(key, message);
        warn!(key = %warning.key, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Append the results of a later run.
    pub fn merge(&mut self, other: MigrationReport) {
        self.changed |= other.changed;
        self.warnings.extend(other.warnings);
        self.external_items.extend(other.external_items);
    }
}
