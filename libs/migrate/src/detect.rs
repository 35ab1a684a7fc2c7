//! Location and format of the configuration files to migrate

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::properties::PROPERTY_FILENAME_PROP_DEF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Already written in the DSL.
    Dsl,
    /// Legacy `key=value` properties.
    Properties,
}

/// Existing files named by a comma separated `--property-file` value.
///
/// A single missing file is replaced by the default property file.
pub fn resolve_property_files(property_files: Option<&str>) -> Vec<PathBuf> {
    let names = property_files.unwrap_or_else(|| {
        debug!(default = PROPERTY_FILENAME_PROP_DEF, "no property file specified, using default");
        PROPERTY_FILENAME_PROP_DEF
    });
    let mut names: Vec<&str> = names.split(',').map(str::trim).collect();

    if let [single] = names.as_mut_slice() {
        if !Path::new(*single).exists() {
            debug!(
                file = %single,
                default = PROPERTY_FILENAME_PROP_DEF,
                "property file does not exist, trying default"
            );
            *single = PROPERTY_FILENAME_PROP_DEF;
        }
    }

    names
        .into_iter()
        .map(PathBuf::from)
        .filter(|path| path.exists())
        .collect()
}

/// Look for DSL syntax in any of the files.
pub fn detect_format(files: &[PathBuf]) -> Format {
    for file in files {
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "could not read configuration file");
                continue;
            }
        };
        let found = text
            .lines()
            .take_while(|line| !line.starts_with("--user-db"))
            .filter(|line| !is_comment(line))
            .any(is_dsl_line);
        if found {
            return Format::Dsl;
        }
    }
    Format::Properties
}

fn is_comment(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('#') || line.starts_with('!')
}

/// A brace outside cluster node placeholders and stored procedure calls.
fn is_dsl_line(line: &str) -> bool {
    if !line.contains('{') || line.contains("{clusterNode}") {
        return false;
    }
    let quoted_call = line.contains("'{ call") || line.contains("\"{ call");
    !line.contains("{ call") || quoted_call
}
