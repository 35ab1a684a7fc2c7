//! tconf-migrate - moving server configuration to the current tdsl layout
//!
//! Two rule sets live here:
//! - [`convert_from_old_format`] turns the flat settings of legacy property
//!   files into the current key layout
//! - [`upgrade_dsl`] restructures an already parsed tree in place and can be
//!   applied any number of times
//!
//! [`ConfigHolder`] drives both at startup, backing up every file it
//! replaces. Settings that cannot be migrated are collected as
//! [`MigrationWarning`]s instead of failing the run.

pub mod backup;
pub mod detect;
pub mod error;
pub mod holder;
pub mod legacy;
mod plugins;
pub mod properties;
pub mod registry;
pub mod report;
pub mod rules;
pub mod upgrade;

pub use backup::{backup_path, make_backup};
pub use detect::{detect_format, resolve_property_files, Format};
pub use error::{Error, Result};
pub use holder::{config_file_path, ConfigHolder, ITEMS_IMPORT_FILE};
pub use legacy::{convert_from_old_format, repo_class};
pub use registry::{KnownProcessor, ProcessorRegistry, StaticProcessorRegistry};
pub use report::{MigrationReport, MigrationWarning};
pub use upgrade::upgrade_dsl;
