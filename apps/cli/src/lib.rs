//! `tconf` - configuration maintenance for the server
//!
//! The binary wraps the migration and repository libraries in a few tasks:
//! checking and upgrading a configuration file, a dry run of the startup
//! load, and listing or importing repository items.

pub mod commands;
pub mod logging;
pub mod settings;

pub use settings::{LoggingSettings, Settings};
