//! Settings of the tool itself
//!
//! Sources in order of precedence, lowest first: built-in defaults, the
//! settings file (`tconf.toml` in the working directory or the path given on
//! the command line), `TCONF__*` environment variables. A `.env` file is
//! loaded into the environment beforehand.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tconf_migrate::properties::{CONFIG_FILE_PROP_DEF, PROPERTY_FILENAME_PROP_DEF};
use tconf_migrate::{StaticProcessorRegistry, ITEMS_IMPORT_FILE};

pub const SETTINGS_FILE: &str = "tconf";
pub const ENV_PREFIX: &str = "TCONF";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub property_file: PathBuf,
    pub config_file: PathBuf,
    /// Where external component items found during migration are saved.
    pub items_file: PathBuf,
    pub logging: LoggingSettings,
    /// Values for `prop('name')` variables.
    pub properties: HashMap<String, String>,
    /// Session manager processors whose class is written to the configuration.
    pub processors: BTreeMap<String, String>,
    /// Processors the server discovers as beans.
    pub bean_processors: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            property_file: PathBuf::from(PROPERTY_FILENAME_PROP_DEF),
            config_file: PathBuf::from(CONFIG_FILE_PROP_DEF),
            items_file: PathBuf::from(ITEMS_IMPORT_FILE),
            logging: LoggingSettings::default(),
            properties: HashMap::new(),
            processors: BTreeMap::new(),
            bean_processors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: PathBuf,
    pub file_prefix: String,
    /// `daily`, `hourly`, `minutely` or `never`.
    pub file_rotation: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: PathBuf::from("logs"),
            file_prefix: "tconf".to_string(),
            file_rotation: "daily".to_string(),
        }
    }
}

impl Settings {
    /// Load settings; an explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from(explicit, ENV_PREFIX)
    }

    pub(crate) fn load_from(explicit: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) => File::from(path).required(true),
            None => File::with_name(SETTINGS_FILE).required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn registry(&self) -> StaticProcessorRegistry {
        let mut registry: StaticProcessorRegistry = self.processors.clone().into_iter().collect();
        for (id, class) in &self.bean_processors {
            registry.register(id.clone(), class.clone(), true);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tconf_migrate::ProcessorRegistry;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load_from(None, "TCONF_TEST_UNSET").unwrap();
        assert_eq!(settings.property_file, PathBuf::from("etc/init.properties"));
        assert_eq!(settings.config_file, PathBuf::from("etc/config.tdsl"));
        assert_eq!(settings.logging.level, "info");
        assert!(settings.registry().is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tconf.toml");
        std::fs::write(
            &path,
            r#"
config_file = "/srv/xmpp/config.tdsl"

[logging]
level = "debug"

[processors]
roster = "tigase.xmpp.impl.roster.RosterPresence"

[bean_processors]
presence = "tigase.xmpp.impl.PresenceState"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path), "TCONF_TEST_UNSET").unwrap();
        assert_eq!(settings.config_file, PathBuf::from("/srv/xmpp/config.tdsl"));
        assert_eq!(settings.property_file, PathBuf::from("etc/init.properties"));
        assert_eq!(settings.logging.level, "debug");
        assert!(!settings.logging.json);

        let registry = settings.registry();
        assert_eq!(registry.len(), 2);
        assert!(!registry.find("roster").unwrap().bean);
        assert!(registry.find("presence").unwrap().bean);
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load_from(Some(&missing), "TCONF_TEST_UNSET").is_err());
    }
}
