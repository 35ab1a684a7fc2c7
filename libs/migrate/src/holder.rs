//! Startup loading of the server configuration
//!
//! [`ConfigHolder`] finds the configuration on disk, converts legacy property
//! files, upgrades DSL files in place and keeps the resulting tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tconf_dsl::{build_tree, read_file, ConfigMap, ConfigWriter, ProcessVariables, VariableSource};
use tracing::{debug, info, warn};

use crate::backup::make_backup;
use crate::detect::{detect_format, resolve_property_files, Format};
use crate::error::{Error, Result};
use crate::legacy::convert_from_old_format;
use crate::properties::{
    load_from_property_strings, load_properties_file, parse_args, CONFIG_FILE_PROP_DEF,
    CONFIG_FILE_PROP_KEY, GEN_TEST, PROPERTY_FILENAME_PROP_KEY,
};
use crate::registry::ProcessorRegistry;
use crate::report::{MigrationReport, MigrationWarning};
use crate::upgrade::upgrade_dsl;

/// Default location of the external component items import file.
pub const ITEMS_IMPORT_FILE: &str = "etc/externalComponentItems";

const CONFIG_FILE_NAME: &str = "config.tdsl";

pub struct ConfigHolder<'a> {
    registry: &'a dyn ProcessorRegistry,
    items_file: PathBuf,
    variables: Option<&'a dyn VariableSource>,
    props: ConfigMap,
    warnings: Vec<MigrationWarning>,
}

impl<'a> ConfigHolder<'a> {
    pub fn new(registry: &'a dyn ProcessorRegistry) -> Self {
        Self {
            registry,
            items_file: PathBuf::from(ITEMS_IMPORT_FILE),
            variables: None,
            props: ConfigMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_items_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.items_file = path.into();
        self
    }

    /// Source used to resolve variables in the logged configuration.
    pub fn with_variables(mut self, source: &'a dyn VariableSource) -> Self {
        self.variables = Some(source);
        self
    }

    pub fn properties(&self) -> &ConfigMap {
        &self.props
    }

    pub fn into_properties(self) -> ConfigMap {
        self.props
    }

    /// Settings that could not be migrated during the last runs.
    pub fn warnings(&self) -> &[MigrationWarning] {
        &self.warnings
    }

    /// Convert legacy configuration named by `args` into the DSL file at
    /// `tdsl_path`. Returns the operator messages.
    pub fn convert(&mut self, args: &[String], tdsl_path: &Path) -> Result<Vec<String>> {
        let mut props = ConfigMap::new();
        parse_args(&mut props, args);
        props.remove(GEN_TEST);

        let property_files = props.remove(PROPERTY_FILENAME_PROP_KEY).and_then(|v| v.as_string());
        let files = resolve_property_files(property_files.as_deref());
        let Some(first) = files.first() else {
            return Ok(Vec::new());
        };

        let mut lines = Vec::new();
        match detect_format(&files) {
            Format::Dsl => {
                if same_file(first, tdsl_path) {
                    return Ok(lines);
                }
                let backup = if tdsl_path.exists() {
                    Some(make_backup(tdsl_path)?)
                } else {
                    None
                };
                fs::rename(first, tdsl_path)?;
                lines.push(format!(
                    "Configuration file {} was updated to match current configuration format and renamed to {}.",
                    first.display(),
                    tdsl_path.display()
                ));
                if let Some(backup) = backup {
                    lines.push(format!(
                        "Previous version of a configuration file was saved as {}",
                        backup.display()
                    ));
                }
            }
            Format::Properties => {
                let (tree, report) = self.convert_property_files(props, &files)?;

                if tdsl_path.exists() {
                    let backup = make_backup(tdsl_path)?;
                    lines.push(format!(
                        "Existing DSL config file {} was renamed to {} as conversion from property files was started.",
                        tdsl_path.display(),
                        backup.display()
                    ));
                }
                ConfigWriter::new().write_file(tdsl_path, &tree)?;

                let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
                lines.push(format!(
                    "Configuration files {} were updated to DSL configuration format and saved as {}.",
                    names.join(", "),
                    tdsl_path.display()
                ));
                for file in &files {
                    let backup = make_backup(file)?;
                    lines.push(format!(
                        "Old configuration file {} was renamed to {}.",
                        file.display(),
                        backup.display()
                    ));
                }

                self.absorb(report)?;
                self.props = tree;
            }
        }

        for line in &lines {
            info!("{}", line);
        }
        Ok(lines)
    }

    /// Load the configuration for startup, converting and upgrading it on
    /// disk when needed. Returns the operator messages.
    pub fn load_configuration(&mut self, args: &[String]) -> Result<Vec<String>> {
        let mut cli = ConfigMap::new();
        parse_args(&mut cli, args);
        let config_path = config_file_path(&cli);

        let mut lines = self.convert(args, &config_path)?;

        if config_path.exists() {
            let mut tree = read_file(&config_path)?;
            let report = upgrade_dsl(&mut tree, self.registry);
            if report.changed {
                let backup = make_backup(&config_path)?;
                ConfigWriter::new().write_file(&config_path, &tree)?;
                let line = format!(
                    "Configuration file {} was updated to match current format. Previous version of configuration file was saved at {}",
                    config_path.display(),
                    backup.display()
                );
                warn!("{}", line);
                lines.push(line);
            }
            self.absorb(report)?;
            self.props = tree;
        }

        let defaults = ProcessVariables::new();
        let source: &dyn VariableSource = match self.variables {
            Some(source) => source,
            None => &defaults,
        };
        let dump = ConfigWriter::new().resolve_variables(source).write(&self.props)?;
        debug!("Loaded configuration:\n{}", dump);

        Ok(lines)
    }

    /// Check a single configuration file and upgrade it if needed.
    ///
    /// Never fails: problems are reported as lines for the operator.
    pub fn upgrade_config(&mut self, path: &Path) -> Vec<String> {
        if !path.exists() {
            return vec![format!("Configuration file {} does not exist.", path.display())];
        }
        match self.try_upgrade_config(path) {
            Ok(lines) => lines,
            Err(Error::Io(e)) => vec![
                "Error! Failed to save upgraded configuration file".to_string(),
                e.to_string(),
            ],
            Err(Error::Dsl(e)) if e.line().is_some() => vec![
                format!("ERROR! Error in configuration file: {}", path.display()),
                e.to_string(),
                format!("Line: {}", e.line_content().unwrap_or_default()),
            ],
            Err(Error::Dsl(tconf_dsl::Error::Io(e))) => vec![
                "Error! Failed to save upgraded configuration file".to_string(),
                e.to_string(),
            ],
            Err(e) => vec![
                format!("ERROR! Error in configuration file: {}", path.display()),
                format!("Issue with configuration file: {}", e),
            ],
        }
    }

    fn try_upgrade_config(&mut self, path: &Path) -> Result<Vec<String>> {
        let is_dsl = path.extension().is_some_and(|ext| ext == "tdsl")
            || detect_format(&[path.to_path_buf()]) == Format::Dsl;

        if is_dsl {
            let mut tree = read_file(path)?;
            let report = upgrade_dsl(&mut tree, self.registry);
            let lines = if report.changed {
                let backup = make_backup(path)?;
                ConfigWriter::new().write_file(path, &tree)?;
                vec![
                    format!(
                        "Configuration file {} was updated to match current configuration format.",
                        path.display()
                    ),
                    format!(
                        "Previous version of a configuration file was saved at {}",
                        backup.display()
                    ),
                ]
            } else {
                vec![format!(
                    "Configuration file {} is in DSL format and is valid.",
                    path.display()
                )]
            };
            self.absorb(report)?;
            self.props = tree;
            return Ok(lines);
        }

        let (tree, report) =
            self.convert_property_files(ConfigMap::new(), &[path.to_path_buf()])?;
        let backup = make_backup(path)?;
        ConfigWriter::new().write_file(path, &tree)?;
        self.absorb(report)?;
        self.props = tree;
        Ok(vec![
            format!("Configuration file {} was converted to DSL format.", path.display()),
            format!(
                "Previous version of a configuration file was saved at {}",
                backup.display()
            ),
        ])
    }

    /// Load, convert and upgrade property files without touching the disk.
    fn convert_property_files(
        &self,
        mut props: ConfigMap,
        files: &[PathBuf],
    ) -> Result<(ConfigMap, MigrationReport)> {
        let mut settings = Vec::new();
        for file in files {
            load_properties_file(file, &mut props, &mut settings)?;
        }
        load_from_property_strings(&mut props, &settings)?;

        let mut report = convert_from_old_format(&mut props, self.registry)?;
        let mut tree = build_tree(&props);
        tree.remove(PROPERTY_FILENAME_PROP_KEY);
        tree.remove(CONFIG_FILE_PROP_KEY);

        report.merge(upgrade_dsl(&mut tree, self.registry));
        Ok((tree, report))
    }

    fn absorb(&mut self, report: MigrationReport) -> Result<()> {
        if !report.external_items.is_empty() {
            self.save_external_component_items(&report.external_items)?;
        }
        self.warnings.extend(report.warnings);
        Ok(())
    }

    /// Replace the import file with one item per line.
    pub fn save_external_component_items(&self, items: &[String]) -> io::Result<()> {
        if let Some(parent) = self.items_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.items_file, items.join("\n"))?;
        info!(
            file = %self.items_file.display(),
            items = items.len(),
            "external component items saved for import"
        );
        Ok(())
    }
}

/// DSL file named by the arguments: `--config-file`, else `config.tdsl` next
/// to the property file, else the default location.
pub fn config_file_path(cli: &ConfigMap) -> PathBuf {
    if let Some(path) = cli.get(CONFIG_FILE_PROP_KEY).and_then(|v| v.as_string()) {
        return PathBuf::from(path);
    }
    let property_file = cli
        .get(PROPERTY_FILENAME_PROP_KEY)
        .and_then(|v| v.as_string())
        .and_then(|files| files.split(',').next().map(|f| f.trim().to_string()));
    match property_file {
        Some(file) => Path::new(&file)
            .parent()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
        None => PathBuf::from(CONFIG_FILE_PROP_DEF),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
