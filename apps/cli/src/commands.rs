//! Tasks run by the `tconf` binary
//!
//! Every task returns the lines to show to the operator.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tconf_dsl::{ConfigWriter, ProcessVariables};
use tconf_migrate::properties::{CONFIG_FILE_PROP_KEY, PROPERTY_FILENAME_PROP_KEY};
use tconf_migrate::ConfigHolder;
use tconf_repository::{ConfigItem, ConfigRepository, SqlRepository, XmlRepository};
use tracing::{debug, info, warn};

use crate::settings::Settings;

/// Check a configuration file and upgrade it if needed.
pub fn upgrade_config(settings: &Settings, path: &Path) -> Vec<String> {
    let registry = settings.registry();
    let variables = ProcessVariables::with_properties(settings.properties.clone());
    let mut holder = ConfigHolder::new(&registry)
        .with_items_file(settings.items_file.clone())
        .with_variables(&variables);

    let mut lines = holder.upgrade_config(path);
    lines.extend(warning_lines(&holder));
    lines
}

/// Load configuration the way the server does at startup, converting and
/// upgrading files on disk when needed.
///
/// `args` are server style arguments; missing `--property-file` and
/// `--config-file` are taken from the settings.
pub fn load(settings: &Settings, args: &[String], print: bool) -> anyhow::Result<Vec<String>> {
    let mut args = args.to_vec();
    for (key, default) in [
        (PROPERTY_FILENAME_PROP_KEY, &settings.property_file),
        (CONFIG_FILE_PROP_KEY, &settings.config_file),
    ] {
        if !args.iter().any(|arg| arg == key) {
            args.push(key.to_string());
            args.push(default.display().to_string());
        }
    }
    debug!(?args, "loading configuration");

    let registry = settings.registry();
    let variables = ProcessVariables::with_properties(settings.properties.clone());
    let mut holder = ConfigHolder::new(&registry)
        .with_items_file(settings.items_file.clone())
        .with_variables(&variables);

    let mut lines = holder
        .load_configuration(&args)
        .context("Failed to load configuration")?;
    lines.extend(warning_lines(&holder));

    if print {
        let text = ConfigWriter::new()
            .resolve_variables(&variables)
            .write(holder.properties())
            .context("Failed to render configuration")?;
        lines.extend(text.lines().map(str::to_string));
    }
    Ok(lines)
}

fn warning_lines(holder: &ConfigHolder<'_>) -> Vec<String> {
    holder
        .warnings()
        .iter()
        .map(|warning| format!("WARNING! {}", warning))
        .collect()
}

/// Backing store of a configuration repository.
#[derive(Debug, Clone)]
pub enum RepoLocation {
    Sql(String),
    Xml(PathBuf),
}

pub async fn open_repository(location: &RepoLocation) -> anyhow::Result<Box<dyn ConfigRepository>> {
    let repo: Box<dyn ConfigRepository> = match location {
        RepoLocation::Sql(uri) => Box::new(
            SqlRepository::connect(uri)
                .await
                .with_context(|| format!("Failed to open configuration database {}", uri))?,
        ),
        RepoLocation::Xml(path) => Box::new(
            XmlRepository::open(path)
                .with_context(|| format!("Failed to open configuration file {}", path.display()))?,
        ),
    };
    Ok(repo)
}

/// Items of a repository in `comp/node/key[t]=value` form.
pub async fn repo_dump(repo: &dyn ConfigRepository, component: Option<&str>) -> Vec<String> {
    let items = match component {
        Some(comp) => repo.items_for_component(comp).await,
        None => repo.all_items().await,
    };
    items.iter().map(ConfigItem::to_property_string).collect()
}

/// Add every `comp/node/key[t]=value` line of `file` to the repository and
/// persist it. Blank lines and `#` comments are skipped.
pub async fn repo_import(repo: &dyn ConfigRepository, file: &Path) -> anyhow::Result<Vec<String>> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut imported = 0usize;
    let mut lines = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match ConfigItem::from_property_string(line) {
            Ok(item) => {
                repo.add_item(item).await;
                imported += 1;
            }
            Err(e) => {
                warn!(line = number + 1, error = %e, "item skipped");
                lines.push(format!("Line {} skipped: {}", number + 1, e));
            }
        }
    }
    repo.store().await.context("Failed to save repository")?;

    info!(items = imported, file = %file.display(), "items imported");
    lines.push(format!("Imported {} items from {}.", imported, file.display()));
    Ok(lines)
}
