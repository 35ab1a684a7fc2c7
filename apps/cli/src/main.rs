//! tconf - Configuration Tool Entry Point

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tconf_cli::commands::{self, RepoLocation};
use tconf_cli::{logging, Settings};

#[derive(Parser, Debug)]
#[command(name = "tconf", version, about = "Checks, converts and upgrades server configuration")]
struct Cli {
    /// Settings file; `tconf.toml` in the working directory is used when present
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks configuration file and upgrades it if needed
    UpgradeConfig {
        /// Legacy property file or DSL file to check
        #[arg(long)]
        property_file: Option<PathBuf>,
        /// DSL file to check, takes precedence over --property-file
        #[arg(long)]
        config_file: Option<PathBuf>,
    },
    /// Loads configuration as the server does at startup
    Load {
        /// Print the resolved configuration
        #[arg(long)]
        print: bool,
        /// Server arguments such as `--property-file etc/init.properties`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Lists items of a configuration repository
    RepoDump {
        #[command(flatten)]
        repo: RepoArgs,
        /// Only items of this component
        #[arg(long)]
        component: Option<String>,
    },
    /// Adds `comp/node/key[t]=value` lines from a file to a configuration repository
    RepoImport {
        #[command(flatten)]
        repo: RepoArgs,
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RepoArgs {
    /// Database connection string, e.g. `sqlite://etc/config.db`
    #[arg(long)]
    sql: Option<String>,
    /// XML repository file
    #[arg(long)]
    xml: Option<PathBuf>,
}

impl RepoArgs {
    fn location(self) -> anyhow::Result<RepoLocation> {
        match (self.sql, self.xml) {
            (Some(uri), _) => Ok(RepoLocation::Sql(uri)),
            (None, Some(path)) => Ok(RepoLocation::Xml(path)),
            (None, None) => Err(anyhow::anyhow!("Either --sql or --xml is required")),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref()).context("Failed to load settings")?;
    let _logging_guard =
        logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting tconf");

    let lines = match cli.command {
        Command::UpgradeConfig {
            property_file,
            config_file,
        } => {
            let path = config_file
                .or(property_file)
                .unwrap_or_else(|| settings.property_file.clone());
            commands::upgrade_config(&settings, &path)
        }
        Command::Load { print, args } => commands::load(&settings, &args, print)?,
        Command::RepoDump { repo, component } => {
            let repo = commands::open_repository(&repo.location()?).await?;
            commands::repo_dump(repo.as_ref(), component.as_deref()).await
        }
        Command::RepoImport { repo, file } => {
            let repo = commands::open_repository(&repo.location()?).await?;
            commands::repo_import(repo.as_ref(), &file).await?
        }
    };

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
