use std::fs;
use std::path::Path;

use tconf_cli::commands::{self, RepoLocation};
use tconf_cli::Settings;
use tconf_dsl::{read_file, Value};

fn settings_in(dir: &Path) -> Settings {
    Settings {
        property_file: dir.join("init.properties"),
        config_file: dir.join("config.tdsl"),
        items_file: dir.join("externalComponentItems"),
        ..Settings::default()
    }
}

#[test]
fn upgrade_config_reports_state() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());

    let missing = dir.path().join("missing.tdsl");
    assert_eq!(
        commands::upgrade_config(&settings, &missing),
        vec![format!("Configuration file {} does not exist.", missing.display())]
    );

    let outdated = dir.path().join("config.tdsl");
    fs::write(&outdated, "'--cluster-mode' = 'true'\n").unwrap();
    let lines = commands::upgrade_config(&settings, &outdated);
    assert!(lines[0].ends_with("was updated to match current configuration format."));
    assert_eq!(read_file(&outdated).unwrap().get("cluster-mode"), Some(&Value::Bool(true)));

    let lines = commands::upgrade_config(&settings, &outdated);
    assert_eq!(
        lines,
        vec![format!("Configuration file {} is in DSL format and is valid.", outdated.display())]
    );
}

#[test]
fn upgrade_config_shows_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    let broken = dir.path().join("broken.tdsl");
    fs::write(&broken, "c2s {\n  x = 1\n").unwrap();

    let lines = commands::upgrade_config(&settings, &broken);
    assert_eq!(lines[0], format!("ERROR! Error in configuration file: {}", broken.display()));
}

#[test]
fn load_converts_and_prints() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_in(dir.path());
    settings
        .properties
        .insert("domain".to_string(), "example.com".to_string());
    fs::write(
        &settings.property_file,
        "--cluster-mode=true\n--admins=admin@x.com,admin2@x.com\n",
    )
    .unwrap();

    let lines = commands::load(&settings, &[], true).unwrap();
    assert!(lines[0].starts_with("Configuration files "));
    assert!(lines.iter().any(|line| line.contains("'cluster-mode' = true")));

    let tree = read_file(&settings.config_file).unwrap();
    assert_eq!(
        tree.get("admins"),
        Some(&Value::str_list(["admin@x.com", "admin2@x.com"]))
    );
    assert!(dir.path().join("init.properties.old").exists());

    // Second run finds the converted file and has nothing to report.
    let lines = commands::load(&settings, &[], false).unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn repository_import_and_dump() {
    let dir = tempfile::tempdir().unwrap();
    let items = dir.path().join("items.txt");
    fs::write(
        &items,
        "# exported items\nc2s/connections/ports[i]=5222,5223\nsess-man/max-queue[I]=100\n\nbroken\n",
    )
    .unwrap();
    let location = RepoLocation::Xml(dir.path().join("repo.xml"));

    let repo = commands::open_repository(&location).await.unwrap();
    let lines = commands::repo_import(repo.as_ref(), &items).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Line 5 skipped"));
    assert!(lines[1].starts_with("Imported 2 items"));

    let reopened = commands::open_repository(&location).await.unwrap();
    assert_eq!(
        commands::repo_dump(reopened.as_ref(), None).await,
        vec![
            "c2s/connections/ports[i]=5222,5223".to_string(),
            "sess-man/max-queue[I]=100".to_string(),
        ]
    );
    assert_eq!(
        commands::repo_dump(reopened.as_ref(), Some("sess-man")).await,
        vec!["sess-man/max-queue[I]=100".to_string()]
    );
}
