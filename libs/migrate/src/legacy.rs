//! Conversion of legacy property settings
//!
//! Works on the flat map produced by the property loader, where keys are
//! `/`-joined paths. New entries are collected next to the map and merged
//! at the end so every rule sees the original settings.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tconf_dsl::{ConfigMap, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::plugins::{expand_sm_plugins, PLUGINS_CONCURRENCY, SM_PLUGINS};
use crate::registry::ProcessorRegistry;
use crate::report::MigrationReport;
use crate::rules::string_items;

pub const COMPONENT_PROTOCOL_CLASS: &str = "tigase.server.ext.ComponentProtocol";
const HTTP_MESSAGE_RECEIVER_CLASS: &str = "tigase.http.HttpMessageReceiver";

const AUTH_DOMAIN_POOL_CLASS: &str = "--auth-domain-repo-pool";
const USER_DOMAIN_POOL_CLASS: &str = "--user-domain-repo-pool";
const DATA_REPO_POOL_SIZE: &str = "--data-repo-pool-size";
const AUTH_REPO_POOL_SIZE: &str = "--auth-repo-pool-size";
const EXTCOMP_BIND_HOSTNAMES: &str = "--bind-ext-hostnames";
const SM_THREADS_POOL: &str = "--sm-threads-pool";
const DEFAULT_HTTP_PORT: i64 = 8080;

const COUNTER_DATA_LOGGERS: &[&str] = &[
    "tigase.mongo.stats.CounterDataLoggerMongo",
    "tigase.stats.CounterDataLogger",
];

/// Repository types that work with the default data source repository.
const JDBC_USER_TYPES: &[&str] = &["mysql", "pgsql", "derby", "sqlserver"];

/// Class of a repository given by its short name.
pub fn repo_class(name: &str) -> String {
    match name {
        "mysql" | "pgsql" | "derby" | "sqlserver" => "tigase.db.jdbc.JDBCRepository",
        "tigase-custom-auth" | "tigase-custom" | "custom-auth" => "tigase.db.jdbc.TigaseCustomAuth",
        "tigase-auth" => "tigase.db.jdbc.TigaseAuth",
        "drupal" | "wp" => "tigase.db.jdbc.DrupalWPAuth",
        "libresource" => "tigase.db.jdbc.LibreSourceAuth",
        other => other,
    }
    .to_string()
}

fn config_type(legacy: &str) -> Option<&'static str> {
    match legacy {
        "--gen-config-all" | "--gen-config-def" | "--gen-config-default" => Some("default"),
        "--gen-config-sm" => Some("session-manager"),
        "--gen-config-cs" => Some("connection-managers"),
        "--gen-config-comp" => Some("component"),
        _ => None,
    }
}

fn commands_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^/]+)/command/(.+)$").expect("command regex must compile"))
}

fn processors_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^/]+)/processors/(.+)$").expect("processors regex must compile")
    })
}

/// Repository settings of one domain.
#[derive(Debug, Default)]
struct DataSourceConfig {
    user_uri: Option<String>,
    user_type: Option<String>,
    auth_uri: Option<String>,
    auth_type: Option<String>,
    amp_uri: Option<String>,
    amp_type: Option<String>,
    user_params: BTreeMap<String, String>,
    auth_params: BTreeMap<String, String>,
}

/// Entries collected while walking the legacy settings.
#[derive(Default)]
struct Pending {
    add: ConfigMap,
    remove: Vec<String>,
    data_sources: BTreeMap<String, DataSourceConfig>,
}

impl Pending {
    fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.add.insert(key.into(), value.into());
    }

    fn data_source(&mut self, domain: &str) -> &mut DataSourceConfig {
        self.data_sources.entry(domain.to_string()).or_default()
    }
}

/// Restructure legacy settings into the current key layout.
///
/// Fails without touching `props` when a setting requires manual changes.
pub fn convert_from_old_format(
    props: &mut ConfigMap,
    registry: &dyn ProcessorRegistry,
) -> Result<MigrationReport> {
    for key in [AUTH_DOMAIN_POOL_CLASS, USER_DOMAIN_POOL_CLASS] {
        if props.contains_key(key) {
            return Err(Error::Config(format!(
                "Cannot convert property {}!\nPlease check if provided class is compatible with \
                 Tigase XMPP Server data sources. If so, then please remove this property, convert \
                 the configuration file and then manually modify configuration.",
                key
            )));
        }
    }

    let max_queue_size = max_queue_size(props)?;

    let mut report = MigrationReport::default();
    let def_data_pool_size = props.remove(DATA_REPO_POOL_SIZE);
    let def_auth_repo_pool = props.remove(AUTH_REPO_POOL_SIZE);

    let mut pending = Pending::default();
    let source: &ConfigMap = props;
    for (key, value) in source {
        convert_entry(source, key, value, &mut pending, &mut report);
    }

    let Pending {
        add,
        remove,
        data_sources,
    } = pending;

    for (domain, ds) in &data_sources {
        convert_data_source(
            props,
            domain,
            ds,
            def_data_pool_size.as_ref(),
            def_auth_repo_pool.as_ref(),
        );
    }

    convert_globals(props, &add, max_queue_size, &mut report);

    props.retain(|key, _| !key.starts_with("--comp-"));
    for key in &remove {
        props.remove(key);
    }
    props.extend(add);

    let config_type = props.get("config-type").and_then(Value::as_str);
    if !matches!(config_type, Some("connection-managers") | Some("component")) {
        props.insert("sess-man/active".to_string(), Value::str("true"));
    }

    if let Some(plugins) = props.remove(SM_PLUGINS) {
        let concurrency = props.remove(PLUGINS_CONCURRENCY);
        let plugins = string_items(&plugins).join(",");
        let concurrency = concurrency.map(|c| string_items(&c).join(","));
        for (key, value) in
            expand_sm_plugins(&plugins, concurrency.as_deref(), registry, &mut report)
        {
            props.insert(key, value);
        }
    }

    debug!(
        entries = props.len(),
        warnings = report.warnings.len(),
        "legacy settings converted"
    );
    Ok(report)
}

fn convert_entry(
    props: &ConfigMap,
    key: &str,
    value: &Value,
    pending: &mut Pending,
    report: &mut MigrationReport,
) {
    if key == "config-type" {
        if let Some(mapped) = value.as_str().and_then(config_type) {
            pending.add(key, mapped);
        }
    }

    if let Some(suffix) = key.strip_prefix("--comp-name-") {
        convert_component(props, key, suffix, value, pending, report);
    }

    if key.starts_with("--user-db") || key.starts_with("--auth-db") || key.starts_with("--amp-repo") {
        let domain = match (key.find('['), key.strip_suffix(']')) {
            (Some(open), Some(trimmed)) => &trimmed[open + 1..],
            _ => "default",
        };
        pending.remove.push(key.to_string());

        let setting = value.as_string();
        let ds = pending.data_source(domain);
        if key.starts_with("--user-db-uri") {
            ds.user_uri = setting;
        } else if key.starts_with("--user-db") {
            ds.user_type = setting;
        } else if key.starts_with("--auth-db-uri") {
            ds.auth_uri = setting;
        } else if key.starts_with("--auth-db") {
            ds.auth_type = setting;
        } else if key.starts_with("--amp-repo-uri") {
            ds.amp_uri = setting;
        } else if key.starts_with("--amp-repo-class") {
            ds.amp_type = setting;
        }
    }

    if key == "--sm-cluster-strategy-class" {
        pending.add("sess-man/strategy/class", value.as_string().unwrap_or_default());
        pending.add("sess-man/strategy/active", "true");
        pending.remove.push(key.to_string());
    }

    if key.contains("pubsub-repo-url") {
        pending.add("dataSource/pubsub/uri", value.clone());
        pending.add("dataSource/pubsub/active", "true");
        pending.add("pubsub/dao/default/data-source", "pubsub");
        pending.remove.push(key.to_string());
    }

    if key.starts_with("sess-man/plugins-conf/") {
        convert_plugin_setting(key, value, pending);
        pending.remove.push(key.to_string());
    }

    if let Some(rest) = key.strip_prefix("stats/stats-archiv/") {
        pending.add(format!("stats/{}", rest), value.clone());
        pending.remove.push(key.to_string());
    }

    if key.contains("/command/") {
        if let Some(caps) = commands_re().captures(key) {
            let cmd_id = caps[2].replace("\\:", ":");
            let mut acls: Vec<String> = string_items(value)
                .into_iter()
                .map(|acl| match acl.find(':') {
                    Some(idx) if idx > 0 => acl[idx + 1..].to_string(),
                    _ => acl,
                })
                .collect();
            let acl = if acls.len() == 1 {
                Value::Str(acls.remove(0))
            } else {
                Value::str_list(acls)
            };
            // command ids contain '/', so they live in a nested map
            pending
                .add
                .entry(format!("{}/commands", &caps[1]))
                .or_insert_with(|| Value::Map(ConfigMap::new()))
                .ensure_map()
                .insert(cmd_id, acl);
            pending.remove.push(key.to_string());
        }
    }

    if key == SM_THREADS_POOL {
        pending.add("sess-man/sm-threads-pool", value.clone());
        pending.remove.push(key.to_string());
    }

    if let Some(component) = key.strip_suffix("/processors") {
        for processor in string_items(value) {
            pending.add(format!("{}/{}/active", component, processor), true);
        }
        pending.remove.push(key.to_string());
    }

    if key.contains("/processors/") {
        if let Some(caps) = processors_re().captures(key) {
            let setting = caps[2].replace("\\:", ":");
            match setting.split_once('/') {
                Some((processor, name)) => {
                    pending.add(format!("{}/{}/{}", &caps[1], processor, name), value.clone())
                }
                None => report.warn(key, "processor setting without a name"),
            }
        }
        pending.remove.push(key.to_string());
    }

    if let Some(rest) = key.strip_prefix("basic-conf/logging/") {
        if let Some((group, name)) = rest.rsplit_once('.') {
            if !group.is_empty() {
                let target = if group.ends_with("Handler") {
                    format!("logging/handlers/{}/{}", group, name)
                } else {
                    format!("logging/{}/{}", group, name)
                };
                pending.add(target, value.clone());
                pending.remove.push(key.to_string());
            }
        }
    }

    for (prefix, user) in [
        ("basic-conf/user-repo-params/", true),
        ("basic-conf/auth-repo-params/", false),
    ] {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        let (domain, param) = rest.split_once('/').unwrap_or(("default", rest));
        let setting = value.as_string().unwrap_or_default();
        let ds = pending.data_source(domain);
        let params = if user {
            &mut ds.user_params
        } else {
            &mut ds.auth_params
        };
        params.insert(param.to_string(), setting);
        pending.remove.push(key.to_string());
    }
}

fn convert_component(
    props: &ConfigMap,
    key: &str,
    suffix: &str,
    value: &Value,
    pending: &mut Pending,
    report: &mut MigrationReport,
) {
    let name = value.as_string().unwrap_or_default().trim().to_string();
    let class = props
        .get(&format!("--comp-class-{}", suffix))
        .and_then(Value::as_string);
    let Some(class) = class.filter(|_| !name.is_empty()) else {
        report.warn(key, format!("incomplete definition of component '{}'", name));
        return;
    };
    let class = class.trim();

    pending.add(format!("{}/class", name), class);
    pending.add(format!("{}/active", name), "true");

    if class == HTTP_MESSAGE_RECEIVER_CLASS {
        convert_http_settings(props, &name, pending, report);
    }
}

fn convert_http_settings(
    props: &ConfigMap,
    name: &str,
    pending: &mut Pending,
    report: &mut MigrationReport,
) {
    let prefix = format!("{}/http/", name);
    for (key, value) in props.iter().filter(|(k, _)| k.starts_with(&prefix)) {
        let setting = &key[prefix.len()..];
        pending.remove.push(key.clone());

        if setting == "server-class" {
            pending.add("httpServer/class", value.clone());
        } else if setting == "ports" {
            let mut ports: Vec<i64> = Vec::new();
            for port in string_items(value) {
                match port.parse::<i64>() {
                    Ok(port) => ports.push(port),
                    Err(_) => report.warn(key.as_str(), format!("invalid port '{}'", port)),
                }
            }
            if !ports.contains(&DEFAULT_HTTP_PORT) {
                ports.push(DEFAULT_HTTP_PORT);
            }
            for port in ports {
                pending.add(format!("httpServer/connections/{}/active", port), true);
            }
        } else if setting.ends_with("/socket") || setting.ends_with("/domain") {
            if let Some((port, name)) = setting.split_once('/') {
                pending.add(format!("httpServer/connections/{}/{}", port, name), value.clone());
            }
        } else {
            pending.add(format!("httpServer/{}", setting), value.clone());
        }
    }
}

fn convert_plugin_setting(key: &str, value: &Value, pending: &mut Pending) {
    if key == "sess-man/plugins-conf/dynamic-roster-classes" {
        pending.add("sess-man/dynamic-rosters/active", "true");
        for class in string_items(value) {
            let short = class.rsplit('.').next().unwrap_or(&class).to_string();
            pending.add(format!("sess-man/dynamic-rosters/{}/active", short), "true");
            pending.add(format!("sess-man/dynamic-rosters/{}/class", short), class);
        }
        return;
    }

    let key = key.replacen("/plugins-conf/", "/", 1);
    if let Some(base) = key.strip_suffix("/amp/msg-offline") {
        pending.add(format!("{}/amp/msgoffline/active", base), value.clone());
    } else if let Some(base) = key.strip_suffix("/presence-state/disable-roster-lazy-loading") {
        pending.add(
            format!("{}/presence-state/enable-roster-lazy-loading", base),
            !value.is_truthy(),
        );
    } else if key.ends_with("/presence-state/extended-presence-processors") {
        for class in string_items(value) {
            let short = class.rsplit('.').next().unwrap_or(&class).to_string();
            pending.add(format!("{}/{}/class", key, short), class.as_str());
            pending.add(format!("{}/{}/active", key, short), true);
        }
    } else {
        pending.add(key, value.clone());
    }
}

fn convert_data_source(
    props: &mut ConfigMap,
    domain: &str,
    ds: &DataSourceConfig,
    def_data_pool_size: Option<&Value>,
    def_auth_repo_pool: Option<&Value>,
) {
    let source_prefix = format!("dataSource/{}/", domain);
    let auth_prefix = format!("authRepository/{}/", domain);
    let user_prefix = format!("userRepository/{}/", domain);
    let mut put = |key: String, value: Value| {
        props.insert(key, value);
    };

    if let Some(user_uri) = &ds.user_uri {
        put(format!("{}uri", source_prefix), Value::str(user_uri.as_str()));
        put(format!("{}active", source_prefix), Value::str("true"));
        if let Some(size) = def_data_pool_size {
            put(format!("{}pool-size", source_prefix), size.clone());
        }
        put(format!("{}active", user_prefix), Value::str("true"));
        put(format!("{}active", auth_prefix), Value::str("true"));
    }

    if let Some(auth_uri) = &ds.auth_uri {
        let shared = ds
            .user_uri
            .as_deref()
            .is_some_and(|user_uri| user_uri.contains(auth_uri.as_str()));
        if !shared {
            let source = format!("dataSource/{}-auth/", domain);
            put(format!("{}uri", source), Value::str(auth_uri.as_str()));
            put(format!("{}active", source), Value::str("true"));
            if let Some(size) = def_data_pool_size {
                put(format!("{}pool-size", source), size.clone());
            }
            put(format!("{}data-source", auth_prefix), Value::str(format!("{}-auth", domain)));
            put(format!("{}active", auth_prefix), Value::str("true"));
        }
    }

    if let Some(amp_uri) = &ds.amp_uri {
        if ds.user_uri.as_deref() != Some(amp_uri.as_str()) {
            let source = format!("dataSource/{}-amp/", domain);
            put(format!("{}uri", source), Value::str(amp_uri.as_str()));
            put(format!("{}active", source), Value::str("true"));
            put(
                format!("msgRepository/{}/data-source", domain),
                Value::str(format!("{}-amp", domain)),
            );
            put(format!("msgRepository/{}/active", domain), Value::str("true"));
        }
    }

    if let Some(user_type) = &ds.user_type {
        if !JDBC_USER_TYPES.contains(&user_type.as_str()) {
            put(format!("{}cls", user_prefix), Value::str(repo_class(user_type)));
        }
    }
    if let Some(auth_type) = &ds.auth_type {
        if auth_type != "tigase-custom-auth" {
            put(format!("{}cls", auth_prefix), Value::str(repo_class(auth_type)));
        }
    }
    if let Some(amp_type) = &ds.amp_type {
        put(format!("msgRepository/{}/cls", domain), Value::str(amp_type.as_str()));
    }

    for (params, prefix, kind) in [
        (&ds.auth_params, &auth_prefix, "auth"),
        (&ds.user_params, &user_prefix, "user"),
    ] {
        for (name, value) in params {
            let target = if *name == format!("{}-repo-class", kind) {
                "cls"
            } else if *name == format!("{}-repo-pool", kind) {
                "pool-class"
            } else if *name == format!("{}-repo-pool-size", kind) {
                "pool-size"
            } else {
                name.as_str()
            };
            put(format!("{}{}", prefix, target), Value::str(value.as_str()));
        }
    }

    if let Some(size) = def_auth_repo_pool {
        props
            .entry(format!("{}pool-size", auth_prefix))
            .or_insert_with(|| size.clone());
    }
}

fn max_queue_size(props: &ConfigMap) -> Result<Option<i32>> {
    let Some(value) = props.get("--max-queue-size") else {
        return Ok(None);
    };
    let text = value.as_string().unwrap_or_default();
    text.trim()
        .parse::<i32>()
        .map(Some)
        .map_err(|_| Error::Conversion(format!("--max-queue-size: invalid number '{}'", text)))
}

/// Flags with a single global meaning.
fn convert_globals(
    props: &mut ConfigMap,
    added: &ConfigMap,
    max_queue_size: Option<i32>,
    report: &mut MigrationReport,
) {
    if let Some(external) = props.remove("--external") {
        let has_ext_component = added.iter().any(|(key, value)| {
            key.ends_with("/class") && value.as_str() == Some(COMPONENT_PROTOCOL_CLASS)
        });
        if has_ext_component {
            report.external_items.extend(string_items(&external));
        }
        if let Some(hosts) = props.remove(EXTCOMP_BIND_HOSTNAMES) {
            props.insert("bind-ext-hostnames".to_string(), Value::str_list(string_items(&hosts)));
        }
    } else {
        props.remove(EXTCOMP_BIND_HOSTNAMES);
    }

    for (flag, key) in [("--admins", "admins"), ("--trusted", "trusted")] {
        if let Some(value) = props.remove(flag) {
            props.insert(key.to_string(), Value::str_list(string_items(&value)));
        }
    }

    props.remove("--max-queue-size");
    if let Some(size) = max_queue_size {
        props.insert("max-queue-size".to_string(), Value::Int(size));
    }

    if let Some(monitoring) = props.remove("--monitoring") {
        props.insert("monitoring/active".to_string(), Value::str("true"));
        for entry in string_items(&monitoring) {
            match entry.split(':').collect::<Vec<_>>().as_slice() {
                [name, port] => {
                    props.insert(format!("monitoring/{}/active", name), Value::str("true"));
                    props.insert(format!("monitoring/{}/port", name), Value::str(*port));
                }
                _ => report.warn("--monitoring", format!("invalid monitor definition '{}'", entry)),
            }
        }
    }

    if let Some(archivers) = props.remove("--stats-archiv") {
        for archiver in string_items(&archivers) {
            let parts: Vec<&str> = archiver.split(':').collect();
            let [class, name, rest @ ..] = parts.as_slice() else {
                report.warn("--stats-archiv", format!("invalid archiver definition '{}'", archiver));
                continue;
            };
            let prefix = format!("stats/{}", name);
            props.insert(format!("{}/class", prefix), Value::str(*class));
            props.insert(format!("{}/active", prefix), Value::str("true"));
            if let Some(frequency) = rest.first() {
                props.insert(format!("{}/frequency", prefix), Value::str(*frequency));
            }
            if COUNTER_DATA_LOGGERS.contains(class) {
                if let Some(uri) = props.get("dataSource/default/uri").cloned() {
                    props.entry(format!("{}/db-url", prefix)).or_insert(uri);
                }
            }
        }
    }

    if let Some(history) = props.remove("--stats-history") {
        let history = history.as_string().unwrap_or_default();
        let mut parts = history.split(',').map(str::trim);
        if let Some(size) = parts.next() {
            props
                .entry("stats/stats-history-size".to_string())
                .or_insert_with(|| Value::str(size));
        }
        if let Some(interval) = parts.next() {
            props
                .entry("stats/stats-update-interval".to_string())
                .or_insert_with(|| Value::str(interval));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::load_from_property_strings;
    use crate::registry::StaticProcessorRegistry;

    fn convert(settings: &[&str]) -> (ConfigMap, MigrationReport) {
        let mut props = ConfigMap::new();
        let settings: Vec<String> = settings.iter().map(|s| s.to_string()).collect();
        load_from_property_strings(&mut props, &settings).unwrap();
        let report = convert_from_old_format(&mut props, &StaticProcessorRegistry::new()).unwrap();
        (props, report)
    }

    #[test]
    fn domain_pool_class_is_rejected() {
        let mut props = ConfigMap::new();
        props.insert(AUTH_DOMAIN_POOL_CLASS.into(), Value::str("x.Pool"));
        props.insert("--admins".into(), Value::str("a@b.c"));
        let before = props.clone();

        let err = convert_from_old_format(&mut props, &StaticProcessorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.starts_with("Cannot convert property --auth-domain-repo-pool!")));
        assert_eq!(props, before);
    }

    #[test]
    fn config_type_mapping() {
        let (props, _) = convert(&["config-type=--gen-config-cs"]);
        assert_eq!(props.get("config-type"), Some(&Value::str("connection-managers")));
        assert!(!props.contains_key("sess-man/active"));

        let (props, _) = convert(&["config-type=--gen-config-def"]);
        assert_eq!(props.get("config-type"), Some(&Value::str("default")));
        assert_eq!(props.get("sess-man/active"), Some(&Value::str("true")));
    }

    #[test]
    fn components_and_http_server() {
        let (props, report) = convert(&[
            "--comp-name-1=http",
            "--comp-class-1=tigase.http.HttpMessageReceiver",
            "http/http/ports[i]=8081,8082",
            "http/http/8081/socket=ssl",
            "http/http/server-class=tigase.http.jetty.JettyStandaloneHttpServer",
            "http/http/threads=10",
            "--comp-name-2=muc",
        ]);

        assert_eq!(props.get("http/class"), Some(&Value::str("tigase.http.HttpMessageReceiver")));
        assert_eq!(props.get("http/active"), Some(&Value::str("true")));
        for port in ["8081", "8082", "8080"] {
            assert_eq!(
                props.get(&format!("httpServer/connections/{}/active", port)),
                Some(&Value::Bool(true))
            );
        }
        assert_eq!(
            props.get("httpServer/connections/8081/socket"),
            Some(&Value::str("ssl"))
        );
        assert_eq!(
            props.get("httpServer/class"),
            Some(&Value::str("tigase.http.jetty.JettyStandaloneHttpServer"))
        );
        assert_eq!(props.get("httpServer/threads"), Some(&Value::str("10")));
        assert!(props.keys().all(|k| !k.starts_with("--comp-") && !k.starts_with("http/http/")));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn data_sources_per_domain() {
        let (props, _) = convert(&[
            "--user-db=mysql",
            "--user-db-uri=jdbc:mysql://localhost/tigase",
            "--auth-db[domain4.com]=tigase-custom",
            "--auth-db-uri[domain4.com]=jdbc:mysql://db14.domain4.com/auth",
            "--user-db[domain4.com]=mysql",
            "--user-db-uri[domain4.com]=jdbc:mysql://db14.domain4.com/users",
            "basic-conf/auth-repo-params/domain4.com/user-login-query={ call UserLogin(?, ?) }",
            "basic-conf/auth-repo-params/auth-repo-pool-size=20",
            "--amp-repo-uri=jdbc:mysql://localhost/amp",
            "--data-repo-pool-size=12",
        ]);

        let get = |k: &str| props.get(k).cloned();
        assert_eq!(get("dataSource/default/uri"), Some(Value::str("jdbc:mysql://localhost/tigase")));
        assert_eq!(get("dataSource/default/pool-size"), Some(Value::str("12")));
        assert_eq!(get("userRepository/default/active"), Some(Value::str("true")));
        assert_eq!(get("authRepository/default/pool-size"), Some(Value::str("20")));
        assert_eq!(get("userRepository/default/cls"), None);

        assert_eq!(get("dataSource/domain4.com-auth/uri"), Some(Value::str("jdbc:mysql://db14.domain4.com/auth")));
        assert_eq!(get("authRepository/domain4.com/data-source"), Some(Value::str("domain4.com-auth")));
        assert_eq!(get("authRepository/domain4.com/cls"), Some(Value::str("tigase.db.jdbc.TigaseCustomAuth")));
        assert_eq!(
            get("authRepository/domain4.com/user-login-query"),
            Some(Value::str("{ call UserLogin(?, ?) }"))
        );

        assert_eq!(get("dataSource/default-amp/uri"), Some(Value::str("jdbc:mysql://localhost/amp")));
        assert_eq!(get("msgRepository/default/data-source"), Some(Value::str("default-amp")));

        assert!(props.keys().all(|k| !k.starts_with("--user-db") && !k.starts_with("basic-conf/")));
    }

    #[test]
    fn command_acls() {
        let (props, _) = convert(&[
            "sess-man/command/http://jabber.org/protocol/admin#add-user=LOCAL",
            "sess-man/command/http://jabber.org/protocol/admin#get-active-users-num=LOCAL, DOMAIN:test.com",
        ]);
        let commands = props.get("sess-man/commands").and_then(Value::as_map).unwrap();
        assert_eq!(
            commands.get("http://jabber.org/protocol/admin#add-user"),
            Some(&Value::str("LOCAL"))
        );
        assert_eq!(
            commands.get("http://jabber.org/protocol/admin#get-active-users-num"),
            Some(&Value::str_list(["LOCAL", "test.com"]))
        );
    }

    #[test]
    fn plugin_settings() {
        let (props, _) = convert(&[
            "sess-man/plugins-conf/amp/msg-offline=false",
            "sess-man/plugins-conf/presence-state/disable-roster-lazy-loading=true",
            "sess-man/plugins-conf/presence-state/extended-presence-processors=tigase.ext.Geo",
            "sess-man/plugins-conf/jabber:iq:auth/x=y",
            "stats/stats-archiv/frequency=60",
        ]);
        let get = |k: &str| props.get(k).cloned();
        assert_eq!(get("sess-man/amp/msgoffline/active"), Some(Value::str("false")));
        assert_eq!(
            get("sess-man/presence-state/enable-roster-lazy-loading"),
            Some(Value::Bool(false))
        );
        assert_eq!(
            get("sess-man/presence-state/extended-presence-processors/Geo/class"),
            Some(Value::str("tigase.ext.Geo"))
        );
        assert_eq!(get("sess-man/jabber:iq:auth/x"), Some(Value::str("y")));
        assert_eq!(get("stats/frequency"), Some(Value::str("60")));
    }

    #[test]
    fn processors_and_logging() {
        let (props, _) = convert(&[
            "message-router/processors[s]=a, b",
            "message-router/processors/a/limit=3",
            "basic-conf/logging/java.util.logging.FileHandler.pattern=/tmp/x.log",
            "basic-conf/logging/tigase.server.level=FINE",
            "basic-conf/logging/handlers=java.util.logging.FileHandler",
        ]);
        let get = |k: &str| props.get(k).cloned();
        assert_eq!(get("message-router/a/active"), Some(Value::Bool(true)));
        assert_eq!(get("message-router/b/active"), Some(Value::Bool(true)));
        assert_eq!(get("message-router/a/limit"), Some(Value::str("3")));
        assert_eq!(
            get("logging/handlers/java.util.logging.FileHandler/pattern"),
            Some(Value::str("/tmp/x.log"))
        );
        assert_eq!(get("logging/tigase.server/level"), Some(Value::str("FINE")));
        assert_eq!(
            get("basic-conf/logging/handlers"),
            Some(Value::str("java.util.logging.FileHandler"))
        );
    }

    #[test]
    fn global_flags() {
        let (props, report) = convert(&[
            "--monitoring=jmx:9050, http:9080, broken",
            "--stats-archiv=tigase.stats.CounterDataLogger:db-logger:60",
            "--stats-history=100,10",
            "--trusted=a@x, b@x",
            "--user-db-uri=jdbc:derby:tigasedb",
        ]);
        let get = |k: &str| props.get(k).cloned();
        assert_eq!(get("monitoring/active"), Some(Value::str("true")));
        assert_eq!(get("monitoring/jmx/port"), Some(Value::str("9050")));
        assert_eq!(get("monitoring/http/active"), Some(Value::str("true")));
        assert_eq!(get("stats/db-logger/class"), Some(Value::str("tigase.stats.CounterDataLogger")));
        assert_eq!(get("stats/db-logger/frequency"), Some(Value::str("60")));
        assert_eq!(get("stats/db-logger/db-url"), Some(Value::str("jdbc:derby:tigasedb")));
        assert_eq!(get("stats/stats-history-size"), Some(Value::str("100")));
        assert_eq!(get("stats/stats-update-interval"), Some(Value::str("10")));
        assert_eq!(get("trusted"), Some(Value::str_list(["a@x", "b@x"])));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn invalid_queue_size_fails() {
        let mut props = ConfigMap::new();
        props.insert("--max-queue-size".into(), Value::str("lots"));
        props.insert("--admins".into(), Value::str("admin@x.com"));
        props.insert("--data-repo-pool-size".into(), Value::str("10"));
        let before = props.clone();

        let err = convert_from_old_format(&mut props, &StaticProcessorRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
        assert_eq!(props, before);
    }

    #[test]
    fn repository_short_names() {
        assert_eq!(repo_class("pgsql"), "tigase.db.jdbc.JDBCRepository");
        assert_eq!(repo_class("tigase-auth"), "tigase.db.jdbc.TigaseAuth");
        assert_eq!(repo_class("my.own.Repo"), "my.own.Repo");
    }
}
