//! In-place upgrade of a DSL configuration tree
//!
//! Every rule is a no-op once its old key is gone, so applying the upgrade to
//! its own output leaves the tree untouched.

use tconf_dsl::{get_path_mut, ConfigMap, Value};
use tracing::debug;

use crate::plugins::{expand_sm_plugins, PLUGINS_CONCURRENCY, SM_PLUGINS};
use crate::registry::ProcessorRegistry;
use crate::report::MigrationReport;
use crate::rules::{
    comma_list, decoded, ensure_map_at, identity, put_path, remove_if_exists_and,
    rename_if_exists, string_items, take,
};

/// Flags whose string values are decoded into typed scalars.
const DECODED_RENAMES: &[(&str, &str)] = &[
    ("--cluster-mode", "cluster-mode"),
    ("--client-port-delay-listening", "client-port-delay-listening"),
    ("--shutdown-thread-dump", "shutdown-thread-dump"),
    ("--watchdog_timeout", "watchdog-timeout"),
    ("--watchdog_delay", "watchdog-delay"),
    ("--net-buff-high-throughput", "net-buff-high-throughput"),
    ("--net-buff-standard", "net-buff-standard"),
    ("--cm-ht-traffic-throttling", "cm-ht-traffic-throttling"),
    ("--cm-traffic-throttling", "cm-traffic-throttling"),
    ("--ws-allow-unmasked-frames", "ws-allow-unmasked-frames"),
    ("--vhost-tls-required", "vhost-tls-required"),
    ("--vhost-register-enabled", "vhost-register-enabled"),
    ("--vhost-max-users", "vhost-max-users"),
    ("--vhost-anonymous-enabled", "vhost-anonymous-enabled"),
    ("--vhost-disable-dns-check", "vhost-disable-dns-check"),
    ("--sni-disable", "certificate-container/sni-disable"),
    ("--tls-jdk-nss-bug-workaround-active", "tls-jdk-nss-bug-workaround-active"),
    ("--hardened-mode", "hardened-mode"),
    ("--bosh-close-connection", "bosh-close-connection"),
    ("--cluster-connect-all", "cl-comp/connect-all"),
    ("--cluster-connections-per-node", "cl-comp/connections-per-node"),
];

const PLAIN_RENAMES: &[(&str, &str)] = &[
    ("--amp-security-level", "amp-security-level"),
    ("--watchdog_ping_type", "watchdog-ping-type"),
    ("--installation-id", "installation-id"),
    ("--vhost-message-forward-jid", "vhost-message-forward-jid"),
    ("--vhost-presence-forward-jid", "vhost-presence-forward-jid"),
    ("--ssl-def-cert-domain", "certificate-container/ssl-def-cert-domain"),
    ("--ssl-certs-location", "certificate-container/ssl-certs-location"),
    ("--trusted-certs-dir", "certificate-container/trusted-certs-dir"),
    ("--pem-privatekey-password", "certificate-container/pem-privatekey-password"),
    ("--bosh-extra-headers-file", "bosh-extra-headers-file"),
    ("--client-access-policy-file", "client-access-policy-file"),
    ("--stringprep-processor", "stringprep-processor"),
];

/// Flags holding comma separated lists.
const LIST_RENAMES: &[(&str, &str)] = &[
    ("--debug", "debug"),
    ("--debug-packages", "debug-packages"),
    ("--cluster-nodes", "cluster-nodes"),
    ("--tls-enabled-protocols", "tls-enabled-protocols"),
    ("--tls-enabled-ciphers", "tls-enabled-ciphers"),
    ("--trusted", "trusted"),
    ("--admins", "admins"),
    ("--s2s-skip-tls-hostnames", "s2s/skip-tls-hostnames"),
];

/// Components accepting client connections on a well known port.
const PORT_COMPONENTS: &[(&str, &str)] = &[
    ("5222", "c2s"),
    ("5223", "c2s"),
    ("5277", "c2s"),
    ("5280", "bosh"),
    ("5290", "ws2s"),
    ("5269", "s2s"),
];

const NEW_CONNECTIONS_THROTTLING: &str = "--new-connections-throttling";
const SEE_OTHER_HOST_COMPONENTS: &[&str] = &["c2s", "bosh", "ws2s"];
const CERT_KEY_PREFIXES: &[&str] = &["virtual-hosts-cert-", "virt-hosts-cert-"];
const LOGGING_RESERVED: &[&str] = &["handlers", "loggers", "rootHandlers", "rootLevel"];

/// Fields of an external component item in the order they are joined.
const EXTERNAL_ITEM_FIELDS: &[&[&str]] = &[
    &["password", "secret"],
    &["connection-type"],
    &["port"],
    &["remote-host"],
    &["protocol"],
    &["lb-class"],
];

/// Apply the upgrade rules to a nested tree.
///
/// `changed` in the returned report is set when the tree differs from its
/// input.
pub fn upgrade_dsl(props: &mut ConfigMap, registry: &dyn ProcessorRegistry) -> MigrationReport {
    let before = props.clone();
    let mut report = MigrationReport::default();

    for (old, new) in DECODED_RENAMES {
        rename_if_exists(props, old, new, decoded);
    }
    for (old, new) in PLAIN_RENAMES {
        rename_if_exists(props, old, new, identity);
    }
    for (old, new) in LIST_RENAMES {
        rename_if_exists(props, old, new, comma_list);
    }

    remove_if_exists_and(props, "--virt-hosts", |props, value| {
        let hosts = string_items(&value);
        if let Some(first) = hosts.first() {
            props.insert("default-virtual-host".to_string(), Value::str(first.as_str()));
        }
        props.insert("virtual-hosts".to_string(), Value::str_list(hosts));
    });

    remove_if_exists_and(props, "--cm-see-other-host", |props, value| {
        for component in SEE_OTHER_HOST_COMPONENTS {
            put_path(props, &format!("{}/seeOtherHost/class", component), value.clone());
        }
    });

    rename_if_exists(props, "--test", "logging/rootLevel", |value| {
        Some(Value::str(if value.is_truthy() { "WARNING" } else { "CONFIG" }))
    });

    upgrade_trust_model(props);

    rename_if_exists(
        props,
        "--queue-implementation",
        "priority-queue-implementation",
        |value| {
            Some(match value {
                Value::Str(class) => Value::Str(moved_queue_class(&class)),
                other => other,
            })
        },
    );

    if let Some(value) = take(props, NEW_CONNECTIONS_THROTTLING) {
        upgrade_throttling(props, &value, &mut report);
    }

    rename_if_exists(
        props,
        "--sasl-mechs",
        "sess-man/sasl-provider/allowed-mechanisms",
        comma_list,
    );

    if let Some(plugins) = take(props, SM_PLUGINS) {
        let concurrency = take(props, PLUGINS_CONCURRENCY).map(|c| string_items(&c).join(","));
        let plugins = string_items(&plugins).join(",");
        for (key, value) in
            expand_sm_plugins(&plugins, concurrency.as_deref(), registry, &mut report)
        {
            put_path(props, &key, value);
        }
    }

    upgrade_logging(props);
    upgrade_custom_certificates(props);
    prune_basic_conf(props);
    extract_external_items(props, &mut report);

    report.changed = *props != before;
    debug!(changed = report.changed, "configuration upgrade applied");
    report
}

fn upgrade_trust_model(props: &mut ConfigMap) {
    let mut present = false;
    let mut flag = |props: &mut ConfigMap, name: &str| {
        let mut set = false;
        for key in [format!("--{}", name), name.to_string()] {
            if let Some(value) = props.remove(&key) {
                present = true;
                set |= value.is_truthy();
            }
        }
        set
    };
    let allow_invalid = flag(props, "allow-invalid-certs");
    let allow_self_signed = flag(props, "allow-self-signed-certs");
    if !present {
        return;
    }

    let model = if allow_invalid {
        "all"
    } else if allow_self_signed {
        "selfsigned"
    } else {
        "trusted"
    };
    put_path(props, "certificate-container/ssl-trust-model", Value::str(model));
}

/// Work queues moved from `tigase.util` to `tigase.util.workqueue`.
fn moved_queue_class(class: &str) -> String {
    match class.strip_prefix("tigase.util.") {
        Some(name) if !name.contains('.') => format!("tigase.util.workqueue.{}", name),
        _ => class.to_string(),
    }
}

/// `port:limit` entries become per connection settings of the component
/// listening on the port.
fn upgrade_throttling(props: &mut ConfigMap, value: &Value, report: &mut MigrationReport) {
    for entry in string_items(value) {
        let parsed = entry
            .split_once(':')
            .map(|(port, limit)| (port.trim(), limit.trim()))
            .and_then(|(port, limit)| {
                port.parse::<u16>().ok()?;
                Some((port.to_string(), limit.parse::<i64>().ok()?))
            });
        let Some((port, limit)) = parsed else {
            report.warn(
                NEW_CONNECTIONS_THROTTLING,
                format!("invalid throttling entry '{}'", entry),
            );
            continue;
        };
        let limit = match i32::try_from(limit) {
            Ok(limit) => Value::Int(limit),
            Err(_) => Value::Long(limit),
        };

        let components: Vec<String> = match PORT_COMPONENTS.iter().find(|(p, _)| *p == port) {
            Some((_, component)) => vec![component.to_string()],
            None => components_listening_on(props, &port),
        };
        if components.is_empty() {
            report.warn(
                NEW_CONNECTIONS_THROTTLING,
                format!("no component listens on port {}", port),
            );
            continue;
        }
        for component in components {
            put_path(
                props,
                &format!("{}/connections/{}/new-connections-throttling", component, port),
                limit.clone(),
            );
        }
    }
}

fn components_listening_on(props: &ConfigMap, port: &str) -> Vec<String> {
    props
        .iter()
        .filter(|(_, value)| {
            value
                .as_map()
                .and_then(|component| component.get("connections"))
                .and_then(Value::as_map)
                .is_some_and(|connections| connections.contains_key(port))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

fn upgrade_logging(props: &mut ConfigMap) {
    if let Some(handlers) = take(props, "basic-conf/logging/handlers") {
        let handlers: Vec<String> = match handlers {
            Value::List(_) => string_items(&handlers),
            other => other
                .as_string()
                .unwrap_or_default()
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        };
        ensure_map_at(props, &["logging"])
            .insert("rootHandlers".to_string(), Value::str_list(handlers));
    }

    // `group.key` entries left in the legacy section
    let grouped: Vec<(String, String, Value)> = match get_path_mut(props, "basic-conf/logging")
        .and_then(Value::as_map_mut)
    {
        Some(legacy) => {
            let keys: Vec<String> = legacy
                .keys()
                .filter(|key| key.rsplit_once('.').is_some_and(|(group, _)| !group.is_empty()))
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| {
                    let value = legacy.remove(&key)?;
                    let (group, name) = key.rsplit_once('.')?;
                    Some((group.to_string(), name.to_string(), value))
                })
                .collect()
        }
        None => Vec::new(),
    };
    for (group, name, value) in grouped {
        ensure_map_at(props, &["logging", group.as_str()]).insert(name, value);
    }

    let Some(logging) = props.get_mut("logging").and_then(Value::as_map_mut) else {
        return;
    };
    let names: Vec<String> = logging
        .iter()
        .filter(|(name, value)| !LOGGING_RESERVED.contains(&name.as_str()) && value.is_map_like())
        .map(|(name, _)| name.clone())
        .collect();
    for name in names {
        let target = if name.ends_with("Handler") {
            "handlers"
        } else if logging
            .get(&name)
            .and_then(Value::as_map)
            .is_some_and(|m| m.contains_key("level") || m.contains_key("useParentHandlers"))
        {
            "loggers"
        } else {
            continue;
        };
        let Some(settings) = logging.remove(&name).and_then(|v| v.as_map().cloned()) else {
            continue;
        };
        debug!(name = %name, section = target, "moving logging settings");
        ensure_map_at(logging, &[target, name.as_str()]).extend(settings);
    }
}

fn upgrade_custom_certificates(props: &mut ConfigMap) {
    let Some(basic) = props.get_mut("basic-conf").and_then(Value::as_map_mut) else {
        return;
    };
    let keys: Vec<String> = basic
        .keys()
        .filter(|key| CERT_KEY_PREFIXES.iter().any(|p| key.starts_with(p)))
        .cloned()
        .collect();
    let mut certificates = Vec::new();
    for key in keys {
        let Some(path) = basic.remove(&key) else {
            continue;
        };
        let host = CERT_KEY_PREFIXES
            .iter()
            .find_map(|p| key.strip_prefix(p))
            .unwrap_or(&key)
            .to_string();
        certificates.push((host, path));
    }
    if certificates.is_empty() {
        return;
    }
    ensure_map_at(props, &["certificate-container", "custom-certificates"]).extend(certificates);
}

fn prune_basic_conf(props: &mut ConfigMap) {
    let Some(basic) = props.get_mut("basic-conf").and_then(Value::as_map_mut) else {
        return;
    };
    if basic.get("logging").and_then(Value::as_map).is_some_and(ConfigMap::is_empty) {
        basic.remove("logging");
    }
    if basic.is_empty() {
        props.remove("basic-conf");
    }
}

/// Move `<component>/repository/items` to the report.
fn extract_external_items(props: &mut ConfigMap, report: &mut MigrationReport) {
    for (name, component) in props.iter_mut() {
        let Some(component) = component.as_map_mut() else {
            continue;
        };
        let Some(repository) = component.get_mut("repository").and_then(Value::as_map_mut) else {
            continue;
        };
        let Some(items) = repository.remove("items") else {
            continue;
        };
        let items: Vec<String> = match &items {
            Value::Map(domains) => domains
                .iter()
                .map(|(domain, fields)| external_item(domain, fields))
                .collect(),
            other => string_items(other),
        };
        debug!(component = %name, items = items.len(), "external component items extracted");
        report.external_items.extend(items);

        if repository.is_empty() {
            component.remove("repository");
        }
    }
}

fn external_item(domain: &str, fields: &Value) -> String {
    let mut parts = vec![domain.to_string()];
    for names in EXTERNAL_ITEM_FIELDS {
        let value = fields
            .as_map()
            .and_then(|map| names.iter().find_map(|n| map.get(*n)))
            .and_then(Value::as_string)
            .unwrap_or_default();
        parts.push(value);
    }
    while parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticProcessorRegistry;
    use tconf_dsl::{get_path, read};

    fn upgrade(text: &str) -> (ConfigMap, MigrationReport) {
        let mut props = read(text).unwrap();
        let report = upgrade_dsl(&mut props, &StaticProcessorRegistry::new());
        (props, report)
    }

    #[test]
    fn flags_are_renamed_and_decoded() {
        let (props, report) = upgrade(
            "'--cluster-mode' = 'true'\n'--watchdog_delay' = '1000'\n'--installation-id' = 'abc'\n",
        );
        assert!(report.changed);
        assert_eq!(props.get("cluster-mode"), Some(&Value::Bool(true)));
        assert_eq!(props.get("watchdog-delay"), Some(&Value::Int(1000)));
        assert_eq!(props.get("installation-id"), Some(&Value::str("abc")));
        assert!(!props.contains_key("--cluster-mode"));
    }

    #[test]
    fn virtual_hosts_get_a_default() {
        let (props, _) = upgrade("'--virt-hosts' = 'a.com, b.com'\n");
        assert_eq!(props.get("virtual-hosts"), Some(&Value::str_list(["a.com", "b.com"])));
        assert_eq!(props.get("default-virtual-host"), Some(&Value::str("a.com")));
    }

    #[test]
    fn trust_model() {
        let (props, _) = upgrade("'--allow-self-signed-certs' = 'true'\n");
        assert_eq!(
            get_path(&props, "certificate-container/ssl-trust-model"),
            Some(&Value::str("selfsigned"))
        );

        let (props, _) = upgrade("'allow-invalid-certs' = true\n'--allow-self-signed-certs' = true\n");
        assert_eq!(
            get_path(&props, "certificate-container/ssl-trust-model"),
            Some(&Value::str("all"))
        );

        let (props, _) = upgrade("'--allow-invalid-certs' = false\n");
        assert_eq!(
            get_path(&props, "certificate-container/ssl-trust-model"),
            Some(&Value::str("trusted"))
        );
    }

    #[test]
    fn throttling_fans_out_to_listening_components() {
        let (props, report) = upgrade(
            "'--new-connections-throttling' = '5222:10, 5280:5, 5322:7, 9999:1, broken'\n\
             ext {\n    connections {\n        5322 {}\n    }\n}\n",
        );
        assert_eq!(
            get_path(&props, "c2s/connections/5222/new-connections-throttling"),
            Some(&Value::Int(10))
        );
        assert_eq!(
            get_path(&props, "bosh/connections/5280/new-connections-throttling"),
            Some(&Value::Int(5))
        );
        assert_eq!(
            get_path(&props, "ext/connections/5322/new-connections-throttling"),
            Some(&Value::Int(7))
        );
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn throttling_limit_beyond_int_is_long() {
        let (props, _) = upgrade("'--new-connections-throttling' = '5269:3000000000'\n");
        assert_eq!(
            get_path(&props, "s2s/connections/5269/new-connections-throttling"),
            Some(&Value::Long(3_000_000_000))
        );
    }

    #[test]
    fn see_other_host_fans_out() {
        let (props, _) = upgrade("'--cm-see-other-host' = 'tigase.server.xmppclient.SeeOtherHostHashed'\n");
        for component in ["c2s", "bosh", "ws2s"] {
            let bean = get_path(&props, &format!("{}/seeOtherHost", component))
                .and_then(Value::as_bean)
                .unwrap();
            assert_eq!(
                bean.class.as_deref(),
                Some("tigase.server.xmppclient.SeeOtherHostHashed")
            );
        }
    }

    #[test]
    fn test_flag_sets_root_level() {
        let (props, _) = upgrade("'--test' = true\n");
        assert_eq!(get_path(&props, "logging/rootLevel"), Some(&Value::str("WARNING")));
        let (props, _) = upgrade("'--test' = false\n");
        assert_eq!(get_path(&props, "logging/rootLevel"), Some(&Value::str("CONFIG")));
    }

    #[test]
    fn external_items_from_map_form() {
        let (props, report) = upgrade(
            "ext (class: 'tigase.server.ext.ComponentProtocol') {\n    repository {\n        items {\n            'muc.example.com' {\n                secret = 'pass'\n                'connection-type' = 'listen'\n                port = 5270\n            }\n        }\n    }\n}\n",
        );
        assert_eq!(report.external_items, vec!["muc.example.com:pass:listen:5270"]);
        assert!(get_path(&props, "ext/repository").is_none());
    }

    #[test]
    fn upgrade_is_idempotent() {
        let (mut props, first) = upgrade(
            "'--virt-hosts' = 'a.com'\n'--sasl-mechs' = 'PLAIN,SCRAM-SHA-1'\n\
             '--queue-implementation' = 'tigase.util.PriorityQueueRelaxed'\n\
             basic-conf {\n    logging {\n        handlers = 'java.util.logging.ConsoleHandler'\n    }\n}\n",
        );
        assert!(first.changed);
        assert!(props.get("basic-conf").is_none());
        assert_eq!(
            props.get("priority-queue-implementation"),
            Some(&Value::str("tigase.util.workqueue.PriorityQueueRelaxed"))
        );

        let second = upgrade_dsl(&mut props, &StaticProcessorRegistry::new());
        assert!(!second.changed);
        assert!(second.warnings.is_empty());
    }

    #[test]
    fn queue_class_already_moved_is_kept() {
        assert_eq!(
            moved_queue_class("tigase.util.workqueue.PriorityQueueStrict"),
            "tigase.util.workqueue.PriorityQueueStrict"
        );
        assert_eq!(moved_queue_class("my.Queue"), "my.Queue");
    }
}
