//! Expansion of the session manager processor list
//!
//! `--sm-plugins=+jabber:iq:roster=4:1000,-presence,msgoffline` enables or
//! disables each processor and sets its worker threads and queue size.

use std::collections::BTreeMap;

use tconf_dsl::Value;

use crate::registry::ProcessorRegistry;
use crate::report::MigrationReport;
use crate::rules::split_list;

pub const SM_PLUGINS: &str = "--sm-plugins";
pub const PLUGINS_CONCURRENCY: &str = "sess-man/plugins-concurrency";

/// Flat `sess-man/<id>/...` entries for a processor list and an optional
/// `id=threads:queue` concurrency list.
pub(crate) fn expand_sm_plugins(
    plugins: &str,
    concurrency: Option<&str>,
    registry: &dyn ProcessorRegistry,
    report: &mut MigrationReport,
) -> Vec<(String, Value)> {
    let mut entries = Vec::new();
    let mut plugins_concurrency: BTreeMap<String, String> = BTreeMap::new();

    for part in split_list(plugins) {
        let (spec, threads) = match part.split_once('=') {
            Some((spec, threads)) => (spec, Some(threads)),
            None => (part.as_str(), None),
        };
        let name = spec.strip_prefix(['+', '-']).unwrap_or(spec);
        let active = !spec.starts_with('-');

        entries.push((
            format!("sess-man/{}/active", name),
            Value::str(if active { "true" } else { "false" }),
        ));
        if let Some(threads) = threads {
            plugins_concurrency.insert(name.to_string(), threads.to_string());
        }

        match registry.find(name) {
            Some(processor) if !processor.bean => {
                entries.push((
                    format!("sess-man/{}/class", name),
                    Value::str(processor.class.as_str()),
                ));
            }
            Some(_) => {}
            None => report.warn(SM_PLUGINS, format!("could not find class for processor {}", name)),
        }
    }

    for part in concurrency.map(split_list).unwrap_or_default() {
        match part.split_once('=') {
            Some((name, threads)) => {
                plugins_concurrency.insert(name.to_string(), threads.to_string());
            }
            None => report.warn(
                PLUGINS_CONCURRENCY,
                format!("Plugin concurrency entry without settings: {}", part),
            ),
        }
    }

    for (name, spec) in plugins_concurrency {
        let prefix = format!("sess-man/{}/", name);
        let (threads, queue) = match spec.split_once(':') {
            Some((threads, queue)) => (threads, Some(queue)),
            None => (spec.as_str(), None),
        };
        match threads.trim().parse::<i32>() {
            Ok(threads) => entries.push((format!("{}threadsNo", prefix), Value::Int(threads))),
            Err(_) => report.warn(
                SM_PLUGINS,
                format!("Plugin {} concurrency parsing error for: {}", name, threads),
            ),
        }
        if let Some(queue) = queue {
            match queue.trim().parse::<i32>() {
                Ok(queue) => entries.push((format!("{}queueSize", prefix), Value::Int(queue))),
                Err(_) => report.warn(
                    SM_PLUGINS,
                    format!("Plugin {} queueSize parsing error for: {}", name, queue),
                ),
            }
        }
    }

    entries
}
