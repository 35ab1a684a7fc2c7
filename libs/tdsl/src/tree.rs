//! Conversion between nested trees and flat path-keyed maps
//!
//! A flat map uses `/`-joined keys (`sess-man/commands/x`). Beans flatten to
//! `<path>/class` and `<path>/active` entries next to their own properties, and
//! the same two trailing segments turn a map back into a bean.

use crate::value::{ConfigMap, Value};

/// Flatten a nested tree into a map keyed by `/`-joined paths.
pub fn flat_tree(tree: &ConfigMap) -> ConfigMap {
    let mut out = ConfigMap::new();
    flatten_into(&mut out, None, tree);
    out
}

fn flatten_into(out: &mut ConfigMap, prefix: Option<&str>, map: &ConfigMap) {
    for (k, v) in map {
        let key = match prefix {
            Some(prefix) => format!("{}/{}", prefix, k),
            None => k.clone(),
        };
        match v {
            Value::Bean(bean) => {
                if let Some(class) = &bean.class {
                    out.insert(format!("{}/class", key), Value::Str(class.clone()));
                }
                let active = if bean.active { "true" } else { "false" };
                out.insert(format!("{}/active", key), Value::str(active));
                flatten_into(out, Some(&key), &bean.props);
            }
            Value::Map(nested) => flatten_into(out, Some(&key), nested),
            other => {
                out.insert(key, other.clone());
            }
        }
    }
}

/// Build a nested tree out of a flat path-keyed map.
pub fn build_tree(flat: &ConfigMap) -> ConfigMap {
    let mut root = ConfigMap::new();
    for (path, value) in flat {
        insert_path(&mut root, path, value.clone());
    }
    root
}

/// Store `value` under a `/`-separated path, creating intermediate maps.
///
/// A trailing `class` or `active` segment updates the bean owning it,
/// promoting a plain map to a bean when needed. Scalars found on the way are
/// replaced by maps.
///
/// `active` alone promotes as well, so a class-less bean built here is the
/// same tree the reader produces for a map holding an `active` entry.
pub fn insert_path(root: &mut ConfigMap, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('/').collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let Some((owner_key, ancestors)) = parents.split_last() else {
        root.insert(last.to_string(), value);
        return;
    };

    let mut map = root;
    for part in ancestors {
        map = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Map(ConfigMap::new()))
            .ensure_map();
    }
    let owner = map
        .entry(owner_key.to_string())
        .or_insert_with(|| Value::Map(ConfigMap::new()));

    match *last {
        "class" => owner.ensure_bean(owner_key).class = value.as_string(),
        "active" => owner.ensure_bean(owner_key).active = value.is_truthy(),
        _ => {
            owner.ensure_map().insert(last.to_string(), value);
        }
    }
}

/// Look up a value by `/`-separated path, descending through maps and beans.
pub fn get_path<'a>(root: &'a ConfigMap, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('/');
    let mut value = root.get(parts.next()?)?;
    for part in parts {
        value = value.as_map()?.get(part)?;
    }
    Some(value)
}

pub fn get_path_mut<'a>(root: &'a mut ConfigMap, path: &str) -> Option<&'a mut Value> {
    let mut parts = path.split('/');
    let mut value = root.get_mut(parts.next()?)?;
    for part in parts {
        value = value.as_map_mut()?.get_mut(part)?;
    }
    Some(value)
}

/// Remove the value stored under a `/`-separated path.
pub fn remove_path(root: &mut ConfigMap, path: &str) -> Option<Value> {
    match path.rsplit_once('/') {
        None => root.remove(path),
        Some((parent, key)) => get_path_mut(root, parent)?.as_map_mut()?.remove(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BeanDefinition;

    #[test]
    fn build_promotes_beans() {
        let mut flat = ConfigMap::new();
        flat.insert("--cluster-mode".into(), Value::Bool(true));
        flat.insert("http/active".into(), Value::str("true"));
        flat.insert("sess-man/commands/x".into(), Value::str("DOMAIN"));
        flat.insert("c2s/class".into(), Value::str("tigase.C2S"));
        flat.insert("c2s/ports".into(), Value::List(vec![Value::Int(5222)]));

        let tree = build_tree(&flat);
        assert_eq!(tree.get("--cluster-mode"), Some(&Value::Bool(true)));

        let http = tree.get("http").and_then(Value::as_bean).unwrap();
        assert_eq!(http.name, "http");
        assert!(http.active);
        assert!(http.class.is_none());

        let c2s = tree.get("c2s").and_then(Value::as_bean).unwrap();
        assert_eq!(c2s.class.as_deref(), Some("tigase.C2S"));
        assert!(c2s.props.contains_key("ports"));

        assert_eq!(
            get_path(&tree, "sess-man/commands/x"),
            Some(&Value::str("DOMAIN"))
        );
    }

    #[test]
    fn active_alone_matches_reader() {
        let mut tree = ConfigMap::new();
        insert_path(&mut tree, "presence/active", Value::str("false"));

        let bean = tree.get("presence").and_then(Value::as_bean).unwrap();
        assert!(bean.class.is_none());
        assert!(!bean.active);
        assert_eq!(crate::reader::read("presence {\n    active = false\n}\n").unwrap(), tree);
    }

    #[test]
    fn flatten_beans() {
        let mut bean = BeanDefinition::new("s2s").with_class("tigase.S2S");
        bean.props.insert("max".into(), Value::Int(3));
        let mut tree = ConfigMap::new();
        tree.insert("s2s".into(), Value::Bean(bean));

        let flat = flat_tree(&tree);
        assert_eq!(flat.get("s2s/class"), Some(&Value::str("tigase.S2S")));
        assert_eq!(flat.get("s2s/active"), Some(&Value::str("true")));
        assert_eq!(flat.get("s2s/max"), Some(&Value::Int(3)));
        assert_eq!(build_tree(&flat), tree);
    }

    #[test]
    fn remove_nested() {
        let mut tree = ConfigMap::new();
        insert_path(&mut tree, "a/b/c", Value::Int(1));
        insert_path(&mut tree, "a/b/d", Value::Int(2));

        assert_eq!(remove_path(&mut tree, "a/b/c"), Some(Value::Int(1)));
        assert_eq!(remove_path(&mut tree, "a/x/c"), None);
        assert_eq!(get_path(&tree, "a/b/d"), Some(&Value::Int(2)));
        assert!(get_path(&tree, "a/b/c").is_none());
    }
}
