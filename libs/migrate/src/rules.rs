//! Rule primitives shared by the legacy conversion and the in-place upgrade
//!
//! Both primitives do nothing when the old key is missing, so a rule set
//! built from them can be applied to the same tree any number of times.

use tconf_dsl::{decode_value, insert_path, remove_path, ConfigMap, Value};
use tracing::debug;

/// Store `value` under a `/`-separated path, creating intermediate maps and
/// promoting the owner to a bean when `class` or `active` is set on it.
pub fn put_path(props: &mut ConfigMap, key: &str, value: Value) {
    insert_path(props, key, value);
}

/// Remove a key, trying the literal key first and then a nested path.
pub fn take(props: &mut ConfigMap, key: &str) -> Option<Value> {
    match props.remove(key) {
        Some(value) => Some(value),
        None if key.contains('/') => remove_path(props, key),
        None => None,
    }
}

/// Move `old_key` to `new_key`, passing the value through `converter`.
///
/// Returns `true` when the old key was present. A converter returning `None`
/// drops the value.
pub fn rename_if_exists<F>(props: &mut ConfigMap, old_key: &str, new_key: &str, converter: F) -> bool
where
    F: FnOnce(Value) -> Option<Value>,
{
    let Some(value) = take(props, old_key) else {
        return false;
    };
    if let Some(value) = converter(value) {
        debug!(from = old_key, to = new_key, "renamed configuration key");
        put_path(props, new_key, value);
    }
    true
}

/// Remove `old_key` and hand its value to `consumer`, which may write any
/// number of new keys.
pub fn remove_if_exists_and<F>(props: &mut ConfigMap, old_key: &str, consumer: F) -> bool
where
    F: FnOnce(&mut ConfigMap, Value),
{
    let Some(value) = take(props, old_key) else {
        return false;
    };
    debug!(key = old_key, "restructuring configuration key");
    consumer(props, value);
    true
}

/// Nested map at `path`, created on the way. Segments may contain `/`.
pub fn ensure_map_at<'a>(root: &'a mut ConfigMap, path: &[&str]) -> &'a mut ConfigMap {
    let mut map = root;
    for part in path {
        map = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Map(ConfigMap::new()))
            .ensure_map();
    }
    map
}

/// Keep the value as it is.
pub fn identity(value: Value) -> Option<Value> {
    Some(value)
}

/// Decode string values as tdsl scalars, so `"true"` becomes a boolean and
/// `"10"` an integer.
pub fn decoded(value: Value) -> Option<Value> {
    Some(match value {
        Value::Str(s) => decode_value(&s),
        other => other,
    })
}

/// Turn a comma separated string into a list of trimmed strings.
pub fn comma_list(value: Value) -> Option<Value> {
    Some(match value {
        Value::Str(s) => Value::str_list(split_list(&s)),
        other => other,
    })
}

/// Split a comma separated string, trimming items and dropping empty ones.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Items of a list value, or of a comma separated string.
pub fn string_items(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items.iter().filter_map(Value::as_string).collect(),
        Value::Str(s) => split_list(s),
        other => other.as_string().into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tconf_dsl::get_path;

    #[test]
    fn rename_missing_key_is_noop() {
        let mut props = ConfigMap::new();
        props.insert("a".into(), Value::Int(1));
        let before = props.clone();

        assert!(!rename_if_exists(&mut props, "--missing", "x", identity));
        assert!(!remove_if_exists_and(&mut props, "--missing", |p, v| {
            put_path(p, "y", v);
        }));
        assert_eq!(props, before);
    }

    #[test]
    fn rename_with_converter() {
        let mut props = ConfigMap::new();
        props.insert("--virt-hosts".into(), Value::str("a.com, b.com,"));
        assert!(rename_if_exists(&mut props, "--virt-hosts", "virtual-hosts", comma_list));
        assert_eq!(
            props.get("virtual-hosts"),
            Some(&Value::str_list(["a.com", "b.com"]))
        );
        assert!(!props.contains_key("--virt-hosts"));
    }

    #[test]
    fn fan_out_creates_beans() {
        let mut props = ConfigMap::new();
        props.insert("--see-other".into(), Value::str("tigase.X"));
        remove_if_exists_and(&mut props, "--see-other", |p, v| {
            put_path(p, "c2s/seeOtherHost/class", v.clone());
            put_path(p, "bosh/seeOtherHost/class", v);
        });

        let c2s = get_path(&props, "c2s/seeOtherHost").and_then(Value::as_bean).unwrap();
        assert_eq!(c2s.class.as_deref(), Some("tigase.X"));
        assert!(get_path(&props, "bosh/seeOtherHost").is_some());
    }

    #[test]
    fn take_nested_path() {
        let mut props = ConfigMap::new();
        put_path(&mut props, "basic-conf/logging/handlers", Value::str("x"));
        assert_eq!(take(&mut props, "basic-conf/logging/handlers"), Some(Value::str("x")));
        assert_eq!(take(&mut props, "basic-conf/logging/handlers"), None);
    }

    #[test]
    fn nested_map_keeps_slashes_in_keys() {
        let mut props = ConfigMap::new();
        ensure_map_at(&mut props, &["sess-man", "commands"])
            .insert("http://jabber.org/protocol/admin#add-user".into(), Value::str("LOCAL"));
        let commands = get_path(&props, "sess-man/commands").and_then(Value::as_map).unwrap();
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn decoded_scalars() {
        assert_eq!(decoded(Value::str("true")), Some(Value::Bool(true)));
        assert_eq!(decoded(Value::str("10")), Some(Value::Int(10)));
        assert_eq!(decoded(Value::Int(3)), Some(Value::Int(3)));
    }
}
