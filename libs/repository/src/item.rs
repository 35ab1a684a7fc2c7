//! A single configuration setting and its text forms

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use tconf_dsl::Value;
use tconf_migrate::properties::{decode_value_type, type_id, value_to_string};
use tracing::warn;

use crate::error::{Error, Result};

pub const ITEM_ELEM_NAME: &str = "prop";
pub const CLUSTER_NODE_ATTR: &str = "cluster-node";
pub const COMPONENT_NAME_ATTR: &str = "comp-name";
pub const NODE_NAME_ATTR: &str = "node-name";
pub const KEY_NAME_ATTR: &str = "key-name";
pub const VALUE_ATTR: &str = "value";
pub const VALUE_TYPE_ATTR: &str = "value-type";
pub const FLAG_ATTR: &str = "flag";

/// Provenance of a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flag {
    /// Seeded before any user modification.
    Initial,
    #[default]
    Default,
    Updated,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Initial => "INITIAL",
            Flag::Default => "DEFAULT",
            Flag::Updated => "UPDATED",
        }
    }

    /// Lenient parse used for stored data: unknown names become `Default`.
    pub fn parse_lenient(text: &str) -> Flag {
        text.parse().unwrap_or_else(|_| {
            warn!(flag = %text, "unrecognized item flag, using DEFAULT");
            Flag::Default
        })
    }
}

impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INITIAL" => Ok(Flag::Initial),
            "DEFAULT" => Ok(Flag::Default),
            "UPDATED" => Ok(Flag::Updated),
            other => Err(Error::InvalidItem(format!("unknown flag '{}'", other))),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `comp/[node/]key` into component, node and key.
///
/// The node is everything between the first and the last `/` and may itself
/// contain slashes.
pub fn split_key(key: &str) -> Result<(&str, Option<&str>, &str)> {
    match (key.find('/'), key.rfind('/')) {
        (Some(first), Some(last)) if first > 0 => {
            let node = (first != last).then(|| &key[first + 1..last]);
            Ok((&key[..first], node, &key[last + 1..]))
        }
        _ => Err(Error::InvalidKey(key.to_string())),
    }
}

/// One setting identified by (cluster node, component, node, key).
#[derive(Debug, Clone)]
pub struct ConfigItem {
    pub cluster_node: Option<String>,
    pub comp_name: String,
    pub node_name: Option<String>,
    pub key_name: String,
    pub value: Value,
    pub flag: Flag,
    pub last_modified: DateTime<Utc>,
}

impl ConfigItem {
    pub fn new(
        comp_name: impl Into<String>,
        node_name: Option<&str>,
        key_name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            cluster_node: None,
            comp_name: comp_name.into(),
            node_name: node_name.map(str::to_string),
            key_name: key_name.into(),
            value: value.into(),
            flag: Flag::Default,
            last_modified: Utc::now(),
        }
    }

    pub fn with_cluster_node(mut self, cluster_node: Option<&str>) -> Self {
        self.cluster_node = cluster_node.map(str::to_string);
        self
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flag = flag;
        self
    }

    /// Item for `node_key` inside a component, where the key is the part
    /// after the last `/` and the rest is the node.
    pub fn from_node_key(
        cluster_node: Option<&str>,
        comp_name: &str,
        node_key: &str,
        value: impl Into<Value>,
    ) -> Self {
        let (node, key) = match node_key.rsplit_once('/') {
            Some((node, key)) => (Some(node), key),
            None => (None, node_key),
        };
        Self::new(comp_name, node, key, value).with_cluster_node(cluster_node)
    }

    /// Parse `comp/[node/]key[t]=value`; the type letter is optional.
    pub fn from_property_string(text: &str) -> Result<Self> {
        let (key, raw) = text
            .split_once('=')
            .ok_or_else(|| Error::InvalidItem(format!("missing '=' in '{}'", text)))?;
        let key = key.trim();

        let (key, value) = match typed_key(key) {
            Some((key, letter)) => (key, decode_value_type(letter, raw)?),
            None => (key, Value::str(raw.trim())),
        };
        let (comp, node, key) = split_key(key)?;
        Ok(Self::new(comp, node, key, value))
    }

    pub fn to_property_string(&self) -> String {
        format!(
            "{}[{}]={}",
            self.key(),
            type_id(&self.value),
            value_to_string(&self.value)
        )
    }

    /// Element form: `<prop comp-name=".." key-name=".." value=".." .../>`.
    pub fn to_element(&self) -> Result<String> {
        let mut elem = BytesStart::new(ITEM_ELEM_NAME);
        if let Some(cluster_node) = &self.cluster_node {
            elem.push_attribute((CLUSTER_NODE_ATTR, cluster_node.as_str()));
        }
        elem.push_attribute((COMPONENT_NAME_ATTR, self.comp_name.as_str()));
        if let Some(node) = &self.node_name {
            elem.push_attribute((NODE_NAME_ATTR, node.as_str()));
        }
        elem.push_attribute((KEY_NAME_ATTR, self.key_name.as_str()));
        elem.push_attribute((VALUE_ATTR, value_to_string(&self.value).as_str()));
        elem.push_attribute((VALUE_TYPE_ATTR, type_id(&self.value).to_string().as_str()));
        elem.push_attribute((FLAG_ATTR, self.flag.as_str()));

        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Empty(elem))?;
        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }

    pub fn from_element(node: &roxmltree::Node) -> Result<Self> {
        if node.tag_name().name() != ITEM_ELEM_NAME {
            return Err(Error::InvalidItem(format!(
                "unexpected element <{}>",
                node.tag_name().name()
            )));
        }
        let required = |name: &str| {
            node.attribute(name)
                .ok_or_else(|| Error::InvalidItem(format!("missing attribute '{}'", name)))
        };
        let comp = required(COMPONENT_NAME_ATTR)?;
        let key = required(KEY_NAME_ATTR)?;
        let letter = node
            .attribute(VALUE_TYPE_ATTR)
            .and_then(|t| t.chars().next())
            .unwrap_or('S');
        let value = decode_value_type(letter, node.attribute(VALUE_ATTR).unwrap_or_default())?;
        let flag = node.attribute(FLAG_ATTR).map(Flag::parse_lenient).unwrap_or_default();

        Ok(Self::new(comp, node.attribute(NODE_NAME_ATTR), key, value)
            .with_cluster_node(node.attribute(CLUSTER_NODE_ATTR))
            .with_flag(flag))
    }

    pub fn parse_element(xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)?;
        Self::from_element(&doc.root_element())
    }

    /// Replace the value and refresh the modification time.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.last_modified = Utc::now();
    }

    /// Key inside the component: `[node/]key`.
    pub fn config_key(&self) -> String {
        match &self.node_name {
            Some(node) => format!("{}/{}", node, self.key_name),
            None => self.key_name.clone(),
        }
    }

    /// Full key: `comp/[node/]key`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.comp_name, self.config_key())
    }

    pub fn is_component(&self, comp: &str) -> bool {
        self.comp_name == comp
    }

    pub fn is_node(&self, node: Option<&str>) -> bool {
        self.node_name.as_deref() == node
    }

    pub fn is_key(&self, key: &str) -> bool {
        self.key_name == key
    }

    pub fn is_node_key(&self, node: Option<&str>, key: &str) -> bool {
        self.is_node(node) && self.is_key(key)
    }

    pub fn is_comp_node_key(&self, comp: &str, node: Option<&str>, key: &str) -> bool {
        self.is_component(comp) && self.is_node_key(node, key)
    }
}

impl fmt::Display for ConfigItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}={}",
            self.comp_name,
            self.node_name.as_deref().unwrap_or("null"),
            self.key_name,
            self.value
        )
    }
}

fn typed_key(key: &str) -> Option<(&str, char)> {
    let (name, letter) = key.strip_suffix(']')?.rsplit_once('[')?;
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if "LISBlisbFDfd".contains(c) => Some((name, c)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_splitting() {
        assert_eq!(split_key("sess-man/k").unwrap(), ("sess-man", None, "k"));
        assert_eq!(
            split_key("c2s/connections/5222/type").unwrap(),
            ("c2s", Some("connections/5222"), "type")
        );
        assert!(matches!(split_key("novalue"), Err(Error::InvalidKey(_))));
        assert!(matches!(split_key("/x"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn property_string_forms() {
        let item = ConfigItem::from_property_string("c2s/connections/ports[i]=5222,5223").unwrap();
        assert_eq!(item.comp_name, "c2s");
        assert_eq!(item.node_name.as_deref(), Some("connections"));
        assert_eq!(item.key_name, "ports");
        assert_eq!(item.value, Value::List(vec![Value::Int(5222), Value::Int(5223)]));
        assert_eq!(item.flag, Flag::Default);
        assert_eq!(item.to_property_string(), "c2s/connections/ports[i]=5222,5223");

        let plain = ConfigItem::from_property_string("sess-man/admins = admin@x").unwrap();
        assert_eq!(plain.value, Value::str("admin@x"));
        assert_eq!(plain.to_property_string(), "sess-man/admins[S]=admin@x");

        assert!(ConfigItem::from_property_string("lonely=1").is_err());
        assert!(ConfigItem::from_property_string("c2s/x").is_err());
    }

    #[test]
    fn node_key_splits_at_last_slash() {
        let item = ConfigItem::from_node_key(Some("node1"), "c2s", "a/b/key", 5);
        assert_eq!(item.node_name.as_deref(), Some("a/b"));
        assert_eq!(item.key_name, "key");
        assert_eq!(item.cluster_node.as_deref(), Some("node1"));
        assert_eq!(item.config_key(), "a/b/key");

        let item = ConfigItem::from_node_key(None, "c2s", "key", 5);
        assert_eq!(item.node_name, None);
        assert_eq!(item.key(), "c2s/key");
    }

    #[test]
    fn element_form() {
        let item = ConfigItem::new("sess-man", Some("plugins"), "count", 10i64)
            .with_cluster_node(Some("n1"))
            .with_flag(Flag::Updated);
        let xml = item.to_element().unwrap();
        assert!(xml.starts_with("<prop "));
        assert!(xml.contains(r#"comp-name="sess-man""#));
        assert!(xml.contains(r#"value-type="L""#));
        assert!(xml.contains(r#"flag="UPDATED""#));

        let parsed = ConfigItem::parse_element(&xml).unwrap();
        assert_eq!(parsed.key(), "sess-man/plugins/count");
        assert_eq!(parsed.value, Value::Long(10));
        assert_eq!(parsed.flag, Flag::Updated);
        assert_eq!(parsed.cluster_node.as_deref(), Some("n1"));
    }

    #[test]
    fn unknown_flag_falls_back_to_default() {
        let item =
            ConfigItem::parse_element(r#"<prop comp-name="c" key-name="k" value="v" flag="BOGUS"/>"#)
                .unwrap();
        assert_eq!(item.flag, Flag::Default);
        assert_eq!(item.value, Value::str("v"));
        assert!(ConfigItem::parse_element(r#"<item comp-name="c" key-name="k"/>"#).is_err());
    }

    #[test]
    fn display_and_matching() {
        let item = ConfigItem::new("c2s", None, "ports", "5222");
        assert_eq!(item.to_string(), "c2s/null/ports=5222");
        assert!(item.is_comp_node_key("c2s", None, "ports"));
        assert!(!item.is_node(Some("connections")));
    }
}
