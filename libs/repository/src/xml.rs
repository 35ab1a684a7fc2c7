//! File backed repository
//!
//! Items live in memory and are written to an XML document on `store`:
//!
//! ```xml
//! <tigase-config>
//!   <component name="c2s">
//!     <entry key="max-queue" value="10" type="I"/>
//!     <node name="connections">
//!       <entry key="ports" value="5222,5223" type="i"/>
//!     </node>
//!   </component>
//! </tigase-config>
//! ```
//!
//! Nodes containing `/` are nested one `<node>` per segment.

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use tconf_migrate::properties::{decode_value_type, type_id, value_to_string};
use tracing::{debug, info};

use crate::cache::ConfigurationCache;
use crate::error::{Error, Result};
use crate::item::{ConfigItem, Flag};
use crate::repository::ConfigRepository;

pub const ROOT_NODE: &str = "tigase-config";
pub const COMPONENT_NODE: &str = "component";
const NODE_ELEM: &str = "node";
const ENTRY_ELEM: &str = "entry";

pub struct XmlRepository {
    path: PathBuf,
    cache: ConfigurationCache,
}

impl XmlRepository {
    /// Load `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            load_items(&path)?
        } else {
            info!(file = %path.display(), "configuration file missing, starting empty");
            Vec::new()
        };
        Ok(Self {
            path,
            cache: ConfigurationCache::from_items(items),
        })
    }

    pub fn with_filter_initial(mut self, filter_initial: bool) -> Self {
        self.cache = self.cache.with_filter_initial(filter_initial);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_items(path: &Path) -> Result<Vec<ConfigItem>> {
    let text = fs::read_to_string(path)?;
    parse_document(&text)
}

/// Items of a `<tigase-config>` document.
pub fn parse_document(text: &str) -> Result<Vec<ConfigItem>> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != ROOT_NODE {
        return Err(Error::InvalidItem(format!(
            "expected <{}> root, found <{}>",
            ROOT_NODE,
            root.tag_name().name()
        )));
    }

    let mut items = Vec::new();
    for comp in root.children().filter(|n| n.has_tag_name(COMPONENT_NODE)) {
        let name = comp
            .attribute("name")
            .ok_or_else(|| Error::InvalidItem("component without a name".to_string()))?;
        collect_entries(&comp, name, None, &mut items)?;
    }
    debug!(items = items.len(), "configuration document parsed");
    Ok(items)
}

fn collect_entries(
    parent: &roxmltree::Node,
    comp: &str,
    node: Option<&str>,
    items: &mut Vec<ConfigItem>,
) -> Result<()> {
    for child in parent.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            ENTRY_ELEM => {
                let key = child
                    .attribute("key")
                    .ok_or_else(|| Error::InvalidItem(format!("entry without a key in {}", comp)))?;
                let letter = child
                    .attribute("type")
                    .and_then(|t| t.chars().next())
                    .unwrap_or('S');
                let value = decode_value_type(letter, child.attribute("value").unwrap_or_default())?;
                let flag = child
                    .attribute("flag")
                    .map(Flag::parse_lenient)
                    .unwrap_or_default();
                items.push(ConfigItem::new(comp, node, key, value).with_flag(flag));
            }
            NODE_ELEM => {
                let name = child
                    .attribute("name")
                    .ok_or_else(|| Error::InvalidItem(format!("node without a name in {}", comp)))?;
                let path = match node {
                    Some(node) => format!("{}/{}", node, name),
                    None => name.to_string(),
                };
                collect_entries(&child, comp, Some(&path), items)?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Default)]
struct NodeTree<'a> {
    entries: Vec<&'a ConfigItem>,
    children: BTreeMap<&'a str, NodeTree<'a>>,
}

impl<'a> NodeTree<'a> {
    fn insert(&mut self, item: &'a ConfigItem) {
        let mut tree = self;
        if let Some(node) = item.node_name.as_deref() {
            for segment in node.split('/') {
                tree = tree.children.entry(segment).or_default();
            }
        }
        tree.entries.push(item);
    }

    fn write(&self, writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<()> {
        for item in &self.entries {
            let mut entry = BytesStart::new(ENTRY_ELEM);
            entry.push_attribute(("key", item.key_name.as_str()));
            entry.push_attribute(("value", value_to_string(&item.value).as_str()));
            entry.push_attribute(("type", type_id(&item.value).to_string().as_str()));
            if item.flag != Flag::Default {
                entry.push_attribute(("flag", item.flag.as_str()));
            }
            writer.write_event(Event::Empty(entry))?;
        }
        for (name, child) in &self.children {
            let mut start = BytesStart::new(NODE_ELEM);
            start.push_attribute(("name", *name));
            writer.write_event(Event::Start(start))?;
            child.write(writer)?;
            writer.write_event(Event::End(BytesEnd::new(NODE_ELEM)))?;
        }
        Ok(())
    }
}

/// Render items as a `<tigase-config>` document.
pub fn write_document(items: &[ConfigItem]) -> Result<String> {
    let mut components: BTreeMap<&str, NodeTree> = BTreeMap::new();
    for item in items {
        components
            .entry(item.comp_name.as_str())
            .or_default()
            .insert(item);
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT_NODE)))?;
    for (name, tree) in &components {
        let mut start = BytesStart::new(COMPONENT_NODE);
        start.push_attribute(("name", *name));
        writer.write_event(Event::Start(start))?;
        tree.write(&mut writer)?;
        writer.write_event(Event::End(BytesEnd::new(COMPONENT_NODE)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT_NODE)))?;
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[async_trait]
impl ConfigRepository for XmlRepository {
    fn filter_initial(&self) -> bool {
        self.cache.filter_initial()
    }

    fn def_hostname(&self) -> Option<&str> {
        self.cache.def_hostname()
    }

    fn set_def_hostname(&mut self, hostname: Option<String>) {
        self.cache.set_def_hostname(hostname);
    }

    async fn items_for_component(&self, comp: &str) -> Vec<ConfigItem> {
        self.cache.items_for_component(comp).await
    }

    async fn get_item(&self, comp: &str, node: Option<&str>, key: &str) -> Option<ConfigItem> {
        self.cache.get_item(comp, node, key).await
    }

    async fn add_item(&self, item: ConfigItem) {
        self.cache.add_item(item).await
    }

    async fn update_item(&self, item: &ConfigItem) {
        self.cache.update_item(item).await
    }

    async fn remove_item(&self, item: &ConfigItem) {
        self.cache.remove_item(item).await
    }

    async fn comp_names(&self) -> Vec<String> {
        self.cache.comp_names().await
    }

    async fn keys(&self, comp: &str, node: Option<&str>) -> Vec<String> {
        self.cache.keys(comp, node).await
    }

    async fn size(&self) -> usize {
        self.cache.size().await
    }

    async fn all_items(&self) -> Vec<ConfigItem> {
        self.cache.all_items().await
    }

    async fn store(&self) -> Result<()> {
        let items = self.cache.snapshot().await;
        let document = write_document(&items)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, document)?;
        info!(file = %self.path.display(), items = items.len(), "configuration saved");
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let items = if self.path.exists() {
            load_items(&self.path)?
        } else {
            Vec::new()
        };
        self.cache.replace_all(items).await;
        Ok(())
    }
}
