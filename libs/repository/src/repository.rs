//! The repository contract shared by all backends
//!
//! Backends implement a handful of storage primitives; lookups by full key,
//! `set` with its flag transitions and the property map views are provided
//! on top of them.

use async_trait::async_trait;
use tconf_dsl::{ConfigMap, Value};

use crate::error::Result;
use crate::item::{split_key, ConfigItem, Flag};

/// Storage for [`ConfigItem`]s keyed by (cluster node, component, node, key).
///
/// Every operation takes `&self`; backends guard their state internally so a
/// repository can be shared between tasks.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Whether reads hide items still flagged INITIAL.
    fn filter_initial(&self) -> bool;

    /// Cluster node written into new items and matched next to the wildcard.
    fn def_hostname(&self) -> Option<&str>;

    fn set_def_hostname(&mut self, hostname: Option<String>);

    async fn items_for_component(&self, comp: &str) -> Vec<ConfigItem>;

    /// Visible item for the tuple. Items other than INITIAL win over seeds.
    async fn get_item(&self, comp: &str, node: Option<&str>, key: &str) -> Option<ConfigItem>;

    /// Insert an item, replacing a stored one with the same tuple and the same
    /// seed status.
    async fn add_item(&self, item: ConfigItem);

    /// Store a changed value of an item previously returned by a read.
    async fn update_item(&self, item: &ConfigItem);

    async fn remove_item(&self, item: &ConfigItem);

    async fn comp_names(&self) -> Vec<String>;

    async fn keys(&self, comp: &str, node: Option<&str>) -> Vec<String>;

    async fn size(&self) -> usize;

    async fn all_items(&self) -> Vec<ConfigItem>;

    /// Persist pending changes. Backends writing through do nothing.
    async fn store(&self) -> Result<()> {
        Ok(())
    }

    /// Drop in-memory state and read it again from the backing store.
    async fn reload(&self) -> Result<()> {
        Ok(())
    }

    /// Whether an item is returned by reads under the current policy.
    fn is_visible(&self, item: &ConfigItem) -> bool {
        !(self.filter_initial() && item.flag == Flag::Initial)
    }

    async fn get(&self, comp: &str, node: Option<&str>, key: &str) -> Option<Value> {
        self.get_item(comp, node, key).await.map(|item| item.value)
    }

    /// Create the item as DEFAULT or move an existing one to UPDATED.
    ///
    /// A seeded INITIAL item is left in place and overlaid by a new DEFAULT
    /// item. An existing item keeps its cluster node; only new items get the
    /// default hostname.
    ///
    /// The lookup and the write are separate backend calls, so concurrent
    /// `set`s of the same new tuple may both add an item. Callers needing
    /// that guarantee serialize their writes.
    async fn set(&self, comp: &str, node: Option<&str>, key: &str, value: Value) {
        match self.get_item(comp, node, key).await {
            Some(mut item) if item.flag != Flag::Initial => {
                item.set_value(value);
                item.flag = Flag::Updated;
                self.update_item(&item).await;
            }
            _ => {
                let item = ConfigItem::new(comp, node, key, value)
                    .with_cluster_node(self.def_hostname());
                self.add_item(item).await;
            }
        }
    }

    async fn remove(&self, comp: &str, node: Option<&str>, key: &str) {
        if let Some(item) = self.get_item(comp, node, key).await {
            self.remove_item(&item).await;
        }
    }

    /// Add a DEFAULT item for a full `comp/[node/]key`.
    async fn add_property(&self, key: &str, value: Value) -> Result<()> {
        let (comp, node, key) = split_key(key)?;
        let item = ConfigItem::new(comp, node, key, value).with_cluster_node(self.def_hostname());
        self.add_item(item).await;
        Ok(())
    }

    async fn item_by_key(&self, key: &str) -> Result<Option<ConfigItem>> {
        let (comp, node, key) = split_key(key)?;
        Ok(self.get_item(comp, node, key).await)
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.item_by_key(key).await?.is_some())
    }

    async fn remove_by_key(&self, key: &str) -> Result<()> {
        if let Some(item) = self.item_by_key(key).await? {
            self.remove_item(&item).await;
        }
        Ok(())
    }

    /// Flat `[node/]key -> value` map of one component.
    async fn get_properties(&self, comp: &str) -> ConfigMap {
        self.items_for_component(comp)
            .await
            .into_iter()
            .map(|item| (item.config_key(), item.value))
            .collect()
    }

    /// Store every `[node/]key -> value` entry as an item of `comp`.
    async fn put_properties(&self, comp: &str, props: &ConfigMap) {
        for (node_key, value) in props {
            let item =
                ConfigItem::from_node_key(self.def_hostname(), comp, node_key, value.clone());
            self.add_item(item).await;
        }
    }
}

/// Pick the item a lookup returns among all stored ones for a tuple.
pub(crate) fn preferred<'a, I>(candidates: I) -> Option<&'a ConfigItem>
where
    I: IntoIterator<Item = &'a ConfigItem>,
{
    candidates
        .into_iter()
        .min_by_key(|item| item.flag == Flag::Initial)
}
