//! In-memory repository

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::item::{ConfigItem, Flag};
use crate::repository::{preferred, ConfigRepository};

type Items = BTreeMap<String, Vec<ConfigItem>>;

/// Items grouped by component name, kept in insertion order per component.
///
/// INITIAL items are visible unless the cache is built with
/// [`ConfigurationCache::with_filter_initial`].
#[derive(Debug, Default)]
pub struct ConfigurationCache {
    config: RwLock<Items>,
    hostname: Option<String>,
    filter_initial: bool,
}

impl ConfigurationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter_initial(mut self, filter_initial: bool) -> Self {
        self.filter_initial = filter_initial;
        self
    }

    /// Cache preloaded with `items`, as read from a persistent store.
    pub fn from_items(items: impl IntoIterator<Item = ConfigItem>) -> Self {
        Self {
            config: RwLock::new(collect(items)),
            ..Self::default()
        }
    }

    /// Every stored item regardless of the visibility policy.
    pub(crate) async fn snapshot(&self) -> Vec<ConfigItem> {
        self.config.read().await.values().flatten().cloned().collect()
    }

    /// Swap the whole content. Used by backends that load everything at once.
    pub(crate) async fn replace_all(&self, items: impl IntoIterator<Item = ConfigItem>) {
        *self.config.write().await = collect(items);
    }
}

fn collect(items: impl IntoIterator<Item = ConfigItem>) -> Items {
    let mut config = Items::new();
    for item in items {
        insert(&mut config, item);
    }
    config
}

fn same_slot(stored: &ConfigItem, item: &ConfigItem) -> bool {
    stored.is_node_key(item.node_name.as_deref(), &item.key_name)
        && (stored.flag == Flag::Initial) == (item.flag == Flag::Initial)
}

fn insert(config: &mut Items, item: ConfigItem) {
    let items = config.entry(item.comp_name.clone()).or_default();
    match items.iter_mut().find(|stored| same_slot(stored, &item)) {
        Some(stored) => *stored = item,
        None => items.push(item),
    }
}

#[async_trait]
impl ConfigRepository for ConfigurationCache {
    fn filter_initial(&self) -> bool {
        self.filter_initial
    }

    fn def_hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    fn set_def_hostname(&mut self, hostname: Option<String>) {
        self.hostname = hostname;
    }

    async fn items_for_component(&self, comp: &str) -> Vec<ConfigItem> {
        let config = self.config.read().await;
        config
            .get(comp)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| self.is_visible(item))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn get_item(&self, comp: &str, node: Option<&str>, key: &str) -> Option<ConfigItem> {
        let config = self.config.read().await;
        let items = config.get(comp)?;
        preferred(
            items
                .iter()
                .filter(|item| item.is_node_key(node, key) && self.is_visible(item)),
        )
        .cloned()
    }

    async fn add_item(&self, item: ConfigItem) {
        insert(&mut *self.config.write().await, item);
    }

    async fn update_item(&self, item: &ConfigItem) {
        let mut config = self.config.write().await;
        let items = config.entry(item.comp_name.clone()).or_default();
        let slot = items.iter_mut().find(|stored| {
            stored.is_node_key(item.node_name.as_deref(), &item.key_name)
                && stored.flag != Flag::Initial
        });
        match slot {
            Some(stored) => *stored = item.clone(),
            None => items.push(item.clone()),
        }
    }

    async fn remove_item(&self, item: &ConfigItem) {
        let mut config = self.config.write().await;
        if let Some(items) = config.get_mut(&item.comp_name) {
            items.retain(|stored| !same_slot(stored, item));
        }
    }

    async fn comp_names(&self) -> Vec<String> {
        let config = self.config.read().await;
        config
            .iter()
            .filter(|(_, items)| items.iter().any(|item| self.is_visible(item)))
            .map(|(comp, _)| comp.clone())
            .collect()
    }

    async fn keys(&self, comp: &str, node: Option<&str>) -> Vec<String> {
        let config = self.config.read().await;
        let mut keys: Vec<String> = Vec::new();
        for item in config.get(comp).into_iter().flatten() {
            if item.is_node(node) && self.is_visible(item) && !keys.contains(&item.key_name) {
                keys.push(item.key_name.clone());
            }
        }
        keys
    }

    async fn size(&self) -> usize {
        let config = self.config.read().await;
        config
            .values()
            .flatten()
            .filter(|item| self.is_visible(item))
            .count()
    }

    async fn all_items(&self) -> Vec<ConfigItem> {
        let config = self.config.read().await;
        config
            .values()
            .flatten()
            .filter(|item| self.is_visible(item))
            .cloned()
            .collect()
    }
}
