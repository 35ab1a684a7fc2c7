//! Lookup of session manager processors by id
//!
//! Processor lists in legacy files only carry ids. The class written next to
//! each id comes from a registry supplied by the caller.

use std::collections::HashMap;

/// A processor known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownProcessor {
    pub id: String,
    pub class: String,
    /// Processors registered as beans are found by the server on its own and
    /// do not need their class in the configuration.
    pub bean: bool,
}

pub trait ProcessorRegistry {
    fn find(&self, id: &str) -> Option<&KnownProcessor>;
}

/// Registry backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticProcessorRegistry {
    processors: HashMap<String, KnownProcessor>,
}

impl StaticProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a processor whose class must be written to the configuration.
    pub fn with_class(mut self, id: impl Into<String>, class: impl Into<String>) -> Self {
        self.register(id, class, false);
        self
    }

    /// Add a processor registered as a bean.
    pub fn with_bean(mut self, id: impl Into<String>, class: impl Into<String>) -> Self {
        self.register(id, class, true);
        self
    }

    pub fn register(&mut self, id: impl Into<String>, class: impl Into<String>, bean: bool) {
        let id = id.into();
        self.processors.insert(
            id.clone(),
            KnownProcessor {
                id,
                class: class.into(),
                bean,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl ProcessorRegistry for StaticProcessorRegistry {
    fn find(&self, id: &str) -> Option<&KnownProcessor> {
        self.processors.get(id)
    }
}

impl<K, V> FromIterator<(K, V)> for StaticProcessorRegistry
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(table: I) -> Self {
        let mut registry = Self::new();
        for (id, class) in table {
            registry.register(id, class, false);
        }
        registry
    }
}
