//! Item based configuration store
//!
//! Settings are [`ConfigItem`]s addressed by component, node and key, with a
//! [`Flag`] recording where the value came from. Three interchangeable
//! backends implement [`ConfigRepository`]:
//!
//! - [`ConfigurationCache`], in memory
//! - [`SqlRepository`], one table over a shared SQLite connection
//! - [`XmlRepository`], an XML document written on `store`
//!
//! Whether seeded INITIAL items are visible is a per-repository policy: the
//! SQL backend hides them by default, the other two show them.

pub mod cache;
pub mod error;
pub mod item;
pub mod repository;
pub mod sql;
pub mod xml;

pub use cache::ConfigurationCache;
pub use error::{Error, Result};
pub use item::{split_key, ConfigItem, Flag};
pub use repository::ConfigRepository;
pub use sql::SqlRepository;
pub use xml::{parse_document, write_document, XmlRepository};
