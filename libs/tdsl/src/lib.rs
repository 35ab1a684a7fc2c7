//! tdsl - the configuration language of the server
//!
//! ```text
//! 'sess-man' (class: tigase.server.xmppsession.SessionManager) {
//!     'max-queue-size' = 10000
//!     admins = [ 'admin@example.com' ]
//!     home = env('HOME') + '/certs'
//! }
//! ```
//!
//! The crate provides:
//! - [`Value`], the closed value model with [`BeanDefinition`] and [`Variable`]
//! - [`read`], a single pass reader with line and position aware errors
//! - [`ConfigWriter`], the canonical serializer, optionally resolving variables
//! - [`flat_tree`] / [`build_tree`] and path helpers for `/`-joined keys

pub mod error;
pub mod reader;
pub mod tree;
pub mod value;
pub mod variable;
pub mod writer;

pub use error::{Error, Result};
pub use reader::{decode_value, read, read_file};
pub use tree::{build_tree, flat_tree, get_path, get_path_mut, insert_path, remove_path};
pub use value::{BeanDefinition, ConfigMap, Value};
pub use variable::{CompositeVariable, Operation, ProcessVariables, Variable, VariableSource};
pub use writer::{has_restricted_chars, ConfigWriter};
