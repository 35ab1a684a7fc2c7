//! Configuration value model
//!
//! Every node of a configuration tree is a [`Value`]. Maps are ordered by key
//! so two trees compare equal regardless of the order their entries were
//! read or built in.

use std::collections::BTreeMap;
use std::fmt;

use crate::variable::Variable;

/// A configuration map, keyed by plain identifiers.
pub type ConfigMap = BTreeMap<String, Value>;

/// A single configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    List(Vec<Value>),
    Map(ConfigMap),
    Bean(BeanDefinition),
    Variable(Variable),
}

/// A named component definition with its own nested configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BeanDefinition {
    pub name: String,
    pub class: Option<String>,
    pub active: bool,
    pub exportable: bool,
    pub props: ConfigMap,
}

impl BeanDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: None,
            active: true,
            exportable: false,
            props: ConfigMap::new(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Build a bean out of an existing map, pulling out `class` and `active`.
    pub fn from_map(name: impl Into<String>, mut map: ConfigMap) -> Self {
        let mut bean = Self::new(name);
        if let Some(class) = map.remove("class") {
            bean.class = class.as_string();
        }
        if let Some(active) = map.remove("active") {
            bean.active = active.is_truthy();
        }
        bean.props = map;
        bean
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    /// List of strings, mostly used by the migration rules.
    pub fn str_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Str(s.into())).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_)
        )
    }

    /// Maps and beans both render with block syntax.
    pub fn is_map_like(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Bean(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar rendered as a plain string; `None` for containers and null.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null | Value::List(_) | Value::Map(_) | Value::Bean(_) => None,
            Value::Variable(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `true` for the boolean `true` and for the string `"true"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Str(s) => s == "true",
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nested map of a map or a bean.
    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Value::Map(map) => Some(map),
            Value::Bean(bean) => Some(&bean.props),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            Value::Map(map) => Some(map),
            Value::Bean(bean) => Some(&mut bean.props),
            _ => None,
        }
    }

    pub fn as_bean(&self) -> Option<&BeanDefinition> {
        match self {
            Value::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Return the nested map of this value, replacing a scalar with an
    /// empty map when needed.
    pub fn ensure_map(&mut self) -> &mut ConfigMap {
        if !self.is_map_like() {
            *self = Value::Map(ConfigMap::new());
        }
        match self {
            Value::Map(map) => map,
            Value::Bean(bean) => &mut bean.props,
            _ => unreachable!("value was just replaced with a map"),
        }
    }

    /// Promote this value to a bean named `name`, keeping existing entries.
    pub fn ensure_bean(&mut self, name: &str) -> &mut BeanDefinition {
        if !matches!(self, Value::Bean(_)) {
            let props = match std::mem::replace(self, Value::Null) {
                Value::Map(map) => map,
                _ => ConfigMap::new(),
            };
            let mut bean = BeanDefinition::new(name);
            bean.props = props;
            *self = Value::Bean(bean);
        }
        match self {
            Value::Bean(bean) => bean,
            _ => unreachable!("value was just promoted to a bean"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<ConfigMap> for Value {
    fn from(value: ConfigMap) -> Self {
        Value::Map(value)
    }
}

impl From<BeanDefinition> for Value {
    fn from(value: BeanDefinition) -> Self {
        Value::Bean(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

/// Render a double so that it always reads back as a floating point literal.
pub(crate) fn format_double(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

pub(crate) fn format_float(value: f32) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Double(v) => write!(f, "{}", format_double(*v)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => fmt_map(f, map),
            Value::Bean(bean) => {
                write!(f, "{}(", bean.name)?;
                if let Some(class) = &bean.class {
                    write!(f, "class={}, ", class)?;
                }
                write!(f, "active={})", bean.active)?;
                fmt_map(f, &bean.props)
            }
            Value::Variable(variable) => write!(f, "{}", variable),
        }
    }
}

fn fmt_map(f: &mut fmt::Formatter<'_>, map: &ConfigMap) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}={}", k, v)?;
    }
    write!(f, "}}")
}
