//! tdsl writer
//!
//! Renders a configuration tree in the canonical layout: four space
//! indentation, flags first, scalars before nested blocks.

use std::cmp::Ordering;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::value::{format_double, format_float, BeanDefinition, ConfigMap, Value};
use crate::variable::{Variable, VariableSource};

const INDENT: &str = "    ";

/// Characters that force a key or a flag value to be quoted.
const RESTRICTED_CHARS: &[char] = &['=', ':', ',', '[', ']', '#', '+', '-', '*', '/'];

/// Blocks that are written ahead of other blocks.
const LEADING_BLOCKS: &[&str] = &["dataSource", "userRepository", "authRepository"];

pub fn has_restricted_chars(text: &str) -> bool {
    text.contains(RESTRICTED_CHARS)
}

/// Serializer for configuration trees.
///
/// By default variables are written as `env(...)`, `prop(...)` and composite
/// expressions. With [`ConfigWriter::resolve_variables`] they are evaluated
/// and the resulting values are written instead.
#[derive(Default)]
pub struct ConfigWriter<'a> {
    resolver: Option<&'a dyn VariableSource>,
}

impl<'a> ConfigWriter<'a> {
    pub fn new() -> Self {
        Self { resolver: None }
    }

    pub fn resolve_variables(mut self, source: &'a dyn VariableSource) -> Self {
        self.resolver = Some(source);
        self
    }

    pub fn write(&self, map: &ConfigMap) -> Result<String> {
        let mut emitter = Emitter {
            out: String::new(),
            indent: 0,
            resolver: self.resolver,
        };
        emitter.write_map(map)?;
        Ok(emitter.out)
    }

    /// Write the tree to `path`, replacing any previous content.
    pub fn write_file(&self, path: impl AsRef<Path>, map: &ConfigMap) -> Result<()> {
        let text = self.write(map)?;
        std::fs::write(path.as_ref(), text)?;
        debug!(path = %path.as_ref().display(), entries = map.len(), "configuration written");
        Ok(())
    }
}

struct Emitter<'a> {
    out: String,
    indent: usize,
    resolver: Option<&'a dyn VariableSource>,
}

fn entry_order(a: &(&String, &Value), b: &(&String, &Value)) -> Ordering {
    let a_flag = a.0.starts_with("--");
    let b_flag = b.0.starts_with("--");
    if a_flag != b_flag {
        return if a_flag {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    let a_block = a.1.is_map_like();
    let b_block = b.1.is_map_like();
    if a_block != b_block {
        return if a_block {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    if a_block {
        let rank = |key: &str| {
            LEADING_BLOCKS
                .iter()
                .position(|leading| *leading == key)
                .unwrap_or(LEADING_BLOCKS.len())
        };
        let ordering = rank(a.0.as_str()).cmp(&rank(b.0.as_str()));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.0.cmp(b.0)
}

impl<'a> Emitter<'a> {
    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn write_string(&mut self, text: &str) {
        if has_restricted_chars(text) {
            self.out.push('\'');
            self.out.push_str(text);
            self.out.push('\'');
        } else {
            self.out.push_str(text);
        }
    }

    fn write_map(&mut self, map: &ConfigMap) -> Result<()> {
        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_by(entry_order);

        for (key, value) in entries {
            let root_flag = self.indent == 0 && key.starts_with("--");
            self.write_indent();
            if root_flag {
                self.out.push_str(key);
            } else {
                self.write_string(key);
            }
            self.out
                .push_str(if value.is_map_like() { " " } else { " = " });
            match value {
                Value::Str(s) if root_flag => {
                    self.write_string(s);
                    self.out.push('\n');
                }
                _ => {
                    self.write_value(value)?;
                    self.out.push('\n');
                }
            }
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.out.push_str("null"),
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => self.out.push_str(&i.to_string()),
            Value::Long(l) => {
                self.out.push_str(&l.to_string());
                self.out.push('L');
            }
            Value::Float(f) => {
                self.out.push_str(&format_float(*f));
                self.out.push('f');
            }
            Value::Double(d) => self.out.push_str(&format_double(*d)),
            Value::Str(s) => {
                self.out.push('\'');
                self.out.push_str(s);
                self.out.push('\'');
            }
            Value::List(items) => self.write_list(items)?,
            Value::Map(map) => {
                if map.is_empty() {
                    self.out.push_str("{}");
                } else {
                    self.out.push_str("{\n");
                    self.indent += 1;
                    self.write_map(map)?;
                    self.indent -= 1;
                    self.write_indent();
                    self.out.push('}');
                }
            }
            Value::Bean(bean) => self.write_bean(bean)?,
            Value::Variable(variable) => self.write_variable(variable)?,
        }
        Ok(())
    }

    fn write_bean(&mut self, bean: &BeanDefinition) -> Result<()> {
        self.out.push('(');
        self.indent += 1;
        let mut first = true;
        if let Some(class) = &bean.class {
            self.out.push_str("class: ");
            self.write_string(class);
            first = false;
        }
        if !bean.active {
            self.attribute_separator(first);
            self.out.push_str("active: false");
            first = false;
        }
        if bean.exportable {
            self.attribute_separator(first);
            self.out.push_str("exportable: true");
        }
        self.indent -= 1;

        if bean.props.is_empty() {
            self.out.push_str(") {}");
        } else {
            self.out.push_str(") {\n");
            self.indent += 1;
            self.write_map(&bean.props)?;
            self.indent -= 1;
            self.write_indent();
            self.out.push('}');
        }
        Ok(())
    }

    fn attribute_separator(&mut self, first: bool) {
        if !first {
            self.out.push_str(",\n");
            self.write_indent();
        }
    }

    fn write_list(&mut self, items: &[Value]) -> Result<()> {
        if items.is_empty() {
            self.out.push_str("[]");
            return Ok(());
        }
        let simple = items
            .iter()
            .all(|item| item.is_number() || matches!(item, Value::Str(_)));
        if simple && items.len() < 6 {
            self.out.push_str("[ ");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.write_value(item)?;
            }
            self.out.push_str(" ]");
        } else {
            self.out.push_str("[\n");
            self.indent += 1;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(",\n");
                }
                self.write_indent();
                self.write_value(item)?;
            }
            self.out.push('\n');
            self.indent -= 1;
            self.write_indent();
            self.out.push(']');
        }
        Ok(())
    }

    fn write_variable(&mut self, variable: &Variable) -> Result<()> {
        if let Some(resolver) = self.resolver {
            let value = variable.resolve(resolver)?;
            return self.write_value(&value);
        }
        match variable {
            Variable::Env { name, default } => self.write_call("env", name, default.as_deref()),
            Variable::Property { name, default } => {
                self.write_call("prop", name, default.as_deref())
            }
            Variable::Composite(composite) => {
                for (i, value) in composite.values.iter().enumerate() {
                    if i > 0 {
                        if let Some(operation) = composite.operations.get(i - 1) {
                            self.out.push(' ');
                            self.out.push(operation.symbol());
                            self.out.push(' ');
                        }
                    }
                    self.write_value(value)?;
                }
            }
        }
        Ok(())
    }

    fn write_call(&mut self, function: &str, name: &str, default: Option<&str>) {
        self.out.push_str(function);
        self.out.push_str("('");
        self.out.push_str(name);
        if let Some(default) = default {
            self.out.push_str("', '");
            self.out.push_str(default);
        }
        self.out.push_str("')");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(map: &ConfigMap) -> String {
        ConfigWriter::new().write(map).unwrap()
    }

    #[test]
    fn flags_then_scalars_then_blocks() {
        let mut map = ConfigMap::new();
        map.insert("zeta".into(), Value::Map(ConfigMap::new()));
        map.insert("alpha".into(), Value::Int(1));
        map.insert("--debug".into(), Value::str("server"));
        map.insert("dataSource".into(), Value::Map(ConfigMap::new()));

        let text = write(&map);
        assert_eq!(
            text,
            "--debug = server\nalpha = 1\ndataSource {}\nzeta {}\n"
        );
    }

    #[test]
    fn restricted_keys_are_quoted() {
        let mut map = ConfigMap::new();
        map.insert("sess-man".into(), Value::Bool(true));
        map.insert("plain".into(), Value::Long(5));
        let text = write(&map);
        assert_eq!(text, "plain = 5L\n'sess-man' = true\n");
    }

    #[test]
    fn bean_attributes() {
        let mut bean = BeanDefinition::new("c2s").with_class("tigase.C2S");
        bean.active = false;
        bean.exportable = true;
        let mut map = ConfigMap::new();
        map.insert("c2s".into(), Value::Bean(bean));

        let text = write(&map);
        assert_eq!(
            text,
            "c2s (class: tigase.C2S,\n    active: false,\n    exportable: true) {}\n"
        );
    }

    #[test]
    fn long_lists_are_multiline() {
        let mut map = ConfigMap::new();
        map.insert(
            "l".into(),
            Value::List((1..=6).map(Value::Int).collect()),
        );
        map.insert("s".into(), Value::str_list(["a", "b"]));
        let text = write(&map);
        assert_eq!(
            text,
            "l = [\n    1,\n    2,\n    3,\n    4,\n    5,\n    6\n]\ns = [ 'a', 'b' ]\n"
        );
    }

    #[test]
    fn numbers() {
        let mut map = ConfigMap::new();
        map.insert("d".into(), Value::Double(2.0));
        map.insert("f".into(), Value::Float(1.5));
        map.insert("n".into(), Value::Null);
        assert_eq!(write(&map), "d = 2.0\nf = 1.5f\nn = null\n");
    }
}
