//! tdsl reader
//!
//! Single pass, character at a time. Nesting is tracked with an explicit
//! stack of frames: the frame being filled is `current`, the enclosing ones
//! live in `parents`. Every frame accumulates raw text, an optional pending
//! key, an optional completed value and an optional composite expression.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::value::{BeanDefinition, ConfigMap, Value};
use crate::variable::{CompositeVariable, Operation, Variable};

/// Parse tdsl source text into a configuration tree.
pub fn read(text: &str) -> Result<ConfigMap> {
    Parser::new().process(text)
}

/// Read and parse a tdsl file.
pub fn read_file(path: impl AsRef<Path>) -> Result<ConfigMap> {
    let text = std::fs::read_to_string(path.as_ref())?;
    trace!(path = %path.as_ref().display(), "reading configuration file");
    read(&text)
}

/// Decode an unquoted scalar.
///
/// Floating point literals become doubles unless suffixed with `f`/`F`,
/// integer literals become ints unless suffixed with `l`/`L`, `true`,
/// `false` and `null` are keywords and anything else is returned as is.
pub fn decode_value(input: &str) -> Value {
    static DOUBLE_RE: OnceLock<Regex> = OnceLock::new();
    static INTEGER_RE: OnceLock<Regex> = OnceLock::new();
    let double_re = DOUBLE_RE.get_or_init(|| {
        Regex::new(r"^(-?[0-9]+\.[0-9]+)([dDfF]*)$").expect("double literal regex must compile")
    });
    let integer_re = INTEGER_RE.get_or_init(|| {
        Regex::new(r"^(-?[0-9]+)([lL]*)$").expect("integer literal regex must compile")
    });

    let trimmed = input.trim();

    if let Some(caps) = double_re.captures(trimmed) {
        let number = &caps[1];
        let parsed = match &caps[2] {
            "" | "d" | "D" => number.parse::<f64>().ok().map(Value::Double),
            _ => number.parse::<f32>().ok().map(Value::Float),
        };
        if let Some(value) = parsed {
            return value;
        }
    }

    if let Some(caps) = integer_re.captures(trimmed) {
        let number = &caps[1];
        let parsed = match &caps[2] {
            "l" | "L" => number.parse::<i64>().ok().map(Value::Long),
            _ => number.parse::<i32>().ok().map(Value::Int),
        };
        if let Some(value) = parsed {
            return value;
        }
    }

    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::Str(input.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Map,
    List,
    Quote,
    Comment,
    Bean,
    Environment,
    Property,
}

impl State {
    fn as_str(&self) -> &'static str {
        match self {
            State::Map => "MAP",
            State::List => "LIST",
            State::Quote => "QUOTE",
            State::Comment => "COMMENT",
            State::Bean => "BEAN",
            State::Environment => "ENVIRONMENT",
            State::Property => "PROPERTY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableKind {
    Env,
    Property,
}

#[derive(Debug)]
enum FrameKind {
    Map {
        map: ConfigMap,
        template: Option<BeanDefinition>,
    },
    List(Vec<Value>),
    Quote(char),
    Comment,
    Bean(BeanDefinition),
    Variable {
        kind: VariableKind,
        name: Option<String>,
        default: Option<String>,
    },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    key: Option<String>,
    value: Option<Value>,
    text: String,
    composite: Option<CompositeVariable>,
}

type StepResult = std::result::Result<(), String>;

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            key: None,
            value: None,
            text: String::new(),
            composite: None,
        }
    }

    fn state(&self) -> State {
        match &self.kind {
            FrameKind::Map { .. } => State::Map,
            FrameKind::List(_) => State::List,
            FrameKind::Quote(_) => State::Quote,
            FrameKind::Comment => State::Comment,
            FrameKind::Bean(_) => State::Bean,
            FrameKind::Variable {
                kind: VariableKind::Env,
                ..
            } => State::Environment,
            FrameKind::Variable {
                kind: VariableKind::Property,
                ..
            } => State::Property,
        }
    }

    /// Completed value, or the decoded raw text.
    fn take_scalar(&mut self) -> Value {
        match self.value.take() {
            Some(value) => value,
            None => decode_value(self.text.trim()),
        }
    }

    /// Like [`Frame::take_scalar`] but blank text yields nothing.
    fn take_item(&mut self) -> Option<Value> {
        match self.value.take() {
            Some(value) => Some(value),
            None => {
                let text = self.text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(decode_value(text))
                }
            }
        }
    }

    /// Close a pending composite with the current operand.
    fn finish_composite(&mut self) {
        if matches!(self.kind, FrameKind::Variable { .. }) {
            return;
        }
        if let Some(mut composite) = self.composite.take() {
            let last = self.take_scalar();
            composite.finish(last);
            self.value = Some(Value::Variable(Variable::Composite(composite)));
            self.text.clear();
        }
    }

    fn set_bean_field(&mut self) -> StepResult {
        let value = self.take_scalar();
        let key = match self.key.take() {
            Some(key) if !key.is_empty() => key,
            _ => return Ok(()),
        };
        let FrameKind::Bean(bean) = &mut self.kind else {
            return Ok(());
        };
        match key.as_str() {
            "class" => bean.class = value.as_string(),
            "active" => bean.active = bean_flag(&key, &value)?,
            "exportable" => bean.exportable = bean_flag(&key, &value)?,
            _ => {
                return Err(format!(
                    "Error in configuration file - unknown bean definition field: {}",
                    key
                ))
            }
        }
        Ok(())
    }

    fn set_variable_argument(&mut self) {
        let argument = match self.value.take() {
            Some(Value::Str(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
            None => self.text.trim().to_string(),
        };
        if let FrameKind::Variable { name, default, .. } = &mut self.kind {
            if argument.is_empty() {
                return;
            }
            if name.is_none() {
                *name = Some(argument);
            } else {
                *default = Some(argument);
            }
        }
    }

    fn reset(&mut self) {
        self.key = None;
        self.value = None;
        self.text.clear();
    }
}

fn bean_flag(key: &str, value: &Value) -> std::result::Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Str(s) if s.trim() == "true" => Ok(true),
        Value::Str(s) if s.trim() == "false" => Ok(false),
        other => Err(format!(
            "Invalid value of bean definition field {}: {}",
            key, other
        )),
    }
}

struct Parser {
    current: Frame,
    parents: Vec<Frame>,
    line: usize,
    position: usize,
    line_content: String,
}

impl Parser {
    fn new() -> Self {
        Self {
            current: Frame::new(FrameKind::Map {
                map: ConfigMap::new(),
                template: None,
            }),
            parents: Vec::new(),
            line: 1,
            position: 0,
            line_content: String::new(),
        }
    }

    fn process(mut self, text: &str) -> Result<ConfigMap> {
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\n' {
                self.line_content.clear();
            } else {
                self.line_content.push(c);
            }
            self.position += 1;

            if let Err(message) = self.step(c) {
                // report the whole offending line
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        break;
                    }
                    self.line_content.push(rest);
                }
                return Err(Error::Syntax {
                    message,
                    line: self.line,
                    position: self.position,
                    line_content: self.line_content,
                });
            }
        }
        self.finish()
    }

    fn push(&mut self, frame: Frame) {
        let parent = std::mem::replace(&mut self.current, frame);
        self.parents.push(parent);
    }

    fn pop(&mut self) -> std::result::Result<Frame, String> {
        let parent = self
            .parents
            .pop()
            .ok_or_else(|| format!("Unexpected end of {}", self.current.state().as_str()))?;
        Ok(std::mem::replace(&mut self.current, parent))
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.position = 0;
    }

    fn step(&mut self, c: char) -> StepResult {
        match self.current.kind {
            FrameKind::Quote(quote) => {
                if c == quote {
                    let text = std::mem::take(&mut self.current.text);
                    self.pop()?;
                    self.current.value = Some(Value::Str(text));
                } else {
                    self.current.text.push(c);
                }
                if c == '\n' {
                    self.next_line();
                }
                return Ok(());
            }
            FrameKind::Comment => {
                if c != '\n' {
                    return Ok(());
                }
                self.pop()?;
            }
            _ => {}
        }

        match c {
            '#' => self.push(Frame::new(FrameKind::Comment)),
            ':' | '=' => self.close_key(c),
            '[' => self.push(Frame::new(FrameKind::List(Vec::new()))),
            ']' => self.close_list()?,
            '\'' | '"' => self.push(Frame::new(FrameKind::Quote(c))),
            '{' => self.open_map(),
            '}' => self.close_map()?,
            '(' => self.open_call(),
            ')' => self.close_call()?,
            '\n' => {
                self.next_line();
                self.end_field()?;
            }
            ',' => self.end_field()?,
            '+' | '-' | '*' | '/' => self.operator(c)?,
            _ => self.current.text.push(c),
        }
        Ok(())
    }

    fn close_key(&mut self, c: char) {
        let frame = &mut self.current;
        if frame.key.is_some() {
            frame.text.push(c);
            return;
        }
        frame.key = Some(match frame.value.take() {
            Some(Value::Str(s)) => s,
            Some(other) => other.to_string(),
            None => frame.text.trim().to_string(),
        });
        frame.text.clear();
    }

    fn close_list(&mut self) -> StepResult {
        self.current.finish_composite();
        let item = self.current.take_item();
        let FrameKind::List(items) = &mut self.current.kind else {
            return Err("Unexpected ']'".to_string());
        };
        if let Some(item) = item {
            items.push(item);
        }
        let frame = self.pop()?;
        if let FrameKind::List(items) = frame.kind {
            self.current.value = Some(Value::List(items));
        }
        Ok(())
    }

    fn open_map(&mut self) {
        let frame = &mut self.current;
        if frame.key.is_none() {
            frame.key = Some(match &frame.value {
                Some(Value::Str(s)) => s.trim().to_string(),
                _ => frame.text.trim().to_string(),
            });
        }
        frame.text.clear();
        let (map, template) = match frame.value.take() {
            Some(Value::Bean(mut bean)) => (std::mem::take(&mut bean.props), Some(bean)),
            _ => (ConfigMap::new(), None),
        };
        self.push(Frame::new(FrameKind::Map { map, template }));
    }

    fn close_map(&mut self) -> StepResult {
        if self.current.state() != State::Map || self.parents.is_empty() {
            return Err("Unexpected '}'".to_string());
        }
        // entries written on the same line as the closing brace
        self.end_field()?;

        let frame = self.pop()?;
        let FrameKind::Map { mut map, template } = frame.kind else {
            return Err("Unexpected '}'".to_string());
        };
        let value = match template {
            Some(mut bean) => {
                if let Some(class) = map.remove("class") {
                    bean.class = class.as_string();
                }
                if let Some(active) = map.remove("active") {
                    bean.active = active.is_truthy();
                }
                bean.props = map;
                Value::Bean(bean)
            }
            None if map.contains_key("class") || map.contains_key("active") => {
                let name = self.current.key.clone().unwrap_or_default();
                Value::Bean(BeanDefinition::from_map(name, map))
            }
            None => Value::Map(map),
        };
        self.current.value = Some(value);
        Ok(())
    }

    fn open_call(&mut self) {
        let frame = &mut self.current;
        let name = match frame.value.take() {
            Some(Value::Str(s)) => s.trim().to_string(),
            _ => frame.text.trim().to_string(),
        };
        frame.text.clear();
        let kind = match name.as_str() {
            "env" => FrameKind::Variable {
                kind: VariableKind::Env,
                name: None,
                default: None,
            },
            "prop" => FrameKind::Variable {
                kind: VariableKind::Property,
                name: None,
                default: None,
            },
            _ => {
                frame.key = Some(name.clone());
                FrameKind::Bean(BeanDefinition::new(name))
            }
        };
        self.push(Frame::new(kind));
    }

    fn close_call(&mut self) -> StepResult {
        match self.current.state() {
            State::Environment | State::Property => self.current.set_variable_argument(),
            State::Bean => self.current.set_bean_field()?,
            _ => return Err("Unexpected ')'".to_string()),
        }
        let frame = self.pop()?;
        let value = match frame.kind {
            FrameKind::Variable {
                kind,
                name,
                default,
            } => {
                let name = name.unwrap_or_default();
                Value::Variable(match kind {
                    VariableKind::Env => Variable::Env { name, default },
                    VariableKind::Property => Variable::Property { name, default },
                })
            }
            FrameKind::Bean(bean) => Value::Bean(bean),
            _ => return Err("Unexpected ')'".to_string()),
        };
        self.current.value = Some(value);
        Ok(())
    }

    fn end_field(&mut self) -> StepResult {
        let frame = &mut self.current;
        frame.finish_composite();
        match frame.state() {
            State::Map => {
                if let Some(key) = frame.key.take().filter(|k| !k.is_empty()) {
                    let value = frame.take_scalar();
                    if let FrameKind::Map { map, .. } = &mut frame.kind {
                        map.insert(key, value);
                    }
                }
            }
            State::List => {
                if let Some(item) = frame.take_item() {
                    if let FrameKind::List(items) = &mut frame.kind {
                        items.push(item);
                    }
                }
            }
            State::Bean => frame.set_bean_field()?,
            State::Environment | State::Property => frame.set_variable_argument(),
            State::Quote | State::Comment => {}
        }
        frame.reset();
        Ok(())
    }

    fn operator(&mut self, c: char) -> StepResult {
        let Some(operation) = Operation::from_char(c) else {
            self.current.text.push(c);
            return Ok(());
        };
        let frame = &mut self.current;

        let operand = match frame.state() {
            State::List => frame.value.take(),
            _ if frame.key.is_none() => None,
            _ => match frame.value.take() {
                Some(value) => Some(value),
                None => {
                    let text = frame.text.trim();
                    if text.is_empty() {
                        // sign of a numeric literal
                        None
                    } else {
                        match decode_value(text) {
                            Value::Null => None,
                            // unquoted text such as host-name stays literal
                            Value::Str(_) if operation != Operation::Add => None,
                            value => Some(value),
                        }
                    }
                }
            },
        };

        match operand {
            Some(value) => {
                if matches!(value, Value::Str(_)) && operation != Operation::Add {
                    return Err(format!("Cannot {} a String", operation.verb()));
                }
                frame
                    .composite
                    .get_or_insert_with(CompositeVariable::new)
                    .push(value, operation);
                frame.text.clear();
            }
            None => frame.text.push(c),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ConfigMap> {
        // a comment on the last line without a trailing newline
        if self.current.state() == State::Comment {
            self.pop().map_err(Error::InvalidStructure)?;
        }
        if self.current.state() != State::Map || !self.parents.is_empty() {
            return Err(Error::InvalidStructure(
                self.current.state().as_str().to_string(),
            ));
        }

        let mut frame = self.current;
        frame.finish_composite();
        if let Some(key) = frame.key.take().filter(|k| !k.is_empty()) {
            let value = frame.take_scalar();
            if let FrameKind::Map { map, .. } = &mut frame.kind {
                map.insert(key, value);
            }
        }
        match frame.kind {
            FrameKind::Map { map, .. } => Ok(map),
            _ => Err(Error::InvalidStructure(State::Map.as_str().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode_value("42"), Value::Int(42));
        assert_eq!(decode_value("42L"), Value::Long(42));
        assert_eq!(decode_value("42l"), Value::Long(42));
        assert_eq!(decode_value("3.14"), Value::Double(3.14));
        assert_eq!(decode_value("3.14D"), Value::Double(3.14));
        assert_eq!(decode_value("3.14F"), Value::Float(3.14));
        assert_eq!(decode_value("true"), Value::Bool(true));
        assert_eq!(decode_value("false"), Value::Bool(false));
        assert_eq!(decode_value("null"), Value::Null);
        assert_eq!(decode_value("hello"), Value::str("hello"));
        assert_eq!(decode_value("-7"), Value::Int(-7));
        assert_eq!(decode_value(" 12 "), Value::Int(12));
    }

    #[test]
    fn decode_keeps_untrimmed_text() {
        assert_eq!(decode_value(" hello "), Value::str(" hello "));
    }

    #[test]
    fn int_overflow_falls_back_to_string() {
        assert_eq!(decode_value("99999999999"), Value::str("99999999999"));
        assert_eq!(decode_value("99999999999L"), Value::Long(99_999_999_999));
    }

    #[test]
    fn simple_entries() {
        let map = read("a = 1\nb: 'text'\nc = true\n").unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::str("text")));
        assert_eq!(map.get("c"), Some(&Value::Bool(true)));
    }

    #[test]
    fn last_entry_without_newline() {
        let map = read("a = 5").unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(5)));
    }

    #[test]
    fn comments_are_skipped() {
        let map = read("# header\na = 1 # trailing\n# tail").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn equals_inside_value_is_literal() {
        let map = read("'uri' = 'jdbc:x?a=b'\nraw = a=b\n").unwrap();
        assert_eq!(map.get("uri"), Some(&Value::str("jdbc:x?a=b")));
        assert_eq!(map.get("raw"), Some(&Value::str("a=b")));
    }

    #[test]
    fn unexpected_closing_brace() {
        let err = read("a = 1\n}\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn unterminated_list() {
        let err = read("a = [ 1, 2").unwrap_err();
        assert!(matches!(err, Error::InvalidStructure(ref s) if s == "LIST"));
    }

    #[test]
    fn negative_numbers() {
        let map = read("a = -5\nb = [ -1, 2 ]\nc = -2.5\n").unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(-5)));
        assert_eq!(
            map.get("b"),
            Some(&Value::List(vec![Value::Int(-1), Value::Int(2)]))
        );
        assert_eq!(map.get("c"), Some(&Value::Double(-2.5)));
    }
}
