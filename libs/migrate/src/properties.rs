//! Legacy property files
//!
//! Files use the classic `key=value` syntax. Keys starting with `-` (and
//! `config-type`) are command line style flags and are collected as plain
//! strings, every other line becomes a `key=value` setting which may carry a
//! type suffix such as `name[I]=5` or `hosts[s]=a,b`.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tconf_dsl::{ConfigMap, Value};
use tracing::{debug, trace};

use crate::error::{Error, Result};

pub const GEN_CONFIG: &str = "--gen-config";
pub const GEN_CONFIG_DEF: &str = "--gen-config-default";
pub const GEN_TEST: &str = "--test";
pub const PROPERTY_FILENAME_PROP_KEY: &str = "--property-file";
pub const PROPERTY_FILENAME_PROP_DEF: &str = "etc/init.properties";
pub const CONFIG_FILE_PROP_KEY: &str = "--config-file";
pub const CONFIG_FILE_PROP_DEF: &str = "etc/config.tdsl";

/// `yes`, `true`, `on` (any case) and `1` are true, everything else false.
pub fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("on")
        || value == "1"
}

/// Parse command line arguments into the flag map.
///
/// `--gen-config*` selects the config type, `--test` is a switch and every
/// other `-x` argument takes the next argument as its value.
pub fn parse_args(props: &mut ConfigMap, args: &[String]) {
    props.insert(GEN_TEST.to_string(), Value::Bool(false));
    props.insert("config-type".to_string(), Value::str(GEN_CONFIG_DEF));

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with(GEN_CONFIG) {
            props.insert("config-type".to_string(), Value::str(arg.as_str()));
        } else if arg.starts_with(GEN_TEST) {
            props.insert(arg.clone(), Value::Bool(true));
        } else if arg.starts_with('-') {
            match iter.next() {
                Some(value) => {
                    debug!(key = %arg, value = %value, "setting default");
                    props.insert(arg.clone(), Value::str(value.as_str()));
                }
                None => debug!(key = %arg, "argument without value ignored"),
            }
        }
    }
}

/// Read a property file, splitting its entries between flags and settings.
pub fn load_properties_file(
    path: impl AsRef<Path>,
    props: &mut ConfigMap,
    settings: &mut Vec<String>,
) -> Result<()> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "loading initial properties from property file");

    for (key, value) in parse_properties(&text) {
        let key = key.trim().to_string();
        let value = value.trim();
        if key.starts_with('-') || key == "config-type" {
            let value = if key.eq_ignore_ascii_case(GEN_TEST) {
                Value::Bool(parse_bool(value))
            } else {
                Value::str(value)
            };
            trace!(key = %key, value = %value, "added default config parameter");
            props.insert(key, value);
        } else {
            settings.push(format!("{}={}", key, value));
        }
    }
    Ok(())
}

fn type_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*)\[([LISBlisbFDfd])\]$").expect("type suffix regex must compile")
    })
}

/// Store `key=value` settings in `props`, decoding typed keys.
pub fn load_from_property_strings(props: &mut ConfigMap, settings: &[String]) -> Result<()> {
    for setting in settings {
        let Some((key, value)) = setting.split_once('=') else {
            debug!(setting = %setting, "setting without value ignored");
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match type_suffix_re().captures(key) {
            Some(caps) => {
                let type_id = caps[2].chars().next().unwrap_or('S');
                let decoded = decode_value_type(type_id, value)
                    .map_err(|e| Error::Conversion(format!("{}: {}", key, e)))?;
                props.insert(caps[1].to_string(), decoded);
            }
            None => {
                props.insert(key.to_string(), Value::str(value));
            }
        }
    }
    Ok(())
}

/// Decode a value according to its legacy type letter.
pub fn decode_value_type(type_id: char, value: &str) -> Result<Value> {
    let trimmed = value.trim();
    let items = || value.split(',').map(str::trim);
    let value = match type_id {
        'L' => Value::Long(decode_long(trimmed)?),
        'I' => Value::Int(decode_int(trimmed)?),
        'B' => Value::Bool(parse_bool(trimmed)),
        'F' => Value::Float(parse_number(trimmed)?),
        'D' => Value::Double(parse_number(trimmed)?),
        's' => Value::str_list(items()),
        'l' => Value::List(
            items()
                .map(|s| parse_number(s).map(Value::Long))
                .collect::<Result<_>>()?,
        ),
        'i' => Value::List(
            items()
                .map(|s| parse_number(s).map(Value::Int))
                .collect::<Result<_>>()?,
        ),
        'b' => Value::List(items().map(|s| Value::Bool(parse_bool(s))).collect()),
        'f' => Value::List(
            items()
                .map(|s| parse_number(s).map(Value::Float))
                .collect::<Result<_>>()?,
        ),
        'd' => Value::List(
            items()
                .map(|s| parse_number(s).map(Value::Double))
                .collect::<Result<_>>()?,
        ),
        _ => Value::str(trimmed),
    };
    Ok(value)
}

/// Legacy type letter of a value, the inverse of [`decode_value_type`].
///
/// Lists take the letter of their first element; empty and mixed lists are
/// string lists.
pub fn type_id(value: &Value) -> char {
    match value {
        Value::Long(_) => 'L',
        Value::Int(_) => 'I',
        Value::Bool(_) => 'B',
        Value::Float(_) => 'F',
        Value::Double(_) => 'D',
        Value::List(items) => {
            let letter = match items.first() {
                Some(Value::Long(_)) => 'l',
                Some(Value::Int(_)) => 'i',
                Some(Value::Bool(_)) => 'b',
                Some(Value::Float(_)) => 'f',
                Some(Value::Double(_)) => 'd',
                _ => return 's',
            };
            let upper = letter.to_ascii_uppercase();
            if items.iter().all(|item| type_id(item) == upper) {
                letter
            } else {
                's'
            }
        }
        _ => 'S',
    }
}

/// Text form matching [`type_id`]; list items are joined with commas.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::List(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Result<T> {
    text.parse()
        .map_err(|_| Error::Conversion(format!("invalid number '{}'", text)))
}

/// Decimal, hexadecimal (`0x`, `#`) and octal (leading `0`) integers.
fn decode_long(text: &str) -> Result<i64> {
    let invalid = || Error::Conversion(format!("invalid number '{}'", text));
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .or_else(|| digits.strip_prefix('#'))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return Err(invalid());
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn decode_int(text: &str) -> Result<i32> {
    i32::try_from(decode_long(text)?)
        .map_err(|_| Error::Conversion(format!("number '{}' out of range", text)))
}

/// Parse property file text into ordered key/value pairs.
///
/// Supports `#`/`!` comments, `=`, `:` or whitespace separators, backslash
/// line continuations and the usual escapes including `\uXXXX`.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let line = trim_leading(line);
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = String::new();
        let mut current = line;
        loop {
            if !ends_with_continuation(current) {
                logical.push_str(current);
                break;
            }
            logical.push_str(&current[..current.len() - 1]);
            match lines.next() {
                Some(next) => current = trim_leading(next),
                None => break,
            }
        }

        entries.push(split_entry(&logical));
    }
    entries
}

fn trim_leading(line: &str) -> &str {
    line.trim_start_matches([' ', '\t', '\u{c}'])
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = trim_leading(&line[key_end..]);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = trim_leading(stripped);
    }
    (unescape(key), unescape(rest))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
