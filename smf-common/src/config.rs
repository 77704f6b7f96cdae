//! Hand-rolled configuration document parser.
//!
//! Deliberately not a JSON loader (that stays a Non-goal) and not a CLI flag
//! parser (also a Non-goal) — just a small indented `key = value` document
//! format with `[section]` tables and `[[section]]` array-of-tables,
//! in the spirit of the teacher's own flat `.conf` parser
//! (`redis_node::config::config_parser`), generalized to the nested option
//! set §6 actually needs (`cluster[]`, `ipt[]`, `server`, `hardware`, …).
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// One `[section]` or one element of a `[[section]]` array: a flat map of
/// keys to scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table(BTreeMap<String, Value>);

#[derive(Debug)]
pub enum ConfigError {
    Syntax { line: usize, message: String },
    MissingKey(String),
    WrongType(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax { line, message } => {
                write!(f, "syntax error at line {line}: {message}")
            }
            ConfigError::MissingKey(k) => write!(f, "missing required key: {k}"),
            ConfigError::WrongType(k) => write!(f, "wrong type for key: {k}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Table {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?
            .as_str()
            .ok_or_else(|| ConfigError::WrongType(key.to_string()))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?
            .as_int()
            .ok_or_else(|| ConfigError::WrongType(key.to_string()))
    }

    pub fn get_int_opt(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

/// A parsed configuration document: a root table, any number of named
/// singleton sub-tables (`server`, `hardware`, …), and any number of named
/// array-of-tables (`cluster`, `ipt`).
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub root: Table,
    pub sections: BTreeMap<String, Table>,
    pub arrays: BTreeMap<String, Vec<Table>>,
}

impl Document {
    pub fn parse(text: &str) -> Result<Document, ConfigError> {
        let mut doc = Document::default();
        let mut current: Option<(String, bool)> = None; // (name, is_array_element)

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix("[[").and_then(|s| s.strip_suffix("]]")) {
                let name = name.trim().to_string();
                doc.arrays.entry(name.clone()).or_default().push(Table::default());
                current = Some((name, true));
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.trim().to_string();
                doc.sections.entry(name.clone()).or_default();
                current = Some((name, false));
                continue;
            }

            let (key, value) = split_kv(line, line_no)?;
            match &current {
                None => {
                    doc.root.0.insert(key, value);
                }
                Some((name, true)) => {
                    let table = doc
                        .arrays
                        .get_mut(name)
                        .and_then(|v| v.last_mut())
                        .expect("array section pushed above");
                    table.0.insert(key, value);
                }
                Some((name, false)) => {
                    let table = doc.sections.get_mut(name).expect("section inserted above");
                    table.0.insert(key, value);
                }
            }
        }

        Ok(doc)
    }

    pub fn section(&self, name: &str) -> Option<&Table> {
        self.sections.get(name)
    }

    pub fn array(&self, name: &str) -> &[Table] {
        self.arrays.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_kv(line: &str, line_no: usize) -> Result<(String, Value), ConfigError> {
    let eq = line.find('=').ok_or_else(|| ConfigError::Syntax {
        line: line_no,
        message: format!("expected 'key = value', got {line:?}"),
    })?;
    let key = line[..eq].trim().to_string();
    let raw_value = line[eq + 1..].trim();
    Ok((key, parse_value(raw_value)))
}

fn parse_value(raw: &str) -> Value {
    if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Value::Str(inner.to_string());
    }
    if raw == "true" {
        return Value::Bool(true);
    }
    if raw == "false" {
        return Value::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    Value::Str(raw.to_string())
}
