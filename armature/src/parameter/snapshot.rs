//! Plain key/value snapshots of parameter values.
//!
//! A snapshot maps descriptors to string values. On disk it is a flat YAML
//! mapping, written in walk order:
//!
//! ```yaml
//! cam:fps: '60'
//! cam:serial:baudrate: '115200'
//! cam:serial:linestyle: Sloppy
//! ```
//!
//! Descriptors may contain wildcards when the file is written by hand
//! (`"*:log": false`). Scalar YAML values of any kind are accepted on load
//! and converted to their string form.
//!
//! The same descriptor/value pairs can also be given inline as
//! `desc=value;desc=value`, see [`Snapshot::parse_overrides`].

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::{Error, Result};

/// Ordered descriptor → value map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, String)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Replaced entries keep their position.
    pub fn insert(&mut self, descriptor: impl Into<String>, value: impl Into<String>) {
        let descriptor = descriptor.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(d, _)| *d == descriptor) {
            Some((_, v)) => *v = value,
            None => self.entries.push((descriptor, value)),
        }
    }

    pub fn get(&self, descriptor: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(d, _)| d == descriptor)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(d, v)| (d.as_str(), v.as_str()))
    }

    /// Append all entries of `other`, which take precedence over ours.
    pub fn merge(&mut self, other: Snapshot) {
        for (descriptor, value) in other.entries {
            self.insert(descriptor, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `desc=value;desc=value`. Empty items are skipped, whitespace
    /// around descriptors is trimmed, values are kept verbatim.
    ///
    /// ```
    /// use armature::parameter::snapshot::Snapshot;
    ///
    /// let s = Snapshot::parse_overrides("cam:fps=60; *:log=false;").unwrap();
    /// assert_eq!(s.get("cam:fps"), Some("60"));
    /// assert_eq!(s.get("*:log"), Some("false"));
    /// ```
    pub fn parse_overrides(s: &str) -> Result<Self> {
        let mut snapshot = Self::new();
        for item in s.split(';').filter(|item| !item.trim().is_empty()) {
            let (descriptor, value) = item.split_once('=').ok_or_else(|| {
                Error::Snapshot(format!("override [{}] is not of the form desc=value", item.trim()))
            })?;
            let descriptor = descriptor.trim();
            if descriptor.is_empty() {
                return Err(Error::Snapshot(format!(
                    "override [{}] has an empty descriptor",
                    item.trim()
                )));
            }
            snapshot.insert(descriptor, value);
        }
        Ok(snapshot)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let mut mapping = Mapping::new();
        for (descriptor, value) in &self.entries {
            mapping.insert(
                Value::String(descriptor.clone()),
                Value::String(value.clone()),
            );
        }
        serde_yaml::to_string(&mapping)
            .map_err(|e| Error::Snapshot(format!("failed to serialize: {e}")))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Snapshot(format!("failed to parse YAML: {e}")))?;

        let mapping = match doc {
            Value::Mapping(mapping) => mapping,
            // An empty file parses as null
            Value::Null => return Ok(Self::new()),
            _ => return Err(Error::Snapshot("YAML root must be a mapping".to_string())),
        };

        let mut snapshot = Self::new();
        for (key, value) in mapping {
            let descriptor = key
                .as_str()
                .ok_or_else(|| Error::Snapshot(format!("key {key:?} is not a string")))?;
            let value = scalar_to_string(&value).ok_or_else(|| {
                Error::Snapshot(format!("value for [{descriptor}] must be a scalar"))
            })?;
            snapshot.insert(descriptor, value);
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?).map_err(|e| {
            Error::Snapshot(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Snapshot(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (descriptor, value) in iter {
            snapshot.insert(descriptor, value);
        }
        snapshot
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
