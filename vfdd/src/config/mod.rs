/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Daemon configuration loading and typed key lookup.
//!
//! The expected YAML structure is:
//! ```yaml
//! tasks: [display, clock, temp]
//! display:
//!   device: /sys/bus/platform/devices/meson-vfd.14
//!   quantum: 5000
//! clock:
//!   format: "%H%M"
//!   separator.always: 1
//! ```
//!
//! Nested mappings are flattened into dotted keys (`clock.format`,
//! `clock.separator.always`), so every task instance looks up its settings
//! as `"<instance>.<key>"`.  Sequences become space-separated strings.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::error::TaskError;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    /// Task instances to start, either `"display clock"` or `[display, clock]`.
    #[serde(default)]
    tasks: Option<TaskList>,

    /// Every other top-level key: per-instance sections or global scalars.
    #[serde(flatten)]
    sections: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskList {
    Line(String),
    List(Vec<String>),
}

impl TaskList {
    fn into_line(self) -> String {
        match self {
            TaskList::Line(line) => line,
            TaskList::List(items) => items.join(" "),
        }
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

/// Flattened key/value store with per-instance namespacing.
#[derive(Debug, Default, Clone)]
pub struct Config {
    /// Dotted key → raw string value.
    entries: BTreeMap<String, String>,
}

impl Config {
    /// Creates an empty configuration (every lookup returns its default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` into a new `Config`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading config file from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))
    }

    /// Parses YAML text into a new `Config`.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty document deserializes to `null`; treat it as "no keys".
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let file: ConfigFile = serde_yaml::from_str(content)?;
        let mut cfg = Self::new();

        if let Some(tasks) = file.tasks {
            cfg.entries.insert("tasks".to_string(), tasks.into_line());
        }
        for (key, value) in file.sections {
            cfg.flatten_into(key, value);
        }

        for (key, value) in &cfg.entries {
            debug!("  {} = '{}'", key, value);
        }

        Ok(cfg)
    }

    fn flatten_into(&mut self, key: String, value: Value) {
        match value {
            Value::Null => {}
            Value::Mapping(map) => {
                for (sub, value) in map {
                    match scalar_to_string(&sub) {
                        Some(sub) => self.flatten_into(format!("{}.{}", key, sub), value),
                        None => warn!("ignoring non-scalar key under '{}'", key),
                    }
                }
            }
            Value::Sequence(items) => {
                let joined: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
                self.entries.insert(key, joined.join(" "));
            }
            Value::Tagged(tagged) => self.flatten_into(key, tagged.value),
            scalar => {
                if let Some(s) = scalar_to_string(&scalar) {
                    self.entries.insert(key, s);
                }
            }
        }
    }

    /// Inserts or replaces a single dotted key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    fn lookup(&self, instance: Option<&str>, key: &str) -> Option<&str> {
        let full;
        let key = match instance {
            Some(instance) => {
                full = format!("{}.{}", instance, key);
                full.as_str()
            }
            None => key,
        };
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the string value of `<instance>.<key>` (or `<key>` when
    /// `instance` is `None`), falling back to `default`.
    pub fn get_string(&self, instance: Option<&str>, key: &str, default: &str) -> String {
        self.lookup(instance, key).unwrap_or(default).to_string()
    }

    /// Returns the integer value of `<instance>.<key>`, falling back to
    /// `default` when the key is absent or does not parse.
    pub fn get_int(&self, instance: Option<&str>, key: &str, default: i64) -> i64 {
        match self.lookup(instance, key) {
            None => default,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    warn!(
                        "'{}' is not an integer for key '{}', using {}",
                        raw, key, default
                    );
                    default
                }
            },
        }
    }

    /// Returns the two whitespace-separated integers stored under
    /// `<instance>.<key>`.
    ///
    /// # Errors
    /// [`TaskError::ConfigInvalid`] when the key is missing or does not hold
    /// exactly two integers.
    pub fn get_int_pair(&self, instance: &str, key: &str) -> Result<(i64, i64), TaskError> {
        let full = format!("{}.{}", instance, key);
        let raw = self
            .entries
            .get(&full)
            .ok_or_else(|| TaskError::config(&full, "key not found"))?;

        let mut fields = raw.split_whitespace().map(str::parse::<i64>);
        match (fields.next(), fields.next()) {
            (Some(Ok(a)), Some(Ok(b))) => Ok((a, b)),
            _ => Err(TaskError::config(
                &full,
                format!("expected two integers, got '{}'", raw),
            )),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn load_example_yaml() {
        let yaml = r#"
tasks: [display, clock, disk]
display:
  device: /sys/bus/platform/devices/meson-vfd.14
  quantum: 5000
clock:
  format: "%H%M"
  separator.always: 1
disk:
  field: 7
"#;
        let f = yaml_tempfile(yaml);
        let cfg = Config::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.get_string(None, "tasks", "clock"), "display clock disk");
        assert_eq!(
            cfg.get_string(Some("display"), "device", ""),
            "/sys/bus/platform/devices/meson-vfd.14"
        );
        assert_eq!(cfg.get_int(Some("display"), "quantum", 1), 5000);
        assert_eq!(cfg.get_string(Some("clock"), "format", ""), "%H%M");
        assert_eq!(cfg.get_int(Some("clock"), "separator.always", 0), 1);
    }

    #[test]
    fn get_int_returns_override_or_default() {
        let with = Config::from_yaml_str("disk:\n  field: 7\n").unwrap();
        assert_eq!(with.get_int(Some("disk"), "field", 4), 7);

        let without = Config::from_yaml_str("clock:\n  format: x\n").unwrap();
        assert_eq!(without.get_int(Some("disk"), "field", 4), 4);
    }

    #[test]
    fn tasks_accepts_space_separated_line() {
        let cfg = Config::from_yaml_str("tasks: \"display  clock\"\n").unwrap();
        assert_eq!(cfg.get_string(None, "tasks", ""), "display  clock");
    }

    #[test]
    fn nested_mappings_flatten_to_dotted_keys() {
        let yaml = "clock:\n  separator:\n    always: true\n";
        let cfg = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.get_int(Some("clock"), "separator.always", 0), 1);
    }

    #[test]
    fn instance_with_suffix_is_its_own_namespace() {
        let yaml = "temp/cpu:\n  divider: 100\ntemp:\n  divider: 1000\n";
        let cfg = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.get_int(Some("temp/cpu"), "divider", 1), 100);
        assert_eq!(cfg.get_int(Some("temp"), "divider", 1), 1000);
    }

    #[test]
    fn unparsable_int_falls_back_to_default() {
        let cfg = Config::from_yaml_str("display:\n  quantum: soon\n").unwrap();
        assert_eq!(cfg.get_int(Some("display"), "quantum", 5000), 5000);
    }

    #[test]
    fn get_int_pair_parses_two_integers() {
        let cfg = Config::from_yaml_str("clock:\n  blink: \"250 500\"\n").unwrap();
        assert_eq!(cfg.get_int_pair("clock", "blink").unwrap(), (250, 500));
    }

    #[test]
    fn get_int_pair_accepts_yaml_sequence() {
        let cfg = Config::from_yaml_str("clock:\n  blink: [250, 500]\n").unwrap();
        assert_eq!(cfg.get_int_pair("clock", "blink").unwrap(), (250, 500));
    }

    #[test]
    fn get_int_pair_missing_and_malformed_are_errors() {
        let cfg = Config::from_yaml_str("clock:\n  blink: \"250\"\n").unwrap();
        assert!(matches!(
            cfg.get_int_pair("clock", "blink"),
            Err(TaskError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            cfg.get_int_pair("clock", "nope"),
            Err(TaskError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let f = yaml_tempfile("");
        let cfg = Config::load_from_file(f.path()).unwrap();
        assert_eq!(cfg.get_string(None, "tasks", "clock"), "clock");
    }

    #[test]
    fn missing_file_returns_error() {
        let result = Config::load_from_file(Path::new("/nonexistent/path/vfdd.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(Config::load_from_file(f.path()).is_err());
    }
}
