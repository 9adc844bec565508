//! Dotted-path access to configuration values.
//!
//! `ConfigStore` is a loosely typed view of the whole configuration, used by
//! application code that wants `store.get("mail.from")` style lookups for
//! its own tables next to the typed sections.

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::config::schema::AppConfig;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    root: Table,
}

impl ConfigStore {
    pub fn new(root: Table) -> Self {
        Self { root }
    }

    /// Build a store from a typed config, including its extra tables.
    pub fn from_config(config: &AppConfig) -> Result<Self, toml::ser::Error> {
        match Value::try_from(config)? {
            Value::Table(root) => Ok(Self { root }),
            _ => Ok(Self::default()),
        }
    }

    /// Look up a dotted path such as `app.debug`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up and deserialize a dotted path.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path).and_then(|v| v.clone().try_into().ok())
    }

    /// Set a dotted path, creating intermediate tables as needed.
    ///
    /// A non-table value in the middle of the path is replaced by a table.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut table = &mut self.root;
        for segment in segments {
            let entry = table
                .entry(segment.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            let Value::Table(inner) = entry else {
                return;
            };
            table = inner;
        }
        table.insert(last.to_string(), value.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn as_table(&self) -> &Table {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_typed_sections() {
        let store = ConfigStore::from_config(&AppConfig::default()).unwrap();
        assert_eq!(store.get("app.debug"), Some(&Value::Boolean(false)));
        assert_eq!(store.get_as::<u64>("app.slow_request_ms"), Some(50));
        assert!(store.get("app.missing").is_none());
        assert!(store.get("app.debug.deeper").is_none());
    }

    #[test]
    fn test_extra_tables_are_reachable() {
        let config: AppConfig = toml::from_str("[mail]\nfrom = \"a@b.c\"\n").unwrap();
        let store = ConfigStore::from_config(&config).unwrap();
        assert_eq!(store.get_as::<String>("mail.from").as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_set_creates_tables() {
        let mut store = ConfigStore::default();
        store.set("feature.flags.beta", true);
        store.set("feature.name", "x");
        assert_eq!(store.get("feature.flags.beta"), Some(&Value::Boolean(true)));
        assert!(store.contains("feature.name"));

        store.set("feature.name.inner", 3i64);
        assert_eq!(store.get_as::<i64>("feature.name.inner"), Some(3));
    }
}
