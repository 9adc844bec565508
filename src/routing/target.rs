//! Route targets and per-dispatch match results.
//!
//! A [`Target`] registered with a route is an immutable template. Binding the
//! captures of a successful match produces a fresh [`Target`] inside a
//! [`RouteMatch`]; the registered template is never touched, so a single
//! table can serve any number of concurrent dispatches.

use std::fmt;

use axum::http::Method;
use serde::Serialize;

/// Capture names that select the target instead of becoming parameters.
const SELECTOR_FIELDS: [&str; 3] = ["module", "controller", "action"];

/// Ordered key/value parameters.
///
/// Keys are unique; inserting an existing key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values in insertion order, as passed to actions.
    pub fn positional(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, v)| v.as_str()).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// The module/controller/action bundle a route resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Target {
    pub module: String,
    pub controller: String,
    pub action: String,
    pub params: Params,
}

/// Shorthand for building a route [`Target`].
pub fn route(
    module: impl Into<String>,
    controller: impl Into<String>,
    action: impl Into<String>,
) -> Target {
    Target::new(module, controller, action)
}

impl Target {
    pub fn new(
        module: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            controller: controller.into(),
            action: action.into(),
            params: Params::new(),
        }
    }

    /// Attach a fixed parameter to the template.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Produce the bound target for a set of named captures.
    ///
    /// Selector fields whose text is exactly `{name}` take the captured value
    /// of `name`. Captures other than `module`, `controller` and `action` are
    /// recorded as parameters.
    pub fn bind<'a, I>(&self, captures: I) -> Target
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut bound = self.clone();
        for (name, value) in captures {
            let token = format!("{{{}}}", name);
            for field in [&mut bound.module, &mut bound.controller, &mut bound.action] {
                if *field == token {
                    *field = value.to_string();
                }
            }
            if !SELECTOR_FIELDS.contains(&name) {
                bound.params.insert(name, value);
            }
        }
        bound
    }

    /// True while any selector field is still an unresolved `{placeholder}`.
    pub fn has_placeholders(&self) -> bool {
        [&self.module, &self.controller, &self.action]
            .iter()
            .any(|f| f.starts_with('{') && f.ends_with('}'))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.module, self.controller, self.action)
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Bucket the rule was found in; `None` for the ANY bucket.
    pub method: Option<Method>,
    /// Normalized template of the matched rule.
    pub template: String,
    /// Normalized request path that was matched.
    pub path: String,
    /// The bound target.
    pub target: Target,
    /// All named captures, including selector captures.
    pub captures: Params,
}

impl RouteMatch {
    /// Positional action arguments.
    pub fn params(&self) -> &Params {
        &self.target.params
    }
}
