//! Route template compilation.
//!
//! # Responsibilities
//! - Translate a route template into an anchored, case-insensitive regex
//! - Extract placeholder names in declaration order
//! - Memoize compiled patterns by raw template string
//!
//! # Template Syntax
//! ```text
//! /users/{id}          {id}        → lazy capture of any non-empty text
//! /users/{id@number}   @number     → one or more ASCII digits
//! /tags/{tag@word}     @word       → one or more word characters [0-9A-Za-z_]
//! ```
//!
//! # Design Decisions
//! - Templates are lowercased before compilation; matching is case-insensitive
//!   so captured values keep the request's original case
//! - Backslashes in templates are dropped, every other literal is escaped
//! - The cache never invalidates on its own: a template always compiles to the
//!   same pattern

use std::sync::Arc;

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Upper bound on the compiled program size of a single route pattern.
const MAX_PATTERN_REGEX_SIZE: usize = 1 << 20;

/// Errors raised while compiling a route template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("unclosed placeholder in route template `{template}`")]
    UnclosedPlaceholder { template: String },

    #[error("empty placeholder name in route template `{template}`")]
    EmptyName { template: String },

    #[error("unknown placeholder type `@{kind}` in route template `{template}`")]
    UnknownType { template: String, kind: String },

    #[error("invalid route template `{template}`: {reason}")]
    Regex { template: String, reason: String },
}

/// Placeholder flavours understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Any,
    Number,
    Word,
}

impl Placeholder {
    fn parse(kind: Option<&str>, template: &str) -> Result<Self, PatternError> {
        match kind {
            None => Ok(Placeholder::Any),
            Some("number") => Ok(Placeholder::Number),
            Some("word") => Ok(Placeholder::Word),
            Some(other) => Err(PatternError::UnknownType {
                template: template.to_string(),
                kind: other.to_string(),
            }),
        }
    }

    fn body(self) -> &'static str {
        match self {
            Placeholder::Any => ".+?",
            Placeholder::Number => "[0-9]+",
            Placeholder::Word => "[0-9A-Za-z_]+",
        }
    }
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl CompiledPattern {
    /// Compile a template into a matcher.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let (source, names) = translate(template)?;

        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .size_limit(MAX_PATTERN_REGEX_SIZE)
            .build()
            .map_err(|e| PatternError::Regex {
                template: template.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            names,
        })
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The generated regular expression source.
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    /// Placeholder names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return the named captures in declaration order.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        let values = self
            .names
            .iter()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(values)
    }
}

/// Translate template syntax into regex source plus the placeholder names.
fn translate(template: &str) -> Result<(String, Vec<String>), PatternError> {
    let lowered = template.to_lowercase();
    let mut source = String::with_capacity(lowered.len() * 2 + 2);
    let mut names = Vec::new();
    let mut literal = String::new();

    source.push('^');

    let mut chars = lowered.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {}
            '{' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();

                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return Err(PatternError::UnclosedPlaceholder {
                        template: template.to_string(),
                    });
                }

                let (name, kind) = match inner.split_once('@') {
                    Some((name, kind)) => (name, Some(kind)),
                    None => (inner.as_str(), None),
                };
                if name.is_empty() {
                    return Err(PatternError::EmptyName {
                        template: template.to_string(),
                    });
                }
                let placeholder = Placeholder::parse(kind, template)?;

                source.push_str("(?P<");
                source.push_str(name);
                source.push('>');
                source.push_str(placeholder.body());
                source.push(')');
                names.push(name.to_string());
            }
            other => literal.push(other),
        }
    }

    source.push_str(&regex::escape(&literal));
    source.push('$');

    Ok((source, names))
}

/// Concurrent memo of compiled patterns keyed by raw template.
#[derive(Debug, Default)]
pub struct PatternCache {
    inner: DashMap<String, Arc<CompiledPattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached pattern for `template`, compiling it on first use.
    pub fn get_or_compile(&self, template: &str) -> Result<Arc<CompiledPattern>, PatternError> {
        if let Some(hit) = self.inner.get(template) {
            return Ok(hit.value().clone());
        }

        let compiled = Arc::new(CompiledPattern::compile(template)?);
        tracing::trace!(template, regex = compiled.as_regex(), "Compiled route pattern");

        // A racing compile of the same template yields an identical pattern,
        // so whichever insert lands first is kept.
        let entry = self
            .inner
            .entry(template.to_string())
            .or_insert(compiled);
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_template() {
        let p = CompiledPattern::compile("/about.html").unwrap();
        assert_eq!(p.as_regex(), r"^/about\.html$");
        assert!(p.is_match("/about.html"));
        assert!(!p.is_match("/aboutxhtml"));
        assert!(!p.is_match("/about.html/more"));
    }

    #[test]
    fn test_any_placeholder_is_lazy_and_spans_segments() {
        let p = CompiledPattern::compile("/users/{id}").unwrap();
        assert_eq!(
            p.captures("/users/42"),
            Some(vec![("id".to_string(), "42".to_string())])
        );
        // Anchored lazy capture still extends to the end when nothing follows.
        assert_eq!(
            p.captures("/users/7/edit"),
            Some(vec![("id".to_string(), "7/edit".to_string())])
        );
        assert!(p.captures("/users/").is_none());
    }

    #[test]
    fn test_number_placeholder() {
        let p = CompiledPattern::compile("/users/{id@number}").unwrap();
        assert!(p.is_match("/users/42"));
        assert!(!p.is_match("/users/abc"));
        assert!(!p.is_match("/users/4a"));
    }

    #[test]
    fn test_word_placeholder() {
        let p = CompiledPattern::compile("/tags/{tag@word}").unwrap();
        assert!(p.is_match("/tags/foo_bar"));
        assert!(!p.is_match("/tags/foo/bar"));
        assert!(!p.is_match("/tags/foo-bar"));
    }

    #[test]
    fn test_case_insensitive_and_names_lowercased() {
        let p = CompiledPattern::compile("/Users/{ID}").unwrap();
        assert_eq!(p.names(), &["id".to_string()]);
        assert_eq!(
            p.captures("/USERS/Bob"),
            Some(vec![("id".to_string(), "Bob".to_string())])
        );
    }

    #[test]
    fn test_multiple_placeholders_keep_order() {
        let p = CompiledPattern::compile("/{module}/{controller}/{action}").unwrap();
        let caps = p.captures("/blog/post/view").unwrap();
        let names: Vec<_> = caps.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["module", "controller", "action"]);
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        let p = CompiledPattern::compile("/a+b/{x}").unwrap();
        assert!(p.is_match("/a+b/1"));
        assert!(!p.is_match("/aab/1"));
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            CompiledPattern::compile("/users/{id"),
            Err(PatternError::UnclosedPlaceholder { .. })
        ));
        assert!(matches!(
            CompiledPattern::compile("/users/{}"),
            Err(PatternError::EmptyName { .. })
        ));
        assert!(matches!(
            CompiledPattern::compile("/users/{id@uuid}"),
            Err(PatternError::UnknownType { .. })
        ));
        assert!(matches!(
            CompiledPattern::compile("/{a}/{a}"),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn test_cache_is_transparent() {
        let cache = PatternCache::new();
        let first = cache.get_or_compile("/users/{id@number}").unwrap();
        let second = cache.get_or_compile("/users/{id@number}").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        for path in ["/users/1", "/users/x", "/users/12/3"] {
            assert_eq!(first.captures(path), second.captures(path));
        }

        cache.clear();
        assert!(cache.is_empty());
        let third = cache.get_or_compile("/users/{id@number}").unwrap();
        assert_eq!(third.as_regex(), first.as_regex());
    }
}
