//! Route registration and the immutable route index.
//!
//! # Responsibilities
//! - Collect route rules per HTTP method plus a wildcard (ANY) bucket
//! - Normalize templates to a canonical leading-slash form
//! - Compile every template once and freeze the result
//!
//! # Design Decisions
//! - Registration order is match order; no specificity sorting
//! - Re-registering a template in the same bucket replaces its target but
//!   keeps its original position
//! - `GET` registrations implicitly register `HEAD`
//! - The built table is read-only and shared via `Arc`

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::routing::pattern::{CompiledPattern, PatternCache, PatternError};
use crate::routing::target::{route, Params, RouteMatch, Target};

/// Template of the convention route.
pub const CONVENTION_TEMPLATE: &str = "/{module}/{controller}/{action}";

/// Normalize a template or path to `'/' + trim(value, '/')`.
pub fn normalize_path(value: &str) -> String {
    format!("/{}", value.trim_matches('/'))
}

/// Which index bucket a rule lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    Method(Method),
    Any,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Method(m) => write!(f, "{}", m),
            Bucket::Any => write!(f, "ANY"),
        }
    }
}

/// A compiled (bucket, template, target) rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub template: String,
    pub target: Target,
    pattern: Arc<CompiledPattern>,
}

impl RouteRule {
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Try this rule against a normalized path.
    fn try_match(&self, bucket: &Bucket, path: &str) -> Option<RouteMatch> {
        let captures = self.pattern.captures(path)?;
        let target = self
            .target
            .bind(captures.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        Some(RouteMatch {
            method: match bucket {
                Bucket::Method(m) => Some(m.clone()),
                Bucket::Any => None,
            },
            template: self.template.clone(),
            path: path.to_string(),
            target,
            captures: captures.into_iter().collect::<Params>(),
        })
    }
}

/// Mutable collection of rules prior to compilation.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    buckets: Vec<(Bucket, Vec<(String, Target)>)>,
    convention_route: bool,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target` for `template` under `method`.
    pub fn register(&mut self, method: Method, template: &str, target: Target) -> &mut Self {
        if method == Method::GET {
            self.insert(Bucket::Method(Method::HEAD), template, target.clone());
        }
        self.insert(Bucket::Method(method), template, target);
        self
    }

    pub fn get(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::GET, template, target)
    }

    pub fn post(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::POST, template, target)
    }

    pub fn put(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::PUT, template, target)
    }

    pub fn patch(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::PATCH, template, target)
    }

    pub fn delete(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::DELETE, template, target)
    }

    pub fn options(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::OPTIONS, template, target)
    }

    pub fn head(&mut self, template: &str, target: Target) -> &mut Self {
        self.register(Method::HEAD, template, target)
    }

    /// Register for both `GET` (and so `HEAD`) and `POST`.
    pub fn get_or_post(&mut self, template: &str, target: Target) -> &mut Self {
        self.get(template, target.clone()).post(template, target)
    }

    /// Register in the wildcard bucket, consulted after method buckets.
    pub fn any(&mut self, template: &str, target: Target) -> &mut Self {
        self.insert(Bucket::Any, template, target);
        self
    }

    /// Append the `/{module}/{controller}/{action}` fallback on build.
    pub fn convention_route(&mut self, enabled: bool) -> &mut Self {
        self.convention_route = enabled;
        self
    }

    fn insert(&mut self, bucket: Bucket, template: &str, target: Target) {
        let template = normalize_path(template);
        let rules = match self.buckets.iter_mut().position(|(b, _)| *b == bucket) {
            Some(idx) => &mut self.buckets[idx].1,
            None => {
                self.buckets.push((bucket, Vec::new()));
                let last = self.buckets.len() - 1;
                &mut self.buckets[last].1
            }
        };

        match rules.iter_mut().find(|(t, _)| *t == template) {
            Some(existing) => existing.1 = target,
            None => rules.push((template, target)),
        }
    }

    /// Compile every rule and freeze the table.
    pub fn build(&self) -> Result<RouteTable, PatternError> {
        self.build_with_cache(Arc::new(PatternCache::new()))
    }

    /// Compile using a shared pattern cache.
    pub fn build_with_cache(&self, cache: Arc<PatternCache>) -> Result<RouteTable, PatternError> {
        let mut by_method: HashMap<Method, Vec<RouteRule>> = HashMap::new();
        let mut any = Vec::new();

        for (bucket, rules) in &self.buckets {
            let mut compiled = Vec::with_capacity(rules.len());
            for (template, target) in rules {
                compiled.push(RouteRule {
                    template: template.clone(),
                    target: target.clone(),
                    pattern: cache.get_or_compile(template)?,
                });
            }
            match bucket {
                Bucket::Method(m) => {
                    by_method.insert(m.clone(), compiled);
                }
                Bucket::Any => any = compiled,
            }
        }

        if self.convention_route && !any.iter().any(|r| r.template == CONVENTION_TEMPLATE) {
            any.push(RouteRule {
                template: CONVENTION_TEMPLATE.to_string(),
                target: route("{module}", "{controller}", "{action}"),
                pattern: cache.get_or_compile(CONVENTION_TEMPLATE)?,
            });
        }

        let table = RouteTable {
            by_method,
            any,
            cache,
        };
        tracing::debug!(rules = table.len(), "Route table built");
        Ok(table)
    }
}

/// Immutable route index.
#[derive(Debug)]
pub struct RouteTable {
    by_method: HashMap<Method, Vec<RouteRule>>,
    any: Vec<RouteRule>,
    cache: Arc<PatternCache>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Find the first rule matching a normalized path.
    ///
    /// The method bucket is tried first, then the ANY bucket.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let method_rules = self
            .by_method
            .get(method)
            .map(|rules| (Bucket::Method(method.clone()), rules.as_slice()));
        let any_rules = Some((Bucket::Any, self.any.as_slice()));

        for (bucket, rules) in method_rules.into_iter().chain(any_rules) {
            for rule in rules {
                tracing::trace!(
                    bucket = %bucket,
                    template = %rule.template,
                    regex = rule.pattern.as_regex(),
                    path,
                    "Trying route"
                );
                if let Some(found) = rule.try_match(&bucket, path) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Rules in the given bucket, in match order.
    pub fn rules(&self, bucket: &Bucket) -> &[RouteRule] {
        match bucket {
            Bucket::Method(m) => self.by_method.get(m).map(Vec::as_slice).unwrap_or(&[]),
            Bucket::Any => &self.any,
        }
    }

    /// Every (bucket, rule) pair; method buckets sorted by name, ANY last.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &RouteRule)> {
        let mut methods: Vec<&Method> = self.by_method.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let by_method = methods.into_iter().flat_map(move |m| {
            self.by_method[m]
                .iter()
                .map(move |rule| (Bucket::Method(m.clone()), rule))
        });
        by_method.chain(self.any.iter().map(|rule| (Bucket::Any, rule)))
    }

    pub fn len(&self) -> usize {
        self.by_method.values().map(Vec::len).sum::<usize>() + self.any.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        &self.cache
    }
}
