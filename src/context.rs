//! Read-only compilation context: configuration plus the reference registry.
//!
//! Passed by shared reference to every operation; nothing in here is mutated
//! once compilation starts.

use std::collections::HashSet;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ir::Schema;

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct Config {
    /// Bound on schema nesting accepted by lowering and on reference chains.
    pub max_depth: usize,
    /// Sort output branches by their serialized form.
    pub canonical_order: bool,
    /// Drop output branches subsumed by another branch.
    pub prune_subsumed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            canonical_order: false,
            prune_subsumed: false,
        }
    }
}

/// Named schemas a `Schema::Ref` may point at.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    components: IndexMap<String, Schema>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        self.components.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.components.get(name)
    }

    pub fn len(&self) -> usize { self.components.len() }
    pub fn is_empty(&self) -> bool { self.components.is_empty() }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config: Config,
    pub registry: Registry,
}

impl Context {
    pub fn new(config: Config, registry: Registry) -> Self {
        Self { config, registry }
    }

    /// Look a reference up by name.
    pub fn retrieve_reference(&self, name: &str) -> Result<&Schema> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::UnknownReference(name.to_string()))
    }

    /// Follow `Ref` chains until a concrete schema is reached.
    ///
    /// A reference seen twice in the same chain is returned as-is (opaque),
    /// and so is anything past `max_depth` hops.
    pub fn resolve<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema> {
        let mut visited = HashSet::new();
        let mut current = schema;
        while let Schema::Ref(name) = current {
            if !visited.insert(name.as_str()) || visited.len() > self.config.max_depth {
                tracing::debug!(reference = %name, "reference cycle, treating as opaque");
                return Ok(current);
            }
            current = self.retrieve_reference(name)?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_follows_chains() {
        let mut reg = Registry::new();
        reg.insert("A", Schema::Ref("B".into()));
        reg.insert("B", Schema::string());
        let ctx = Context::new(Config::default(), reg);
        assert_eq!(ctx.resolve(&Schema::Ref("A".into())).unwrap(), &Schema::string());
    }

    #[test]
    fn resolve_stops_on_cycles() {
        let mut reg = Registry::new();
        reg.insert("A", Schema::Ref("B".into()));
        reg.insert("B", Schema::Ref("A".into()));
        let ctx = Context::new(Config::default(), reg);
        let r = Schema::Ref("A".into());
        let out = ctx.resolve(&r).unwrap();
        assert!(matches!(out, Schema::Ref(_)));
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let ctx = Context::default();
        let err = ctx.resolve(&Schema::Ref("Nope".into())).unwrap_err();
        assert!(matches!(err, Error::UnknownReference(n) if n == "Nope"));
    }

    #[test]
    fn config_defaults_fill_missing_keys() {
        let cfg: Config = serde_json::from_value(serde_json::json!({ "canonical_order": true })).unwrap();
        assert!(cfg.canonical_order);
        assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);
    }
}
