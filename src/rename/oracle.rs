//! External-type knowledge.
//!
//! Classes outside the analyzed set (the platform library, third-party jars)
//! still shape renaming: a method overriding an external one must keep its
//! name, and fresh names must not shadow anything an external ancestor makes
//! visible. A [`TypeOracle`] supplies that knowledge; [`OracleCache`] sits in
//! front of it so each external name is asked about at most once per session,
//! misses included.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

/// What is known about one external type, flattened over its ancestry.
#[derive(Debug, Clone, Default)]
pub struct ExternalTypeInfo {
    /// Fully qualified binary name.
    pub name: String,
    /// Fully qualified superclass name, if any.
    pub super_name: Option<String>,
    /// Fully qualified names of directly implemented interfaces.
    pub interfaces: Vec<String>,
    /// Simple names of public/protected methods inherited through the whole
    /// ancestry.
    pub visible_methods: HashSet<String>,
    /// Simple names of public/protected fields inherited through the whole
    /// ancestry.
    pub visible_fields: HashSet<String>,
    /// Simple names of non-public methods declared on this type or an
    /// ancestor.
    pub hidden_methods: HashSet<String>,
    /// Simple names of non-public fields declared on this type or an
    /// ancestor.
    pub hidden_fields: HashSet<String>,
}

impl ExternalTypeInfo {
    /// A type with the given name and no known members.
    #[must_use]
    pub fn new(name: impl Into<String>) -> ExternalTypeInfo {
        ExternalTypeInfo {
            name: name.into(),
            ..ExternalTypeInfo::default()
        }
    }

    /// Set the superclass name.
    #[must_use]
    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// Add visible (public/protected) method names.
    #[must_use]
    pub fn with_visible_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible_methods.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add visible (public/protected) field names.
    #[must_use]
    pub fn with_visible_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible_fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Every member simple name fresh names must keep clear of.
    pub fn all_member_names(&self) -> impl Iterator<Item = &str> {
        self.visible_methods
            .iter()
            .chain(&self.visible_fields)
            .chain(&self.hidden_methods)
            .chain(&self.hidden_fields)
            .map(String::as_str)
    }
}

/// Resolves fully qualified external type names.
///
/// Implementations must be cheap to query repeatedly or sit behind an
/// [`OracleCache`]. Returning `None` is not an error: resolution degrades to
/// "no reservation" for unknown types.
pub trait TypeOracle: Send + Sync {
    /// Look up one external type by fully qualified binary name.
    fn lookup(&self, name: &str) -> Option<ExternalTypeInfo>;
}

/// A memoizing front for a [`TypeOracle`], caching hits and misses.
#[derive(Debug)]
pub struct OracleCache<O> {
    oracle: O,
    entries: DashMap<String, Option<Arc<ExternalTypeInfo>>>,
}

impl<O: TypeOracle> OracleCache<O> {
    /// Wrap `oracle` with an empty cache.
    pub fn new(oracle: O) -> OracleCache<O> {
        OracleCache {
            oracle,
            entries: DashMap::new(),
        }
    }

    /// Cached lookup; a miss is remembered and never re-queried.
    pub fn get(&self, name: &str) -> Option<Arc<ExternalTypeInfo>> {
        if let Some(cached) = self.entries.get(name) {
            return cached.clone();
        }
        let resolved = self.oracle.lookup(name).map(Arc::new);
        self.entries.insert(name.to_string(), resolved.clone());
        resolved
    }

    /// The wrapped oracle.
    pub fn inner(&self) -> &O {
        &self.oracle
    }
}

/// Deterministic table-backed oracle, used by tests and embedders with a
/// pre-computed class path index.
#[derive(Debug, Default)]
pub struct FixtureOracle {
    types: HashMap<String, ExternalTypeInfo>,
}

impl FixtureOracle {
    /// An oracle that knows nothing.
    #[must_use]
    pub fn new() -> FixtureOracle {
        FixtureOracle::default()
    }

    /// An oracle seeded with the platform types almost every class touches:
    /// `java/lang/Object`, `java/lang/Enum`, and `java/io/Serializable`.
    #[must_use]
    pub fn with_core_types() -> FixtureOracle {
        let mut oracle = FixtureOracle::new();
        oracle.insert(
            ExternalTypeInfo::new("java/lang/Object").with_visible_methods([
                "clone",
                "equals",
                "finalize",
                "getClass",
                "hashCode",
                "notify",
                "notifyAll",
                "toString",
                "wait",
            ]),
        );
        oracle.insert(
            ExternalTypeInfo::new("java/lang/Enum")
                .with_super("java/lang/Object")
                .with_visible_methods([
                    "clone",
                    "compareTo",
                    "equals",
                    "finalize",
                    "getClass",
                    "getDeclaringClass",
                    "hashCode",
                    "name",
                    "notify",
                    "notifyAll",
                    "ordinal",
                    "toString",
                    "wait",
                ]),
        );
        oracle.insert(ExternalTypeInfo::new("java/io/Serializable"));
        oracle
    }

    /// Register one external type, replacing any previous entry of the same
    /// name.
    pub fn insert(&mut self, info: ExternalTypeInfo) {
        self.types.insert(info.name.clone(), info);
    }
}

impl TypeOracle for FixtureOracle {
    fn lookup(&self, name: &str) -> Option<ExternalTypeInfo> {
        self.types.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fixture_lookup() {
        let oracle = FixtureOracle::with_core_types();
        let object = oracle.lookup("java/lang/Object").unwrap();
        assert!(object.visible_methods.contains("toString"));
        assert!(oracle.lookup("com/example/Nope").is_none());
    }

    #[test]
    fn cache_remembers_misses() {
        struct Counting(AtomicUsize);
        impl TypeOracle for Counting {
            fn lookup(&self, _name: &str) -> Option<ExternalTypeInfo> {
                self.0.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
        let cache = OracleCache::new(Counting(AtomicUsize::new(0)));
        assert!(cache.get("a/B").is_none());
        assert!(cache.get("a/B").is_none());
        assert_eq!(cache.inner().0.load(Ordering::SeqCst), 1);
    }
}
