//! Migration trait and the version graph built from registered migrations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use statekeep_core::{is_valid_version, DataMap, Error, Result, Version};

/// Key identifying a migration edge.
pub fn migration_key(from: &str, to: &str) -> String {
    format!("{}-to-{}", from, to)
}

/// A reversible one-step data transformation between two versions.
#[allow(clippy::wrong_self_convention)]
pub trait Migration: Send + Sync {
    /// Source version this migration applies to.
    fn from_version(&self) -> &str;

    /// Target version this migration produces.
    fn to_version(&self) -> &str;

    /// Human-readable description of the migration.
    fn description(&self) -> &str;

    /// Transform data from `from_version` to `to_version`.
    fn apply(&self, data: DataMap) -> Result<DataMap>;

    /// Transform data from `to_version` back to `from_version`.
    fn rollback(&self, data: DataMap) -> Result<DataMap>;

    fn key(&self) -> String {
        migration_key(self.from_version(), self.to_version())
    }
}

type StepFn = Box<dyn Fn(DataMap) -> Result<DataMap> + Send + Sync>;

/// A [`Migration`] built from a pair of closures.
pub struct FnMigration {
    from: String,
    to: String,
    description: String,
    apply: StepFn,
    rollback: StepFn,
}

impl FnMigration {
    pub fn new<A, R>(
        from: impl Into<String>,
        to: impl Into<String>,
        description: impl Into<String>,
        apply: A,
        rollback: R,
    ) -> Self
    where
        A: Fn(DataMap) -> Result<DataMap> + Send + Sync + 'static,
        R: Fn(DataMap) -> Result<DataMap> + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            description: description.into(),
            apply: Box::new(apply),
            rollback: Box::new(rollback),
        }
    }
}

impl fmt::Debug for FnMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMigration")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("description", &self.description)
            .finish()
    }
}

impl Migration for FnMigration {
    fn from_version(&self) -> &str {
        &self.from
    }

    fn to_version(&self) -> &str {
        &self.to
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&self, data: DataMap) -> Result<DataMap> {
        (self.apply)(data)
    }

    fn rollback(&self, data: DataMap) -> Result<DataMap> {
        (self.rollback)(data)
    }
}

/// Read-only description of a registered migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInfo {
    pub key: String,
    pub from_version: String,
    pub to_version: String,
    pub description: String,
}

/// Directed graph of registered migrations.
///
/// Built once at startup and shared by reference; registered migrations are
/// never replaced.
#[derive(Default)]
pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    /// Create a new empty migration registry.
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    /// Register a migration.
    ///
    /// Rejects malformed versions, self-loops and a second migration for an
    /// already registered edge.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> Result<()> {
        let (from, to) = (migration.from_version(), migration.to_version());

        for version in [from, to] {
            if !is_valid_version(version) {
                return Err(Error::InvalidInput(format!(
                    "Invalid migration version: {}",
                    version
                )));
            }
        }
        if from == to {
            return Err(Error::InvalidInput(format!(
                "Migration {} does not change the version",
                migration.key()
            )));
        }
        let key = migration.key();
        if self.migrations.iter().any(|m| m.key() == key) {
            return Err(Error::InvalidInput(format!(
                "Migration {} is already registered",
                key
            )));
        }

        self.migrations.push(migration);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with_migration(mut self, migration: impl Migration + 'static) -> Result<Self> {
        self.register(Box::new(migration))?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.key() == key)
            .map(|m| m.as_ref())
    }

    /// Registered migrations in registration order.
    pub fn available(&self) -> Vec<MigrationInfo> {
        self.migrations
            .iter()
            .map(|m| MigrationInfo {
                key: m.key(),
                from_version: m.from_version().to_string(),
                to_version: m.to_version().to_string(),
                description: m.description().to_string(),
            })
            .collect()
    }

    /// Adjacency map with each version's outgoing edges ordered by ascending
    /// target version. This order is the BFS tie-break between equally short
    /// paths.
    fn graph(&self) -> HashMap<&str, Vec<&dyn Migration>> {
        let mut graph: HashMap<&str, Vec<&dyn Migration>> = HashMap::new();
        for migration in &self.migrations {
            graph
                .entry(migration.from_version())
                .or_default()
                .push(migration.as_ref());
        }
        for edges in graph.values_mut() {
            edges.sort_by_key(|m| Version::parse(m.to_version()).ok());
        }
        graph
    }

    /// Find the shortest migration path (by number of steps).
    ///
    /// Returns `Some(vec![])` when `from == to` and `None` when `to` is not
    /// reachable.
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<&dyn Migration>> {
        if from == to {
            return Some(Vec::new());
        }

        let graph = self.graph();
        let mut queue: VecDeque<(&str, Vec<&dyn Migration>)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        queue.push_back((from, Vec::new()));
        visited.insert(from);

        while let Some((current, path)) = queue.pop_front() {
            let Some(edges) = graph.get(current) else {
                continue;
            };
            for migration in edges {
                let next = migration.to_version();
                if !visited.insert(next) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(*migration);
                if next == to {
                    return Some(next_path);
                }
                queue.push_back((next, next_path));
            }
        }

        None
    }

    /// Keys of the shortest path, see [`find_path`](Self::find_path).
    pub fn path_keys(&self, from: &str, to: &str) -> Option<Vec<String>> {
        self.find_path(from, to)
            .map(|path| path.iter().map(|m| m.key()).collect())
    }

    /// Whether `to` is reachable from `from`. Malformed versions are never
    /// reachable.
    pub fn is_available(&self, from: &str, to: &str) -> bool {
        is_valid_version(from) && is_valid_version(to) && self.find_path(from, to).is_some()
    }

    /// Highest version reachable from `from`, which may be `from` itself.
    pub fn latest_reachable(&self, from: &str) -> Option<String> {
        let start = Version::parse(from).ok()?;
        let graph = self.graph();

        let mut best = (start, from);
        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);

        while let Some(current) = queue.pop_front() {
            for migration in graph.get(current).into_iter().flatten() {
                let next = migration.to_version();
                if !visited.insert(next) {
                    continue;
                }
                if let Ok(version) = Version::parse(next) {
                    if version > best.0 {
                        best = (version, next);
                    }
                }
                queue.push_back(next);
            }
        }

        Some(best.1.to_string())
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.migrations.iter().map(|m| m.key()).collect();
        f.debug_struct("MigrationRegistry")
            .field("migrations", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(from: &str, to: &str) -> FnMigration {
        FnMigration::new(from, to, "Test migration", Ok, Ok)
    }

    fn registry(edges: &[(&str, &str)]) -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        for (from, to) in edges {
            registry.register(Box::new(passthrough(from, to))).unwrap();
        }
        registry
    }

    #[test]
    fn test_registry_empty_path() {
        let registry = MigrationRegistry::new();
        let path = registry.find_path("1.0.0", "1.0.0");
        assert_eq!(path.map(|p| p.len()), Some(0));
    }

    #[test]
    fn test_registry_no_path() {
        let registry = MigrationRegistry::new();
        assert!(registry.find_path("1.0.0", "2.0.0").is_none());
    }

    #[test]
    fn test_registry_single_migration() {
        let registry = registry(&[("1.0.0", "1.1.0")]);
        assert_eq!(
            registry.path_keys("1.0.0", "1.1.0"),
            Some(vec!["1.0.0-to-1.1.0".to_string()])
        );
        assert!(registry.find_path("1.1.0", "1.0.0").is_none());
    }

    #[test]
    fn test_registry_multi_step_path() {
        let registry = registry(&[("1.0.0", "1.1.0"), ("1.1.0", "1.2.0"), ("1.0.0", "2.0.0")]);
        assert_eq!(
            registry.path_keys("1.0.0", "1.2.0"),
            Some(vec![
                "1.0.0-to-1.1.0".to_string(),
                "1.1.0-to-1.2.0".to_string()
            ])
        );
    }

    #[test]
    fn test_registry_prefers_fewest_steps() {
        let registry = registry(&[
            ("1.0.0", "1.1.0"),
            ("1.1.0", "1.2.0"),
            ("1.2.0", "2.0.0"),
            ("1.0.0", "2.0.0"),
        ]);
        assert_eq!(
            registry.path_keys("1.0.0", "2.0.0"),
            Some(vec!["1.0.0-to-2.0.0".to_string()])
        );
    }

    #[test]
    fn test_tie_break_uses_lowest_next_version() {
        // Two 2-step routes; registration order puts the 1.5.0 route first.
        let registry = registry(&[
            ("1.0.0", "1.5.0"),
            ("1.5.0", "2.0.0"),
            ("1.0.0", "1.10.0"),
            ("1.10.0", "2.0.0"),
            ("1.0.0", "1.2.0"),
            ("1.2.0", "2.0.0"),
        ]);
        assert_eq!(
            registry.path_keys("1.0.0", "2.0.0"),
            Some(vec![
                "1.0.0-to-1.2.0".to_string(),
                "1.2.0-to-2.0.0".to_string()
            ])
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let registry = registry(&[("1.0.0", "1.1.0"), ("1.1.0", "1.0.0"), ("1.1.0", "1.2.0")]);
        assert_eq!(registry.path_keys("1.0.0", "1.2.0").map(|p| p.len()), Some(2));
        assert!(registry.find_path("1.0.0", "3.0.0").is_none());
    }

    #[test]
    fn test_is_available() {
        let registry = registry(&[("1.0.0", "1.1.0")]);
        assert!(registry.is_available("1.0.0", "1.1.0"));
        assert!(registry.is_available("1.0.0", "1.0.0"));
        assert!(!registry.is_available("9.9.9", "1.0.0"));
        assert!(!registry.is_available("1.0", "1.0"));
    }

    #[test]
    fn test_register_rejects_invalid_edges() {
        let mut registry = MigrationRegistry::new();
        assert!(registry.register(Box::new(passthrough("1.0", "1.1.0"))).is_err());
        assert!(registry.register(Box::new(passthrough("1.0.0", "1.0.0"))).is_err());

        registry.register(Box::new(passthrough("1.0.0", "1.1.0"))).unwrap();
        let err = registry
            .register(Box::new(passthrough("1.0.0", "1.1.0")))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_latest_reachable() {
        let registry = registry(&[("1.0.0", "1.1.0"), ("1.1.0", "2.0.0"), ("3.0.0", "4.0.0")]);
        assert_eq!(registry.latest_reachable("1.0.0").as_deref(), Some("2.0.0"));
        assert_eq!(registry.latest_reachable("2.0.0").as_deref(), Some("2.0.0"));
        assert_eq!(registry.latest_reachable("bad"), None);
    }

    #[test]
    fn test_available_lists_in_registration_order() {
        let registry = registry(&[("1.1.0", "1.2.0"), ("1.0.0", "1.1.0")]);
        let keys: Vec<String> = registry.available().into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["1.1.0-to-1.2.0", "1.0.0-to-1.1.0"]);
    }
}
