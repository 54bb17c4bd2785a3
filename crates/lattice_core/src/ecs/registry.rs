//! # Registration State
//!
//! The registry is the process-shared home of component schemas, memoized
//! query handles, and the ordered system lists. It is shared by `Arc` and
//! internally locked; worlds hold a handle and resolve systems through it
//! at step time.
//!
//! Component registration is a one-time lifecycle event: creating the
//! first world freezes the registry, assigning each component a stable
//! integer index sorted by type name - the canonical order across all
//! worlds. Defining a component after the freeze fails with
//! `DefineAfterFreeze`. Query and system definitions stay open.

use std::any::TypeId;
use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::ecs::component::{ComponentSchema, ComponentType};
use crate::ecs::query::QueryHandle;
use crate::ecs::system::{System, SystemDef};
use crate::error::{EcsError, EcsResult};

#[derive(Debug, Default)]
struct RegistryInner {
    components: Vec<ComponentType>,
    by_name: HashMap<String, usize>,
    indices: HashMap<String, usize>,
    frozen: bool,
    queries: HashMap<String, QueryHandle>,
    systems: Vec<SystemDef>,
    run_list: Vec<SystemDef>,
    draw_list: Vec<SystemDef>,
    manual_list: Vec<SystemDef>,
    by_query_key: HashMap<String, Vec<SystemDef>>,
}

/// Process-shared component/query/system registration state.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Creates an empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a component schema.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DefineAfterFreeze`] once any world exists.
    /// - [`EcsError::ComponentNull`] for an empty type name.
    /// - [`EcsError::DuplicateComponent`] for a name defined twice.
    pub fn define_component(&self, schema: ComponentSchema) -> EcsResult<ComponentType> {
        let mut inner = self.inner.write();
        let name = schema.type_name().to_string();
        if name.is_empty() {
            return Err(EcsError::ComponentNull { name });
        }
        if inner.frozen {
            return Err(EcsError::DefineAfterFreeze { name });
        }
        if inner.by_name.contains_key(&name) {
            return Err(EcsError::DuplicateComponent { name });
        }
        let handle: ComponentType = std::sync::Arc::new(schema);
        let idx = inner.components.len();
        inner.by_name.insert(name, idx);
        inner.components.push(handle.clone());
        Ok(handle)
    }

    /// Freezes component registration, assigning each component its stable
    /// index sorted by type name. Idempotent; called by world creation.
    pub fn freeze(&self) {
        let mut inner = self.inner.write();
        if inner.frozen {
            return;
        }
        inner.frozen = true;
        let mut names: Vec<String> =
            inner.components.iter().map(|c| c.type_name().to_string()).collect();
        names.sort();
        inner.indices = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name, index))
            .collect();
        debug!(components = inner.components.len(), "registry frozen");
    }

    /// Whether component registration is closed.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    /// Looks up a component schema by type name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<ComponentType> {
        let inner = self.inner.read();
        inner.by_name.get(name).map(|&i| inner.components[i].clone())
    }

    /// The canonical (post-freeze) index of a component.
    #[must_use]
    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.inner.read().indices.get(name).copied()
    }

    /// All defined component schemas, in definition order.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentType> {
        self.inner.read().components.clone()
    }

    /// Returns the memoized query handle for a component set.
    ///
    /// Handles are keyed by the sorted `|`-joined type names, so
    /// `define_query(&["A", "B"])` and `define_query(&["B", "A"])` return
    /// the same instance.
    #[must_use]
    pub fn define_query(&self, components: &[&str]) -> QueryHandle {
        let handle = QueryHandle::new(components);
        let mut inner = self.inner.write();
        inner
            .queries
            .entry(handle.key().to_string())
            .or_insert(handle)
            .clone()
    }

    /// Registers a system against a component set and re-derives the
    /// ordered run lists.
    ///
    /// Systems are sorted ascending by `(depth, query key)` and
    /// partitioned into auto-run, draw and manual lists.
    pub fn define_system<S: System>(&self, components: &[&str], system: S) -> SystemDef {
        let def = SystemDef::new(components, system);
        let mut inner = self.inner.write();
        inner.systems.push(def.clone());
        inner
            .systems
            .sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.key.cmp(&b.key)));

        inner.run_list =
            inner.systems.iter().filter(|s| !s.is_manual() && !s.draw).cloned().collect();
        inner.draw_list =
            inner.systems.iter().filter(|s| !s.is_manual() && s.draw).cloned().collect();
        inner.manual_list = inner.systems.iter().filter(|s| s.is_manual()).cloned().collect();

        inner
            .by_query_key
            .entry(def.key.clone())
            .or_default()
            .push(def.clone());
        def
    }

    /// The auto-run system list, ordered by `(depth, query key)`.
    #[must_use]
    pub fn run_list(&self) -> Vec<SystemDef> {
        self.inner.read().run_list.clone()
    }

    /// The draw system list, ordered by `(depth, query key)`.
    #[must_use]
    pub fn draw_list(&self) -> Vec<SystemDef> {
        self.inner.read().draw_list.clone()
    }

    /// Manual systems (`depth < 0`), never auto-stepped.
    #[must_use]
    pub fn manual_list(&self) -> Vec<SystemDef> {
        self.inner.read().manual_list.clone()
    }

    /// Every registered system.
    #[must_use]
    pub fn all_systems(&self) -> Vec<SystemDef> {
        self.inner.read().systems.clone()
    }

    /// Systems bound to a query key, in registration order.
    #[must_use]
    pub fn systems_for_key(&self, key: &str) -> Vec<SystemDef> {
        self.inner.read().by_query_key.get(key).cloned().unwrap_or_default()
    }

    /// Systems whose component set mentions `type_name`.
    #[must_use]
    pub fn systems_for_component(&self, type_name: &str) -> Vec<SystemDef> {
        self.inner
            .read()
            .systems
            .iter()
            .filter(|s| s.components.iter().any(|c| c == type_name))
            .cloned()
            .collect()
    }

    /// Finds a registered system by its concrete Rust type.
    #[must_use]
    pub fn system_by_type(&self, type_id: TypeId) -> Option<SystemDef> {
        self.inner.read().systems.iter().find(|s| s.type_id == type_id).cloned()
    }
}
