//! # ECS World
//!
//! The world owns all simulation state: the entity sparse set, one store
//! per (lazily registered) component, the mask generations, query states
//! and the frame counter. Component registration order within a world is
//! the canonical order the serializer walks.
//!
//! Lifecycle hooks are ordered deliberately: `init` fires immediately on
//! the membership transition that admits an entity, while `cleanup` fires
//! after the whole transition loop completes - in reverse-encounter
//! order - so every query has been updated before any cleanup observes
//! world state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::ecs::component::{ComponentType, Eid};
use crate::ecs::masks::{BitflagCursor, EntityMasks};
use crate::ecs::query::{QueryHandle, QueryState};
use crate::ecs::registry::Registry;
use crate::ecs::sparse::SparseSet;
use crate::ecs::store::Store;
use crate::ecs::system::{System, SystemDef};
use crate::error::{EcsError, EcsResult};

/// Default entity capacity for [`create_world`].
pub const DEFAULT_WORLD_SIZE: usize = 10_000;

/// One component registered in a world: its schema, mask position, store
/// and the queries that reference it.
#[derive(Debug)]
pub struct WorldComponent {
    /// The shared schema.
    pub schema: ComponentType,
    /// Mask generation this component's bit lives in.
    pub generation_id: usize,
    /// The component's bit within its generation.
    pub bitflag: u32,
    /// The component's columns.
    pub store: Store,
    /// Keys of the queries requiring this component.
    pub queries: Vec<String>,
}

/// The ECS world.
#[derive(Debug)]
pub struct World {
    registry: Arc<Registry>,
    size: usize,
    entities: SparseSet,
    removed: VecDeque<Eid>,
    entity_cursor: Eid,
    masks: EntityMasks,
    cursor: BitflagCursor,
    components: Vec<WorldComponent>,
    component_index: HashMap<String, usize>,
    queries: HashMap<String, QueryState>,
    query_order: Vec<String>,
    dirty_queries: Vec<String>,
    frame: u32,
    delta_baseline: bool,
}

impl World {
    /// Creates a world for `size` entities, freezing the registry.
    ///
    /// Queries of already-registered systems are associated immediately,
    /// so membership transitions can notify their systems from the first
    /// `add_component` on. Systems defined later get their queries on the
    /// first step that runs them.
    #[must_use]
    pub fn new(registry: Arc<Registry>, size: usize) -> Self {
        registry.freeze();
        debug!(size, "world created");
        let mut world = Self {
            registry,
            size,
            entities: SparseSet::new(size),
            removed: VecDeque::new(),
            entity_cursor: 0,
            masks: EntityMasks::new(size),
            cursor: BitflagCursor::default(),
            components: Vec::new(),
            component_index: HashMap::new(),
            queries: HashMap::new(),
            query_order: Vec::new(),
            dirty_queries: Vec::new(),
            frame: 0,
            delta_baseline: false,
        };
        for def in world.registry.clone().all_systems() {
            // A system may query components defined in no registry; its
            // query is then created lazily at step time, surfacing the
            // error there.
            let _ = world.ensure_query_raw(&def.key, &def.components);
        }
        world
    }

    /// The registry this world resolves schemas and systems through.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The fixed entity capacity.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The frame counter, incremented by [`step_world`].
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Restores the frame counter (snapshot support).
    pub fn set_frame(&mut self, frame: u32) {
        self.frame = frame;
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Allocates an entity id.
    ///
    /// Freed ids are reused only once more than `round(size * 0.01)` of
    /// them have accumulated, keeping short-lived recycling cheap while
    /// amortising id reuse.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] when the cursor passes `size`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn add_entity(&mut self) -> EcsResult<Eid> {
        let threshold = (self.size as f64 * 0.01).round() as usize;
        let eid = if self.removed.len() > threshold {
            // unwrap: len > threshold >= 0 guarantees an element
            self.removed.pop_front().unwrap()
        } else {
            let eid = self.entity_cursor;
            if eid as usize >= self.size {
                return Err(EcsError::CapacityExceeded { size: self.size });
            }
            self.entity_cursor += 1;
            eid
        };
        self.entities.add(eid);
        trace!(eid, "entity added");
        Ok(eid)
    }

    /// Whether the id is currently alive.
    #[inline]
    #[must_use]
    pub fn entity_exists(&self, eid: Eid) -> bool {
        self.entities.has(eid)
    }

    /// The next never-used entity id.
    #[inline]
    #[must_use]
    pub fn get_entity_cursor(&self) -> Eid {
        self.entity_cursor
    }

    /// Removes an entity. Idempotent: a dead id is a no-op.
    ///
    /// Every query containing the entity queues a deferred removal;
    /// cleanup hooks run in reverse-encounter order while the entity
    /// still exists; the id is queued for reuse and the entity's mask row
    /// is zeroed in every generation.
    pub fn remove_entity(&mut self, eid: Eid) {
        if !self.entities.has(eid) {
            return;
        }
        let mut cleanups: Vec<SystemDef> = Vec::new();
        let keys = self.query_order.clone();
        for key in keys {
            let queued = {
                let query = self.queries.get_mut(&key).expect("ordered query exists");
                if query.members.has(eid) {
                    query.entered.remove(eid);
                    query.queue_remove(eid)
                } else {
                    false
                }
            };
            if queued {
                self.mark_dirty(&key);
                cleanups.extend(self.registry.systems_for_key(&key));
            }
        }
        for def in cleanups.iter().rev() {
            def.system.cleanup(self, eid);
        }
        self.removed.push_back(eid);
        self.entities.remove(eid);
        self.masks.zero_entity(eid);
        trace!(eid, "entity removed");
    }

    fn check_entity(&self, eid: Eid) -> EcsResult<()> {
        if eid as usize >= self.size {
            return Err(EcsError::EntityUndefined { eid, size: self.size });
        }
        if !self.entities.has(eid) {
            return Err(EcsError::EntityMissing { eid });
        }
        Ok(())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Lazily registers a component in this world, allocating its bitflag
    /// (and a fresh mask generation on cursor wrap) and creating its store.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNull`] if the schema is not in the registry.
    pub fn ensure_component(&mut self, schema: &ComponentType) -> EcsResult<usize> {
        let name = schema.type_name();
        if name.is_empty() || self.registry.component(name).is_none() {
            return Err(EcsError::ComponentNull { name: name.to_string() });
        }
        if let Some(&idx) = self.component_index.get(name) {
            return Ok(idx);
        }
        let (generation_id, bitflag) = self.cursor.allocate();
        Ok(self.insert_component(schema.clone(), generation_id, bitflag))
    }

    /// Registers a component with explicit mask coordinates (snapshot
    /// restore). Does not advance the bitflag cursor.
    pub fn register_component_raw(
        &mut self,
        schema: ComponentType,
        generation_id: usize,
        bitflag: u32,
    ) -> usize {
        if let Some(&idx) = self.component_index.get(schema.type_name()) {
            return idx;
        }
        self.insert_component(schema, generation_id, bitflag)
    }

    fn insert_component(
        &mut self,
        schema: ComponentType,
        generation_id: usize,
        bitflag: u32,
    ) -> usize {
        self.masks.ensure_generation(generation_id);
        let store = Store::new(&schema, self.size);
        let name = schema.type_name().to_string();
        let queries = self
            .query_order
            .iter()
            .filter(|key| {
                self.queries
                    .get(*key)
                    .is_some_and(|q| q.components.iter().any(|c| c == &name))
            })
            .cloned()
            .collect();
        let idx = self.components.len();
        self.components.push(WorldComponent { schema, generation_id, bitflag, store, queries });
        self.component_index.insert(name, idx);
        idx
    }

    /// Whether the entity carries the component, per its mask bit.
    #[must_use]
    pub fn has_component(&self, schema: &ComponentType, eid: Eid) -> bool {
        self.component_index
            .get(schema.type_name())
            .is_some_and(|&idx| {
                let comp = &self.components[idx];
                self.masks.test(comp.generation_id, eid, comp.bitflag)
            })
    }

    /// Attaches a component to an entity with `reset` semantics enabled.
    ///
    /// See [`World::add_component_with`].
    ///
    /// # Errors
    ///
    /// As [`World::add_component_with`].
    pub fn add_component(
        &mut self,
        schema: &ComponentType,
        eid: Eid,
        overrides: Option<&Value>,
    ) -> EcsResult<()> {
        self.add_component_with(schema, eid, overrides, true)
    }

    /// Attaches a component to an entity.
    ///
    /// Idempotent: if the entity already carries the component this is a
    /// no-op. Otherwise the component's bit is ORed into the entity mask;
    /// with `reset` the entity's row is zeroed and schema defaults are
    /// re-applied; overrides are validated and written (the reserved
    /// `type` key is skipped); and every query referencing the component
    /// re-evaluates membership, firing `init` on newly matched systems.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityUndefined`] / [`EcsError::EntityMissing`] on
    ///   precondition violations.
    /// - [`EcsError::ComponentNull`] for an unregistered schema.
    /// - [`EcsError::Validation`] when the validator rejects `overrides`.
    /// - [`EcsError::UnknownProperty`] when an override key has no column.
    pub fn add_component_with(
        &mut self,
        schema: &ComponentType,
        eid: Eid,
        overrides: Option<&Value>,
        reset: bool,
    ) -> EcsResult<()> {
        self.check_entity(eid)?;
        let idx = self.ensure_component(schema)?;
        let (generation_id, bitflag) = {
            let comp = &self.components[idx];
            (comp.generation_id, comp.bitflag)
        };
        if self.masks.test(generation_id, eid, bitflag) {
            return Ok(());
        }
        self.masks.set(generation_id, eid, bitflag);

        if reset {
            let comp = &mut self.components[idx];
            comp.store.reset_for(eid);
            for (col, prop) in comp.schema.properties().iter().enumerate() {
                if !prop.default.is_null() {
                    comp.store.write_value(col, eid, &prop.default);
                }
            }
        }

        match overrides {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                schema
                    .validator()
                    .validate(map)
                    .map_err(|errors| EcsError::Validation {
                        schema: schema.type_name().to_string(),
                        overrides: Value::Object(map.clone()),
                        errors,
                    })?;
                for (key, value) in map {
                    if key == "type" {
                        continue;
                    }
                    let comp = &mut self.components[idx];
                    let Some(col) = comp.store.find_column(key) else {
                        return Err(EcsError::UnknownProperty {
                            schema: comp.schema.type_name().to_string(),
                            key: key.clone(),
                        });
                    };
                    comp.store.write_value(col, eid, value);
                }
            }
            Some(other) => {
                return Err(EcsError::Validation {
                    schema: schema.type_name().to_string(),
                    overrides: other.clone(),
                    errors: vec![crate::error::ValidationIssue {
                        key: String::new(),
                        message: "expected an object of overrides".to_string(),
                    }],
                })
            }
        }

        self.evaluate_queries_for(idx, eid);
        Ok(())
    }

    /// Detaches a component from an entity.
    ///
    /// AND-NOTs the component's bit out of the mask and re-evaluates the
    /// queries referencing the component; de-matched systems get their
    /// `cleanup` after the transition loop. A missing component is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityUndefined`] / [`EcsError::EntityMissing`] on
    /// precondition violations.
    pub fn remove_component(&mut self, schema: &ComponentType, eid: Eid) -> EcsResult<()> {
        self.check_entity(eid)?;
        let Some(&idx) = self.component_index.get(schema.type_name()) else {
            return Ok(());
        };
        let comp = &self.components[idx];
        if !self.masks.test(comp.generation_id, eid, comp.bitflag) {
            return Ok(());
        }
        let (generation_id, bitflag) = (comp.generation_id, comp.bitflag);
        self.masks.clear(generation_id, eid, bitflag);
        self.evaluate_queries_for(idx, eid);
        Ok(())
    }

    /// Clears the component's mask bit only: the store is untouched and
    /// queries are **not** re-evaluated, so a disabled entity can appear
    /// in query results until the next add/remove on the same component.
    /// A low-level primitive for higher-level state machines.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityUndefined`] / [`EcsError::EntityMissing`] on
    /// precondition violations.
    pub fn disable_component(&mut self, schema: &ComponentType, eid: Eid) -> EcsResult<()> {
        self.check_entity(eid)?;
        if let Some(&idx) = self.component_index.get(schema.type_name()) {
            let comp = &self.components[idx];
            let (generation_id, bitflag) = (comp.generation_id, comp.bitflag);
            self.masks.clear(generation_id, eid, bitflag);
        }
        Ok(())
    }

    /// Re-evaluates every query referencing a component for one entity,
    /// firing `init` immediately on entry and collecting `cleanup` hooks
    /// to run after the loop, in reverse-encounter order.
    fn evaluate_queries_for(&mut self, comp_idx: usize, eid: Eid) {
        let keys = self.components[comp_idx].queries.clone();
        let mut cleanups: Vec<SystemDef> = Vec::new();
        for key in keys {
            let verdict = {
                let Some(query) = self.queries.get_mut(&key) else { continue };
                query.to_remove.remove(eid);
                if query.check(&self.masks, eid) {
                    query.add(eid).then_some(true)
                } else {
                    query.entered.remove(eid);
                    query.queue_remove(eid).then_some(false)
                }
            };
            match verdict {
                Some(true) => {
                    for def in self.registry.systems_for_key(&key) {
                        def.system.init(self, eid);
                    }
                }
                Some(false) => {
                    self.mark_dirty(&key);
                    cleanups.extend(self.registry.systems_for_key(&key));
                }
                None => {}
            }
        }
        for def in cleanups.iter().rev() {
            def.system.cleanup(self, eid);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn mark_dirty(&mut self, key: &str) {
        if !self.dirty_queries.iter().any(|k| k == key) {
            self.dirty_queries.push(key.to_string());
        }
    }

    /// Creates the per-world state for a query if absent: computes its
    /// generation masks, registers it on each component, and walks all
    /// existing entities to populate initial membership.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNull`] if a component name is unregistered.
    pub fn ensure_query(&mut self, handle: &QueryHandle) -> EcsResult<()> {
        self.ensure_query_raw(handle.key(), handle.components())
    }

    fn ensure_query_raw(&mut self, key: &str, components: &[String]) -> EcsResult<()> {
        if self.queries.contains_key(key) {
            return Ok(());
        }
        let mut flags = Vec::with_capacity(components.len());
        for name in components {
            let schema = self
                .registry
                .component(name)
                .ok_or_else(|| EcsError::ComponentNull { name: name.clone() })?;
            let idx = self.ensure_component(&schema)?;
            let comp = &self.components[idx];
            flags.push((comp.generation_id, comp.bitflag));
        }
        let mut state = QueryState::new(key.to_string(), components.to_vec(), &flags, self.size);
        for eid in self.entities.dense().to_vec() {
            if state.check(&self.masks, eid) {
                state.add(eid);
            }
        }
        for name in components {
            if let Some(&idx) = self.component_index.get(name) {
                let comp = &mut self.components[idx];
                if !comp.queries.iter().any(|k| k == key) {
                    comp.queries.push(key.to_string());
                }
            }
        }
        self.queries.insert(key.to_string(), state);
        self.query_order.push(key.to_string());
        Ok(())
    }

    /// Commits every dirty query's deferred removals.
    pub fn commit_removals(&mut self) {
        for key in std::mem::take(&mut self.dirty_queries) {
            if let Some(query) = self.queries.get_mut(&key) {
                query.commit();
            }
        }
    }

    /// The entities currently matching a query, flushing all dirty
    /// queries first.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNull`] if the query names an unregistered
    /// component.
    pub fn get_entities(&mut self, handle: &QueryHandle) -> EcsResult<&[Eid]> {
        self.ensure_query(handle)?;
        self.commit_removals();
        Ok(self.queries[handle.key()].members.dense())
    }

    /// Whether the entity matches the query, after committing removals.
    ///
    /// # Errors
    ///
    /// As [`World::get_entities`].
    pub fn query_has(&mut self, handle: &QueryHandle, eid: Eid) -> EcsResult<bool> {
        self.ensure_query(handle)?;
        self.commit_removals();
        Ok(self.queries[handle.key()].members.has(eid))
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advances the frame counter and runs the auto-run system list in
    /// `(depth, query key)` order, skipping systems with empty queries.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNull`] if a system queries an unregistered
    /// component.
    pub fn step(&mut self) -> EcsResult<()> {
        self.frame = self.frame.wrapping_add(1);
        self.run_defs(self.registry.run_list())
    }

    /// Runs the draw system list, leaving the frame counter untouched.
    ///
    /// # Errors
    ///
    /// As [`World::step`].
    pub fn step_draw(&mut self) -> EcsResult<()> {
        self.run_defs(self.registry.draw_list())
    }

    fn run_defs(&mut self, defs: Vec<SystemDef>) -> EcsResult<()> {
        for def in defs {
            self.ensure_query_raw(&def.key, &def.components)?;
            self.commit_removals();
            let entities = self.queries[&def.key].members.dense().to_vec();
            if entities.is_empty() {
                continue;
            }
            def.system.run_all(self, &entities);
        }
        Ok(())
    }

    // =========================================================================
    // Property access
    // =========================================================================

    /// Returns the accessor view over one entity's component row.
    ///
    /// # Errors
    ///
    /// Entity preconditions as [`World::add_component`];
    /// [`EcsError::ComponentNull`] for an unregistered schema.
    pub fn proxy(&mut self, schema: &ComponentType, eid: Eid) -> EcsResult<ComponentProxy<'_>> {
        self.check_entity(eid)?;
        let comp = self.ensure_component(schema)?;
        Ok(ComponentProxy { world: self, comp, eid })
    }

    // =========================================================================
    // Snapshot support
    // =========================================================================

    /// The live entity sparse set.
    #[must_use]
    pub fn entities(&self) -> &SparseSet {
        &self.entities
    }

    /// Replaces the entity sparse set (snapshot restore).
    pub fn restore_entities(&mut self, dense: Vec<Eid>, sparse: Vec<i32>) {
        self.entities.reset(Some(dense), Some(sparse));
    }

    /// The queued-for-reuse ids, oldest first.
    pub fn removed(&self) -> impl Iterator<Item = Eid> + '_ {
        self.removed.iter().copied()
    }

    /// Replaces the reuse queue (snapshot restore).
    pub fn restore_removed(&mut self, removed: Vec<Eid>) {
        self.removed = removed.into();
    }

    /// Restores the entity cursor (snapshot restore).
    pub fn set_entity_cursor(&mut self, cursor: Eid) {
        self.entity_cursor = cursor;
    }

    /// The next bitflag the cursor would hand out.
    #[must_use]
    pub fn bitflag(&self) -> u32 {
        self.cursor.flag()
    }

    /// Restores the bitflag cursor (snapshot restore).
    pub fn restore_bitflag(&mut self, flag: u32, generation: usize) {
        self.cursor.restore(flag, generation);
    }

    /// The mask generations.
    #[must_use]
    pub fn masks(&self) -> &EntityMasks {
        &self.masks
    }

    /// Mutable mask access (snapshot restore).
    pub fn masks_mut(&mut self) -> &mut EntityMasks {
        &mut self.masks
    }

    /// Registered components in world insertion order - the order the
    /// serializer walks.
    #[must_use]
    pub fn components(&self) -> &[WorldComponent] {
        &self.components
    }

    /// Index of a registered component by type name.
    #[must_use]
    pub fn component_position(&self, name: &str) -> Option<usize> {
        self.component_index.get(name).copied()
    }

    /// Mutable store access for one component (snapshot restore).
    pub fn store_mut(&mut self, idx: usize) -> &mut Store {
        &mut self.components[idx].store
    }

    /// Sets a component's mask bit for an entity without touching queries
    /// (snapshot restore).
    pub fn set_membership_raw(&mut self, idx: usize, eid: Eid) {
        let comp = &self.components[idx];
        let (generation_id, bitflag) = (comp.generation_id, comp.bitflag);
        self.masks.set(generation_id, eid, bitflag);
    }

    /// Query keys in world insertion order.
    #[must_use]
    pub fn query_order(&self) -> &[String] {
        &self.query_order
    }

    /// One query's state.
    #[must_use]
    pub fn query_state(&self, key: &str) -> Option<&QueryState> {
        self.queries.get(key)
    }

    /// Installs a query state verbatim (snapshot restore).
    pub fn restore_query(&mut self, state: QueryState) {
        let key = state.key.clone();
        for name in &state.components {
            if let Some(&idx) = self.component_index.get(name) {
                let comp = &mut self.components[idx];
                if !comp.queries.iter().any(|k| k == &key) {
                    comp.queries.push(key.clone());
                }
            }
        }
        if !self.query_order.iter().any(|k| k == &key) {
            self.query_order.push(key.clone());
        }
        self.queries.insert(key, state);
    }

    /// The dirty query keys, in the order they became dirty.
    #[must_use]
    pub fn dirty_queries(&self) -> &[String] {
        &self.dirty_queries
    }

    /// Replaces the dirty query list (snapshot restore).
    pub fn restore_dirty_queries(&mut self, keys: Vec<String>) {
        self.dirty_queries = keys;
    }

    /// Whether a delta baseline has been established on this world.
    #[must_use]
    pub fn has_delta_baseline(&self) -> bool {
        self.delta_baseline
    }

    /// Marks the delta baseline (set by full-snapshot decode).
    pub fn set_delta_baseline(&mut self, established: bool) {
        self.delta_baseline = established;
    }

    /// Drops every registered component and query so a snapshot can
    /// rebuild the table in its own order (snapshot restore).
    pub fn clear_registration(&mut self) {
        self.components.clear();
        self.component_index.clear();
        self.queries.clear();
        self.query_order.clear();
        self.dirty_queries.clear();
        self.cursor = BitflagCursor::default();
        self.masks = EntityMasks::new(self.size);
    }

    /// Clears all entities, masks, stores and query sets without
    /// reallocating columns. Registered components stay registered.
    pub fn reset(&mut self) {
        self.entities.reset(None, None);
        self.removed.clear();
        self.entity_cursor = 0;
        self.masks.reset();
        for comp in &mut self.components {
            comp.store.reset();
        }
        for query in self.queries.values_mut() {
            query.members.reset(None, None);
            query.entered.reset(None, None);
            query.to_remove.reset(None, None);
        }
        self.dirty_queries.clear();
        self.frame = 0;
        self.delta_baseline = false;
    }
}

/// Accessor view over one entity's component row.
///
/// Property enumeration yields the store's keys plus the `type`
/// pseudo-field, which always reads the component's type name.
pub struct ComponentProxy<'w> {
    world: &'w mut World,
    comp: usize,
    eid: Eid,
}

impl ComponentProxy<'_> {
    fn component(&self) -> &WorldComponent {
        &self.world.components[self.comp]
    }

    /// The component's type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.component().schema.type_name()
    }

    /// Store keys plus `"type"`.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .component()
            .store
            .columns()
            .iter()
            .map(|c| c.key().to_string())
            .collect();
        keys.push("type".to_string());
        keys
    }

    /// Reads a property. Unknown keys read as absent; boolean columns
    /// project to JSON booleans; `"type"` reads the type name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == "type" {
            return Some(Value::String(self.type_name().to_string()));
        }
        let comp = self.component();
        let col = comp.store.find_column(key)?;
        Some(comp.store.value(col, self.eid))
    }

    /// Reads a numeric property widened to f64.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    /// Writes a property.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownProperty`] for keys the store does not carry
    /// (including the reserved `type` key).
    pub fn set(&mut self, key: &str, value: &Value) -> EcsResult<()> {
        let Some(col) = self.component().store.find_column(key) else {
            return Err(EcsError::UnknownProperty {
                schema: self.type_name().to_string(),
                key: key.to_string(),
            });
        };
        let (comp, eid) = (self.comp, self.eid);
        self.world.store_mut(comp).write_value(col, eid, value);
        Ok(())
    }

    /// Writes a numeric property.
    ///
    /// # Errors
    ///
    /// As [`ComponentProxy::set`].
    pub fn set_f64(&mut self, key: &str, value: f64) -> EcsResult<()> {
        self.set(key, &serde_json::json!(value))
    }

    /// Writes one element of a subarray property.
    ///
    /// # Errors
    ///
    /// As [`ComponentProxy::set`].
    pub fn set_element(&mut self, key: &str, index: usize, value: f64) -> EcsResult<()> {
        let Some(col) = self.component().store.find_column(key) else {
            return Err(EcsError::UnknownProperty {
                schema: self.type_name().to_string(),
                key: key.to_string(),
            });
        };
        let (comp, eid) = (self.comp, self.eid);
        self.world.store_mut(comp).subarray_set(col, eid, index, value);
        Ok(())
    }
}

// =============================================================================
// Module-level operations
// =============================================================================

/// Creates a world, freezing the registry. `size` defaults to
/// [`DEFAULT_WORLD_SIZE`].
#[must_use]
pub fn create_world(registry: &Arc<Registry>, size: Option<usize>) -> World {
    World::new(registry.clone(), size.unwrap_or(DEFAULT_WORLD_SIZE))
}

/// Deletes a world, running every registered system's `destroy` hook
/// before the stores are released.
pub fn delete_world(mut world: World) {
    for def in world.registry.clone().all_systems() {
        def.system.destroy(&mut world);
    }
    debug!("world deleted");
}

/// Clears a world's entities, masks, stores and query sets without
/// reallocating columns. See [`World::reset`].
pub fn reset_world(world: &mut World) {
    world.reset();
}

/// Steps the auto-run system list. See [`World::step`].
///
/// # Errors
///
/// As [`World::step`].
pub fn step_world(world: &mut World) -> EcsResult<()> {
    world.step()
}

/// Steps the draw system list. See [`World::step_draw`].
///
/// # Errors
///
/// As [`World::step_draw`].
pub fn step_world_draw(world: &mut World) -> EcsResult<()> {
    world.step_draw()
}

/// Finds the registered system of concrete type `S`.
#[must_use]
pub fn get_system<S: System>(world: &World) -> Option<SystemDef> {
    world.registry.system_by_type(std::any::TypeId::of::<S>())
}

/// Systems whose component set mentions `type_name`.
#[must_use]
pub fn get_systems_by_type(world: &World, type_name: &str) -> Vec<SystemDef> {
    world.registry.systems_for_component(type_name)
}

/// Looks up a component schema by type name.
#[must_use]
pub fn get_component_by_type(world: &World, type_name: &str) -> Option<ComponentType> {
    world.registry.component(type_name)
}
