//! # Lattice Core
//!
//! Schema-driven Entity Component System runtime.
//!
//! Components are described at runtime by string-named schemas (ordered
//! property descriptors plus a precomputed validator), not by Rust types.
//! Worlds store component data in dense typed columns, track membership in
//! generations of 32-bit entity masks, and answer queries through sparse
//! sets with deferred removal semantics.
//!
//! ## Architecture Rules
//!
//! 1. **Columns are allocated once** - a world's stores are sized at
//!    creation; only an explicit resize grows them
//! 2. **Masks are the truth** - an entity has a component iff its mask bit
//!    is set; stores may hold stale rows for cleared entities
//! 3. **Removal is deferred** - queries queue removals and commit them
//!    before any read
//!
//! ## Example
//!
//! ```rust,ignore
//! use lattice_core::{ComponentBuilder, ElementType, Registry, World};
//!
//! let registry = std::sync::Arc::new(Registry::new());
//! let position = registry.define_component(
//!     ComponentBuilder::new("Position")
//!         .field("x", ElementType::F64, 0.0)
//!         .field("y", ElementType::F64, 0.0)
//!         .build(),
//! )?;
//!
//! let mut world = World::new(registry, 10_000); // freezes the registry
//! let eid = world.add_entity()?;
//! world.add_component(&position, eid, None)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ecs;
pub mod error;

pub use ecs::component::{
    ComponentBuilder, ComponentSchema, ComponentType, Eid, ElementType, FauxKind,
    OverrideValidator, PropertyDescriptor, PropertyKind, SchemaValidator,
};
pub use ecs::masks::EntityMasks;
pub use ecs::query::{QueryHandle, QueryState};
pub use ecs::registry::Registry;
pub use ecs::sparse::SparseSet;
pub use ecs::store::{Column, ColumnInfo, ShadowColumn, Store, TypedData};
pub use ecs::system::{System, SystemDef};
pub use ecs::world::{
    create_world, delete_world, get_component_by_type, get_system, get_systems_by_type,
    reset_world, step_world, step_world_draw, ComponentProxy, World, WorldComponent,
    DEFAULT_WORLD_SIZE,
};
pub use error::{EcsError, EcsResult, ValidationIssue};
