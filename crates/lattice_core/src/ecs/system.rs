//! # Systems
//!
//! A system is a logic unit bound to a query: it declares the component
//! set it needs, a signed scheduling `depth`, and optional lifecycle
//! hooks. Systems are registered once (module scope, shared across
//! worlds) and ordered ascending by `(depth, query key)`.
//!
//! - `init` fires immediately when an entity newly matches the system's
//!   query.
//! - `cleanup` fires after a transition loop completes for entities that
//!   de-matched, in reverse-encounter order.
//! - `run` is invoked per matching entity by the steppers; `run_all` can
//!   be overridden to process the batch at once.
//! - `destroy` fires when a world is deleted.
//!
//! Systems with `depth < 0` are *manual*: excluded from both steppers and
//! invoked explicitly by the caller. Draw systems run only in the draw
//! step; the draw bit is captured at registration.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::ecs::component::Eid;
use crate::ecs::world::World;

/// A logic unit bound to a component query.
///
/// All hooks have no-op defaults; implementors override what they need.
pub trait System: Any + Send + Sync {
    /// Scheduling depth. Negative depths make the system manual.
    fn depth(&self) -> i32 {
        0
    }

    /// Whether this system runs in the draw step instead of the auto step.
    fn is_draw(&self) -> bool {
        false
    }

    /// Called when an entity newly matches the system's query.
    fn init(&self, _world: &mut World, _eid: Eid) {}

    /// Called when an entity no longer matches the system's query, after
    /// the transition loop has updated every query.
    fn cleanup(&self, _world: &mut World, _eid: Eid) {}

    /// Called when the owning world is deleted.
    fn destroy(&self, _world: &mut World) {}

    /// Per-entity step.
    fn run(&self, _world: &mut World, _eid: Eid) {}

    /// Batch step over the query's current entities, in dense order.
    fn run_all(&self, world: &mut World, entities: &[Eid]) {
        for &eid in entities {
            self.run(world, eid);
        }
    }
}

/// A registered system: the shared instance plus registration facts.
#[derive(Clone)]
pub struct SystemDef {
    /// Canonical sorted query key.
    pub key: String,
    /// Sorted component type names the system queries.
    pub components: Vec<String>,
    /// Depth captured at registration.
    pub depth: i32,
    /// Draw bit captured at registration.
    pub draw: bool,
    /// The shared system instance.
    pub system: Arc<dyn System>,
    /// Type id for `get_system` lookups.
    pub type_id: TypeId,
    /// The same instance, kept downcastable.
    pub any: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for SystemDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDef")
            .field("key", &self.key)
            .field("depth", &self.depth)
            .field("draw", &self.draw)
            .finish_non_exhaustive()
    }
}

impl SystemDef {
    /// Wraps a system instance, capturing depth and draw-ness.
    #[must_use]
    pub fn new<S: System>(components: &[&str], system: S) -> Self {
        let mut names: Vec<String> = components.iter().map(|&s| s.to_string()).collect();
        names.sort();
        let key = names.join("|");
        let depth = system.depth();
        let draw = system.is_draw();
        let shared = Arc::new(system);
        Self {
            key,
            components: names,
            depth,
            draw,
            system: shared.clone(),
            type_id: TypeId::of::<S>(),
            any: shared,
        }
    }

    /// Downcasts the shared instance to its concrete type.
    #[must_use]
    pub fn downcast<S: System>(&self) -> Option<Arc<S>> {
        self.any.clone().downcast::<S>().ok()
    }

    /// Whether this system is manual (never auto-stepped).
    #[inline]
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.depth < 0
    }
}
