//! # Runtime Error Types
//!
//! All errors surfaced by the ECS runtime. Every public operation reports
//! failures to its caller; nothing is retried internally.

use thiserror::Error;

/// A single validation failure for one override key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The override key that failed.
    pub key: String,
    /// What was wrong with the supplied value.
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.key, self.message)
    }
}

/// Errors that can occur in the ECS runtime.
#[derive(Debug, Error)]
pub enum EcsError {
    /// Attempted to allocate an entity id past the world's capacity.
    #[error("entity capacity exceeded: world holds {size} entities")]
    CapacityExceeded {
        /// The world's fixed entity capacity.
        size: usize,
    },

    /// Operated on an entity reference outside the world's id range.
    #[error("entity reference {eid} is outside the world range 0..{size}")]
    EntityUndefined {
        /// The out-of-range id.
        eid: u32,
        /// The world's fixed entity capacity.
        size: usize,
    },

    /// Operated on an eid that is not in the entity sparse set.
    #[error("entity {eid} does not exist in this world")]
    EntityMissing {
        /// The dead or never-allocated id.
        eid: u32,
    },

    /// A null-equivalent component reference: empty or unregistered type name.
    #[error("component reference is null or unregistered: '{name}'")]
    ComponentNull {
        /// The offending type name (may be empty).
        name: String,
    },

    /// A component type name was defined twice.
    #[error("component '{name}' is already defined")]
    DuplicateComponent {
        /// The already-registered type name.
        name: String,
    },

    /// The validator rejected the supplied overrides.
    #[error("validation failed for component '{schema}' ({} issue(s))", errors.len())]
    Validation {
        /// Type name of the component being written.
        schema: String,
        /// The overrides that were rejected, for caller inspection.
        overrides: serde_json::Value,
        /// Per-key failure descriptions.
        errors: Vec<ValidationIssue>,
    },

    /// Wrote a key the component's store does not carry.
    #[error("component '{schema}' has no property '{key}'")]
    UnknownProperty {
        /// Type name of the component.
        schema: String,
        /// The unknown key.
        key: String,
    },

    /// Defined a new component after the registry froze.
    #[error("cannot define component '{name}': registry is frozen")]
    DefineAfterFreeze {
        /// The type name that arrived too late.
        name: String,
    },
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
