//! # Component Schemas
//!
//! Components are described by runtime schemas, not Rust types: a
//! globally-unique string type name plus an ordered list of property
//! descriptors. A schema with no properties is a *tag* component whose
//! presence lives only in the entity bitmask.
//!
//! Each schema carries a precomputed validator. The default validator is
//! derived from the descriptors; callers can substitute any
//! [`OverrideValidator`] implementation (e.g. a code-generated one).

use std::sync::Arc;

use serde_json::Value;

use crate::error::ValidationIssue;

/// An entity id: an opaque 32-bit index into per-component columns.
pub type Eid = u32;

/// A shared, immutable component schema handle.
pub type ComponentType = Arc<ComponentSchema>;

/// Numeric element types a dense column can hold.
///
/// `U8C` is clamped-u8 (writes round then clamp to 0..=255). `Eid` is a
/// u32 column flagged as holding entity references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Signed 8-bit.
    I8,
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 8-bit, clamped on write.
    U8C,
    /// Signed 16-bit.
    I16,
    /// Unsigned 16-bit.
    U16,
    /// Signed 32-bit.
    I32,
    /// Unsigned 32-bit.
    U32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Entity reference (stored as u32).
    Eid,
}

impl ElementType {
    /// Size of one element in bytes.
    #[must_use]
    pub const fn byte_len(self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::U8C => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 | Self::Eid => 4,
            Self::F64 => 8,
        }
    }

    /// The underlying storage type (`U8C` stores as `U8`, `Eid` as `U32`).
    #[must_use]
    pub const fn storage(self) -> Self {
        match self {
            Self::U8C => Self::U8,
            Self::Eid => Self::U32,
            other => other,
        }
    }

    /// Whether this element type holds entity references.
    #[inline]
    #[must_use]
    pub const fn is_eid(self) -> bool {
        matches!(self, Self::Eid)
    }

    /// The smallest unsigned type that can index a subarray of `len`
    /// elements: u8 up to 255, u16 up to 65535, u32 beyond.
    #[must_use]
    pub const fn index_type_for(len: usize) -> Self {
        if len <= u8::MAX as usize {
            Self::U8
        } else if len <= u16::MAX as usize {
            Self::U16
        } else {
            Self::U32
        }
    }

    /// The canonical string tag for this element type.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::U8C => "u8c",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Eid => "eid",
        }
    }

    /// Parses a canonical tag back into an element type.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "i8" => Self::I8,
            "u8" => Self::U8,
            "u8c" => Self::U8C,
            "i16" => Self::I16,
            "u16" => Self::U16,
            "i32" => Self::I32,
            "u32" => Self::U32,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "eid" => Self::Eid,
            _ => return None,
        })
    }
}

/// Declared shape of a faux (non-columnar) property.
///
/// The shape decides the wire layout: strings, numbers, booleans, objects
/// whose declared sub-properties are all primitive, and arrays of
/// primitives serialize inline; everything else goes through the
/// out-of-band complex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FauxKind {
    /// A Latin-1 string of at most 255 characters.
    String,
    /// An f64 number.
    Number,
    /// A boolean.
    Boolean,
    /// An object with a declared, ordered property set.
    Object(Vec<(String, FauxKind)>),
    /// A homogeneous array of the given item kind.
    Array(Box<FauxKind>),
    /// An arbitrary value; always serialized out-of-band.
    Any,
}

impl FauxKind {
    /// Whether this kind is a primitive leaf.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::String | Self::Number | Self::Boolean)
    }

    /// Whether concrete values of this kind serialize inline.
    ///
    /// Objects qualify when every declared sub-property is primitive
    /// (the "shallow-simple" case); arrays when their item kind is.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        match self {
            Self::String | Self::Number | Self::Boolean => true,
            Self::Object(props) => props.iter().all(|(_, kind)| kind.is_primitive()),
            Self::Array(items) => items.is_primitive(),
            Self::Any => false,
        }
    }
}

/// Storage class of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// One dense element per entity.
    Scalar {
        /// Element type of the column.
        element: ElementType,
        /// Project reads to JSON booleans.
        boolean: bool,
    },
    /// A fixed-length slice per entity in a shared backing buffer.
    Subarray {
        /// Element type of the backing buffer.
        element: ElementType,
        /// Slice length per entity.
        len: usize,
    },
    /// An eid-keyed map to arbitrary JSON values.
    Faux {
        /// Declared value shape.
        kind: FauxKind,
    },
}

/// One property of a component schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Property key. `"type"` is reserved and rejected by the builder.
    pub key: String,
    /// Storage class.
    pub kind: PropertyKind,
    /// Default applied by `add_component` when `reset` is true
    /// (`Value::Null` means the zero state).
    pub default: Value,
}

/// Validates component overrides before they are written to a store.
///
/// Any JSON-schema-style implementation satisfies this contract; the
/// default is a descriptor-driven [`SchemaValidator`].
pub trait OverrideValidator: Send + Sync {
    /// Checks `overrides` and reports every failing key.
    ///
    /// # Errors
    ///
    /// Returns the collected issues when any key is rejected.
    fn validate(&self, overrides: &serde_json::Map<String, Value>)
        -> Result<(), Vec<ValidationIssue>>;
}

/// A runtime component schema.
///
/// Frozen once built; shared between the registry and every world through
/// [`ComponentType`] handles.
pub struct ComponentSchema {
    type_name: String,
    properties: Vec<PropertyDescriptor>,
    validator: Arc<dyn OverrideValidator>,
}

impl std::fmt::Debug for ComponentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSchema")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl ComponentSchema {
    /// The globally-unique component type name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Ordered property descriptors.
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Whether this schema is a tag component (no properties).
    #[inline]
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.properties.is_empty()
    }

    /// The precomputed validator.
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &Arc<dyn OverrideValidator> {
        &self.validator
    }
}

/// Builder for [`ComponentSchema`].
///
/// ```rust,ignore
/// let schema = ComponentBuilder::new("Velocity")
///     .field("x", ElementType::F64, 0.0)
///     .subarray("xyz", ElementType::F32, 3, serde_json::json!([0, 0, 0]))
///     .build();
/// ```
pub struct ComponentBuilder {
    type_name: String,
    properties: Vec<PropertyDescriptor>,
    validator: Option<Arc<dyn OverrideValidator>>,
}

impl ComponentBuilder {
    /// Starts a schema for `type_name`.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
            validator: None,
        }
    }

    fn push(mut self, key: impl Into<String>, kind: PropertyKind, default: Value) -> Self {
        let key = key.into();
        debug_assert!(key != "type", "'type' is a reserved property key");
        self.properties.push(PropertyDescriptor { key, kind, default });
        self
    }

    /// Adds a typed scalar column.
    #[must_use]
    pub fn field(self, key: impl Into<String>, element: ElementType, default: f64) -> Self {
        let default = if default == 0.0 {
            Value::Null
        } else {
            serde_json::json!(default)
        };
        self.push(key, PropertyKind::Scalar { element, boolean: false }, default)
    }

    /// Adds a boolean column (u8 storage, boolean projection on read).
    #[must_use]
    pub fn boolean(self, key: impl Into<String>, default: bool) -> Self {
        let default = if default { Value::Bool(true) } else { Value::Null };
        self.push(
            key,
            PropertyKind::Scalar { element: ElementType::U8, boolean: true },
            default,
        )
    }

    /// Adds a fixed-length subarray column.
    #[must_use]
    pub fn subarray(
        self,
        key: impl Into<String>,
        element: ElementType,
        len: usize,
        default: Value,
    ) -> Self {
        self.push(key, PropertyKind::Subarray { element, len }, default)
    }

    /// Adds a faux (eid-keyed) property of the given declared shape.
    #[must_use]
    pub fn faux(self, key: impl Into<String>, kind: FauxKind, default: Value) -> Self {
        self.push(key, PropertyKind::Faux { kind }, default)
    }

    /// Replaces the default descriptor-driven validator.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn OverrideValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Finalizes the schema, precomputing the validator if none was set.
    #[must_use]
    pub fn build(self) -> ComponentSchema {
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(SchemaValidator::new(&self.properties)));
        ComponentSchema {
            type_name: self.type_name,
            properties: self.properties,
            validator,
        }
    }
}

/// The default validator, derived from a schema's property descriptors.
///
/// Rejects unknown keys and values whose JSON type does not match the
/// declared property kind. The reserved `type` key is ignored.
pub struct SchemaValidator {
    properties: Vec<PropertyDescriptor>,
}

impl SchemaValidator {
    /// Precomputes a validator for the given descriptors.
    #[must_use]
    pub fn new(properties: &[PropertyDescriptor]) -> Self {
        Self { properties: properties.to_vec() }
    }

    fn check_faux(kind: &FauxKind, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        match kind {
            FauxKind::String => value
                .as_str()
                .map(|_| ())
                .ok_or_else(|| "expected string".to_string()),
            FauxKind::Number => value
                .as_f64()
                .map(|_| ())
                .ok_or_else(|| "expected number".to_string()),
            FauxKind::Boolean => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| "expected boolean".to_string()),
            FauxKind::Object(props) => {
                let obj = value.as_object().ok_or_else(|| "expected object".to_string())?;
                for (sub_key, sub_kind) in props {
                    if let Some(sub) = obj.get(sub_key) {
                        Self::check_faux(sub_kind, sub)
                            .map_err(|msg| format!("{sub_key}: {msg}"))?;
                    }
                }
                Ok(())
            }
            FauxKind::Array(items) => {
                let arr = value.as_array().ok_or_else(|| "expected array".to_string())?;
                for (i, item) in arr.iter().enumerate() {
                    Self::check_faux(items, item).map_err(|msg| format!("[{i}]: {msg}"))?;
                }
                Ok(())
            }
            FauxKind::Any => Ok(()),
        }
    }
}

impl OverrideValidator for SchemaValidator {
    fn validate(
        &self,
        overrides: &serde_json::Map<String, Value>,
    ) -> Result<(), Vec<ValidationIssue>> {
        let mut errors = Vec::new();
        for (key, value) in overrides {
            if key == "type" {
                continue;
            }
            let Some(descriptor) = self.properties.iter().find(|p| &p.key == key) else {
                errors.push(ValidationIssue {
                    key: key.clone(),
                    message: "unknown property".to_string(),
                });
                continue;
            };
            let failure = match &descriptor.kind {
                PropertyKind::Scalar { boolean: true, .. } => {
                    (!value.is_boolean() && !value.is_number())
                        .then(|| "expected boolean".to_string())
                }
                PropertyKind::Scalar { .. } => {
                    (!value.is_number()).then(|| "expected number".to_string())
                }
                PropertyKind::Subarray { len, .. } => match value.as_array() {
                    None => Some("expected array".to_string()),
                    Some(arr) if arr.len() > *len => {
                        Some(format!("expected at most {len} elements, got {}", arr.len()))
                    }
                    Some(arr) if arr.iter().any(|v| !v.is_number()) => {
                        Some("expected numeric elements".to_string())
                    }
                    Some(_) => None,
                },
                PropertyKind::Faux { kind } => Self::check_faux(kind, value).err(),
            };
            if let Some(message) = failure {
                errors.push(ValidationIssue { key: key.clone(), message });
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn velocity() -> ComponentSchema {
        ComponentBuilder::new("Velocity")
            .field("x", ElementType::F64, 0.0)
            .field("y", ElementType::F64, 0.0)
            .subarray("xyz", ElementType::F32, 3, Value::Null)
            .build()
    }

    #[test]
    fn test_tag_schema() {
        let schema = ComponentBuilder::new("Frozen").build();
        assert!(schema.is_tag());
        assert_eq!(schema.type_name(), "Frozen");
    }

    #[test]
    fn test_index_type_widths() {
        assert_eq!(ElementType::index_type_for(3), ElementType::U8);
        assert_eq!(ElementType::index_type_for(255), ElementType::U8);
        assert_eq!(ElementType::index_type_for(256), ElementType::U16);
        assert_eq!(ElementType::index_type_for(65_535), ElementType::U16);
        assert_eq!(ElementType::index_type_for(65_536), ElementType::U32);
    }

    #[test]
    fn test_element_tag_roundtrip() {
        for element in [
            ElementType::I8,
            ElementType::U8,
            ElementType::U8C,
            ElementType::I16,
            ElementType::U16,
            ElementType::I32,
            ElementType::U32,
            ElementType::F32,
            ElementType::F64,
            ElementType::Eid,
        ] {
            assert_eq!(ElementType::from_tag(element.tag()), Some(element));
        }
        assert_eq!(ElementType::from_tag("u128"), None);
    }

    #[test]
    fn test_validator_accepts_matching_overrides() {
        let schema = velocity();
        let overrides = json!({"x": 30.0, "xyz": [1.0, 2.0, 3.0]});
        assert!(schema
            .validator()
            .validate(overrides.as_object().unwrap())
            .is_ok());
    }

    #[test]
    fn test_validator_rejects_unknown_key() {
        let schema = velocity();
        let overrides = json!({"z": 1.0});
        let errors = schema
            .validator()
            .validate(overrides.as_object().unwrap())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, "z");
    }

    #[test]
    fn test_validator_rejects_wrong_types() {
        let schema = velocity();
        let overrides = json!({"x": "fast", "xyz": [1.0, "two"]});
        let errors = schema
            .validator()
            .validate(overrides.as_object().unwrap())
            .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_validator_rejects_oversized_subarray() {
        let schema = velocity();
        let overrides = json!({"xyz": [1, 2, 3, 4]});
        assert!(schema
            .validator()
            .validate(overrides.as_object().unwrap())
            .is_err());
    }

    #[test]
    fn test_faux_object_inline_detection() {
        let shallow = FauxKind::Object(vec![
            ("name".to_string(), FauxKind::String),
            ("score".to_string(), FauxKind::Number),
        ]);
        assert!(shallow.is_inline());

        let nested = FauxKind::Object(vec![(
            "inner".to_string(),
            FauxKind::Object(vec![("x".to_string(), FauxKind::Number)]),
        )]);
        assert!(!nested.is_inline());

        assert!(FauxKind::Array(Box::new(FauxKind::Number)).is_inline());
        assert!(!FauxKind::Array(Box::new(FauxKind::Any)).is_inline());
        assert!(!FauxKind::Any.is_inline());
    }
}
