use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::component::{Component, TypedComponent};

/// Unique identifier for every entity in the world.
///
/// Drawn from the world RNG, so spawning is reproducible under a fixed seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A flexible metadata value that supports common types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A text value.
    String(String),
    /// A 64-bit signed integer value.
    Integer(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A boolean value.
    Boolean(bool),
    /// An ordered list of metadata values.
    List(Vec<MetadataValue>),
    /// A string-keyed map of metadata values.
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Map(_) => write!(f, "{{...}}"),
        }
    }
}

/// An identifier plus an open set of components, keyed by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique, immutable identifier.
    pub id: EntityId,
    #[serde(default)]
    components: BTreeMap<String, Component>,
}

impl Entity {
    /// An entity with no components.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
        }
    }

    /// Builder form of [`Entity::insert`].
    pub fn with(mut self, component: impl Into<Component>) -> Self {
        self.insert(component);
        self
    }

    /// Attach a component, replacing any other of the same type name.
    pub fn insert(&mut self, component: impl Into<Component>) -> Option<Component> {
        let component = component.into();
        self.components
            .insert(component.type_name().to_string(), component)
    }

    /// Detach a component by type name.
    pub fn remove(&mut self, type_name: &str) -> Option<Component> {
        self.components.remove(type_name)
    }

    /// True if a component with this type name is attached.
    pub fn has(&self, type_name: &str) -> bool {
        self.components.contains_key(type_name)
    }

    /// Type names of the attached components, in sorted order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Untyped lookup by type name.
    pub fn component(&self, type_name: &str) -> Option<&Component> {
        self.components.get(type_name)
    }

    /// Typed lookup; `None` if absent or of another shape.
    pub fn get<T: TypedComponent>(&self) -> Option<&T> {
        self.components
            .get(T::TYPE_NAME)
            .and_then(T::from_component)
    }

    /// Mutable typed lookup.
    pub fn get_mut<T: TypedComponent>(&mut self) -> Option<&mut T> {
        self.components
            .get_mut(T::TYPE_NAME)
            .and_then(T::from_component_mut)
    }

    /// Typed access, inserting a default component when absent.
    ///
    /// Returns `None` only if a component of another shape is stored under
    /// the same name.
    pub fn get_or_default<T: TypedComponent + Default>(&mut self) -> Option<&mut T> {
        self.components
            .entry(T::TYPE_NAME.to_string())
            .or_insert_with(|| T::default().into_component());
        self.get_mut::<T>()
    }

    /// Every attached component, ordered by type name.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }
}
