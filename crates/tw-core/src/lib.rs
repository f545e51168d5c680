//! Core types for tickworld: the clock, resources, modifiers, entities and
//! the world state that owns them.
//!
//! Nothing in this crate drives time forward on its own; the `tw-sim` crate
//! runs the tick loop and calls into [`WorldState`].

/// Hourly clock with calendar boundaries and the run's RNG.
pub mod clock;
/// Typed component records attached to entities.
pub mod component;
/// Effect arithmetic and modifier stacking.
pub mod effect;
/// Entity identifiers, entities, and metadata values.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Calendar frequencies and period boundaries.
pub mod frequency;
/// Timed modifiers and their renewal policy.
pub mod modifier;
/// Global resources.
pub mod resource;
/// Seeded, serializable random generator.
pub mod rng;
/// Serializable world snapshots.
pub mod snapshot;
/// Resource status classification.
pub mod status;
/// The world state container.
pub mod world;

/// Re-export clock and RNG.
pub use clock::SimClock;
pub use rng::SimRng;
/// Re-export component types.
pub use component::{
    Component, CustomComponent, EmploymentComponent, HouseholdComponent, InventoryComponent,
    NeedState, NeedsComponent, PressureComponent, ResourceHoldings, TypedComponent,
    WealthComponent,
};
/// Re-export effect types.
pub use effect::{Direction, EffectKind, LegacyEffect, ModifierEffect, ValueDomain};
/// Re-export entity types.
pub use entity::{Entity, EntityId, MetadataValue};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
pub use frequency::Frequency;
/// Re-export modifier types.
pub use modifier::{Modifier, ModifierId, ModifierSpec, ModifierTarget, RenewalPolicy};
/// Re-export resource types.
pub use resource::{Resource, ResourceSpec};
pub use snapshot::{SNAPSHOT_VERSION, WorldSnapshot};
pub use status::ResourceStatus;
/// Re-export the world state.
pub use world::WorldState;
