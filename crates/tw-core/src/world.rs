use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::clock::SimClock;
use crate::component::{Component, TypedComponent};
use crate::effect::{ValueDomain, stack_effects};
use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::modifier::{Modifier, ModifierId, ModifierSpec, ModifierTarget};
use crate::resource::Resource;
use crate::rng::SimRng;
use crate::snapshot::{SNAPSHOT_VERSION, WorldSnapshot};

/// The shared state every behavior module reads and mutates.
///
/// Owns the clock (and with it the RNG), global resources, modifiers,
/// entities and the ids of registered modules. All stores are ordered maps,
/// so iteration order never depends on hashing and a run replays exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    clock: SimClock,
    resources: BTreeMap<String, Resource>,
    modifiers: BTreeMap<ModifierId, Modifier>,
    entities: BTreeMap<EntityId, Entity>,
    modules: Vec<String>,
}

impl WorldState {
    /// An empty world at `start` whose RNG is seeded with `seed`.
    pub fn new(start: NaiveDateTime, seed: u64) -> Self {
        Self {
            clock: SimClock::new(start, seed),
            resources: BTreeMap::new(),
            modifiers: BTreeMap::new(),
            entities: BTreeMap::new(),
            modules: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Clock & RNG
    // -----------------------------------------------------------------------

    /// The clock, which also owns the RNG.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Mutable clock, used by the driver to advance time.
    pub fn clock_mut(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    /// Current simulated timestamp.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Ticks elapsed since the world was created.
    pub fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// The run's only random source. Modules must draw from here.
    pub fn rng_mut(&mut self) -> &mut SimRng {
        self.clock.rng_mut()
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Register a validated resource. Identifiers must be unique.
    pub fn add_resource(&mut self, resource: Resource) -> CoreResult<()> {
        if self.resources.contains_key(&resource.id) {
            return Err(CoreError::DuplicateResource(resource.id));
        }
        self.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    /// Look up a resource by id.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Mutable lookup of a resource by id.
    pub fn resource_mut(&mut self, id: &str) -> Option<&mut Resource> {
        self.resources.get_mut(id)
    }

    /// Every resource, in id order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Current amount of a resource, `None` for unknown ids.
    pub fn resource_amount(&self, id: &str) -> Option<f64> {
        self.resources.get(id).map(Resource::amount)
    }

    /// Add to a resource. Returns the applied delta; unknown ids apply nothing.
    pub fn add_to_resource(&mut self, id: &str, amount: f64) -> f64 {
        match self.resources.get_mut(id) {
            Some(resource) => resource.add(amount),
            None => {
                tracing::debug!(resource = id, "add to unknown resource ignored");
                0.0
            }
        }
    }

    /// Consume from a resource. Returns the applied delta; unknown ids apply nothing.
    pub fn consume_resource(&mut self, id: &str, amount: f64) -> f64 {
        match self.resources.get_mut(id) {
            Some(resource) => resource.consume(amount),
            None => {
                tracing::debug!(resource = id, "consume from unknown resource ignored");
                0.0
            }
        }
    }

    // -----------------------------------------------------------------------
    // Modifiers
    // -----------------------------------------------------------------------

    /// A fresh modifier id drawn from the world RNG.
    pub fn next_modifier_id(&mut self) -> ModifierId {
        ModifierId(self.rng_mut().uuid())
    }

    /// Validate a declaration, assign it an id, and store it.
    pub fn add_modifier(&mut self, spec: ModifierSpec) -> CoreResult<ModifierId> {
        let id = self.next_modifier_id();
        self.insert_modifier(Modifier::new(id, spec)?)
    }

    /// Store an already-built modifier (e.g. a renewed copy).
    pub fn insert_modifier(&mut self, modifier: Modifier) -> CoreResult<ModifierId> {
        let id = modifier.id;
        if self.modifiers.contains_key(&id) {
            return Err(CoreError::DuplicateModifier(id));
        }
        self.modifiers.insert(id, modifier);
        Ok(id)
    }

    /// Look up a modifier by id, active or not.
    pub fn modifier(&self, id: ModifierId) -> Option<&Modifier> {
        self.modifiers.get(&id)
    }

    /// Mutable lookup of a modifier by id.
    pub fn modifier_mut(&mut self, id: ModifierId) -> Option<&mut Modifier> {
        self.modifiers.get_mut(&id)
    }

    /// Every modifier, active or not.
    pub fn modifiers(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers.values()
    }

    /// Deactivate a modifier. Returns false for unknown ids.
    pub fn deactivate_modifier(&mut self, id: ModifierId) -> bool {
        match self.modifiers.get_mut(&id) {
            Some(m) => {
                m.deactivate();
                true
            }
            None => false,
        }
    }

    /// Modifiers on `target` that are active right now.
    pub fn active_modifiers_for<'a>(
        &'a self,
        target: &'a ModifierTarget,
    ) -> impl Iterator<Item = &'a Modifier> + 'a {
        let now = self.now();
        self.modifiers
            .values()
            .filter(move |m| &m.target == target && m.is_active(now))
    }

    /// Number of modifiers active at the current time.
    pub fn active_modifier_count(&self) -> usize {
        let now = self.now();
        self.modifiers.values().filter(|m| m.is_active(now)).count()
    }

    /// `base` after every active modifier on `target`, clamped to `domain`.
    pub fn effective_value(&self, target: &ModifierTarget, base: f64, domain: ValueDomain) -> f64 {
        stack_effects(
            base,
            self.active_modifiers_for(target).map(|m| &m.effect),
            domain,
        )
    }

    /// [`WorldState::effective_value`] for a resource target.
    pub fn effective_resource_value(&self, resource_id: &str, base: f64, domain: ValueDomain) -> f64 {
        self.effective_value(&ModifierTarget::Resource(resource_id.to_string()), base, domain)
    }

    /// [`WorldState::effective_value`] for a module target.
    pub fn effective_module_value(&self, module_id: &str, base: f64, domain: ValueDomain) -> f64 {
        self.effective_value(&ModifierTarget::Module(module_id.to_string()), base, domain)
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create an entity with a fresh RNG-drawn id and the given components.
    pub fn spawn_entity<I>(&mut self, components: I) -> EntityId
    where
        I: IntoIterator<Item = Component>,
    {
        let id = EntityId(self.rng_mut().uuid());
        let mut entity = Entity::new(id);
        for component in components {
            entity.insert(component);
        }
        self.entities.insert(id, entity);
        tracing::debug!(entity = %id, "spawned entity");
        id
    }

    /// Store a pre-built entity. Identifiers must be unique.
    pub fn insert_entity(&mut self, entity: Entity) -> CoreResult<EntityId> {
        let id = entity.id;
        if self.entities.contains_key(&id) {
            return Err(CoreError::DuplicateEntity(id));
        }
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Remove an entity and hand it back.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable lookup of an entity by id.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Every entity, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Typed component of one entity.
    pub fn get_component<T: TypedComponent>(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id).and_then(Entity::get::<T>)
    }

    /// Mutable typed component of one entity.
    pub fn get_component_mut<T: TypedComponent>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id).and_then(Entity::get_mut::<T>)
    }

    /// Attach a component. Returns false if the entity does not exist.
    pub fn set_component(&mut self, id: EntityId, component: impl Into<Component>) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.insert(component);
                true
            }
            None => false,
        }
    }

    /// Detach a component by type name.
    pub fn remove_component(&mut self, id: EntityId, type_name: &str) -> Option<Component> {
        self.entities
            .get_mut(&id)
            .and_then(|entity| entity.remove(type_name))
    }

    /// Every entity holding a `T`, in id order.
    pub fn query<T: TypedComponent>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entities
            .iter()
            .filter_map(|(id, entity)| entity.get::<T>().map(|c| (*id, c)))
    }

    /// Ids of entities holding a component with this type name.
    pub fn entities_with(&self, type_name: &str) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, entity)| entity.has(type_name))
            .map(|(id, _)| *id)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Modules
    // -----------------------------------------------------------------------

    /// Record a module id in registration order. Ids must be unique.
    pub fn register_module(&mut self, id: &str) -> CoreResult<()> {
        if self.modules.iter().any(|m| m == id) {
            return Err(CoreError::DuplicateModule(id.to_string()));
        }
        self.modules.push(id.to_string());
        Ok(())
    }

    /// Registered module ids, in registration order.
    pub fn module_ids(&self) -> &[String] {
        &self.modules
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Capture everything needed to rebuild an identical world.
    pub fn to_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            clock: self.clock.clone(),
            resources: self.resources.values().cloned().collect(),
            modifiers: self.modifiers.values().cloned().collect(),
            entities: self.entities.values().cloned().collect(),
            modules: self.modules.clone(),
        }
    }

    /// Rebuild a world from a snapshot, rejecting duplicates and unknown versions.
    pub fn from_snapshot(snapshot: WorldSnapshot) -> CoreResult<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut world = Self {
            clock: snapshot.clock,
            resources: BTreeMap::new(),
            modifiers: BTreeMap::new(),
            entities: BTreeMap::new(),
            modules: Vec::new(),
        };
        for resource in snapshot.resources {
            world.add_resource(resource)?;
        }
        for modifier in snapshot.modifiers {
            world.insert_modifier(modifier)?;
        }
        for entity in snapshot.entities {
            world.insert_entity(entity)?;
        }
        for module in &snapshot.modules {
            world.register_module(module)?;
        }
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{InventoryComponent, NeedsComponent, ResourceHoldings};
    use crate::effect::{Direction, ModifierEffect};
    use crate::frequency::Frequency;
    use crate::modifier::RenewalPolicy;
    use crate::resource::ResourceSpec;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn world() -> WorldState {
        let mut w = WorldState::new(start(), 42);
        w.add_resource(Resource::new(ResourceSpec::new("water", 500.0).with_capacity(1000.0)).unwrap())
            .unwrap();
        w
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_resource_rejected() {
        let mut w = world();
        let err = w
            .add_resource(Resource::new(ResourceSpec::new("water", 1.0)).unwrap())
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateResource(id) if id == "water"));
    }

    #[test]
    fn unknown_resource_is_inert() {
        let mut w = world();
        assert_eq!(w.add_to_resource("nope", 10.0), 0.0);
        assert_eq!(w.consume_resource("nope", 10.0), 0.0);
        assert!(w.resource("nope").is_none());
    }

    #[test]
    fn resource_delta_reported() {
        let mut w = world();
        assert_eq!(w.consume_resource("water", 600.0), 500.0);
        assert_eq!(w.resource_amount("water"), Some(0.0));
    }

    // -----------------------------------------------------------------------
    // Modifiers
    // -----------------------------------------------------------------------

    #[test]
    fn effective_value_uses_active_modifiers_only() {
        let mut w = world();
        w.add_modifier(ModifierSpec::new(
            "drought",
            ModifierTarget::Resource("water".into()),
            ModifierEffect::percentage(0.3, Direction::Decrease),
            2024,
            2025,
        ))
        .unwrap();
        w.add_modifier(ModifierSpec::new(
            "future",
            ModifierTarget::Resource("water".into()),
            ModifierEffect::direct(50.0, Direction::Increase),
            2030,
            2031,
        ))
        .unwrap();

        let v = w.effective_resource_value("water", 100.0, ValueDomain::NonNegative);
        assert!((v - 70.0).abs() < 1e-9);
        assert_eq!(w.active_modifier_count(), 1);
        assert_eq!(
            w.effective_resource_value("food", 100.0, ValueDomain::NonNegative),
            100.0
        );
    }

    #[test]
    fn deactivated_modifier_stops_applying() {
        let mut w = world();
        let id = w
            .add_modifier(ModifierSpec::new(
                "boost",
                ModifierTarget::Module("needs".into()),
                ModifierEffect::percentage(0.5, Direction::Increase),
                2024,
                2026,
            ))
            .unwrap();
        assert!((w.effective_module_value("needs", 2.0, ValueDomain::NonNegative) - 3.0).abs() < 1e-9);
        assert!(w.deactivate_modifier(id));
        assert_eq!(w.effective_module_value("needs", 2.0, ValueDomain::NonNegative), 2.0);
        assert!(w.modifier(id).is_some());
    }

    #[test]
    fn invalid_window_rejected() {
        let mut w = world();
        let err = w
            .add_modifier(ModifierSpec::new(
                "bad",
                ModifierTarget::Resource("water".into()),
                ModifierEffect::direct(1.0, Direction::Increase),
                2025,
                2025,
            ))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow { .. }));
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    #[test]
    fn spawn_is_reproducible_under_seed() {
        let mut a = world();
        let mut b = world();
        let ida = a.spawn_entity([Component::from(InventoryComponent::default())]);
        let idb = b.spawn_entity([Component::from(InventoryComponent::default())]);
        assert_eq!(ida, idb);
    }

    #[test]
    fn component_access_through_world() {
        let mut w = world();
        let id = w.spawn_entity([Component::from(InventoryComponent::default().with("food", 4.0))]);
        assert_eq!(w.get_component::<InventoryComponent>(id).unwrap().amount("food"), 4.0);
        assert!(w.get_component::<NeedsComponent>(id).is_none());

        assert!(w.set_component(id, NeedsComponent::default().with_need("hunger", 0.2, 0.01)));
        assert_eq!(w.query::<NeedsComponent>().count(), 1);
        assert_eq!(w.entities_with("Needs"), vec![id]);

        assert!(w.remove_component(id, "Needs").is_some());
        assert!(w.get_component::<NeedsComponent>(id).is_none());
        assert!(w.remove_entity(id).is_some());
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn set_component_on_missing_entity_is_false() {
        let mut w = world();
        let ghost = EntityId(uuid::Uuid::from_u128(5));
        assert!(!w.set_component(ghost, InventoryComponent::default()));
    }

    // -----------------------------------------------------------------------
    // Modules & snapshots
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_module_rejected() {
        let mut w = world();
        w.register_module("needs").unwrap();
        assert!(matches!(
            w.register_module("needs"),
            Err(CoreError::DuplicateModule(_))
        ));
    }

    #[test]
    fn snapshot_round_trip_is_exact() {
        let mut w = world();
        w.register_module("replenishment").unwrap();
        w.spawn_entity([
            Component::from(NeedsComponent::default().with_need("thirst", 0.3, 0.015)),
            Component::from(InventoryComponent::default().with("water", 2.5)),
        ]);
        let parent = w
            .add_modifier(
                ModifierSpec::new(
                    "drought",
                    ModifierTarget::Resource("water".into()),
                    ModifierEffect::percentage(0.3, Direction::Decrease),
                    2023,
                    2024,
                )
                .with_renewal(RenewalPolicy::new(0.5, Frequency::Yearly).with_duration(2)),
            )
            .unwrap();
        let child_id = w.next_modifier_id();
        let now = w.now();
        let parent_record = w.modifier_mut(parent).unwrap();
        parent_record.mark_renewal_checked(now);
        let child = parent_record.renew(child_id, now).unwrap();
        parent_record.deactivate();
        w.insert_modifier(child).unwrap();
        let mid = w
            .add_modifier(ModifierSpec::new(
                "flood",
                ModifierTarget::Resource("water".into()),
                ModifierEffect::direct(10.0, Direction::Increase),
                2020,
                2021,
            ))
            .unwrap();
        w.deactivate_modifier(mid);
        for _ in 0..37 {
            w.clock_mut().advance();
        }
        w.rng_mut().next_f64();

        let json = w.to_snapshot().to_json().unwrap();
        let restored = WorldState::from_snapshot(WorldSnapshot::from_json(&json).unwrap()).unwrap();
        assert_eq!(restored, w);

        let entity = restored.entities().next().unwrap();
        assert_eq!(
            entity.component_names().collect::<Vec<_>>(),
            vec!["Inventory", "Needs"]
        );
        let old = restored.modifier(parent).unwrap();
        assert!(!old.is_flagged_active());
        assert_eq!(old.successor(), Some(child_id));
        assert!(!old.renewal_due(restored.now()));
        let renewed = restored.modifier(child_id).unwrap();
        assert_eq!(renewed.parent, Some(parent));
        assert_eq!((renewed.start_period(), renewed.end_period()), (2024, 2026));
        assert!(renewed.is_active(restored.now()));
    }

    #[test]
    fn snapshot_version_checked() {
        let mut snap = world().to_snapshot();
        snap.version = 99;
        assert!(matches!(
            WorldState::from_snapshot(snap),
            Err(CoreError::SnapshotVersion { found: 99, .. })
        ));
    }
}
