//! Circular bodies and the generational arena that owns them.

use std::ops::{Index, IndexMut};

use glam::Vec2;
use slotmap::{SlotMap, new_key_type};

use crate::error::{CollisionError, Result};
use crate::reference::{AnyEntity, RefKind, Reference};
use crate::types::{CollisionType, EntityKind, TreePurpose};

new_key_type! {
    /// Generation-tagged arena key. A key whose entity was despawned never
    /// resolves again, even if its slot is reused.
    pub struct EntityKey;
}

/// Spawn serial. Gives every entity a reproducible total order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

/// Everything needed to spawn an entity.
#[derive(Copy, Clone, Debug)]
pub struct EntityDesc {
    pub kind: EntityKind,
    pub collision_type: CollisionType,
    pub translation: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub mass: f32,
    pub elasticity: f32,
    /// Physics radius.
    pub radius: f32,
    /// Radius reported to render trees; defaults to `radius`.
    pub render_radius: Option<f32>,
}

impl Default for EntityDesc {
    fn default() -> Self {
        Self {
            kind: EntityKind::empty(),
            collision_type: CollisionType::Solid,
            translation: Vec2::ZERO,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mass: 1.0,
            elasticity: 0.0,
            radius: 1.0,
            render_radius: None,
        }
    }
}

impl EntityDesc {
    /// Convenience: a solid circle at rest.
    pub fn circle(translation: Vec2, radius: f32, mass: f32) -> Self {
        Self { translation, radius, mass, ..Default::default() }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_collision_type(mut self, collision_type: CollisionType) -> Self {
        self.collision_type = collision_type;
        self
    }

    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity;
        self
    }

    pub fn with_render_radius(mut self, radius: f32) -> Self {
        self.render_radius = Some(radius);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.mass > 0.0) {
            return Err(CollisionError::NonPositiveMass(self.mass));
        }
        if !(self.radius > 0.0) {
            return Err(CollisionError::NonPositiveRadius(self.radius));
        }
        if let Some(r) = self.render_radius {
            if !(r > 0.0) {
                return Err(CollisionError::NonPositiveRadius(r));
            }
        }
        if !(self.elasticity >= 0.0) {
            return Err(CollisionError::NegativeElasticity(self.elasticity));
        }
        Ok(())
    }
}

/// A movable circular body.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    key: EntityKey,
    kind: EntityKind,
    collision_type: CollisionType,
    translation: Vec2,
    velocity: Vec2,
    angular_velocity: f32,
    mass: f32,
    elasticity: f32,
    radius: f32,
    render_radius: f32,
    accumulated_force: Vec2,
}

impl Entity {
    fn from_desc(id: EntityId, key: EntityKey, desc: EntityDesc) -> Self {
        Self {
            id,
            key,
            kind: desc.kind,
            collision_type: desc.collision_type,
            translation: desc.translation,
            velocity: desc.velocity,
            angular_velocity: desc.angular_velocity,
            mass: desc.mass,
            elasticity: desc.elasticity,
            radius: desc.radius,
            render_radius: desc.render_radius.unwrap_or(desc.radius),
            accumulated_force: Vec2::ZERO,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// A safe handle to this entity.
    pub fn reference(&self) -> Reference {
        Reference::from_key(self.key)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is(&self, kind: EntityKind) -> bool {
        self.kind.contains(kind)
    }

    pub fn collision_type(&self) -> CollisionType {
        self.collision_type
    }

    pub fn set_collision_type(&mut self, collision_type: CollisionType) {
        self.collision_type = collision_type;
    }

    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    /// Moving an indexed entity requires `relocate` on every tree holding it.
    pub fn set_translation(&mut self, translation: Vec2) {
        self.translation = translation;
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f32) {
        self.angular_velocity = angular_velocity;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn set_mass(&mut self, mass: f32) {
        debug_assert!(mass > 0.0, "mass must stay positive, got {mass}");
        self.mass = mass;
    }

    pub fn elasticity(&self) -> f32 {
        self.elasticity
    }

    pub fn set_elasticity(&mut self, elasticity: f32) {
        debug_assert!(elasticity >= 0.0, "elasticity must be non-negative, got {elasticity}");
        self.elasticity = elasticity;
    }

    /// Effective radius for a given tree.
    pub fn radius(&self, purpose: TreePurpose) -> f32 {
        match purpose {
            TreePurpose::Physics => self.radius,
            TreePurpose::Render => self.render_radius,
        }
    }

    pub fn set_radius(&mut self, purpose: TreePurpose, radius: f32) {
        debug_assert!(radius > 0.0, "radius must be positive, got {radius}");
        match purpose {
            TreePurpose::Physics => self.radius = radius,
            TreePurpose::Render => self.render_radius = radius,
        }
    }

    pub fn accumulated_force(&self) -> Vec2 {
        self.accumulated_force
    }

    pub fn accumulate_force(&mut self, force: Vec2) {
        self.accumulated_force += force;
    }

    pub fn reset_force(&mut self) {
        self.accumulated_force = Vec2::ZERO;
    }
}

/// Owner of every live entity.
#[derive(Debug, Default)]
pub struct Entities {
    slots: SlotMap<EntityKey, Entity>,
    next_id: u64,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, desc: EntityDesc) -> Result<EntityKey> {
        desc.validate()?;
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let key = self.slots.insert_with_key(|key| Entity::from_desc(id, key, desc));
        log::debug!("spawned entity {:?} at {:?}", id, desc.translation);
        Ok(key)
    }

    /// Remove an entity. Every outstanding reference to it turns invalid.
    pub fn despawn(&mut self, key: EntityKey) -> Option<Entity> {
        let removed = self.slots.remove(key);
        if let Some(e) = &removed {
            log::debug!("despawned entity {:?}", e.id);
        }
        removed
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.slots.get(key)
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.slots.get_mut(key)
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Reference to `key`, or an invalid reference if it is not alive.
    pub fn reference(&self, key: EntityKey) -> Reference {
        if self.contains(key) { Reference::from_key(key) } else { Reference::invalid() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityKey, &mut Entity)> {
        self.slots.iter_mut()
    }

    /// Live keys sorted by spawn order.
    pub fn keys_by_id(&self) -> Vec<EntityKey> {
        let mut keys: Vec<(EntityId, EntityKey)> =
            self.slots.iter().map(|(k, e)| (e.id, k)).collect();
        keys.sort_unstable_by_key(|(id, _)| *id);
        keys.into_iter().map(|(_, k)| k).collect()
    }

    pub fn reset_forces(&mut self) {
        for e in self.slots.values_mut() {
            e.reset_force();
        }
    }
}

/// Asserting dereference; check [`Reference::is_valid`] first.
impl<K: RefKind> Index<Reference<K>> for Entities {
    type Output = Entity;

    fn index(&self, reference: Reference<K>) -> &Entity {
        match reference.get(self) {
            Some(e) => e,
            None => panic!("dereferenced an invalid entity reference"),
        }
    }
}

impl<K: RefKind> IndexMut<Reference<K>> for Entities {
    fn index_mut(&mut self, reference: Reference<K>) -> &mut Entity {
        match reference.get_mut(self) {
            Some(e) => e,
            None => panic!("dereferenced an invalid entity reference"),
        }
    }
}

impl From<&Entity> for Reference<AnyEntity> {
    fn from(entity: &Entity) -> Self {
        entity.reference()
    }
}
