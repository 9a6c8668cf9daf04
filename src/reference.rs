//! Safe entity handles.
//!
//! A [`Reference`] never dangles: once its target is despawned the arena's
//! generation check makes every lookup return `None`. The kind parameter
//! records which capability flags the holder expects the target to carry.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::entity::{Entities, Entity, EntityKey};
use crate::types::EntityKind;

/// Marker for the capability flags a reference promises.
pub trait RefKind: 'static {
    const REQUIRED: EntityKind;
}

/// Any entity at all.
#[derive(Copy, Clone, Debug)]
pub enum AnyEntity {}

/// A player-controlled body.
#[derive(Copy, Clone, Debug)]
pub enum Player {}

/// A collectible.
#[derive(Copy, Clone, Debug)]
pub enum Pickup {}

/// A simple projectile.
#[derive(Copy, Clone, Debug)]
pub enum Projectile {}

impl RefKind for AnyEntity {
    const REQUIRED: EntityKind = EntityKind::empty();
}

impl RefKind for Player {
    const REQUIRED: EntityKind = EntityKind::PLAYER;
}

impl RefKind for Pickup {
    const REQUIRED: EntityKind = EntityKind::PICKUP;
}

impl RefKind for Projectile {
    const REQUIRED: EntityKind = EntityKind::PROJECTILE;
}

/// Copyable handle that degrades to "invalid" when its target is destroyed.
pub struct Reference<K: RefKind = AnyEntity> {
    key: Option<EntityKey>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: RefKind> Reference<K> {
    /// A handle that never resolves.
    pub const fn invalid() -> Self {
        Self { key: None, _kind: PhantomData }
    }

    pub(crate) fn from_key(key: EntityKey) -> Self {
        Self { key: Some(key), _kind: PhantomData }
    }

    /// The underlying arena key, if this handle ever pointed anywhere.
    pub fn key(&self) -> Option<EntityKey> {
        self.key
    }

    /// The target, or `None` once it has been despawned.
    pub fn get<'a>(&self, entities: &'a Entities) -> Option<&'a Entity> {
        self.key.and_then(|k| entities.get(k))
    }

    pub fn get_mut<'a>(&self, entities: &'a mut Entities) -> Option<&'a mut Entity> {
        self.key.and_then(move |k| entities.get_mut(k))
    }

    pub fn is_valid(&self, entities: &Entities) -> bool {
        self.get(entities).is_some()
    }

    /// Forget the kind promise. Always legal.
    pub fn upcast(self) -> Reference<AnyEntity> {
        Reference { key: self.key, _kind: PhantomData }
    }

    /// Checked conversion: `None` if the live target lacks `J`'s flags.
    /// A stale handle converts to an invalid one.
    pub fn downcast<J: RefKind>(self, entities: &Entities) -> Option<Reference<J>> {
        match self.get(entities) {
            Some(e) if !e.kind().contains(J::REQUIRED) => None,
            Some(_) => Some(Reference { key: self.key, _kind: PhantomData }),
            None => Some(Reference::invalid()),
        }
    }

    /// Unchecked conversion. Debug builds assert the live target carries
    /// `J`'s flags; null targets are always accepted.
    pub fn cast<J: RefKind>(self, entities: &Entities) -> Reference<J> {
        debug_assert!(
            self.get(entities).is_none_or(|e| e.kind().contains(J::REQUIRED)),
            "illegal reference cast to {}",
            std::any::type_name::<J>()
        );
        Reference { key: self.key, _kind: PhantomData }
    }
}

impl<K: RefKind> Default for Reference<K> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<K: RefKind> Clone for Reference<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: RefKind> Copy for Reference<K> {}

impl<K: RefKind> PartialEq for Reference<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: RefKind> Eq for Reference<K> {}

impl<K: RefKind> Hash for Reference<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K: RefKind> fmt::Debug for Reference<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("kind", &std::any::type_name::<K>())
            .field("key", &self.key)
            .finish()
    }
}

impl From<Reference<Player>> for Reference<AnyEntity> {
    fn from(r: Reference<Player>) -> Self {
        r.upcast()
    }
}

impl From<Reference<Pickup>> for Reference<AnyEntity> {
    fn from(r: Reference<Pickup>) -> Self {
        r.upcast()
    }
}

impl From<Reference<Projectile>> for Reference<AnyEntity> {
    fn from(r: Reference<Projectile>) -> Self {
        r.upcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDesc;
    use glam::Vec2;

    fn player_desc() -> EntityDesc {
        EntityDesc::circle(Vec2::ZERO, 1.0, 1.0).with_kind(EntityKind::PLAYER)
    }

    #[test]
    fn test_reference_invalid_after_despawn() {
        let mut entities = Entities::new();
        let k = entities.spawn(EntityDesc::default()).unwrap();
        let r = entities.get(k).unwrap().reference();
        let copy = r;
        assert!(r.is_valid(&entities));
        entities.despawn(k);
        assert!(!r.is_valid(&entities));
        assert!(copy.get(&entities).is_none());
        assert!(copy.get_mut(&mut entities).is_none());
    }

    #[test]
    fn test_reference_survives_slot_reuse_as_invalid() {
        let mut entities = Entities::new();
        let k = entities.spawn(EntityDesc::default()).unwrap();
        let r = entities.reference(k);
        entities.despawn(k);
        let newcomer = entities.spawn(EntityDesc::default()).unwrap();
        assert!(!r.is_valid(&entities));
        assert!(entities.reference(newcomer).is_valid(&entities));
    }

    #[test]
    fn test_default_reference_is_invalid() {
        let entities = Entities::new();
        let r: Reference = Reference::default();
        assert!(!r.is_valid(&entities));
        assert_eq!(r.key(), None);
    }

    #[test]
    fn test_downcast_checks_flags() {
        let mut entities = Entities::new();
        let p = entities.spawn(player_desc()).unwrap();
        let rock = entities.spawn(EntityDesc::default()).unwrap();

        let as_player = entities.reference(p).downcast::<Player>(&entities);
        assert!(as_player.is_some());
        assert!(entities.reference(rock).downcast::<Player>(&entities).is_none());

        let back: Reference = as_player.unwrap().into();
        assert_eq!(back, entities.reference(p));
    }

    #[test]
    fn test_stale_downcast_yields_invalid() {
        let mut entities = Entities::new();
        let p = entities.spawn(EntityDesc::default()).unwrap();
        let r = entities.reference(p);
        entities.despawn(p);
        let cast = r.downcast::<Pickup>(&entities).unwrap();
        assert!(!cast.is_valid(&entities));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal reference cast")]
    fn test_cast_asserts_in_debug() {
        let mut entities = Entities::new();
        let rock = entities.spawn(EntityDesc::default()).unwrap();
        let _ = entities.reference(rock).cast::<Projectile>(&entities);
    }
}
