use std::cmp::Ordering;
use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::reference::Reference;

/// How an entity participates in queries and impulse response.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionType {
    /// Invisible to every collision query.
    #[default]
    None,
    /// Reports contact but never receives an impulse.
    NonSolid,
    /// Reports contact and bounces.
    Solid,
}

impl CollisionType {
    /// Query filter: Solid always, NonSolid on request, None never.
    #[inline]
    pub fn admitted(self, include_nonsolid: bool) -> bool {
        match self {
            CollisionType::Solid => true,
            CollisionType::NonSolid => include_nonsolid,
            CollisionType::None => false,
        }
    }
}

bitflags::bitflags! {
    /// Capability flags consulted by collision policy.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntityKind: u32 {
        /// Player-controlled body.
        const PLAYER = 1 << 0;
        /// Collectible; never bounces off players or projectiles.
        const PICKUP = 1 << 1;
        /// Simple projectile (bullet, shell).
        const PROJECTILE = 1 << 2;
        /// Hostile body (asteroid, ship).
        const ENEMY = 1 << 3;
    }
}

/// Which tree a radius is requested for. A body may be larger on screen than
/// it is physically.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreePurpose {
    #[default]
    Physics,
    Render,
}

/// One detected contact, produced fresh every tick.
#[derive(Copy, Clone, Debug)]
pub struct CollisionPair {
    /// The entity whose `collide_entity` call reported the pair.
    pub entity_a: Reference,
    pub entity_b: Reference,
    pub contact_point: Vec2,
    /// Unit length, pointing toward `entity_a`.
    pub contact_normal: Vec2,
    /// Always `>= 0`; zero when no physical response was applied.
    pub impulse_magnitude: f32,
}

pub type CollisionPairList = Vec<CollisionPair>;

/// A line-trace hit. Ordered by `t`, then by entity id, so a
/// [`LineTraceResult`] iterates nearest-first.
#[derive(Copy, Clone, Debug)]
pub struct LineTraceBinding {
    /// Parametric entry distance in `[0, 1]`, clamped to 0 when the trace
    /// starts inside the entity.
    pub t: f32,
    pub id: EntityId,
    pub entity: Reference,
}

impl PartialEq for LineTraceBinding {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LineTraceBinding {}

impl PartialOrd for LineTraceBinding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LineTraceBinding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.t.total_cmp(&other.t).then(self.id.cmp(&other.id))
    }
}

pub type LineTraceResult = BTreeSet<LineTraceBinding>;

/// Structural statistics for a quad tree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub entities: usize,
    pub max_depth_reached: u8,
}

/// Timing breakdown for the last completed world step.
#[derive(Copy, Clone, Debug, Default)]
pub struct StepTiming {
    pub step_ms: f64,
    pub collide_ms: f64,
    pub integrate_ms: f64,
    pub relocate_ms: f64,

    pub pairs_emitted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;
    use slotmap::KeyData;

    fn binding(t: f32, id: u64) -> LineTraceBinding {
        let key = EntityKey::from(KeyData::from_ffi(id));
        LineTraceBinding { t, id: EntityId(id), entity: Reference::from_key(key) }
    }

    #[test]
    fn test_collision_type_filter() {
        assert!(CollisionType::Solid.admitted(false));
        assert!(!CollisionType::NonSolid.admitted(false));
        assert!(CollisionType::NonSolid.admitted(true));
        assert!(!CollisionType::None.admitted(true));
    }

    #[test]
    fn test_bindings_order_nearest_first_then_id() {
        let mut set = LineTraceResult::new();
        set.insert(binding(0.5, 1));
        set.insert(binding(0.25, 7));
        set.insert(binding(0.5, 0));
        let order: Vec<u64> = set.iter().map(|b| b.id.0).collect();
        assert_eq!(order, vec![7, 0, 1]);
    }
}
