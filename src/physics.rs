//! Collision policy that sits above the index.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{CollisionError, Result};
use crate::types::{CollisionType, EntityKind};

/// Tuning for impulse response and speed limits.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Ceiling for non-solid, non-colliding and projectile entities.
    pub fast_max_speed: f32,
    /// Ceiling for everything else.
    pub max_speed: f32,
    /// Scale applied to the solved impulse roots, in `(0, 1]`.
    pub impulse_damping: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fast_max_speed: 1000.0,
            max_speed: 400.0,
            impulse_damping: 0.8,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fast_max_speed > 0.0) || !(self.max_speed > 0.0) {
            return Err(CollisionError::InvalidConfig(format!(
                "speed limits must be positive (fast_max_speed={}, max_speed={})",
                self.fast_max_speed, self.max_speed
            )));
        }
        if !(self.impulse_damping > 0.0 && self.impulse_damping <= 1.0) {
            return Err(CollisionError::InvalidConfig(format!(
                "impulse_damping must be in (0, 1], got {}",
                self.impulse_damping
            )));
        }
        Ok(())
    }
}

/// Pairwise exemptions and per-entity speed ceilings.
#[derive(Clone, Debug, Default)]
pub struct PhysicsHandler {
    cfg: PhysicsConfig,
}

impl PhysicsHandler {
    pub fn new(cfg: PhysicsConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.cfg
    }

    /// Pickups never bounce off players or projectiles; contact is still
    /// reported so pickup logic can fire.
    pub fn collision_exemption(&self, a: &Entity, b: &Entity) -> bool {
        let grabber = EntityKind::PLAYER | EntityKind::PROJECTILE;
        (a.is(EntityKind::PICKUP) && b.kind().intersects(grabber))
            || (b.is(EntityKind::PICKUP) && a.kind().intersects(grabber))
    }

    /// Velocity ceiling the integrator clamps to after applying forces.
    pub fn max_speed(&self, entity: &Entity) -> f32 {
        if entity.collision_type() != CollisionType::Solid || entity.is(EntityKind::PROJECTILE) {
            self.cfg.fast_max_speed
        } else {
            self.cfg.max_speed
        }
    }

    pub fn clamp_velocity(&self, entity: &mut Entity) {
        let limit = self.max_speed(entity);
        let v = entity.velocity();
        if v.length_squared() > limit * limit {
            entity.set_velocity(v.clamp_length_max(limit));
        }
    }
}
