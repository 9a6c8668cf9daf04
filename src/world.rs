use glam::Vec2;

use std::time::Instant;

use crate::api::CollisionQueryApi;
use crate::config::WorldConfig;
use crate::entity::{Entities, Entity, EntityDesc, EntityKey};
use crate::error::{CollisionError, Result};
use crate::physics::PhysicsHandler;
use crate::quadtree::{CollisionQuadTree, NodeId};
use crate::reference::Reference;
use crate::toroid;
use crate::types::*;

/// Per-tick driver owning the entity arena, the physics tree and the policy.
///
/// `step` runs the whole tick: reset forces, one `collide_entity` per
/// participating entity in spawn order, integration, speed clamp, wrap and
/// re-indexing.
pub struct PhysicsWorld {
    cfg: WorldConfig,
    entities: Entities,
    tree: CollisionQuadTree,
    handler: PhysicsHandler,
    tick: u64,

    // Timing for the last step (optional)
    last_timing: Option<StepTiming>,
}

impl PhysicsWorld {
    pub fn new(cfg: WorldConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            entities: Entities::new(),
            tree: CollisionQuadTree::new(cfg.tree)?,
            handler: PhysicsHandler::new(cfg.physics),
            tick: 0,
            last_timing: None,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.cfg
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Direct arena access. Moved or despawned entities are reconciled with
    /// the tree on the next `step`; moves can be applied at once through
    /// [`PhysicsWorld::sync`].
    pub fn entities_mut(&mut self) -> &mut Entities {
        &mut self.entities
    }

    pub fn tree(&self) -> &CollisionQuadTree {
        &self.tree
    }

    pub fn handler(&self) -> &PhysicsHandler {
        &self.handler
    }

    /// Number of completed steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Spawn and index an entity. Wrapping worlds fold the translation
    /// into `[0, L)` first.
    pub fn spawn(&mut self, mut desc: EntityDesc) -> Result<EntityKey> {
        if let Some(l) = self.cfg.wrap_side() {
            desc.translation = toroid::wrap_into(desc.translation, l);
        }
        let key = self.entities.spawn(desc)?;
        self.tree.insert(&self.entities, key)?;
        Ok(key)
    }

    pub fn despawn(&mut self, key: EntityKey) -> Option<Entity> {
        // Entities spawned straight into the arena were never indexed
        let _ = self.tree.remove(key);
        self.entities.despawn(key)
    }

    /// Bring one entity's tree placement up to date after an outside edit.
    pub fn sync(&mut self, key: EntityKey) -> Result<NodeId> {
        match self.tree.relocate(&self.entities, key) {
            Err(CollisionError::NotIndexed) => self.tree.insert(&self.entities, key),
            other => other,
        }
    }

    /// Advance the simulation by `dt` and return every contact found.
    pub fn step(&mut self, dt: f32) -> CollisionPairList {
        let t_all = if self.cfg.enable_timing { Some(Instant::now()) } else { None };
        let side = self.cfg.wrap_side();
        self.tree.retain_live(&self.entities);
        let order = self.entities.keys_by_id();

        self.entities.reset_forces();

        let t_collide = if self.cfg.enable_timing { Some(Instant::now()) } else { None };
        let mut pairs = CollisionPairList::new();
        for &key in &order {
            let participates = self
                .entities
                .get(key)
                .is_some_and(|e| e.collision_type() != CollisionType::None);
            if !participates {
                continue;
            }
            match side {
                Some(l) => self.tree.collide_entity_wrapped(
                    &mut self.entities,
                    &self.handler,
                    key,
                    dt,
                    &mut pairs,
                    l,
                ),
                None => self.tree.collide_entity(&mut self.entities, &self.handler, key, dt, &mut pairs),
            }
        }
        let collide_ms = elapsed_ms(t_collide);

        let t_integrate = if self.cfg.enable_timing { Some(Instant::now()) } else { None };
        for (_, e) in self.entities.iter_mut() {
            let v = e.velocity() + e.accumulated_force() / e.mass() * dt;
            e.set_velocity(v);
            self.handler.clamp_velocity(e);
            let mut x = e.translation() + e.velocity() * dt;
            if let Some(l) = side {
                x = toroid::wrap_into(x, l);
            }
            e.set_translation(x);
        }
        let integrate_ms = elapsed_ms(t_integrate);

        let t_relocate = if self.cfg.enable_timing { Some(Instant::now()) } else { None };
        for &key in &order {
            if let Err(err) = self.sync(key) {
                log::warn!("could not re-index entity {:?}: {}", key, err);
            }
        }
        let relocate_ms = elapsed_ms(t_relocate);

        self.tick += 1;
        log::trace!("tick {}: {} pair(s) from {} entities", self.tick, pairs.len(), order.len());

        if t_all.is_some() {
            self.last_timing = Some(StepTiming {
                step_ms: elapsed_ms(t_all),
                collide_ms,
                integrate_ms,
                relocate_ms,
                pairs_emitted: pairs.len(),
            });
        }
        pairs
    }

    // --- Queries, wrapped automatically when the world wraps ---------------

    pub fn does_area_overlap_any_entity(&self, center: Vec2, radius: f32, include_nonsolid: bool) -> bool {
        match self.cfg.wrap_side() {
            Some(l) => self.tree.does_area_overlap_any_entity_wrapped(
                &self.entities,
                center,
                radius,
                include_nonsolid,
                l,
            ),
            None => self.tree.does_area_overlap_any_entity(&self.entities, center, radius, include_nonsolid),
        }
    }

    pub fn line_trace(&self, start: Vec2, vector: Vec2, radius: f32, include_nonsolid: bool) -> LineTraceResult {
        match self.cfg.wrap_side() {
            Some(l) => self.tree.line_trace_wrapped(&self.entities, start, vector, radius, include_nonsolid, l),
            None => self.tree.line_trace(&self.entities, start, vector, radius, include_nonsolid),
        }
    }

    pub fn area_trace(&self, center: Vec2, radius: f32, include_nonsolid: bool) -> Vec<Reference> {
        match self.cfg.wrap_side() {
            Some(l) => self.tree.area_trace_wrapped(&self.entities, center, radius, include_nonsolid, l),
            None => self.tree.area_trace(&self.entities, center, radius, include_nonsolid),
        }
    }

    /// Structural stats of the physics tree.
    pub fn debug_stats(&self) -> TreeStats {
        self.tree.stats()
    }

    /// Timing breakdown for the last `step`, when timing is enabled.
    pub fn timing(&self) -> Option<StepTiming> {
        self.last_timing
    }
}

fn elapsed_ms(start: Option<Instant>) -> f64 {
    start.map_or(0.0, |t| t.elapsed().as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cfg(wrap: bool) -> WorldConfig {
        WorldConfig { wrap, ..WorldConfig::for_side(1000.0) }
    }

    #[test]
    fn test_spawn_indexes_and_despawn_unindexes() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        let k = w.spawn(EntityDesc::circle(Vec2::new(10.0, 10.0), 2.0, 1.0)).unwrap();
        assert!(w.tree().contains(k));
        let r = w.entities().reference(k);
        assert!(w.despawn(k).is_some());
        assert!(!w.tree().contains(k));
        assert!(!r.is_valid(w.entities()));
        assert!(w.despawn(k).is_none());
    }

    #[test]
    fn test_spawn_rejects_bad_desc() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        let err = w.spawn(EntityDesc::circle(Vec2::ZERO, 1.0, 0.0)).unwrap_err();
        assert_eq!(err, CollisionError::NonPositiveMass(0.0));
        assert!(w.tree().is_empty());
    }

    #[test]
    fn test_spawn_wraps_translation() {
        let mut w = PhysicsWorld::new(cfg(true)).unwrap();
        let k = w.spawn(EntityDesc::circle(Vec2::new(-10.0, 1010.0), 2.0, 1.0)).unwrap();
        assert_eq!(w.entities().get(k).unwrap().translation(), Vec2::new(990.0, 10.0));
    }

    #[test]
    fn test_step_integrates_and_wraps() {
        let mut w = PhysicsWorld::new(cfg(true)).unwrap();
        let k = w
            .spawn(EntityDesc::circle(Vec2::new(995.0, 500.0), 2.0, 1.0).with_velocity(Vec2::new(100.0, 0.0)))
            .unwrap();
        let pairs = w.step(0.1);
        assert!(pairs.is_empty());
        let x = w.entities().get(k).unwrap().translation();
        assert_abs_diff_eq!(x.x, 5.0, epsilon = 1e-3);
        assert_eq!(w.tick(), 1);
        let node = w.tree().node_info(w.tree().node_of(k).unwrap()).unwrap();
        assert!(node.center.x < 500.0);
    }

    #[test]
    fn test_step_clamps_speed() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        let k = w
            .spawn(EntityDesc::circle(Vec2::new(100.0, 100.0), 2.0, 1.0).with_velocity(Vec2::new(0.0, 900.0)))
            .unwrap();
        w.step(0.01);
        assert_abs_diff_eq!(w.entities().get(k).unwrap().velocity().y, 400.0, epsilon = 1e-3);
    }

    #[test]
    fn test_step_separates_closing_pair() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        let a = w.spawn(EntityDesc::circle(Vec2::new(100.0, 100.0), 5.0, 10.0)).unwrap();
        let b = w
            .spawn(
                EntityDesc::circle(Vec2::new(109.0, 100.0), 5.0, 10.0).with_velocity(Vec2::new(-10.0, 0.0)),
            )
            .unwrap();
        let pairs = w.step(0.1);
        assert_eq!(pairs.len(), 1);
        let va = w.entities().get(a).unwrap().velocity();
        let vb = w.entities().get(b).unwrap().velocity();
        assert!(va.x < 0.0);
        assert!(vb.x > -10.0);
    }

    #[test]
    fn test_step_skips_none_entities() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        w.spawn(EntityDesc::circle(Vec2::new(100.0, 100.0), 5.0, 1.0)).unwrap();
        w.spawn(
            EntityDesc::circle(Vec2::new(101.0, 100.0), 5.0, 1.0).with_collision_type(CollisionType::None),
        )
        .unwrap();
        assert!(w.step(0.1).is_empty());
    }

    #[test]
    fn test_sync_indexes_arena_spawns() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        let k = w.entities_mut().spawn(EntityDesc::circle(Vec2::new(50.0, 50.0), 1.0, 1.0)).unwrap();
        assert!(!w.tree().contains(k));
        w.sync(k).unwrap();
        assert!(w.tree().contains(k));
    }

    #[test]
    fn test_step_forgets_arena_despawns() {
        let mut w = PhysicsWorld::new(cfg(false)).unwrap();
        let k = w.spawn(EntityDesc::circle(Vec2::new(100.0, 100.0), 5.0, 1.0)).unwrap();
        w.entities_mut().despawn(k);
        for _ in 0..3 {
            w.step(0.1);
        }
        assert_eq!(w.tree().len(), w.entities().len());
        assert_eq!(w.tree().node_info(w.tree().root()).unwrap().population, 0);
        assert!(!w.does_area_overlap_any_entity(Vec2::new(100.0, 100.0), 10.0, true));
    }

    #[test]
    fn test_queries_follow_wrap_setting() {
        let mut wrapped = PhysicsWorld::new(cfg(true)).unwrap();
        let mut flat = PhysicsWorld::new(cfg(false)).unwrap();
        for w in [&mut wrapped, &mut flat] {
            w.spawn(EntityDesc::circle(Vec2::new(998.0, 500.0), 3.0, 1.0)).unwrap();
        }
        let c = Vec2::new(1.0, 500.0);
        assert!(wrapped.does_area_overlap_any_entity(c, 1.0, false));
        assert!(!flat.does_area_overlap_any_entity(c, 1.0, false));
        assert_eq!(wrapped.area_trace(c, 1.0, false).len(), 1);
        assert!(flat.area_trace(c, 1.0, false).is_empty());
        let start = Vec2::new(10.0, 500.0);
        let v = Vec2::new(-20.0, 0.0);
        assert_eq!(wrapped.line_trace(start, v, 0.0, false).len(), 1);
        assert!(flat.line_trace(start, v, 0.0, false).is_empty());
    }

    #[test]
    fn test_timing_recorded_when_enabled() {
        let mut w = PhysicsWorld::new(WorldConfig { enable_timing: true, ..cfg(false) }).unwrap();
        assert!(w.timing().is_none());
        w.spawn(EntityDesc::circle(Vec2::new(100.0, 100.0), 5.0, 1.0)).unwrap();
        w.step(0.1);
        let t = w.timing().unwrap();
        assert!(t.step_ms >= 0.0);
        assert_eq!(t.pairs_emitted, 0);

        let mut quiet = PhysicsWorld::new(cfg(false)).unwrap();
        quiet.step(0.1);
        assert!(quiet.timing().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = WorldConfig { world_side_length: 0.0, ..cfg(false) };
        assert!(PhysicsWorld::new(bad).is_err());
    }
}
