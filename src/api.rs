use glam::Vec2;

use crate::entity::{Entities, EntityKey};
use crate::physics::PhysicsHandler;
use crate::reference::Reference;
use crate::types::*;

/// Public query contract of a collision index.
///
/// Every operation has a `*_wrapped` twin that treats the world as a torus of
/// side `world_side_length`; the twin runs the same tests after re-centering
/// one operand onto the nearest copy of the other.
pub trait CollisionQueryApi {
    // --- Overlap -----------------------------------------------------------

    /// True if the circle overlaps any admitted entity. Short-circuits.
    fn does_area_overlap_any_entity(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
    ) -> bool;

    fn does_area_overlap_any_entity_wrapped(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        world_side_length: f32,
    ) -> bool;

    // --- Traces ------------------------------------------------------------

    /// Sweep a circle of `radius` along `start + t * vector`, `t` in `[0, 1]`.
    /// Hits come back nearest-first.
    fn line_trace(
        &self,
        entities: &Entities,
        start: Vec2,
        vector: Vec2,
        radius: f32,
        include_nonsolid: bool,
    ) -> LineTraceResult;

    fn line_trace_wrapped(
        &self,
        entities: &Entities,
        start: Vec2,
        vector: Vec2,
        radius: f32,
        include_nonsolid: bool,
        world_side_length: f32,
    ) -> LineTraceResult;

    /// Every admitted entity overlapping the circle, each exactly once.
    fn area_trace(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
    ) -> Vec<Reference>;

    fn area_trace_wrapped(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        world_side_length: f32,
    ) -> Vec<Reference>;

    // --- Resolution --------------------------------------------------------

    /// Resolve `entity` against everything it touches, accumulating impulses
    /// on both participants and appending one pair per contact to `out`.
    /// Call once per Solid/NonSolid entity per tick.
    fn collide_entity(
        &self,
        entities: &mut Entities,
        handler: &PhysicsHandler,
        entity: EntityKey,
        dt: f32,
        out: &mut CollisionPairList,
    );

    fn collide_entity_wrapped(
        &self,
        entities: &mut Entities,
        handler: &PhysicsHandler,
        entity: EntityKey,
        dt: f32,
        out: &mut CollisionPairList,
        world_side_length: f32,
    );
}

/// Circle and capsule primitives used by the index.
pub trait NarrowphaseApi {
    /// Strict overlap: `|c0 - c1| < r0 + r1`.
    fn overlap_circle_circle(c0: Vec2, r0: f32, c1: Vec2, r1: f32) -> bool;

    /// Parametric roots `(t0, t1)`, `t0 <= t1`, of
    /// `|start + t * vector - center| = radius`. `None` for a zero-length
    /// vector or a negative discriminant.
    fn sweep_roots(start: Vec2, vector: Vec2, center: Vec2, radius: f32) -> Option<(f32, f32)>;

    /// Entry parameter of a swept circle against a static one, if the sweep
    /// overlaps it anywhere in `[0, 1]`. Clamped to `>= 0`.
    fn line_segment_circle(
        start: Vec2,
        vector: Vec2,
        sweep_radius: f32,
        center: Vec2,
        radius: f32,
    ) -> Option<f32>;

    /// Unit vector from `b` toward `a`; `(1, 0)` when they coincide.
    fn contact_normal(a: Vec2, b: Vec2) -> Vec2;

    /// Point between the centers weighted by the opposite radius.
    fn contact_point(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Vec2;

    /// Non-negative impulse along `normal` that makes the bodies just touch
    /// after one step of `dt`, scaled by `damping`.
    fn contact_impulse(
        rel_pos: Vec2,
        rel_vel: Vec2,
        normal: Vec2,
        inv_mass_sum: f32,
        radius_sum: f32,
        dt: f32,
        damping: f32,
    ) -> f32;
}
