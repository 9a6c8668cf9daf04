//! Loose quad tree over circular entities.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. Each
//! indexed entity sits in exactly one node: the deepest one whose square
//! holds its center and whose half side is at least `radius / LOOSENESS`
//! (twice the radius with the default looseness). Anything too big, or
//! outside the root square, parks at the root.
//!
//! Because membership is unique, a traversal sees every entity at most once,
//! and the pair tie-break in [`CollisionQuadTree::collide_entity`] reports
//! each touching pair exactly once per tick.

use std::f32::consts::SQRT_2;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::api::{CollisionQueryApi, NarrowphaseApi};
use crate::entity::{Entities, Entity, EntityKey};
use crate::error::{CollisionError, Result};
use crate::narrowphase::Narrowphase;
use crate::physics::PhysicsHandler;
use crate::reference::Reference;
use crate::toroid::{self, recenter};
use crate::types::*;

/// How far an entity may overhang its node, as a fraction of the node's half side.
pub const LOOSENESS: f32 = 0.5;

/// Deepest subdivision accepted by [`QuadTreeConfig::validate`].
pub const MAX_SUPPORTED_DEPTH: u8 = 16;

const ROOT: NodeId = NodeId(0);

/// Arena index of a tree node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }

    /// Nodes are only allocated along insertion paths, so the arena stays far
    /// below `u32::MAX` even at the deepest supported depth.
    fn from_index(index: usize) -> Self {
        debug_assert!(u32::try_from(index).is_ok(), "node arena overflow at {index}");
        NodeId(index as u32)
    }
}

/// Shape and purpose of a quad tree.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadTreeConfig {
    /// Center of the root square.
    pub center: Vec2,
    /// Half the side length of the root square.
    pub half_side: f32,
    /// Nodes at this depth never subdivide.
    pub max_depth: u8,
    /// Which entity radius the tree indexes.
    pub purpose: TreePurpose,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self::for_world(2000.0)
    }
}

impl QuadTreeConfig {
    /// Root square covering `[0, side)²`.
    pub fn for_world(side: f32) -> Self {
        Self {
            center: Vec2::splat(side * 0.5),
            half_side: side * 0.5,
            max_depth: 6,
            purpose: TreePurpose::Physics,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.half_side > 0.0) || !self.half_side.is_finite() {
            return Err(CollisionError::InvalidConfig(format!(
                "half_side must be positive and finite, got {}",
                self.half_side
            )));
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(CollisionError::InvalidConfig(format!(
                "max_depth {} exceeds {}",
                self.max_depth, MAX_SUPPORTED_DEPTH
            )));
        }
        Ok(())
    }
}

/// Read-only view of one node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeInfo {
    pub center: Vec2,
    pub half_side: f32,
    pub depth: u8,
    pub is_leaf: bool,
    /// Entities held directly by this node.
    pub residents: usize,
    /// Entities in this node and all of its descendants.
    pub population: usize,
}

#[derive(Clone, Debug)]
struct Node {
    center: Vec2,
    half_side: f32,
    depth: u8,
    parent: Option<NodeId>,
    children: Option<[NodeId; 4]>,
    residents: Vec<EntityKey>,
    population: usize,
}

impl Node {
    fn new(center: Vec2, half_side: f32, depth: u8, parent: Option<NodeId>) -> Self {
        Self {
            center,
            half_side,
            depth,
            parent,
            children: None,
            residents: Vec::new(),
            population: 0,
        }
    }

    /// Radius of a circle around `center` enclosing every entity in the subtree.
    /// Unbounded at the root, which also holds oversized and out-of-range bodies.
    fn reach(&self) -> f32 {
        match self.parent {
            None => f32::INFINITY,
            Some(_) => self.half_side * (SQRT_2 + LOOSENESS),
        }
    }

    fn contains(&self, p: Vec2) -> bool {
        let d = (p - self.center).abs();
        d.x <= self.half_side && d.y <= self.half_side
    }

    /// Quadrant bits: x in bit 0, y in bit 1.
    fn quadrant(&self, p: Vec2) -> usize {
        let x_bit = usize::from(p.x >= self.center.x);
        let y_bit = usize::from(p.y >= self.center.y);
        (y_bit << 1) | x_bit
    }

    /// Under wrap the nearest image of a query is only the right one while
    /// every body in the subtree plus the query's `extent` stays within half
    /// a period of the node center, per axis.
    fn ambiguous_under_wrap(&self, extent: f32, side: Option<f32>) -> bool {
        side.is_some_and(|l| self.half_side * (1.0 + LOOSENESS) + extent >= l * 0.5)
    }

    /// True when nothing in the subtree can overlap the circle.
    fn rejects_circle(&self, center: Vec2, radius: f32, side: Option<f32>) -> bool {
        if self.population == 0 {
            return true;
        }
        let reach = self.reach();
        if reach.is_infinite() || self.ambiguous_under_wrap(radius, side) {
            return false;
        }
        let c = recenter(center, self.center, side);
        !Narrowphase::overlap_circle_circle(c, radius, self.center, reach)
    }

    /// True when nothing in the subtree can be touched by the swept circle.
    fn rejects_capsule(&self, start: Vec2, vector: Vec2, radius: f32, side: Option<f32>) -> bool {
        if self.population == 0 {
            return true;
        }
        let reach = self.reach();
        if reach.is_infinite() || self.ambiguous_under_wrap(radius + vector.length() * 0.5, side) {
            return false;
        }
        let s = recenter_segment(start, vector, self.center, side);
        Narrowphase::line_segment_circle(s, vector, radius, self.center, reach).is_none()
    }
}

/// Shift a segment by whole periods so its midpoint is nearest `home`.
fn recenter_segment(start: Vec2, vector: Vec2, home: Vec2, side: Option<f32>) -> Vec2 {
    match side {
        None => start,
        Some(l) => {
            let mid = start + vector * 0.5;
            start + (toroid::nearest_image(mid, home, l) - mid)
        }
    }
}

/// Contact computed during the read-only half of `collide_entity`.
struct PendingContact {
    other: EntityKey,
    contact_point: Vec2,
    normal: Vec2,
    impulse: f32,
}

/// Spatial index over [`Entities`].
#[derive(Clone, Debug)]
pub struct CollisionQuadTree {
    cfg: QuadTreeConfig,
    nodes: Vec<Node>,
    placement: SecondaryMap<EntityKey, NodeId>,
}

impl CollisionQuadTree {
    pub fn new(cfg: QuadTreeConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            nodes: vec![Node::new(cfg.center, cfg.half_side, 0, None)],
            placement: SecondaryMap::new(),
        })
    }

    pub fn config(&self) -> &QuadTreeConfig {
        &self.cfg
    }

    pub fn purpose(&self) -> TreePurpose {
        self.cfg.purpose
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    // --- Maintenance -------------------------------------------------------

    /// Index a live entity at its current translation.
    pub fn insert(&mut self, entities: &Entities, key: EntityKey) -> Result<NodeId> {
        let e = entities.get(key).ok_or(CollisionError::StaleEntity)?;
        if self.placement.contains_key(key) {
            return Err(CollisionError::AlreadyIndexed);
        }
        let node = self.place(e.translation(), e.radius(self.cfg.purpose));
        self.nodes[node.index()].residents.push(key);
        self.placement.insert(key, node);
        self.adjust_population(node, true);
        Ok(node)
    }

    /// Drop an entity from the index. Works for keys whose entity was
    /// already despawned.
    pub fn remove(&mut self, key: EntityKey) -> Result<NodeId> {
        let node = self.placement.remove(key).ok_or(CollisionError::NotIndexed)?;
        let residents = &mut self.nodes[node.index()].residents;
        if let Some(i) = residents.iter().position(|&k| k == key) {
            residents.swap_remove(i);
        }
        self.adjust_population(node, false);
        Ok(node)
    }

    /// Re-place an entity after its translation or radius changed.
    pub fn relocate(&mut self, entities: &Entities, key: EntityKey) -> Result<NodeId> {
        let e = entities.get(key).ok_or(CollisionError::StaleEntity)?;
        let current = *self.placement.get(key).ok_or(CollisionError::NotIndexed)?;
        let (pos, radius) = (e.translation(), e.radius(self.cfg.purpose));
        if self.fits_exactly(current, pos, radius) {
            return Ok(current);
        }
        self.remove(key)?;
        self.insert(entities, key)
    }

    /// Clear and re-index every live entity in spawn order.
    pub fn rebuild(&mut self, entities: &Entities) {
        self.clear();
        for key in entities.keys_by_id() {
            // Keys come straight from the arena, so they are live and unindexed.
            let _ = self.insert(entities, key);
        }
        log::debug!(
            "rebuilt {:?} quad tree: {} entities in {} nodes",
            self.cfg.purpose,
            self.placement.len(),
            self.nodes.len()
        );
    }

    /// Drop every entry whose entity is gone, including entries left behind
    /// when the arena reused a slot. Returns how many were dropped.
    pub fn retain_live(&mut self, entities: &Entities) -> usize {
        self.placement.retain(|key, _| entities.contains(key));
        let placement = &self.placement;
        let mut emptied = Vec::new();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            let id = NodeId::from_index(index);
            let before = node.residents.len();
            node.residents.retain(|&key| placement.get(key) == Some(&id));
            emptied.extend(std::iter::repeat_n(id, before - node.residents.len()));
        }
        for &id in &emptied {
            self.adjust_population(id, false);
        }
        if !emptied.is_empty() {
            log::debug!("dropped {} stale entries from {:?} quad tree", emptied.len(), self.cfg.purpose);
        }
        emptied.len()
    }

    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        let root = &mut self.nodes[ROOT.index()];
        root.children = None;
        root.residents.clear();
        root.population = 0;
        self.placement.clear();
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.placement.contains_key(key)
    }

    pub fn node_of(&self, key: EntityKey) -> Option<NodeId> {
        self.placement.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.placement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placement.is_empty()
    }

    pub fn node_info(&self, id: NodeId) -> Option<NodeInfo> {
        self.nodes.get(id.index()).map(|n| NodeInfo {
            center: n.center,
            half_side: n.half_side,
            depth: n.depth,
            is_leaf: n.children.is_none(),
            residents: n.residents.len(),
            population: n.population,
        })
    }

    pub fn children(&self, id: NodeId) -> Option<[NodeId; 4]> {
        self.nodes.get(id.index()).and_then(|n| n.children)
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            nodes: self.nodes.len(),
            leaves: self.nodes.iter().filter(|n| n.children.is_none()).count(),
            entities: self.placement.len(),
            max_depth_reached: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn descends(&self, node: &Node, pos: Vec2, radius: f32) -> bool {
        node.depth < self.cfg.max_depth
            && node.contains(pos)
            && radius <= node.half_side * 0.5 * LOOSENESS
    }

    /// Deepest node for a circle, allocating children on the way down.
    fn place(&mut self, pos: Vec2, radius: f32) -> NodeId {
        let mut id = ROOT;
        while self.descends(self.node(id), pos, radius) {
            let quadrant = self.node(id).quadrant(pos);
            id = self.split(id)[quadrant];
        }
        id
    }

    /// Whether `place` would pick `id` again without touching the arena.
    fn fits_exactly(&self, id: NodeId, pos: Vec2, radius: f32) -> bool {
        let node = self.node(id);
        let inside_parent = match node.parent {
            None => true,
            Some(p) => {
                let parent = self.node(p);
                self.descends(parent, pos, radius)
                    && parent.quadrant(pos) == self.quadrant_index(p, id)
            }
        };
        inside_parent && !self.descends(node, pos, radius)
    }

    fn quadrant_index(&self, parent: NodeId, child: NodeId) -> usize {
        self.node(parent)
            .children
            .and_then(|c| c.iter().position(|&id| id == child))
            .unwrap_or(usize::MAX)
    }

    fn split(&mut self, id: NodeId) -> [NodeId; 4] {
        if let Some(children) = self.node(id).children {
            return children;
        }
        let (center, half, depth) = {
            let n = self.node(id);
            (n.center, n.half_side, n.depth)
        };
        let quarter = half * 0.5;
        let mut ids = [ROOT; 4];
        for (quadrant, slot) in ids.iter_mut().enumerate() {
            let sx = if quadrant & 1 != 0 { 1.0 } else { -1.0 };
            let sy = if quadrant & 2 != 0 { 1.0 } else { -1.0 };
            let child_center = center + Vec2::new(sx, sy) * quarter;
            *slot = NodeId::from_index(self.nodes.len());
            self.nodes.push(Node::new(child_center, quarter, depth + 1, Some(id)));
        }
        self.nodes[id.index()].children = Some(ids);
        ids
    }

    fn adjust_population(&mut self, from: NodeId, grow: bool) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let node = &mut self.nodes[id.index()];
            if grow {
                node.population += 1;
            } else {
                node.population -= 1;
            }
            cursor = node.parent;
        }
    }

    // --- Queries -----------------------------------------------------------

    fn overlap_any(
        &self,
        entities: &Entities,
        id: NodeId,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        side: Option<f32>,
    ) -> bool {
        let node = self.node(id);
        if node.rejects_circle(center, radius, side) {
            return false;
        }
        for &key in &node.residents {
            let Some(e) = entities.get(key) else { continue };
            if !e.collision_type().admitted(include_nonsolid) {
                continue;
            }
            let pos = e.translation();
            let c = recenter(center, pos, side);
            if Narrowphase::overlap_circle_circle(c, radius, pos, e.radius(self.cfg.purpose)) {
                return true;
            }
        }
        node.children.is_some_and(|children| {
            children
                .iter()
                .any(|&child| self.overlap_any(entities, child, center, radius, include_nonsolid, side))
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn trace_line(
        &self,
        entities: &Entities,
        id: NodeId,
        start: Vec2,
        vector: Vec2,
        radius: f32,
        include_nonsolid: bool,
        side: Option<f32>,
        out: &mut LineTraceResult,
    ) {
        let node = self.node(id);
        if node.rejects_capsule(start, vector, radius, side) {
            return;
        }
        for &key in &node.residents {
            let Some(e) = entities.get(key) else { continue };
            if !e.collision_type().admitted(include_nonsolid) {
                continue;
            }
            let pos = e.translation();
            let s = recenter_segment(start, vector, pos, side);
            if let Some(t) =
                Narrowphase::line_segment_circle(s, vector, radius, pos, e.radius(self.cfg.purpose))
            {
                out.insert(LineTraceBinding { t, id: e.id(), entity: e.reference() });
            }
        }
        if let Some(children) = node.children {
            for child in children {
                self.trace_line(entities, child, start, vector, radius, include_nonsolid, side, out);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn trace_area(
        &self,
        entities: &Entities,
        id: NodeId,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        side: Option<f32>,
        out: &mut Vec<Reference>,
    ) {
        let node = self.node(id);
        if node.rejects_circle(center, radius, side) {
            return;
        }
        for &key in &node.residents {
            let Some(e) = entities.get(key) else { continue };
            if !e.collision_type().admitted(include_nonsolid) {
                continue;
            }
            let pos = e.translation();
            let c = recenter(center, pos, side);
            if Narrowphase::overlap_circle_circle(c, radius, pos, e.radius(self.cfg.purpose)) {
                out.push(e.reference());
            }
        }
        if let Some(children) = node.children {
            for child in children {
                self.trace_area(entities, child, center, radius, include_nonsolid, side, out);
            }
        }
    }

    fn line_trace_impl(
        &self,
        entities: &Entities,
        start: Vec2,
        vector: Vec2,
        radius: f32,
        include_nonsolid: bool,
        side: Option<f32>,
    ) -> LineTraceResult {
        let mut out = LineTraceResult::new();
        if vector.length_squared() == 0.0 {
            return out;
        }
        self.trace_line(entities, ROOT, start, vector, radius, include_nonsolid, side, &mut out);
        out
    }

    fn area_trace_impl(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        side: Option<f32>,
    ) -> Vec<Reference> {
        let mut out = Vec::new();
        self.trace_area(entities, ROOT, center, radius, include_nonsolid, side, &mut out);
        out
    }

    // --- Collision resolution ---------------------------------------------

    /// Pair ownership: the physically larger body reports; equal radii go
    /// to the later-spawned one.
    fn reports_pair(me: &Entity, other: &Entity) -> bool {
        let mine = me.radius(TreePurpose::Physics);
        let theirs = other.radius(TreePurpose::Physics);
        theirs < mine || (theirs == mine && other.id() < me.id())
    }

    #[allow(clippy::too_many_arguments)]
    fn gather_candidates(
        &self,
        entities: &Entities,
        id: NodeId,
        me: &Entity,
        pos: Vec2,
        radius: f32,
        side: Option<f32>,
        out: &mut Vec<EntityKey>,
    ) {
        let node = self.node(id);
        if node.rejects_circle(pos, radius, side) {
            return;
        }
        for &key in &node.residents {
            if key == me.key() {
                continue;
            }
            let Some(other) = entities.get(key) else { continue };
            if !other.collision_type().admitted(true) || !Self::reports_pair(me, other) {
                continue;
            }
            let other_pos = recenter(other.translation(), pos, side);
            if Narrowphase::overlap_circle_circle(pos, radius, other_pos, other.radius(self.cfg.purpose)) {
                out.push(key);
            }
        }
        if let Some(children) = node.children {
            for child in children {
                self.gather_candidates(entities, child, me, pos, radius, side, out);
            }
        }
    }

    fn resolve_contact(
        &self,
        handler: &PhysicsHandler,
        me: &Entity,
        other: &Entity,
        dt: f32,
        side: Option<f32>,
    ) -> PendingContact {
        let pos = me.translation();
        let radius = me.radius(self.cfg.purpose);
        let other_pos = recenter(other.translation(), pos, side);
        let other_radius = other.radius(self.cfg.purpose);

        let normal = Narrowphase::contact_normal(pos, other_pos);
        let mut contact_point = Narrowphase::contact_point(pos, radius, other_pos, other_radius);
        if let Some(l) = side {
            contact_point = toroid::wrap_into(contact_point, l);
        }

        let rel_pos = pos - other_pos;
        let rel_vel = me.velocity() - other.velocity();
        let closing = rel_vel.dot(rel_pos) < 0.0;
        let both_solid = me.collision_type() == CollisionType::Solid
            && other.collision_type() == CollisionType::Solid;

        let impulse = if closing && both_solid && !handler.collision_exemption(me, other) {
            debug_assert!(me.mass() > 0.0 && other.mass() > 0.0, "non-positive mass in contact");
            let inv_mass_sum = me.mass().recip() + other.mass().recip();
            let f = Narrowphase::contact_impulse(
                rel_pos,
                rel_vel,
                normal,
                inv_mass_sum,
                radius + other_radius,
                dt,
                handler.config().impulse_damping,
            );
            f * (1.0 + me.elasticity() * other.elasticity())
        } else {
            0.0
        };

        PendingContact { other: other.key(), contact_point, normal, impulse }
    }

    fn collide_impl(
        &self,
        entities: &mut Entities,
        handler: &PhysicsHandler,
        key: EntityKey,
        dt: f32,
        out: &mut CollisionPairList,
        side: Option<f32>,
    ) {
        let contacts = {
            let entities: &Entities = entities;
            let Some(me) = entities.get(key) else { return };
            if me.collision_type() == CollisionType::None {
                debug_assert!(false, "collide_entity called on a CollisionType::None entity");
                log::warn!("skipping collision for non-colliding entity {:?}", me.id());
                return;
            }
            let pos = me.translation();
            let radius = me.radius(self.cfg.purpose);
            let mut candidates = Vec::new();
            self.gather_candidates(entities, ROOT, me, pos, radius, side, &mut candidates);

            candidates
                .into_iter()
                .filter_map(|k| entities.get(k))
                .map(|other| self.resolve_contact(handler, me, other, dt, side))
                .collect::<Vec<_>>()
        };

        let me_ref = entities.reference(key);
        for c in &contacts {
            if c.impulse > 0.0 {
                let push = c.normal * c.impulse;
                if let Some(me) = entities.get_mut(key) {
                    me.accumulate_force(push);
                }
                if let Some(other) = entities.get_mut(c.other) {
                    other.accumulate_force(-push);
                }
            }
            out.push(CollisionPair {
                entity_a: me_ref,
                entity_b: entities.reference(c.other),
                contact_point: c.contact_point,
                contact_normal: c.normal,
                impulse_magnitude: c.impulse,
            });
        }
        if !contacts.is_empty() {
            log::trace!("entity {:?}: {} contact(s)", key, contacts.len());
        }
    }
}

impl CollisionQueryApi for CollisionQuadTree {
    fn does_area_overlap_any_entity(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
    ) -> bool {
        self.overlap_any(entities, ROOT, center, radius, include_nonsolid, None)
    }

    fn does_area_overlap_any_entity_wrapped(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        world_side_length: f32,
    ) -> bool {
        self.overlap_any(entities, ROOT, center, radius, include_nonsolid, Some(world_side_length))
    }

    fn line_trace(
        &self,
        entities: &Entities,
        start: Vec2,
        vector: Vec2,
        radius: f32,
        include_nonsolid: bool,
    ) -> LineTraceResult {
        self.line_trace_impl(entities, start, vector, radius, include_nonsolid, None)
    }

    fn line_trace_wrapped(
        &self,
        entities: &Entities,
        start: Vec2,
        vector: Vec2,
        radius: f32,
        include_nonsolid: bool,
        world_side_length: f32,
    ) -> LineTraceResult {
        self.line_trace_impl(entities, start, vector, radius, include_nonsolid, Some(world_side_length))
    }

    fn area_trace(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
    ) -> Vec<Reference> {
        self.area_trace_impl(entities, center, radius, include_nonsolid, None)
    }

    fn area_trace_wrapped(
        &self,
        entities: &Entities,
        center: Vec2,
        radius: f32,
        include_nonsolid: bool,
        world_side_length: f32,
    ) -> Vec<Reference> {
        self.area_trace_impl(entities, center, radius, include_nonsolid, Some(world_side_length))
    }

    fn collide_entity(
        &self,
        entities: &mut Entities,
        handler: &PhysicsHandler,
        entity: EntityKey,
        dt: f32,
        out: &mut CollisionPairList,
    ) {
        self.collide_impl(entities, handler, entity, dt, out, None);
    }

    fn collide_entity_wrapped(
        &self,
        entities: &mut Entities,
        handler: &PhysicsHandler,
        entity: EntityKey,
        dt: f32,
        out: &mut CollisionPairList,
        world_side_length: f32,
    ) {
        self.collide_impl(entities, handler, entity, dt, out, Some(world_side_length));
    }
}
