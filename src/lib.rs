//! quadbonk: circle collision core on a loose quad tree, with optional
//! toroidal (wrap-around) world topology.
//!
//! Entities live in a generational arena ([`Entities`]) and are handed out
//! as [`Reference`]s that go invalid instead of dangling. A
//! [`CollisionQuadTree`] indexes them and answers overlap, line-trace and
//! area-trace queries, and resolves contacts with a one-step swept impulse.
//! [`PhysicsWorld`] strings it all together into a per-tick driver.

pub mod types;
pub mod api;
pub mod toroid;
pub mod entity;
pub mod reference;
pub mod narrowphase;
pub mod quadtree;
pub mod physics;
pub mod world;
pub mod config;
pub mod error;

pub use crate::types::*;
pub use crate::api::*;
pub use crate::entity::{Entities, Entity, EntityDesc, EntityId, EntityKey};
pub use crate::reference::{AnyEntity, Pickup, Player, Projectile, RefKind, Reference};
pub use crate::narrowphase::Narrowphase;
pub use crate::quadtree::{CollisionQuadTree, NodeId, NodeInfo, QuadTreeConfig, LOOSENESS};
pub use crate::physics::{PhysicsConfig, PhysicsHandler};
pub use crate::world::PhysicsWorld;
pub use crate::config::{Config, WorldConfig};
pub use crate::error::{CollisionError, ConfigError};
