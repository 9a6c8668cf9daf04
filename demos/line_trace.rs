use glam::Vec2;
use quadbonk::*;

fn main() {
    env_logger::init();

    let mut world = PhysicsWorld::new(WorldConfig { wrap: false, ..WorldConfig::default() }).unwrap();

    let near = world.spawn(EntityDesc::circle(Vec2::new(10.0, 0.0), 3.0, 1.0)).unwrap();
    let far = world.spawn(EntityDesc::circle(Vec2::new(40.0, 1.0), 5.0, 1.0)).unwrap();
    let ghost = world
        .spawn(EntityDesc::circle(Vec2::new(25.0, 0.0), 2.0, 1.0).with_collision_type(CollisionType::NonSolid))
        .unwrap();
    println!("Spawned near={:?} far={:?} ghost={:?}", near, far, ghost);

    for include_nonsolid in [false, true] {
        let hits = world.line_trace(Vec2::ZERO, Vec2::new(60.0, 0.0), 0.5, include_nonsolid);
        println!("Trace (include_nonsolid={}): {} hit(s)", include_nonsolid, hits.len());
        for hit in &hits {
            let Some(e) = hit.entity.get(world.entities()) else { continue };
            println!("  t={:.3} id={:?} at ({:.1},{:.1})", hit.t, hit.id, e.translation().x, e.translation().y);
        }
    }

    // Results stay safe to hold across a despawn
    let hits = world.line_trace(Vec2::ZERO, Vec2::new(60.0, 0.0), 0.0, false);
    world.despawn(near);
    for hit in &hits {
        println!("id={:?} still valid: {}", hit.id, hit.entity.is_valid(world.entities()));
    }
}
