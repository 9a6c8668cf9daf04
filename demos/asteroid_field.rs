use glam::Vec2;
use quadbonk::*;

fn main() {
    env_logger::init();

    let mut world = PhysicsWorld::new(WorldConfig { enable_timing: true, ..WorldConfig::for_side(400.0) })
        .unwrap();

    // Deterministic ring of rocks drifting toward the center
    let count = 24;
    for i in 0..count {
        let angle = i as f32 / count as f32 * std::f32::consts::TAU;
        let dir = Vec2::from_angle(angle);
        let radius = 4.0 + (i % 3) as f32 * 3.0;
        let desc = EntityDesc::circle(Vec2::splat(200.0) + dir * 120.0, radius, radius * radius)
            .with_velocity(-dir * 60.0)
            .with_elasticity(0.5)
            .with_kind(EntityKind::ENEMY);
        world.spawn(desc).unwrap();
    }

    // Player sitting on the seam, and a pickup right next to it
    let player = world
        .spawn(EntityDesc::circle(Vec2::new(398.0, 200.0), 6.0, 20.0).with_kind(EntityKind::PLAYER))
        .unwrap();
    let pickup = world
        .spawn(EntityDesc::circle(Vec2::new(6.0, 200.0), 3.0, 1.0).with_kind(EntityKind::PICKUP))
        .unwrap();
    let player_ref = world.entities().reference(player).downcast::<Player>(world.entities()).unwrap();
    println!("player={:?} pickup={:?}", player_ref, pickup);

    for _ in 0..120 {
        let pairs = world.step(1.0 / 60.0);
        for pair in &pairs {
            let a = pair.entity_a.get(world.entities()).map(|e| e.id());
            let b = pair.entity_b.get(world.entities()).map(|e| e.id());
            println!(
                "tick {:3}: {:?} vs {:?} at ({:.1},{:.1}) n=({:.2},{:.2}) impulse={:.1}",
                world.tick(),
                a,
                b,
                pair.contact_point.x,
                pair.contact_point.y,
                pair.contact_normal.x,
                pair.contact_normal.y,
                pair.impulse_magnitude
            );
        }
    }

    if let Some(t) = world.timing() {
        println!(
            "timing: step={:.3}ms (collide={:.3}ms integrate={:.3}ms relocate={:.3}ms) pairs={}",
            t.step_ms, t.collide_ms, t.integrate_ms, t.relocate_ms, t.pairs_emitted
        );
    }
    let stats = world.debug_stats();
    println!(
        "tree: {} nodes, {} leaves, {} entities, depth {}",
        stats.nodes, stats.leaves, stats.entities, stats.max_depth_reached
    );
    let safe_spot = !world.does_area_overlap_any_entity(Vec2::new(200.0, 200.0), 10.0, true);
    println!("center clear for respawn: {}", safe_spot);
}
