use arche_ecs::World;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[test]
fn repeated_runs_against_a_stable_archetype_set_return_the_same_count() {
    let mut world = World::new();
    let position = world.register_component("Position", std::mem::size_of::<Position>(), None).unwrap();
    let velocity = world.register_component("Velocity", std::mem::size_of::<Velocity>(), None).unwrap();

    for i in 0..100 {
        let e = world.entity_new();
        world.set(e, position, Position { x: i as f32, y: 0.0 }).unwrap();
        world.set(e, velocity, Velocity { x: 1.0, y: 1.0 }).unwrap();
    }

    let mut query = world.query().with(position).with(velocity).build().unwrap();
    assert_eq!(query.run(&world).count(), 100);
    assert_eq!(query.matched_archetype_count(), 1);
    // Re-running without any structural change must not rescan or change the result.
    assert_eq!(query.run(&world).count(), 100);
}

#[test]
fn new_archetypes_are_picked_up_without_rebuilding_the_query() {
    let mut world = World::new();
    let position = world.register_component("Position", std::mem::size_of::<Position>(), None).unwrap();
    let velocity = world.register_component("Velocity", std::mem::size_of::<Velocity>(), None).unwrap();

    for i in 0..50 {
        let e = world.entity_new();
        world.set(e, position, Position { x: i as f32, y: 0.0 }).unwrap();
    }

    let mut query = world.query().with(position).build().unwrap();
    assert_eq!(query.run(&world).count(), 50);

    // Entities that also carry Velocity still live in a distinct archetype,
    // but the query still matches them by the `with(position)` term alone.
    for i in 50..100 {
        let e = world.entity_new();
        world.set(e, position, Position { x: i as f32, y: 0.0 }).unwrap();
        world.set(e, velocity, Velocity { x: 1.0, y: 1.0 }).unwrap();
    }

    assert_eq!(query.run(&world).count(), 100);
    assert_eq!(query.matched_archetype_count(), 2);
}

#[test]
fn pruning_empty_archetypes_does_not_corrupt_a_live_query() {
    let mut world = World::new();
    let position = world.register_component("Position", std::mem::size_of::<Position>(), None).unwrap();

    let transient = world.entity_new();
    world.set(transient, position, Position { x: 0.0, y: 0.0 }).unwrap();
    world.unset(transient, position).unwrap();
    world.remove_empty_archetypes();

    let e = world.entity_new();
    world.set(e, position, Position { x: 1.0, y: 1.0 }).unwrap();

    let mut query = world.query().with(position).build().unwrap();
    assert_eq!(query.run(&world).count(), 1);
}

#[test]
fn running_many_queries_over_a_thousand_entities_completes_quickly() {
    let mut world = World::new();
    let position = world.register_component("Position", std::mem::size_of::<Position>(), None).unwrap();
    let velocity = world.register_component("Velocity", std::mem::size_of::<Velocity>(), None).unwrap();

    for i in 0..1000 {
        let e = world.entity_new();
        world.set(e, position, Position { x: i as f32, y: 0.0 }).unwrap();
        world.set(e, velocity, Velocity { x: 1.0, y: 1.0 }).unwrap();
    }

    let mut query = world.query().with(position).with(velocity).build().unwrap();
    query.run(&world).count();

    let start = std::time::Instant::now();
    for _ in 0..100 {
        let _count = query.run(&world).count();
    }
    let duration = start.elapsed();

    assert!(duration.as_millis() < 1000, "100 cached query runs took {:?}, expected <1000ms", duration);
}
