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
fn change_detection_flow_across_several_ticks() {
    let mut world = World::new();
    let position = world.register_component_type::<Position>("Position").unwrap();
    let velocity = world.register_component_type::<Velocity>("Velocity").unwrap();

    let e1 = world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 1.0 })).unwrap();
    let e2 = world.spawn((Position { x: 10.0, y: 10.0 },)).unwrap();

    // Tick 1: a fresh `Added<Position>` query sees both entities as added.
    let mut added_position = world.query().added(position).build().unwrap();
    assert_eq!(added_position.run(&world).count(), 2);
    // Running again immediately sees nothing new.
    assert_eq!(added_position.run(&world).count(), 0);

    world.increment_tick(); // Tick 2
    let mut changed_position = world.query().changed(position).build().unwrap();
    assert_eq!(changed_position.run(&world).count(), 0);

    world.get_mut::<Position>(e1, position).unwrap().x = 1.0;
    assert_eq!(changed_position.run(&world).count(), 1);
    // e2 was untouched, so the next run reports nothing.
    assert_eq!(changed_position.run(&world).count(), 0);

    world.increment_tick(); // Tick 3
    world.set(e2, velocity, Velocity { x: 0.0, y: 0.0 }).unwrap();

    let mut added_velocity = world.query().added(velocity).build().unwrap();
    assert_eq!(added_velocity.run(&world).count(), 1);
}

#[test]
fn changed_and_with_combine_without_double_counting() {
    let mut world = World::new();
    let position = world.register_component_type::<Position>("Position").unwrap();

    let e1 = world.spawn((Position { x: 0.0, y: 0.0 },)).unwrap();
    let _e2 = world.spawn((Position { x: 1.0, y: 1.0 },)).unwrap();

    let mut query = world.query().with(position).changed(position).build().unwrap();
    query.run(&world).count(); // consume the initial "everything added" run

    world.increment_tick();
    world.get_mut::<Position>(e1, position).unwrap().x += 1.0;

    let results: Vec<_> = query.run(&world).collect();
    assert_eq!(results.len(), 1);
    let pos: &Position = unsafe { &*(results[0].component(position).unwrap() as *const Position) };
    assert_eq!(pos.x, 1.0);
}
