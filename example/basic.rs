//! Example: spawning, querying, change detection, and hierarchy together.

use arche_ecs::World;

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Health(u32);

fn main() {
    let mut world = World::new();
    let position = world.register_component_type::<Position>("Position").unwrap();
    let velocity = world.register_component_type::<Velocity>("Velocity").unwrap();
    let health = world.register_component_type::<Health>("Health").unwrap();

    println!("Creating entities...");

    let moving = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 0.5 }))
        .expect("spawn moving");
    let full = world
        .spawn((
            Position { x: 10.0, y: 20.0 },
            Velocity { x: -1.0, y: 2.0 },
            Health(100),
        ))
        .expect("spawn full");
    let stationary = world.spawn((Position { x: 5.0, y: 5.0 },)).expect("spawn stationary");

    println!("Spawned {moving:?}, {full:?}, {stationary:?}");
    println!("{full:?} has Health: {}", world.has(full, health));

    // Query every entity carrying both Position and Velocity.
    let mut moving_query = world.query().with(position).with(velocity).build().unwrap();
    println!("Entities with Position+Velocity: {}", moving_query.run(&world).count());

    // Advance a frame and mutate one entity to see change detection in action.
    world.increment_tick();
    world.get_mut::<Position>(moving, position).unwrap().x += 1.0;

    let mut changed_query = world.query().changed(position).build().unwrap();
    println!("Entities whose Position changed last frame: {}", changed_query.run(&world).count());

    // Parent/child relationships.
    world.add_child(full, stationary).unwrap();
    println!("{:?}'s children: {:?}", full, world.children_of(full));

    world.entity_delete(full).unwrap();
    println!("Despawned {full:?}; {stationary:?} still exists: {}", world.entity_exists(stationary));

    println!("\nMemory stats: {:?}", world.memory_stats());
}
