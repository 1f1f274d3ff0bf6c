use arche_ecs::World;

#[test]
fn single_parent_child_link_is_queryable_both_ways() {
    let mut world = World::new();
    let parent = world.entity_new();
    let child = world.entity_new();

    world.add_child(parent, child).unwrap();

    assert_eq!(world.parent_of(child), Some(parent));
    assert_eq!(world.children_of(parent), &[child]);
}

#[test]
fn many_children_are_all_tracked_under_one_parent() {
    let mut world = World::new();
    let parent = world.entity_new();
    let children: Vec<_> = (0..999).map(|_| world.entity_new()).collect();
    for &child in &children {
        world.add_child(parent, child).unwrap();
    }

    assert_eq!(world.children_of(parent).len(), 999);
    for &child in &children {
        assert_eq!(world.parent_of(child), Some(parent));
    }
}

#[test]
fn deep_nesting_reports_correct_depth_and_ancestry() {
    let mut world = World::new();
    let mut entities = Vec::new();
    let root = world.entity_new();
    entities.push(root);

    for _ in 0..9 {
        let child = world.entity_new();
        world.add_child(*entities.last().unwrap(), child).unwrap();
        entities.push(child);
    }

    let deepest = *entities.last().unwrap();
    assert_eq!(world.hierarchy_depth(deepest), 9);
    assert!(world.is_ancestor_of(root, deepest));
    assert!(world.is_descendant_of(deepest, root));
}

#[test]
fn reparenting_moves_a_child_from_one_parent_to_another() {
    let mut world = World::new();
    let parent_a = world.entity_new();
    let parent_b = world.entity_new();
    let child = world.entity_new();

    world.add_child(parent_a, child).unwrap();
    assert_eq!(world.parent_of(child), Some(parent_a));

    // add_child to a new parent automatically detaches the old one.
    world.add_child(parent_b, child).unwrap();

    assert_eq!(world.parent_of(child), Some(parent_b));
    assert!(world.children_of(parent_a).is_empty());
    assert_eq!(world.children_of(parent_b), &[child]);
}

#[test]
fn traverse_children_visits_every_descendant() {
    let mut world = World::new();
    let root = world.entity_new();
    let mut expected = Vec::new();
    for _ in 0..20 {
        let child = world.entity_new();
        world.add_child(root, child).unwrap();
        expected.push(child);
    }

    let mut visited = Vec::new();
    world.traverse_children(root, &mut |e| visited.push(e));
    visited.sort();
    expected.sort();
    assert_eq!(visited, expected);
}

#[test]
fn an_entity_with_no_parent_has_no_ancestors() {
    let mut world = World::new();
    let entity = world.entity_new();
    assert_eq!(world.parent_of(entity), None);
    assert_eq!(world.hierarchy_depth(entity), 0);
}
