//! # Hierarchy Verification Tests
//!
//! End-to-end checks of name lookup, path resolution, path construction and
//! tree iteration, canonical and staged.
//!
//! Run with: cargo test -p arbor_core --test hierarchy_verification

use arbor_core::{EntityId, StageContext, World, WorldConfig};

const C: StageContext<'static> = StageContext::Canonical;
const ROOT: EntityId = EntityId::NULL;

/// Deterministic xorshift sequence.
fn xorshift(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

// ============================================================================
// PATH RESOLUTION
// ============================================================================

#[test]
fn verify_lookup_path_follows_named_chain() {
    let mut world = World::default();
    let parent = world.spawn_named("Parent", None).unwrap();
    let child = world.spawn_named("Child", Some(parent)).unwrap();
    let grandchild = world.spawn_named("Grandchild", Some(child)).unwrap();
    // Same names elsewhere must not be picked up.
    let decoy = world.spawn_named("Child", None).unwrap();
    world.spawn_named("Grandchild", Some(decoy)).unwrap();

    assert_eq!(world.lookup_path(C, ROOT, "Parent.Child.Grandchild", ".", None), grandchild);
    assert_eq!(world.lookup_path(C, ROOT, "Parent.Child", ".", None), child);
    assert_eq!(world.lookup_path(C, ROOT, "Parent.Missing.Grandchild", ".", None), ROOT);
    assert_eq!(world.lookup_path(C, ROOT, "Missing.Child.Grandchild", ".", None), ROOT);
    assert_eq!(world.lookup_path(C, ROOT, "Parent.Child.Grandchild.Extra", ".", None), ROOT);
    assert_eq!(world.lookup_path(C, ROOT, "Parent.Grandchild", ".", None), ROOT);
}

#[test]
fn verify_build_then_lookup_round_trips() {
    let mut world = World::default();
    let mut state = 0x5EED_1234_u64;
    let mut entities: Vec<EntityId> = Vec::new();

    for i in 0..300 {
        let roll = xorshift(&mut state) as usize;
        let parent = if entities.is_empty() || roll % 5 == 0 {
            None
        } else {
            Some(entities[roll % entities.len()])
        };
        entities.push(world.spawn_named(&format!("Node{i}"), parent).unwrap());
    }

    for &entity in &entities {
        let path = world.build_path(C, ROOT, entity, ".", None).unwrap();
        assert_eq!(world.lookup_path(C, ROOT, &path, ".", None), entity, "path {path}");

        let absolute = world.build_path(C, ROOT, entity, "/", Some("/")).unwrap();
        assert!(absolute.starts_with('/'));
        let start = *entities.last().unwrap();
        assert_eq!(world.lookup_path(C, start, &absolute, "/", Some("/")), entity);
    }

    // Relative to an ancestor.
    for &entity in &entities {
        let parent = world.parent(C, entity);
        if parent.is_null() {
            continue;
        }
        let path = world.build_path(C, parent, entity, ".", None).unwrap();
        assert!(!path.contains('.'));
        assert_eq!(world.lookup_path(C, parent, &path, ".", None), entity);
    }
}

#[test]
fn verify_configured_separator_and_prefix() {
    let config = WorldConfig::from_toml_str(
        r#"
        path_separator = "::"
        path_prefix = "::"
        "#,
    )
    .unwrap();
    let mut world = World::new(config);
    let game = world.spawn_named("game", None).unwrap();
    let unit = world.spawn_named("unit", Some(game)).unwrap();

    assert_eq!(world.build_path_default(C, ROOT, unit).unwrap(), "::game::unit");
    assert_eq!(world.build_path_default(C, game, unit).unwrap(), "unit");
    assert_eq!(world.lookup_path_default(C, unit, "::game::unit"), unit);
    assert_eq!(world.lookup_path_default(C, game, "unit"), unit);
}

// ============================================================================
// LOOKUP
// ============================================================================

#[test]
fn verify_single_table_lookup_with_duplicate_registration() {
    let mut world = World::default();
    let alice = world.spawn_named("Alice", None).unwrap();

    let table = world
        .tables()
        .find(|table| table.main().entities().contains(&alice))
        .map(|table| table.id())
        .unwrap();
    world.hierarchy_mut().register(ROOT, table);
    world.hierarchy_mut().register(ROOT, table);

    assert_eq!(world.lookup_child(C, ROOT, "Alice"), alice);
    assert_eq!(world.lookup_child(C, ROOT, "Bob"), ROOT);
    let yielded: Vec<_> = world.tree_iter(ROOT).map(|batch| batch.table.id()).collect();
    assert_eq!(yielded, vec![table]);
}

#[test]
fn verify_staged_lookup_finds_rows_in_new_tables() {
    let mut world = World::default();
    let tag = world.register_tag();
    let parent = world.spawn_named("Parent", None).unwrap();

    let mut stage = world.new_stage();
    let child = stage.spawn_named(&world, "Fresh", Some(parent)).unwrap();
    // A type no committed table has yet.
    stage.add_id(&world, child, arbor_core::Id::component(tag)).unwrap();

    assert_eq!(world.lookup_child(StageContext::Staged(&stage), parent, "Fresh"), child);
    assert_eq!(world.lookup_child(C, parent, "Fresh"), ROOT);
    assert_eq!(
        world.lookup_path(StageContext::Staged(&stage), ROOT, "Parent.Fresh", ".", None),
        child
    );

    world.merge(&mut stage);
    assert_eq!(world.lookup_child(C, parent, "Fresh"), child);
}

#[test]
fn verify_staged_rename_is_private_to_stage() {
    let mut world = World::default();
    let e = world.spawn_named("Old", None).unwrap();

    let mut stage = world.new_stage();
    stage.set_name(&world, e, "New").unwrap();
    let staged = StageContext::Staged(&stage);

    assert_eq!(world.lookup_child(staged, ROOT, "New"), e);
    assert_eq!(world.lookup_child(staged, ROOT, "Old"), ROOT);
    assert_eq!(world.lookup_child(C, ROOT, "Old"), e);
    assert_eq!(world.lookup_child(C, ROOT, "New"), ROOT);
    assert_eq!(world.build_path(staged, ROOT, e, ".", None).unwrap(), "New");
}

// ============================================================================
// TREE ITERATION
// ============================================================================

#[test]
fn verify_tree_iteration_is_isolated_from_pending_writes() {
    let mut world = World::default();
    let parent = world.spawn_named("P", None).unwrap();
    let first = world.spawn_named("First", Some(parent)).unwrap();
    let marker = world.register_component::<u32>();

    let mut stage = world.new_stage();
    let mut before = world.tree_iter(parent);

    // The writer puts a new child of P into a table that does not exist yet.
    let late = stage.spawn_named(&world, "Late", Some(parent)).unwrap();
    stage.set_component(&world, late, marker, 7u32).unwrap();

    let mut seen = Vec::new();
    for batch in before.by_ref() {
        seen.extend_from_slice(batch.entities);
    }
    assert_eq!(seen, vec![first]);
    assert!(before.next().is_none());

    world.merge(&mut stage);
    let after: Vec<EntityId> = world
        .tree_iter(parent)
        .flat_map(|batch| batch.entities.iter().copied())
        .collect();
    assert_eq!(after, vec![first, late]);
    assert_eq!(world.get_component::<u32>(C, late, marker), Ok(Some(7)));
}
