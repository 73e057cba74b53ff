//! # Staging Verification Tests
//!
//! Deferred writers against a shared world: isolation while pending, and
//! what a merge commits.
//!
//! Run with: cargo test -p arbor_core --test staging_verification

use arbor_core::{ArborError, ComponentId, EntityId, Id, StageContext, World};

const C: StageContext<'static> = StageContext::Canonical;

fn world_with_health() -> (World, ComponentId) {
    let mut world = World::default();
    let health = world.register_component::<f32>();
    (world, health)
}

#[test]
fn verify_pending_writes_are_invisible_until_merge() {
    let (mut world, health) = world_with_health();
    let unit = world.spawn_named("Unit", None).unwrap();
    world.set_component(unit, health, 100.0f32).unwrap();

    let mut stage = world.new_stage();
    stage.set_component(&world, unit, health, 40.0f32).unwrap();
    let spawned = stage.spawn_named(&world, "Reinforcement", None).unwrap();

    assert_eq!(world.get_component::<f32>(C, unit, health), Ok(Some(100.0)));
    assert!(!world.is_alive(C, spawned));
    assert_eq!(world.entity_count(), 1);
    {
        let staged = StageContext::Staged(&stage);
        assert_eq!(world.get_component::<f32>(staged, unit, health), Ok(Some(40.0)));
        assert!(world.is_alive(staged, spawned));
        assert_eq!(world.name(staged, spawned).as_deref(), Some("Reinforcement"));
    }

    world.merge(&mut stage);
    assert_eq!(world.get_component::<f32>(C, unit, health), Ok(Some(40.0)));
    assert!(world.is_alive(C, spawned));
    assert_eq!(world.entity_count(), 2);
}

#[test]
fn verify_latest_write_wins_across_tables() {
    let (mut world, health) = world_with_health();
    let armor = world.register_component::<u16>();
    let unit = world.spawn_named("Unit", None).unwrap();

    let mut stage = world.new_stage();
    stage.set_component(&world, unit, health, 1.0f32).unwrap();
    stage.set_component(&world, unit, armor, 3u16).unwrap();
    stage.remove_id(&world, unit, Id::component(health)).unwrap();
    stage.set_component(&world, unit, armor, 9u16).unwrap();

    world.merge(&mut stage);
    assert_eq!(world.get_component::<f32>(C, unit, health), Ok(None));
    assert_eq!(world.get_component::<u16>(C, unit, armor), Ok(Some(9)));
    assert_eq!(world.name(C, unit).as_deref(), Some("Unit"));

    // Every committed entity appears once.
    let rows: usize = world.tables().map(|table| table.count()).sum();
    assert_eq!(rows, world.entity_count());
}

#[test]
fn verify_staged_delete_applies_at_merge() {
    let (mut world, _) = world_with_health();
    let keep = world.spawn_named("Keep", None).unwrap();
    let doomed = world.spawn_named("Doomed", None).unwrap();

    let mut stage = world.new_stage();
    stage.set_name(&world, doomed, "StillDoomed").unwrap();
    stage.delete(&world, doomed).unwrap();
    let ghost = stage.spawn(&world).unwrap();
    stage.delete(&world, ghost).unwrap();

    assert!(world.is_alive(C, doomed));
    assert_eq!(world.lookup_child(StageContext::Staged(&stage), EntityId::NULL, "Doomed"), EntityId::NULL);

    world.merge(&mut stage);
    assert!(!world.is_alive(C, doomed));
    assert!(!world.is_alive(C, ghost));
    assert!(world.is_alive(C, keep));
    assert_eq!(world.lookup_child(C, EntityId::NULL, "Keep"), keep);
    assert_eq!(world.entity_count(), 1);
}

#[test]
fn verify_stage_tables_are_adopted_and_indexed() {
    let (mut world, health) = world_with_health();
    let squad = world.spawn_named("Squad", None).unwrap();
    let tables_before = world.table_count();

    let mut stage = world.new_stage();
    let medic = stage.spawn_named(&world, "Medic", Some(squad)).unwrap();
    stage.set_component(&world, medic, health, 55.0f32).unwrap();
    assert_eq!(stage.created_table_count(), 2);
    assert_eq!(world.table_count(), tables_before);
    assert!(world.hierarchy().tables(squad).is_empty());

    world.merge(&mut stage);
    assert!(stage.is_empty());
    assert_eq!(world.table_count(), tables_before + 2);
    assert_eq!(world.hierarchy().tables(squad).len(), 2);
    assert_eq!(world.lookup_path(C, EntityId::NULL, "Squad.Medic", ".", None), medic);
    assert_eq!(world.get_component::<f32>(C, medic, health), Ok(Some(55.0)));
    assert_eq!(world.build_path(C, EntityId::NULL, medic, ".", None).unwrap(), "Squad.Medic");
}

#[test]
fn verify_two_stages_creating_the_same_type() {
    let (mut world, health) = world_with_health();

    let mut first = world.new_stage();
    let mut second = world.new_stage();
    assert_ne!(first.id(), second.id());

    let a = first.spawn(&world).unwrap();
    first.set_component(&world, a, health, 1.0f32).unwrap();
    let b = second.spawn(&world).unwrap();
    second.set_component(&world, b, health, 2.0f32).unwrap();

    world.merge(&mut first);
    let tables_after_first = world.table_count();
    world.merge(&mut second);

    assert_eq!(world.table_count(), tables_after_first);
    assert_eq!(world.get_component::<f32>(C, a, health), Ok(Some(1.0)));
    assert_eq!(world.get_component::<f32>(C, b, health), Ok(Some(2.0)));
    assert_eq!(world.type_of(C, a), world.type_of(C, b));
}

#[test]
fn verify_stage_errors() {
    let (mut world, health) = world_with_health();
    let unit = world.spawn();
    let mut stage = world.new_stage();
    let nobody = EntityId::from_raw(90_000);

    assert_eq!(
        stage.set_component(&world, nobody, health, 1.0f32),
        Err(ArborError::EntityNotFound(nobody))
    );
    assert_eq!(
        stage.spawn_named(&world, "Orphan", Some(nobody)),
        Err(ArborError::EntityNotFound(nobody))
    );
    assert!(matches!(
        stage.set_component(&world, unit, health, 1u8),
        Err(ArborError::ComponentMismatch { .. })
    ));
    assert!(stage.is_empty());
}
