//! End-to-end engine scenarios across detector, merge, restore and history

mod helpers;

use lectary_admin::db::{entities, history};
use lectary_admin::models::{EntityKind, HistoryAction, Relationship};
use lectary_admin::services::{DuplicateDetector, MergeEngine, RestoreEngine};

/// director#5 "Tarkovsky" with 3 links, director#9 "Tarkovsky" with one
/// overlapping and one unique link: after the merge the keeper holds 4
/// distinct links, the loser is gone, and repeating the merge changes
/// nothing.
#[tokio::test]
async fn test_tarkovsky_merge_scenario() {
    let (_dir, state) = helpers::create_test_state().await;
    let course = helpers::seed_course(&state.db, "Cinema", "cinema").await;

    let mut lectures = Vec::new();
    for n in 1..=4 {
        lectures.push(helpers::seed_lecture(&state.db, course, n).await);
    }

    let keep = entities::insert_entity(&state.db, EntityKind::Director, "Tarkovsky", None, None)
        .await
        .unwrap();
    let lose = entities::insert_entity(&state.db, EntityKind::Director, "Tarkovsky", None, None)
        .await
        .unwrap();

    for &lecture in &lectures[0..3] {
        entities::link_to_lecture(&state.db, EntityKind::Director, lecture, keep, Relationship::Discussed)
            .await
            .unwrap();
    }
    // One overlapping (lectures[2]) and one unique (lectures[3]) link
    entities::link_to_lecture(&state.db, EntityKind::Director, lectures[2], lose, Relationship::Mentioned)
        .await
        .unwrap();
    entities::link_to_lecture(&state.db, EntityKind::Director, lectures[3], lose, Relationship::Discussed)
        .await
        .unwrap();

    let engine = MergeEngine::new(state.db.clone(), state.storage.clone());
    engine
        .merge(keep, EntityKind::Director, lose, EntityKind::Director)
        .await
        .unwrap();

    assert!(entities::get_entity(&state.db, EntityKind::Director, lose)
        .await
        .unwrap()
        .is_none());

    let mut linked = entities::linked_lecture_ids(&state.db, EntityKind::Director, keep)
        .await
        .unwrap();
    linked.sort_unstable();
    assert_eq!(linked.len(), 4, "keeper must hold 4 distinct lecture links");

    // Same merge again: success with zero additional side effects
    engine
        .merge(keep, EntityKind::Director, lose, EntityKind::Director)
        .await
        .unwrap();
    assert_eq!(
        entities::connection_count(&state.db, EntityKind::Director, keep)
            .await
            .unwrap(),
        4
    );
}

/// Detection -> approve -> re-detect replays the decision once; later
/// passes see nothing left to merge.
#[tokio::test]
async fn test_history_replay_across_detection_passes() {
    let (_dir, state) = helpers::create_test_state().await;
    let course = helpers::seed_course(&state.db, "Art", "art").await;
    let lecture = helpers::seed_lecture(&state.db, course, 1).await;

    let strong = entities::insert_entity(&state.db, EntityKind::Painter, "Rembrandt", None, None)
        .await
        .unwrap();
    entities::insert_entity(&state.db, EntityKind::Painter, "rembrandt", None, None)
        .await
        .unwrap();
    entities::link_to_lecture(&state.db, EntityKind::Painter, lecture, strong, Relationship::Discussed)
        .await
        .unwrap();

    let detector = DuplicateDetector::new(state.db.clone(), state.storage.clone());

    let report = detector.detect().await.unwrap();
    assert_eq!(report.exact.len(), 1);
    let sig = report.exact[0].signature();

    history::record_decision(&state.db, &sig, HistoryAction::Approved, Some(EntityKind::Painter))
        .await
        .unwrap();

    let report = detector.detect().await.unwrap();
    assert!(report.exact.is_empty(), "approved group must not re-surface");
    assert_eq!(report.auto_merged.len(), 1);
    assert_eq!(report.auto_merged[0].keep_id, strong);

    let report = detector.detect().await.unwrap();
    assert!(report.auto_merged.is_empty(), "replay must happen exactly once");

    assert_eq!(
        entities::list_entities(&state.db, EntityKind::Painter)
            .await
            .unwrap()
            .len(),
        1
    );
}

/// Soft delete then restore round-trips junctions and relationship types
/// under a new id, consuming the backup record.
#[tokio::test]
async fn test_soft_delete_restore_round_trip() {
    let (_dir, state) = helpers::create_test_state().await;
    let course = helpers::seed_course(&state.db, "Literature", "literature").await;
    let l1 = helpers::seed_lecture(&state.db, course, 1).await;
    let l2 = helpers::seed_lecture(&state.db, course, 2).await;

    let id = entities::insert_entity(
        &state.db,
        EntityKind::Philosopher,
        "Kierkegaard",
        None,
        Some("Danish philosopher"),
    )
    .await
    .unwrap();
    entities::link_to_lecture(&state.db, EntityKind::Philosopher, l1, id, Relationship::Discussed)
        .await
        .unwrap();
    entities::link_to_lecture(&state.db, EntityKind::Philosopher, l2, id, Relationship::Mentioned)
        .await
        .unwrap();

    let engine = RestoreEngine::new(state.db.clone(), state.storage.clone());
    let backup_id = engine.soft_delete(EntityKind::Philosopher, id).await.unwrap();
    let new_id = engine.restore(backup_id).await.unwrap();

    assert_ne!(new_id, id);

    let restored = entities::get_entity(&state.db, EntityKind::Philosopher, new_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.display_name, "Kierkegaard");
    assert_eq!(restored.description.as_deref(), Some("Danish philosopher"));

    let mut rows = entities::junction_rows(&state.db, EntityKind::Philosopher, new_id)
        .await
        .unwrap();
    rows.sort_by_key(|r| r.lecture_id);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].relationship_type, Relationship::Discussed);
    assert_eq!(rows[1].relationship_type, Relationship::Mentioned);

    // Restored entities surface in detection again: create a near-duplicate
    entities::insert_entity(&state.db, EntityKind::Philosopher, "Kierkegard", None, None)
        .await
        .unwrap();
    let detector = DuplicateDetector::new(state.db.clone(), state.storage.clone());
    let report = detector.detect().await.unwrap();
    assert_eq!(report.similar.len(), 1);
    assert!(report.similar[0].similarity >= 0.85);
}
