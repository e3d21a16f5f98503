//! Soft delete and restore
//!
//! Soft delete snapshots an entity and its junction rows into the
//! `deleted_entities` staging table before removing them; restore replays
//! the snapshot under a fresh id. The entity insert and the junction replay
//! are not atomic, so a failed replay compensates by deleting the new row
//! before surfacing the error. Image staging in both directions is
//! best-effort and never fails the operation.

use std::collections::HashSet;
use std::sync::Arc;

use lectary_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{backups, entities};
use crate::models::{BackupRecord, EntityKind, JunctionSnapshot};
use crate::storage::{deleted_image_key, entity_image_key, ObjectStore};

/// Soft-deletes entities into backup records and restores them
#[derive(Clone)]
pub struct RestoreEngine {
    db: SqlitePool,
    storage: Arc<dyn ObjectStore>,
}

impl RestoreEngine {
    pub fn new(db: SqlitePool, storage: Arc<dyn ObjectStore>) -> Self {
        Self { db, storage }
    }

    /// Soft-delete an entity, returning the backup record id
    pub async fn soft_delete(&self, kind: EntityKind, id: i64) -> Result<i64> {
        let entity = entities::get_entity(&self.db, kind, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {} not found", kind, id)))?;

        let snapshots: Vec<JunctionSnapshot> = entities::junction_rows(&self.db, kind, id)
            .await?
            .into_iter()
            .map(|row| JunctionSnapshot {
                lecture_id: row.lecture_id,
                relationship_type: row.relationship_type,
            })
            .collect();

        let live_key = entity_image_key(kind, id);
        let has_image = match self.storage.exists(&live_key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %live_key, error = %e, "Image existence check failed during soft delete");
                false
            }
        };

        let backup_id = backups::insert_backup(
            &self.db,
            id,
            kind,
            &entity.display_name,
            entity.hebrew_name.as_deref(),
            entity.description.as_deref(),
            &snapshots,
            has_image,
        )
        .await?;

        entities::delete_junction_rows(&self.db, kind, id).await?;
        entities::delete_entity_row(&self.db, kind, id).await?;

        // Stage the image under deleted/ so a later restore can find it
        if has_image {
            let staged_key = deleted_image_key(kind, id);
            if let Err(e) = self.storage.copy(&live_key, &staged_key).await {
                warn!(src = %live_key, dest = %staged_key, error = %e, "Image staging failed during soft delete");
            } else if let Err(e) = self.storage.delete(&live_key).await {
                warn!(key = %live_key, error = %e, "Image delete failed during soft delete");
            }
        }

        info!(
            kind = %kind,
            id,
            backup_id,
            junctions = snapshots.len(),
            "Entity soft-deleted"
        );

        Ok(backup_id)
    }

    /// Restore a soft-deleted entity under a new store-assigned id
    pub async fn restore(&self, backup_id: i64) -> Result<i64> {
        let backup = backups::get_backup(&self.db, backup_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Backup {} not found", backup_id)))?;

        let kind = backup.entity_type;
        let new_id = entities::insert_entity(
            &self.db,
            kind,
            &backup.name,
            backup.hebrew_name.as_deref(),
            backup.description.as_deref(),
        )
        .await?;

        if let Err(e) = self.replay_junctions(&backup, new_id).await {
            // Compensate: the insert and the replay are not atomic, so roll
            // the new row back before surfacing the error
            warn!(
                backup_id,
                new_id,
                error = %e,
                "Junction replay failed, rolling back restored entity"
            );
            if let Err(rollback) = entities::delete_entity_row(&self.db, kind, new_id).await {
                warn!(new_id, error = %rollback, "Rollback of restored entity failed");
            }
            return Err(e);
        }

        self.restore_image(&backup, new_id).await;

        backups::delete_backup(&self.db, backup_id).await?;

        info!(
            backup_id,
            kind = %kind,
            original_id = backup.original_id,
            new_id,
            "Entity restored"
        );

        Ok(new_id)
    }

    /// Replay junction snapshots against the new id, de-duplicated by
    /// lecture id (first occurrence wins)
    async fn replay_junctions(&self, backup: &BackupRecord, new_id: i64) -> Result<()> {
        let mut seen: HashSet<i64> = HashSet::new();

        for snapshot in &backup.junction_data {
            if !seen.insert(snapshot.lecture_id) {
                continue;
            }
            entities::link_to_lecture(
                &self.db,
                backup.entity_type,
                snapshot.lecture_id,
                new_id,
                snapshot.relationship_type,
            )
            .await?;
        }

        Ok(())
    }

    /// Best-effort image un-staging: copy the deleted/ copy back to the live
    /// key for the new id and drop the staged copy
    async fn restore_image(&self, backup: &BackupRecord, new_id: i64) {
        if !backup.has_image {
            return;
        }

        let staged_key = deleted_image_key(backup.entity_type, backup.original_id);
        let live_key = entity_image_key(backup.entity_type, new_id);

        match self.storage.exists(&staged_key).await {
            Ok(true) => {
                if let Err(e) = self.storage.copy(&staged_key, &live_key).await {
                    warn!(src = %staged_key, dest = %live_key, error = %e, "Image restore copy failed");
                    return;
                }
                if let Err(e) = self.storage.delete(&staged_key).await {
                    warn!(key = %staged_key, error = %e, "Staged image cleanup failed");
                }
            }
            Ok(false) => {
                warn!(key = %staged_key, "Backup claims an image but none is staged");
            }
            Err(e) => {
                warn!(key = %staged_key, error = %e, "Image existence check failed during restore");
            }
        }
    }
}
