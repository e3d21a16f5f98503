//! Merge engine
//!
//! Folds a duplicate entity (the loser) into a keeper: junction rows are
//! transplanted without ever violating the one-row-per-(lecture, entity)
//! invariant, the loser row is deleted, and the loser's image is reconciled
//! onto the keeper best-effort. Junction migration and row deletion run in
//! one transaction so a crash cannot strand relinked junctions next to a
//! surviving loser row.

use std::collections::HashSet;
use std::sync::Arc;

use lectary_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::db::entities;
use crate::models::EntityKind;
use crate::storage::{entity_image_key, ObjectStore};

/// Merges duplicate catalog entities
#[derive(Clone)]
pub struct MergeEngine {
    db: SqlitePool,
    storage: Arc<dyn ObjectStore>,
}

impl MergeEngine {
    pub fn new(db: SqlitePool, storage: Arc<dyn ObjectStore>) -> Self {
        Self { db, storage }
    }

    /// Merge `delete` into `keep`. Cross-type merges are allowed.
    ///
    /// Re-running the same merge is safe: once the loser is gone the call
    /// succeeds with no further side effects, which is what history-driven
    /// auto-replay relies on.
    pub async fn merge(
        &self,
        keep_id: i64,
        keep_kind: EntityKind,
        delete_id: i64,
        delete_kind: EntityKind,
    ) -> Result<()> {
        if keep_kind == delete_kind && keep_id == delete_id {
            return Err(Error::InvalidInput(
                "Cannot merge an entity into itself".to_string(),
            ));
        }

        let keeper = entities::get_entity(&self.db, keep_kind, keep_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {} not found", keep_kind, keep_id)))?;

        let Some(loser) = entities::get_entity(&self.db, delete_kind, delete_id).await? else {
            // Already merged away; treat replay as success
            info!(
                keep = %format_ref(keep_kind, keep_id),
                delete = %format_ref(delete_kind, delete_id),
                "Merge target already gone, nothing to do"
            );
            return Ok(());
        };

        let moved = self
            .transplant_and_delete(keep_id, keep_kind, delete_id, delete_kind)
            .await?;

        info!(
            keep = %format_ref(keep_kind, keep_id),
            keep_name = %keeper.display_name,
            delete = %format_ref(delete_kind, delete_id),
            delete_name = %loser.display_name,
            junctions_moved = moved,
            "Merged entity"
        );

        // Image bookkeeping never fails the merge
        self.reconcile_images(keep_id, keep_kind, delete_id, delete_kind)
            .await;

        Ok(())
    }

    /// Junction migration + loser deletion inside one transaction
    async fn transplant_and_delete(
        &self,
        keep_id: i64,
        keep_kind: EntityKind,
        delete_id: i64,
        delete_kind: EntityKind,
    ) -> Result<u64> {
        let mut tx = self.db.begin().await?;

        let select_loser_rows = format!(
            "SELECT id, lecture_id, relationship_type FROM {junction} WHERE {fk} = ?",
            junction = delete_kind.junction_table(),
            fk = delete_kind.junction_fk(),
        );
        let loser_rows = sqlx::query(&select_loser_rows)
            .bind(delete_id)
            .fetch_all(&mut *tx)
            .await?;

        let select_keep_lectures = format!(
            "SELECT lecture_id FROM {junction} WHERE {fk} = ?",
            junction = keep_kind.junction_table(),
            fk = keep_kind.junction_fk(),
        );
        let keep_lectures: HashSet<i64> = sqlx::query_scalar(&select_keep_lectures)
            .bind(keep_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

        let delete_loser_row = format!(
            "DELETE FROM {junction} WHERE id = ?",
            junction = delete_kind.junction_table(),
        );
        let relink_in_place = format!(
            "UPDATE {junction} SET {fk} = ? WHERE id = ?",
            junction = delete_kind.junction_table(),
            fk = delete_kind.junction_fk(),
        );
        let insert_into_keep = format!(
            "INSERT INTO {junction} (lecture_id, {fk}, relationship_type) VALUES (?, ?, ?)",
            junction = keep_kind.junction_table(),
            fk = keep_kind.junction_fk(),
        );

        let mut moved = 0u64;
        for row in &loser_rows {
            let row_id: i64 = row.get("id");
            let lecture_id: i64 = row.get("lecture_id");
            let relationship: String = row.get("relationship_type");

            if keep_lectures.contains(&lecture_id) {
                // Keeper already covers this lecture; relinking would break
                // the per-pair uniqueness constraint
                sqlx::query(&delete_loser_row)
                    .bind(row_id)
                    .execute(&mut *tx)
                    .await?;
            } else if keep_kind == delete_kind {
                // Relink, not recreate: only the foreign key changes
                sqlx::query(&relink_in_place)
                    .bind(keep_id)
                    .bind(row_id)
                    .execute(&mut *tx)
                    .await?;
                moved += 1;
            } else {
                // Cross-type: the row moves to the keeper's junction table
                sqlx::query(&insert_into_keep)
                    .bind(lecture_id)
                    .bind(keep_id)
                    .bind(&relationship)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&delete_loser_row)
                    .bind(row_id)
                    .execute(&mut *tx)
                    .await?;
                moved += 1;
            }
        }

        let delete_entity = format!(
            "DELETE FROM {table} WHERE id = ?",
            table = delete_kind.table(),
        );
        sqlx::query(&delete_entity)
            .bind(delete_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(moved)
    }

    /// Best-effort image reconciliation: give the keeper the loser's image
    /// if it has none, then drop the loser's key.
    async fn reconcile_images(
        &self,
        keep_id: i64,
        keep_kind: EntityKind,
        delete_id: i64,
        delete_kind: EntityKind,
    ) {
        let loser_key = entity_image_key(delete_kind, delete_id);
        let keeper_key = entity_image_key(keep_kind, keep_id);

        let loser_has_image = match self.storage.exists(&loser_key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %loser_key, error = %e, "Image existence check failed during merge");
                return;
            }
        };
        if !loser_has_image {
            return;
        }

        match self.storage.exists(&keeper_key).await {
            Ok(false) => {
                if let Err(e) = self.storage.copy(&loser_key, &keeper_key).await {
                    warn!(
                        src = %loser_key,
                        dest = %keeper_key,
                        error = %e,
                        "Image copy failed during merge"
                    );
                }
            }
            Ok(true) => {}
            Err(e) => {
                warn!(key = %keeper_key, error = %e, "Image existence check failed during merge");
            }
        }

        if let Err(e) = self.storage.delete(&loser_key).await {
            warn!(key = %loser_key, error = %e, "Image delete failed during merge");
        }
    }
}

fn format_ref(kind: EntityKind, id: i64) -> String {
    format!("{}#{}", kind, id)
}
