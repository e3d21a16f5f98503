//! Merge history database operations
//!
//! Append-only decision ledger keyed by group signature. Recording the same
//! signature twice overwrites the previous decision (last write wins).

use lectary_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::models::{EntityKind, HistoryAction, MergeHistoryEntry};

/// Record (or overwrite) a decision for a group signature
pub async fn record_decision(
    pool: &SqlitePool,
    group_sig: &str,
    action: HistoryAction,
    keep_type: Option<EntityKind>,
) -> Result<()> {
    if group_sig.trim().is_empty() {
        return Err(Error::InvalidInput("Empty group signature".to_string()));
    }
    if action == HistoryAction::Approved && keep_type.is_none() {
        return Err(Error::InvalidInput(
            "Approved decisions require keep_type".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO merge_history (group_sig, action, keep_type)
        VALUES (?, ?, ?)
        ON CONFLICT(group_sig) DO UPDATE SET
            action = excluded.action,
            keep_type = excluded.keep_type,
            decided_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(group_sig)
    .bind(action.as_str())
    .bind(keep_type.map(|k| k.as_str()))
    .execute(pool)
    .await?;

    tracing::debug!(group_sig = %group_sig, action = %action, "Recorded merge decision");

    Ok(())
}

/// All recorded decisions
pub async fn list_decisions(pool: &SqlitePool) -> Result<Vec<MergeHistoryEntry>> {
    let rows = sqlx::query(
        "SELECT group_sig, action, keep_type, decided_at FROM merge_history ORDER BY group_sig",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let action: String = row.get("action");
            let action = HistoryAction::parse(&action).ok_or_else(|| {
                Error::Internal(format!("Invalid history action in database: {}", action))
            })?;
            let keep_type: Option<String> = row.get("keep_type");
            let keep_type = match keep_type {
                Some(s) => Some(EntityKind::parse(&s).ok_or_else(|| {
                    Error::Internal(format!("Invalid keep_type in database: {}", s))
                })?),
                None => None,
            };

            Ok(MergeHistoryEntry {
                group_sig: row.get("group_sig"),
                action,
                keep_type,
                decided_at: row.get("decided_at"),
            })
        })
        .collect()
}

/// Drop every recorded decision, re-surfacing all groups
pub async fn reset(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM merge_history").execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory database");
        lectary_common::db::initialize_schema(&pool)
            .await
            .expect("Schema initialization failed");
        pool
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let pool = setup_test_db().await;

        record_decision(&pool, "tarkovsky|director", HistoryAction::Declined, None)
            .await
            .unwrap();
        record_decision(
            &pool,
            "tolstoy|philosopher,writer",
            HistoryAction::Approved,
            Some(EntityKind::Writer),
        )
        .await
        .unwrap();

        let entries = list_decisions(&pool).await.unwrap();
        assert_eq!(entries.len(), 2);
        let approved = entries
            .iter()
            .find(|e| e.group_sig == "tolstoy|philosopher,writer")
            .unwrap();
        assert_eq!(approved.action, HistoryAction::Approved);
        assert_eq!(approved.keep_type, Some(EntityKind::Writer));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let pool = setup_test_db().await;

        record_decision(&pool, "sig", HistoryAction::Declined, None).await.unwrap();
        record_decision(&pool, "sig", HistoryAction::Approved, Some(EntityKind::Film))
            .await
            .unwrap();

        let entries = list_decisions(&pool).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, HistoryAction::Approved);
        assert_eq!(entries[0].keep_type, Some(EntityKind::Film));
    }

    #[tokio::test]
    async fn test_approved_requires_keep_type() {
        let pool = setup_test_db().await;
        let result = record_decision(&pool, "sig", HistoryAction::Approved, None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_reset_clears_ledger() {
        let pool = setup_test_db().await;
        record_decision(&pool, "a|director", HistoryAction::Declined, None).await.unwrap();
        record_decision(&pool, "b|film", HistoryAction::Declined, None).await.unwrap();

        let removed = reset(&pool).await.unwrap();
        assert_eq!(removed, 2);
        assert!(list_decisions(&pool).await.unwrap().is_empty());
    }
}
