//! Duplicate detection results and the merge decision ledger

use lectary_common::db::models::{EntityKind, HistoryAction};
use serde::Serialize;

/// One entity inside a duplicate group
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateEntry {
    pub id: i64,
    pub entity_type: EntityKind,
    pub display_name: String,
    pub hebrew_name: Option<String>,
    pub connection_count: i64,
    pub has_image: bool,
}

/// How a group was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Similar,
}

/// A computed duplicate group; ephemeral, recomputed on every detection pass
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub name: String,
    pub entities: Vec<DuplicateEntry>,
    pub match_type: MatchType,
    pub similarity: f64,
}

impl DuplicateGroup {
    /// Content signature, stable across entity-id churn
    pub fn signature(&self) -> String {
        let types: Vec<EntityKind> = self.entities.iter().map(|e| e.entity_type).collect();
        group_signature(&self.name, &types)
    }
}

/// Reference to one entity, used for auto-merge reporting
#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub entity_type: EntityKind,
}

/// A previously-approved group that was replayed during this detection pass
#[derive(Debug, Clone, Serialize)]
pub struct AutoMergedGroup {
    pub name: String,
    pub keep_id: i64,
    pub keep_type: EntityKind,
    pub merged: Vec<EntityRef>,
}

/// Full result of one detection pass
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub exact: Vec<DuplicateGroup>,
    pub similar: Vec<DuplicateGroup>,
    pub auto_merged: Vec<AutoMergedGroup>,
}

/// One row of the merge decision ledger
#[derive(Debug, Clone, Serialize)]
pub struct MergeHistoryEntry {
    pub group_sig: String,
    pub action: HistoryAction,
    pub keep_type: Option<EntityKind>,
    pub decided_at: String,
}

/// Normalized group signature: lowercased trimmed name plus the sorted,
/// de-duplicated member types, so a group is recognized again even after
/// the entity-id space has changed.
pub fn group_signature(name: &str, types: &[EntityKind]) -> String {
    let mut kinds: Vec<&str> = types.iter().map(|k| k.as_str()).collect();
    kinds.sort_unstable();
    kinds.dedup();
    format!("{}|{}", name.trim().to_lowercase(), kinds.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_normalizes_name() {
        let sig = group_signature("  Tarkovsky ", &[EntityKind::Director]);
        assert_eq!(sig, "tarkovsky|director");
    }

    #[test]
    fn test_signature_sorts_and_dedups_types() {
        let a = group_signature(
            "Tolstoy",
            &[EntityKind::Writer, EntityKind::Philosopher, EntityKind::Writer],
        );
        let b = group_signature(
            "tolstoy",
            &[EntityKind::Philosopher, EntityKind::Writer],
        );
        assert_eq!(a, b);
        assert_eq!(a, "tolstoy|philosopher,writer");
    }
}
