//! Duplicate detector
//!
//! Scans all seven entity kinds for exact and near-duplicate display names.
//! Exact groups share a trimmed, case-folded name; similar groups are the
//! transitive closure of normalized-Levenshtein matches at or above the
//! threshold. Groups are recomputed fresh on every pass; the only
//! persistent state is the merge history, which filters the output:
//! declined groups disappear, approved groups are replayed through the
//! merge engine instead of being surfaced again.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lectary_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{entities, history};
use crate::models::{
    AutoMergedGroup, DetectionReport, DuplicateEntry, DuplicateGroup, EntityKind, EntityRef,
    HistoryAction, MatchType,
};
use crate::services::MergeEngine;
use crate::storage::{entity_image_key, ObjectStore};

/// Minimum normalized-Levenshtein similarity for a near-duplicate pair
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Finds duplicate entities and replays recorded decisions
#[derive(Clone)]
pub struct DuplicateDetector {
    db: SqlitePool,
    storage: Arc<dyn ObjectStore>,
    merge_engine: MergeEngine,
}

impl DuplicateDetector {
    pub fn new(db: SqlitePool, storage: Arc<dyn ObjectStore>) -> Self {
        let merge_engine = MergeEngine::new(db.clone(), storage.clone());
        Self {
            db,
            storage,
            merge_engine,
        }
    }

    /// Run one detection pass
    pub async fn detect(&self) -> Result<DetectionReport> {
        let entries = self.load_entries().await?;
        let (exact, similar) = build_groups(&entries);

        let decisions: HashMap<String, (HistoryAction, Option<EntityKind>)> =
            history::list_decisions(&self.db)
                .await?
                .into_iter()
                .map(|e| (e.group_sig, (e.action, e.keep_type)))
                .collect();

        let mut report = DetectionReport {
            exact: Vec::new(),
            similar: Vec::new(),
            auto_merged: Vec::new(),
        };

        for (group, match_type) in exact
            .into_iter()
            .map(|g| (g, MatchType::Exact))
            .chain(similar.into_iter().map(|g| (g, MatchType::Similar)))
        {
            match decisions.get(&group.signature()) {
                Some((HistoryAction::Declined, _)) => {}
                Some((HistoryAction::Approved, Some(keep_type))) => {
                    match self.auto_resolve(&group, *keep_type).await {
                        Ok(merged) => report.auto_merged.push(merged),
                        Err(e) => {
                            warn!(
                                group = %group.name,
                                keep_type = %keep_type,
                                error = %e,
                                "Auto-merge of approved group failed"
                            );
                        }
                    }
                }
                Some((HistoryAction::Approved, None)) => {
                    // Should not happen: approvals are validated on record
                    warn!(group = %group.name, "Approved decision without keep_type, skipping");
                }
                None => match match_type {
                    MatchType::Exact => report.exact.push(group),
                    MatchType::Similar => report.similar.push(group),
                },
            }
        }

        info!(
            exact = report.exact.len(),
            similar = report.similar.len(),
            auto_merged = report.auto_merged.len(),
            "Duplicate detection pass complete"
        );

        Ok(report)
    }

    /// Load every entity of every kind with its connection count and image flag
    async fn load_entries(&self) -> Result<Vec<DuplicateEntry>> {
        let mut entries = Vec::new();

        for kind in EntityKind::ALL {
            let counts = entities::connection_counts(&self.db, kind).await?;

            for entity in entities::list_entities(&self.db, kind).await? {
                let image_key = entity_image_key(kind, entity.id);
                let has_image = match self.storage.exists(&image_key).await {
                    Ok(exists) => exists,
                    Err(e) => {
                        warn!(key = %image_key, error = %e, "Image existence check failed during detection");
                        false
                    }
                };

                entries.push(DuplicateEntry {
                    id: entity.id,
                    entity_type: kind,
                    display_name: entity.display_name,
                    hebrew_name: entity.hebrew_name,
                    connection_count: counts.get(&entity.id).copied().unwrap_or(0),
                    has_image,
                });
            }
        }

        Ok(entries)
    }

    /// Replay an approved group: keep the recorded type's strongest member,
    /// merge everything else into it
    async fn auto_resolve(
        &self,
        group: &DuplicateGroup,
        keep_type: EntityKind,
    ) -> Result<AutoMergedGroup> {
        let mut candidates: Vec<&DuplicateEntry> = group
            .entities
            .iter()
            .filter(|e| e.entity_type == keep_type)
            .collect();

        if candidates.is_empty() {
            return Err(lectary_common::Error::Internal(format!(
                "Approved group '{}' has no entity of keep type {}",
                group.name, keep_type
            )));
        }

        // Highest connection count wins; ties go to the oldest id
        candidates.sort_by(|a, b| {
            b.connection_count
                .cmp(&a.connection_count)
                .then(a.id.cmp(&b.id))
        });
        let keeper = candidates[0];

        let mut merged = Vec::new();
        for entity in &group.entities {
            if entity.entity_type == keep_type && entity.id == keeper.id {
                continue;
            }
            self.merge_engine
                .merge(keeper.id, keep_type, entity.id, entity.entity_type)
                .await?;
            merged.push(EntityRef {
                id: entity.id,
                entity_type: entity.entity_type,
            });
        }

        info!(
            group = %group.name,
            keep = %format!("{}#{}", keep_type, keeper.id),
            merged = merged.len(),
            "Approved group auto-merged"
        );

        Ok(AutoMergedGroup {
            name: group.name.clone(),
            keep_id: keeper.id,
            keep_type,
            merged,
        })
    }
}

/// Trim and case-fold a display name for comparison
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Build exact and similar groups from a flat entity list.
///
/// Exact groups collect entities whose normalized names are byte-equal.
/// Similar groups union distinct normalized names pairwise at or above the
/// similarity threshold and take the transitive closure; the group score is
/// the weakest edge that joined the cluster.
fn build_groups(entries: &[DuplicateEntry]) -> (Vec<DuplicateGroup>, Vec<DuplicateGroup>) {
    // BTreeMap keeps name order deterministic across passes
    let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        by_name.entry(normalize(&entry.display_name)).or_default().push(idx);
    }

    let mut exact = Vec::new();
    for (_, indices) in by_name.iter().filter(|(_, v)| v.len() >= 2) {
        let members: Vec<DuplicateEntry> =
            indices.iter().map(|&i| entries[i].clone()).collect();
        exact.push(DuplicateGroup {
            name: members[0].display_name.trim().to_string(),
            entities: members,
            match_type: MatchType::Exact,
            similarity: 1.0,
        });
    }

    // Similar groups over distinct normalized names
    let names: Vec<&String> = by_name.keys().collect();
    let mut uf = UnionFind::new(names.len());

    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let similarity = strsim::normalized_levenshtein(names[i], names[j]);
            if similarity >= SIMILARITY_THRESHOLD {
                uf.union(i, j, similarity);
            }
        }
    }

    let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..names.len() {
        clusters.entry(uf.find(i)).or_default().push(i);
    }

    let mut similar = Vec::new();
    for (root, name_indices) in clusters.into_iter().filter(|(_, v)| v.len() >= 2) {
        let mut members = Vec::new();
        for &name_idx in &name_indices {
            for &entry_idx in &by_name[names[name_idx]] {
                members.push(entries[entry_idx].clone());
            }
        }
        similar.push(DuplicateGroup {
            // name_indices are sorted, so the representative name is the
            // lexicographically smallest in the cluster and stable across runs
            name: members[0].display_name.trim().to_string(),
            entities: members,
            match_type: MatchType::Similar,
            similarity: uf.min_similarity(root),
        });
    }

    (exact, similar)
}

/// Union-find over name indices, tracking the weakest joining edge per set
struct UnionFind {
    parent: Vec<usize>,
    min_sim: Vec<f64>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            min_sim: vec![1.0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize, similarity: f64) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        self.parent[rb] = ra;
        self.min_sim[ra] = self.min_sim[ra].min(self.min_sim[rb]).min(similarity);
    }

    fn min_similarity(&mut self, x: usize) -> f64 {
        let root = self.find(x);
        self.min_sim[root]
    }
}
