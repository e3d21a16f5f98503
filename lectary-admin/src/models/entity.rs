//! Catalog entity records and soft-delete backups

use lectary_common::db::models::{EntityKind, Relationship};
use serde::{Deserialize, Serialize};

/// A catalog entity row
///
/// `display_name` maps onto the `name` or `title` column depending on the
/// kind. Ids are unique per kind, not globally: (kind, id) is the true key.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: i64,
    pub entity_type: EntityKind,
    pub display_name: String,
    pub hebrew_name: Option<String>,
    pub description: Option<String>,
}

/// Field patch for an entity; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityPatch {
    pub display_name: Option<String>,
    pub hebrew_name: Option<String>,
    pub description: Option<String>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.hebrew_name.is_none() && self.description.is_none()
    }
}

/// A junction row linking an entity to a lecture
#[derive(Debug, Clone, Serialize)]
pub struct JunctionRow {
    pub id: i64,
    pub lecture_id: i64,
    pub relationship_type: Relationship,
}

/// Junction snapshot stored in a backup record's `junction_data` JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionSnapshot {
    pub lecture_id: i64,
    pub relationship_type: Relationship,
}

/// A soft-delete backup record
///
/// Write-once at soft-delete, read-once and removed at restore.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub id: i64,
    pub original_id: i64,
    pub entity_type: EntityKind,
    pub name: String,
    pub hebrew_name: Option<String>,
    pub description: Option<String>,
    pub junction_data: Vec<JunctionSnapshot>,
    pub has_image: bool,
    pub deleted_at: String,
}
