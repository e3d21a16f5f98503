//! Shared domain model types
//!
//! The seven linkable entity kinds and their table mappings, junction
//! relationship types, and upload job statuses. Courses and lectures are
//! catalog tables but not entity kinds: they have no junction table of
//! their own and never participate in duplicate detection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven linkable entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Director,
    Film,
    Writer,
    Book,
    Painter,
    Painting,
    Philosopher,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Director,
        EntityKind::Film,
        EntityKind::Writer,
        EntityKind::Book,
        EntityKind::Painter,
        EntityKind::Painting,
        EntityKind::Philosopher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Director => "director",
            EntityKind::Film => "film",
            EntityKind::Writer => "writer",
            EntityKind::Book => "book",
            EntityKind::Painter => "painter",
            EntityKind::Painting => "painting",
            EntityKind::Philosopher => "philosopher",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s {
            "director" => Some(EntityKind::Director),
            "film" => Some(EntityKind::Film),
            "writer" => Some(EntityKind::Writer),
            "book" => Some(EntityKind::Book),
            "painter" => Some(EntityKind::Painter),
            "painting" => Some(EntityKind::Painting),
            "philosopher" => Some(EntityKind::Philosopher),
            _ => None,
        }
    }

    /// Entity table name
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Director => "directors",
            EntityKind::Film => "films",
            EntityKind::Writer => "writers",
            EntityKind::Book => "books",
            EntityKind::Painter => "painters",
            EntityKind::Painting => "paintings",
            EntityKind::Philosopher => "philosophers",
        }
    }

    /// Display-name column: work-like kinds carry a title, person-like a name
    pub fn name_column(&self) -> &'static str {
        match self {
            EntityKind::Film | EntityKind::Book | EntityKind::Painting => "title",
            _ => "name",
        }
    }

    /// Hebrew display-name column, paired with [`Self::name_column`]
    pub fn hebrew_column(&self) -> &'static str {
        match self {
            EntityKind::Film | EntityKind::Book | EntityKind::Painting => "hebrew_title",
            _ => "hebrew_name",
        }
    }

    /// Junction table linking this kind to lectures
    pub fn junction_table(&self) -> &'static str {
        match self {
            EntityKind::Director => "lecture_directors",
            EntityKind::Film => "lecture_films",
            EntityKind::Writer => "lecture_writers",
            EntityKind::Book => "lecture_books",
            EntityKind::Painter => "lecture_painters",
            EntityKind::Painting => "lecture_paintings",
            EntityKind::Philosopher => "lecture_philosophers",
        }
    }

    /// Foreign-key column inside the junction table
    pub fn junction_fk(&self) -> &'static str {
        match self {
            EntityKind::Director => "director_id",
            EntityKind::Film => "film_id",
            EntityKind::Writer => "writer_id",
            EntityKind::Book => "book_id",
            EntityKind::Painter => "painter_id",
            EntityKind::Painting => "painting_id",
            EntityKind::Philosopher => "philosopher_id",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a lecture relates to a linked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Discussed,
    Mentioned,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Discussed => "discussed",
            Relationship::Mentioned => "mentioned",
        }
    }

    pub fn parse(s: &str) -> Option<Relationship> {
        match s {
            "discussed" => Some(Relationship::Discussed),
            "mentioned" => Some(Relationship::Mentioned),
            _ => None,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "succeeded" => Some(JobStatus::Succeeded),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states cannot be cancelled, only re-queued (failed) or left alone
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge history decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Approved,
    Declined,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Approved => "approved",
            HistoryAction::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<HistoryAction> {
        match s {
            "approved" => Some(HistoryAction::Approved),
            "declined" => Some(HistoryAction::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("course"), None);
    }

    #[test]
    fn test_name_columns() {
        assert_eq!(EntityKind::Director.name_column(), "name");
        assert_eq!(EntityKind::Film.name_column(), "title");
        assert_eq!(EntityKind::Book.hebrew_column(), "hebrew_title");
        assert_eq!(EntityKind::Philosopher.hebrew_column(), "hebrew_name");
    }

    #[test]
    fn test_junction_mapping() {
        assert_eq!(EntityKind::Painter.junction_table(), "lecture_painters");
        assert_eq!(EntityKind::Painter.junction_fk(), "painter_id");
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_serde_rename() {
        let json = serde_json::to_string(&EntityKind::Philosopher).unwrap();
        assert_eq!(json, "\"philosopher\"");
        let parsed: JobStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(parsed, JobStatus::Running);
    }
}
