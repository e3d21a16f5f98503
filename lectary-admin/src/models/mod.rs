//! Data types for the admin service

pub mod duplicates;
pub mod entity;
pub mod job;

pub use duplicates::{
    group_signature, AutoMergedGroup, DetectionReport, DuplicateEntry, DuplicateGroup, EntityRef,
    MatchType, MergeHistoryEntry,
};
pub use entity::{BackupRecord, Entity, EntityPatch, JunctionRow, JunctionSnapshot};
pub use job::UploadJob;

pub use lectary_common::db::models::{EntityKind, HistoryAction, JobStatus, Relationship};
