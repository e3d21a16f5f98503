//! Engine services for the admin backend

pub mod duplicate_detector;
pub mod job_queue;
pub mod merge_engine;
pub mod metadata;
pub mod restore_engine;

pub use duplicate_detector::DuplicateDetector;
pub use job_queue::{CancelOutcome, JobQueue};
pub use merge_engine::MergeEngine;
pub use metadata::MetadataGenerator;
pub use restore_engine::RestoreEngine;
