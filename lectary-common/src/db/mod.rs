//! Database access for lectary services

pub mod init;
pub mod models;

pub use init::{init_database, initialize_schema};
