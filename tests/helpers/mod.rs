//! Test helpers module
//!
//! Database, service and HTTP fixtures shared by the integration tests.
//! Tests that need PostgreSQL skip themselves when neither Docker nor
//! `TEST_DATABASE_URL` is available.

#![allow(dead_code)]

pub mod database_helper;
pub mod test_context;
pub mod test_data;

pub use database_helper::*;
pub use test_context::*;
pub use test_data::*;
