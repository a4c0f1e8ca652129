//! Test Utilities Crate
//!
//! Shared test infrastructure for the renewal system test suite.
//!
//! # Modules
//!
//! - `fixtures`: fixed dates, amounts and identifiers
//! - `builders`: builders for customers, policies, cases, payments, units and providers
//! - `database`: PostgreSQL test containers with migrations applied
//! - `assertions`: assertion helpers for amounts and installment schedules
//! - `generators`: proptest strategies and fake data

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
