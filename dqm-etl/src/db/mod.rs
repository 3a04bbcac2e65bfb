//! Database layer - connection pool, migrations and repositories
//!
//! # Design Principles
//!
//! - Connection pool (max 5 connections by default) - no shared single connection
//! - All list operations use JOINs - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations

pub mod migrations;
pub mod pagination;
pub mod pool;
pub mod repos;

pub use pagination::{Paginated, Pagination};
pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
