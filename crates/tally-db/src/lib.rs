//! # tally-db: Database Layer for Tally
//!
//! SQLite persistence for the inventory ledger: the append-only movement
//! store, the derived position cache, transfers, sales, and daily rollups.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (HTTP handlers, jobs)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-core (Business Logic)                     │   │
//! │  │        Pure types, invariants, rollup math - NO I/O             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-db (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌──────────────────────────┐  │   │
//! │  │   │   pool    │  │ migrations │  │      repository/         │  │   │
//! │  │   │  SQLite   │  │  embedded  │  │  ledger  positions       │  │   │
//! │  │   │  + WAL    │  │    SQL     │  │  transfers sales         │  │   │
//! │  │   └───────────┘  └────────────┘  │  summaries catalog       │  │   │
//! │  │                                  └──────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Discipline
//!
//! 1. **Ledger is truth**: `stock_movements` is append-only; positions and
//!    summaries are derived and rebuildable
//! 2. **Atomic pairs**: every position-cache change commits in the same
//!    transaction as its ledger row
//! 3. **Guarded outflows**: decrements carry a non-negativity guard, so
//!    concurrent writers cannot overdraw a position
//!
//! ## Quick Start
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//! let committed = db.ledger().append(&movement).await?;
//! let report = db.positions().reconcile().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    CatalogRepository, LedgerRepository, MovementFilter, PositionRepository, SaleRepository,
    SummaryRepository, TransferRepository,
};
