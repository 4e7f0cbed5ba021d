//! # Repository Layer
//!
//! Data access implementations following the Repository pattern.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Repository Pattern                                   │
//! │                                                                         │
//! │  Caller ──► Repository ──► SqlitePool ──► SQLite                        │
//! │                 │                                                        │
//! │                 └── Validates with tally-core before any write          │
//! │                                                                         │
//! │  One repository per aggregate:                                          │
//! │    CatalogRepository   products + locations                              │
//! │    LedgerRepository    stock_movements (append-only)                     │
//! │    PositionRepository  stock_positions (derived cache)                   │
//! │    TransferRepository  paired transfer_out / transfer_in                 │
//! │    SaleRepository      sales_transactions + sale_lines                   │
//! │    SummaryRepository   daily_sales_summaries (derived)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Discipline
//! Every multi-row write runs inside a single SQLite transaction. The
//! position cache is never touched outside a transaction that also appends
//! the corresponding ledger row.

pub mod catalog;
pub mod ledger;
pub mod position;
pub mod sale;
pub mod summary;
pub mod transfer;

pub use catalog::CatalogRepository;
pub use ledger::{LedgerRepository, MovementFilter};
pub use position::PositionRepository;
pub use sale::SaleRepository;
pub use summary::SummaryRepository;
pub use transfer::TransferRepository;
