//! # Meridian Core Types
//!
//! This crate defines the shared data model for the whole system: market
//! bars, factor scores, positions, order instructions and the portfolio
//! snapshots produced by the simulator. It is a Layer 0 crate and depends
//! on nothing else in the workspace.
//!
//! It also hosts the one accumulation primitive (`fold_by_key`) that both
//! the universe deduplication and the multi-strategy blender are built on,
//! so that "two rows for one asset" and "one symbol in two books" are
//! resolved by the same code path.

pub mod accumulate;
pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use accumulate::{canonical_symbol, fold_by_key, net_by_symbol};
pub use enums::{Direction, ExecutionAlgorithm, FillStatus, OrderSide, Side, WeightingMethod};
pub use error::{DataError, ValidationError};
pub use structs::{FactorScore, FillReport, MarketBar, OrderInstruction, PortfolioState, Position};
