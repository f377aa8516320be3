//! # Meridian Strategy Library
//!
//! The cross-sectional half of the engine: turning raw bar history into a
//! ranked, percentile-normalized score per symbol, and turning that
//! ranking into a weighted long/short book.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** this is a pure logic crate. It has no knowledge of
//!   databases, APIs, or execution. It depends only on `core-types` and
//!   `configuration`.
//! - **One selection routine:** momentum and mean-reversion differ only by
//!   an invert flag consumed inside `selection::select`. There are no
//!   hand-written per-direction branches to drift apart.
//! - **Pluggable scoring:** the factor formula itself lives behind the
//!   `FactorModel` trait; the scorer only cares that it maps a history
//!   window to a number.
//!
//! ## Public API
//!
//! - `FactorModel`: the trait all scoring functions implement.
//! - `score_universe`: filter, deduplicate and rank a universe at a date.
//! - `select` / `calculate_weights`: ranking -> selection -> positions.
//! - `target_book`: the full pipeline, used by both backtest and live.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod scorer;
pub mod selection;
pub mod universe;
pub mod weights;

// Re-export the key components to create a clean, public-facing API.
pub use error::StrategyError;
pub use models::{realized_volatility, trailing_volatilities, FactorModel, TrailingReturn};
pub use pipeline::target_book;
pub use scorer::score_universe;
pub use selection::{select, Selection};
pub use universe::{deduplicate, group_by_symbol, UniverseFilter};
pub use weights::calculate_weights;
