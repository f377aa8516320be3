//! # Meridian Risk Crate
//!
//! Portfolio-level exposure caps. A breach does not abort the run: all
//! target weights are scaled down proportionally until the caps hold,
//! and the event is logged at a severity that escalates with the breach
//! magnitude. Aborting on every cap violation would turn a slightly
//! aggressive config into a dead strategy; scaling preserves the book's
//! shape while honoring the limits.

pub mod error;
pub mod exposure;

pub use error::RiskError;
pub use exposure::ExposureGuard;
