//! govrisk core library - risk-based ranking of governance scenarios
//!
//! Pipeline: factor scores -> factor effects -> logistic probability adjustment
//! -> PERT expected goal impacts -> weighted scenario ranking.

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Catalogs are loaded once and never mutated
// - No global mutable state
// - No randomness, clocks, threads, or async
// - Unknown ids yield None or an empty result, never a panic
// - Probabilities stay strictly inside (0, 1)
// - Identical input yields byte-for-byte identical output

pub mod audit;
pub mod catalog;
pub mod config;
pub mod effect;
pub mod goals;
pub mod probability;
pub mod ranking;
pub mod report;

pub use audit::{audit_catalog, AuditReport};
pub use catalog::{Catalog, Direction, GoalDirection, Strength, ThreePoint};
pub use config::ResolvedConfig;
pub use effect::factor_effect;
pub use goals::{pert_mean, scenario_goal_profile};
pub use probability::{adjusted_probability, logistic_transform, scenario_risk_profile};
pub use ranking::{goal_rankings, rank_scenarios, GoalWeights, RankedScenario};
