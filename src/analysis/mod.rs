//! Heuristic message analysis: topic relevance and emotional energy.
//!
//! Both checks are pure, rule-based functions over the raw user text.

mod energy;
mod relevance;

pub use energy::{detect_energy, EnergyLevel};
pub use relevance::is_relevant;
