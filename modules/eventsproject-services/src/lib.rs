//! Event affinity and cost engine.
//!
//! Links participants and logistics to events, lists reserved logistics in a
//! date range, and recomputes event costs from reserved logistics. All
//! persistence goes through the store traits in `eventsproject-store`.

pub mod services;

pub use services::{EventServices, LogisticsInRange, RecomputeRuns};
