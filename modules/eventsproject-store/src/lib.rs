//! Persistence for events, participants and logistics.
//!
//! One trait per entity. `PgStore` backs all three with Postgres; `MemoryStore`
//! backs all three with in-memory tables and records every save so callers can
//! assert on writes without a database.

pub mod memory;
pub mod pg;
pub mod traits;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use traits::{EventStore, LogisticsStore, ParticipantStore};
