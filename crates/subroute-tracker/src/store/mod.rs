//! Store adapters for the persistence contracts
//!
//! - `memory`: process-local, for tests and the simulator
//! - `file`: one JSON recovery snapshot per user
//! - `jsonl`: append-only JSON-lines trip logs

mod file;
mod jsonl;
mod memory;

pub use file::FileRecoveryStore;
pub use jsonl::{read_trip_logs, JsonLinesTripLogStore};
pub use memory::{MemoryRecoveryStore, MemoryTripLogStore};
