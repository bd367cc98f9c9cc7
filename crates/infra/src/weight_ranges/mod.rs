//! Weight-range persistence.
//!
//! - [`in_memory`]: staged in-process store implementing `WeightRangeStore`.
//! - [`postgres`]: SQL store serialized per carrier with advisory transaction locks; also
//!   implements `WeightRangeStore`, so the same validator drives both.

pub mod in_memory;
pub mod locks;
pub mod postgres;

pub use in_memory::{InMemoryRangeTx, InMemoryWeightRangeStore};
pub use locks::{CarrierLockGuard, CarrierLocks};
pub use postgres::{PostgresRangeTx, PostgresWeightRangeStore};
