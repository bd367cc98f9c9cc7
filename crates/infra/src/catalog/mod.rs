//! Shop-scoped catalog lookups backing the eligibility resolver.

pub mod in_memory;
pub mod zones;

pub use in_memory::InMemoryCatalog;
pub use zones::InMemoryZoneDirectory;
