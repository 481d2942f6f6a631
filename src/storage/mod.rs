//! Entity store for panel records.
//!
//! [`RecordStore`] is the contract; [`InMemoryRecordStore`] is the
//! session-scoped implementation every panel uses.

mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
