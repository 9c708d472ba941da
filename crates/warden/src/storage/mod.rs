pub mod memory;
pub mod sql;

pub use memory::{MemoryAccountLinkStore, MemoryShiftLedger};
pub use sql::{SqlAccountLinkStore, SqlShiftLedger};
