#![warn(clippy::uninlined_format_args)]

pub mod clock;
pub mod memory;

pub use clock::{ManualClock, SystemClock};
pub use memory::{
    InMemoryActivityLedger, InMemoryLedger, InMemoryLoanBook, InMemoryMemberDirectory,
    InMemoryRateCatalog, InMemoryShuStore, MemberRecord,
};
