//! Domain layer for the DNS block checker
//!
//! Pure data and bookkeeping: rule lines, outcomes, run summaries and the error taxonomy.
//! Nothing here touches the network or the file system.

pub mod outcome;

// Re-export main domain types for convenience
pub use outcome::*;
