//! Logging setup. Everything goes through `tracing`; stdout is left alone
//! because the stdio transport writes protocol traffic there.

pub mod tracing;
pub use self::tracing::*;
