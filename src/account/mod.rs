//! Account module
//!
//! Ledger accounts and the currency registry entries they reference.

pub mod models;

// Re-export commonly used types
pub use models::{Account, AccountError, Currency};
