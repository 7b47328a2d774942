//! Account data model: secret-bearing records and their public projections.

pub mod types;

pub use types::{Account, AccountReference, AccountType};
