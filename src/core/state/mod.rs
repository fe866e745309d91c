//! Cursor state persistence
//!
//! The change feed cursor and the failed-instance ledger live in a small
//! JSON file, rewritten atomically on every checkpoint.

pub mod cursor;
pub mod manager;

pub use cursor::{CursorState, FailedInstance};
pub use manager::StateManager;
