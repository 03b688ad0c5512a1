//! Database access layer
//!
//! Every function takes any SQLite executor, so the same query runs against
//! the pool or inside a caller's transaction (`&mut *tx`).

pub mod iris;
pub mod terms;
pub mod users;
pub mod vocabulary;
