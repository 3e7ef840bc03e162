//! Session correlation and cross-turn context.

pub mod key;
pub mod store;

pub use key::{current_key, derive_key};
pub use store::SqliteContextStore;
