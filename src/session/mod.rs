//! Session lifecycle: the in-memory store and its idle sweeper.

pub mod store;
pub mod sweeper;

pub use store::{SessionStore, SessionSummary, StoreStats};
pub use sweeper::SessionSweeper;
