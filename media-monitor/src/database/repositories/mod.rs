//! Repository layer for server persistence.
//!
//! [`ServerStore`] abstracts where media server records live; the monitor
//! only ever talks to the trait.

pub mod memory;
pub mod server;

pub use memory::MemoryServerStore;
pub use server::{ServerStore, SqlxServerStore};
