//! # storage-adapters
//!
//! Implementations of the `domains` ports. Only the in-memory backend ships
//! today; database backends plug in behind the same traits.

pub mod directory;
pub mod memory;

pub use directory::StaticViewerDirectory;
pub use memory::{InMemoryDiscussionRepo, InMemorySubscriptionRepo};
