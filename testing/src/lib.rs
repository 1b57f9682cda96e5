//! Shared test fixtures for the mirror workspace.
//!
//! - [`InMemoryBackend`]: a [`mirror_core::DocumentBackend`] living in memory,
//!   for repository tests that need no server
//! - [`mongo`]: one MongoDB testcontainer per test process, lazily started and
//!   `None` when Docker is unavailable

mod fixtures;
mod memory;

pub use fixtures::*;
pub use memory::InMemoryBackend;
