//! # Storage
//!
//! MongoDB persistence for the mirrored Redis structures:
//! - [`MongoHandler`]: one client per process, built from [`config::MongoConfig`]
//! - [`MongoBackend`]: the [`mirror_core::DocumentBackend`] over that client
//! - [`Repository`]: typed save/update/query over any backend
//!
//! Typical wiring:
//!
//! ```rust,no_run
//! use config::MongoConfig;
//! use mirror_core::{KeyedDocument, StreamDocument};
//! use storage::{MongoBackend, MongoHandler, Repository};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MongoConfig::load()?;
//! let handler = MongoHandler::connect(&config)?;
//! let repo = Repository::new(MongoBackend::new(&handler));
//! repo.ensure_all_indexes().await?;
//!
//! let mut stream: StreamDocument = repo.find_or_new_by_key("events", false).await?;
//! if stream.update_active_now_no_save(true) {
//!     repo.save(&mut stream).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod mongo;
pub mod repository;

pub use connection::{AUTH_SOURCE, MongoHandler, client_options};
pub use mongo::MongoBackend;
pub use repository::Repository;
