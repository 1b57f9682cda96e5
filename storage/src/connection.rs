//! MongoDB connection handle.
//!
//! Construct one [`MongoHandler`] at startup and pass it to whatever needs
//! the database. [`MongoHandler::shared`] exists for callers that cannot
//! thread a handle through; it hands every caller the same instance.

use config::MongoConfig;
use errors::StorageError;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::{Client, Database};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const BACKEND: &str = "MongoDB";

/// Users authenticate against this database regardless of the data database.
pub const AUTH_SOURCE: &str = "admin";

static SHARED: OnceCell<Arc<MongoHandler>> = OnceCell::const_new();

pub struct MongoHandler {
    client: Client,
    database: Database,
    config: MongoConfig,
}

impl MongoHandler {
    /// Build a client for `config`.
    ///
    /// The driver connects lazily, so this only fails on options the driver
    /// rejects; use [`MongoHandler::ping`] to verify the server is reachable.
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: &MongoConfig) -> Result<Self, StorageError> {
        Self::with_options(config, client_options(config))
    }

    /// Build a client from explicit driver options, e.g. [`client_options`]
    /// with a shorter `server_selection_timeout`.
    pub fn with_options(config: &MongoConfig, options: ClientOptions) -> Result<Self, StorageError> {
        let client = Client::with_options(options).map_err(|e| StorageError::ConnectionError {
            backend: BACKEND.to_string(),
            reason: e.to_string(),
        })?;
        let database = client.database(&config.mongo_db_name);

        info!(uri = %config.redacted_uri(), "MongoDB client created");
        Ok(Self {
            client,
            database,
            config: config.clone(),
        })
    }

    /// The process-wide handle.
    ///
    /// The first call connects with `config`; every later call returns the
    /// same handle and ignores its argument.
    pub async fn shared(config: &MongoConfig) -> Result<Arc<Self>, StorageError> {
        let handler = SHARED
            .get_or_try_init(|| async { Self::connect(config).map(Arc::new) })
            .await?;

        if handler.config != *config {
            debug!(
                requested = %config.redacted_uri(),
                active = %handler.config.redacted_uri(),
                "shared MongoDB handle already initialized, ignoring new configuration"
            );
        }
        Ok(Arc::clone(handler))
    }

    /// Round-trip a `ping` command. Returns the latency in milliseconds.
    pub async fn ping(&self) -> Result<u64, StorageError> {
        let start = Instant::now();
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;
        Ok(start.elapsed().as_millis() as u64)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }
}

/// Driver options for `config`: one TCP host, credentials checked against
/// [`AUTH_SOURCE`].
pub fn client_options(config: &MongoConfig) -> ClientOptions {
    let credential = Credential::builder()
        .username(config.mongo_username.clone())
        .password(config.mongo_password.clone())
        .source(AUTH_SOURCE.to_string())
        .build();

    ClientOptions::builder()
        .hosts(vec![ServerAddress::Tcp {
            host: config.mongo_host.clone(),
            port: Some(config.mongo_port),
        }])
        .credential(credential)
        .default_database(config.mongo_db_name.clone())
        .app_name("redis-mirror".to_string())
        .build()
}
