use config::{EnvSource, MongoConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use storage::MongoHandler;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::mongo::Mongo;
use tokio::sync::OnceCell;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

const ROOT_USER: &str = "mirror";
const ROOT_PASSWORD: &str = "mirror-secret";
const PING_ATTEMPTS: u32 = 30;

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

/// Collection suffix private to one test.
pub fn unique_suffix() -> String {
    unique_id("test").replace('-', "_")
}

pub struct MongoFixture {
    #[allow(dead_code)]
    container: ContainerAsync<Mongo>,
    config: MongoConfig,
}

impl MongoFixture {
    /// Settings for the container's root user on a scratch database.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }
}

static MONGO: OnceCell<Option<MongoFixture>> = OnceCell::const_new();

/// Shared MongoDB container, or `None` when Docker is unavailable.
pub async fn mongo() -> Option<&'static MongoFixture> {
    MONGO
        .get_or_init(|| async {
            let container_result = Mongo::default()
                .with_env_var("MONGO_INITDB_ROOT_USERNAME", ROOT_USER)
                .with_env_var("MONGO_INITDB_ROOT_PASSWORD", ROOT_PASSWORD)
                .start()
                .await;

            let container = match container_result {
                Ok(container) => container,
                Err(e) => {
                    tracing::warn!("Failed to start MongoDB container: {:?}", e);
                    return None;
                }
            };

            let port = match container.get_host_port_ipv4(27017).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Failed to get MongoDB port: {:?}", e);
                    return None;
                }
            };
            let port = port.to_string();

            let config = MongoConfig::from_source(&EnvSource::from_values([
                ("MONGO_DB_NAME", "mirror_test"),
                ("MONGO_DB_USER", ROOT_USER),
                ("MONGO_DB_PASSWORD", ROOT_PASSWORD),
                ("MONGO_HOST", "localhost"),
                ("MONGO_PORT", port.as_str()),
            ]))
            .ok()?;

            if let Err(e) = verify_mongo_connection(&config).await {
                tracing::warn!("MongoDB connection verification failed: {:?}", e);
                return None;
            }

            tracing::info!("MongoDB fixture started on port {}", port);
            Some(MongoFixture { container, config })
        })
        .await
        .as_ref()
}

/// The image restarts once after creating the root user, so the first pings
/// may be refused.
async fn verify_mongo_connection(config: &MongoConfig) -> Result<(), Box<dyn std::error::Error>> {
    let handler = MongoHandler::connect(config)?;
    let mut last_error = None;
    for _ in 0..PING_ATTEMPTS {
        match handler.ping().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                last_error = Some(e);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
    Err(last_error.map_or_else(|| "MongoDB never answered ping".into(), Into::into))
}
