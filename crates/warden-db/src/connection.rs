//! Opening the store the registries run against.
//!
//! The URL picks the engine. `ws://`, `wss://`, `http://` and `https://`
//! reach a SurrealDB server and sign in as root; a bare `host:port` is
//! treated as `ws://host:port`. `mem://` runs an embedded in-memory
//! store that lives as long as the process. Opening always brings the
//! schema up to date.

use std::fmt;

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::{current_version, run_migrations};

const MEMORY_URL: &str = "mem://";
const REMOTE_SCHEMES: [&str; 4] = ["ws://", "wss://", "http://", "https://"];

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Server address or `mem://`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; ignored for `mem://`.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "warden".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// An embedded in-memory store with the default namespace and database.
    pub fn in_memory() -> Self {
        Self {
            url: MEMORY_URL.into(),
            ..Self::default()
        }
    }

    /// Resolve the URL into an engine endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, DbError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(DbError::Config("database url is empty".into()));
        }
        if url == MEMORY_URL || url == "memory" {
            return Ok(Endpoint::Memory);
        }
        if REMOTE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return Ok(Endpoint::Remote(url.to_string()));
        }
        if url.contains("://") {
            return Err(DbError::Config(format!("unsupported database url: {url}")));
        }
        Ok(Endpoint::Remote(format!("ws://{url}")))
    }

    fn validate(&self) -> Result<Endpoint, DbError> {
        if self.namespace.trim().is_empty() || self.database.trim().is_empty() {
            return Err(DbError::Config(
                "namespace and database must not be blank".into(),
            ));
        }
        self.endpoint()
    }
}

/// Engine selected by [`DbConfig::url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Memory,
    Remote(String),
}

impl Endpoint {
    fn address(&self) -> &str {
        match self {
            Endpoint::Memory => MEMORY_URL,
            Endpoint::Remote(address) => address,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address())
    }
}

/// A migrated connection.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
    endpoint: Endpoint,
    schema_version: u32,
}

impl DbManager {
    /// Connect, sign in when the store is remote, select the namespace
    /// and database, and apply pending migrations.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        let endpoint = config.validate()?;
        info!(
            %endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Opening store"
        );

        let db = any::connect(endpoint.address().to_string()).await?;
        if let Endpoint::Remote(_) = endpoint {
            db.signin(Root {
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .await?;
        }
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        run_migrations(&db).await?;
        let schema_version = current_version(&db).await?;
        info!(%endpoint, schema_version, "Store ready");

        Ok(Self {
            db,
            endpoint,
            schema_version,
        })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Highest migration applied when the store was opened.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }
}
