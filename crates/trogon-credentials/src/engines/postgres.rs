//! PostgreSQL engine: issues login roles through SQL templates.
//!
//! The connection URI is configured without credentials; the management
//! username and password are injected on every call, into the authority or,
//! for socket URIs with an empty host, as query parameters.
//! Provisioning and revocation are delegated to [`DatabaseEngine`].

use std::fmt;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::database::{DatabaseEngine, SqlExecutor};
#[cfg(feature = "postgres")]
use super::database::PgExecutor;
use crate::credentials::{Provisioned, RevocationToken};
use crate::engine::Engine;
use crate::env::{ReadEnv, list};
use crate::error::{EngineError, Result};

const ENV_POSTGRES_URI: &str = "POSTGRES_URI";
const ENV_POSTGRES_USERNAME: &str = "POSTGRES_USERNAME";
const ENV_POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
const ENV_POSTGRES_CREATION: &str = "POSTGRES_CREATION";
const ENV_POSTGRES_REVOCATION: &str = "POSTGRES_REVOCATION";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// e.g. `postgres://db.internal:5432/app?sslmode=disable`
    pub uri: String,
    pub username: String,
    pub password: String,
    /// Statements run to create a role. `{{name}}` and `{{password}}` are
    /// substituted.
    pub creation: Vec<String>,
    /// Statements run to drop a role. Empty means the default
    /// revoke-then-drop pair.
    pub revocation: Vec<String>,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("creation", &self.creation)
            .field("revocation", &self.revocation)
            .finish()
    }
}

impl PostgresConfig {
    /// Build config from environment variables.
    ///
    /// - `POSTGRES_URI`
    /// - `POSTGRES_USERNAME` / `POSTGRES_PASSWORD`
    /// - `POSTGRES_CREATION`: `;`-separated creation statements
    /// - `POSTGRES_REVOCATION`: `;`-separated revocation statements
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        Self {
            uri: env.var(ENV_POSTGRES_URI).unwrap_or_default(),
            username: env.var(ENV_POSTGRES_USERNAME).unwrap_or_default(),
            password: env.var(ENV_POSTGRES_PASSWORD).unwrap_or_default(),
            creation: list(env, ENV_POSTGRES_CREATION, ';'),
            revocation: list(env, ENV_POSTGRES_REVOCATION, ';'),
        }
    }
}

/// Issues PostgreSQL roles through a [`SqlExecutor`].
pub struct PostgresEngine<X> {
    executor: X,
    database: DatabaseEngine,
    uri: String,
    username: String,
    password: String,
}

#[cfg(feature = "postgres")]
impl PostgresEngine<PgExecutor> {
    pub fn new(config: &PostgresConfig) -> Result<Self> {
        Self::with_executor(PgExecutor, config)
    }
}

impl<X: SqlExecutor> PostgresEngine<X> {
    pub fn with_executor(executor: X, config: &PostgresConfig) -> Result<Self> {
        let database = DatabaseEngine::new(config.creation.clone(), config.revocation.clone())?;
        Ok(Self {
            executor,
            database,
            uri: config.uri.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// The configured URI with the management credentials injected.
    ///
    /// Checked on every call, before any connection is attempted. URIs with
    /// an empty authority (Unix sockets, `postgres:///app?host=/run/pg`) get
    /// `user` / `password` query parameters instead of userinfo.
    fn connection_uri(&self) -> Result<String> {
        let mut uri =
            Url::parse(&self.uri).map_err(|e| EngineError::InvalidUri(e.to_string()))?;
        if uri.cannot_be_a_base() {
            return Err(EngineError::InvalidUri(format!("{}: not a connection URI", self.uri)));
        }

        if uri.host_str().is_none_or(str::is_empty) {
            return Ok(self.with_query_credentials(uri));
        }

        uri.set_username(&self.username)
            .map_err(|()| EngineError::InvalidUri(self.uri.clone()))?;
        let password = (!self.password.is_empty()).then_some(self.password.as_str());
        uri.set_password(password)
            .map_err(|()| EngineError::InvalidUri(self.uri.clone()))?;
        Ok(uri.into())
    }

    fn with_query_credentials(&self, mut uri: Url) -> String {
        let mut params: Vec<String> = uri
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|p| !p.is_empty())
            .filter(|p| {
                let key = p.split_once('=').map_or(*p, |(k, _)| k);
                key != "user" && key != "password"
            })
            .map(str::to_string)
            .collect();

        if !self.username.is_empty() {
            params.push(format!("user={}", query_value(&self.username)));
        }
        if !self.password.is_empty() {
            params.push(format!("password={}", query_value(&self.password)));
        }

        let query = params.join("&");
        uri.set_query((!query.is_empty()).then_some(query.as_str()));
        uri.into()
    }
}

// tokio-postgres percent-decodes query values but does not treat `+` as space.
fn query_value(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

impl<X: SqlExecutor> Engine for PostgresEngine<X> {
    async fn provision(&self, namespace: &str, name: &str) -> Result<Provisioned> {
        let uri = self.connection_uri()?;
        self.database
            .provision(&self.executor, &uri, namespace, name)
            .await
    }

    async fn revoke(&self, revocation: &RevocationToken) -> Result<()> {
        let uri = self.connection_uri()?;
        self.database.revoke(&self.executor, &uri, revocation).await
    }
}
