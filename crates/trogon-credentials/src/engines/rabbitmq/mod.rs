//! RabbitMQ engine: issues broker users through the management API.
//!
//! Provisioning creates user `{namespace}-{name}` with a random UUID password,
//! then grants the configured permissions on each vhost in configuration
//! order. Users are deleted by name, so the revocation token is the bare
//! username.

mod client;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use client::{BrokerAdmin, HttpBrokerAdmin, Permissions, UserSettings};

use crate::credentials::{CredentialBundle, Provisioned, RevocationToken};
use crate::engine::Engine;
use crate::env::{ReadEnv, list};
use crate::error::{ClientError, EngineError, Result};
use crate::http::{DEFAULT_TIMEOUT_SECS, default_timeout_secs};
use crate::principal::PrincipalName;

const ENV_RABBITMQ_URI: &str = "RABBITMQ_URI";
const ENV_RABBITMQ_USERNAME: &str = "RABBITMQ_USERNAME";
const ENV_RABBITMQ_PASSWORD: &str = "RABBITMQ_PASSWORD";
const ENV_RABBITMQ_TAGS: &str = "RABBITMQ_TAGS";
const ENV_RABBITMQ_VHOSTS: &str = "RABBITMQ_VHOSTS";

const DEFAULT_URI: &str = "http://localhost:15672";

/// Permissions granted on one vhost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VHostPermissions {
    pub vhost: String,
    #[serde(flatten)]
    pub permissions: Permissions,
}

impl VHostPermissions {
    pub fn new(vhost: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            vhost: vhost.into(),
            permissions,
        }
    }
}

/// Connection and user settings for [`RabbitMqEngine`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitMqConfig {
    /// Management API base URL.
    pub uri: String,
    pub username: String,
    pub password: String,
    /// Tags applied to every issued user.
    pub tags: Vec<String>,
    /// Applied in order during provisioning.
    pub vhosts: Vec<VHostPermissions>,
    pub timeout_secs: u64,
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            username: String::new(),
            password: String::new(),
            tags: Vec::new(),
            vhosts: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for RabbitMqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RabbitMqConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tags", &self.tags)
            .field("vhosts", &self.vhosts)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RabbitMqConfig {
    /// Build config from environment variables.
    ///
    /// - `RABBITMQ_URI` (default: `http://localhost:15672`)
    /// - `RABBITMQ_USERNAME` / `RABBITMQ_PASSWORD` (default: empty)
    /// - `RABBITMQ_TAGS`: comma-separated user tags
    /// - `RABBITMQ_VHOSTS`: comma-separated vhosts, each granted `.*` on
    ///   configure / write / read. Use JSON config for finer patterns.
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        Self {
            uri: env
                .var(ENV_RABBITMQ_URI)
                .unwrap_or_else(|_| DEFAULT_URI.to_string()),
            username: env.var(ENV_RABBITMQ_USERNAME).unwrap_or_default(),
            password: env.var(ENV_RABBITMQ_PASSWORD).unwrap_or_default(),
            tags: list(env, ENV_RABBITMQ_TAGS, ','),
            vhosts: list(env, ENV_RABBITMQ_VHOSTS, ',')
                .into_iter()
                .map(|vhost| VHostPermissions::new(vhost, Permissions::all()))
                .collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Issues RabbitMQ users through a [`BrokerAdmin`].
pub struct RabbitMqEngine<A = HttpBrokerAdmin> {
    admin: A,
    tags: Vec<String>,
    vhosts: Vec<VHostPermissions>,
}

impl RabbitMqEngine<HttpBrokerAdmin> {
    pub fn new(config: &RabbitMqConfig) -> Result<Self> {
        let admin = HttpBrokerAdmin::new(config)?;
        Ok(Self::with_admin(
            admin,
            config.tags.clone(),
            config.vhosts.clone(),
        ))
    }
}

impl<A: BrokerAdmin> RabbitMqEngine<A> {
    pub fn with_admin(admin: A, tags: Vec<String>, vhosts: Vec<VHostPermissions>) -> Self {
        Self {
            admin,
            tags,
            vhosts,
        }
    }

    pub fn admin(&self) -> &A {
        &self.admin
    }

    /// Check that the management API is reachable with the configured credentials.
    pub async fn probe(&self) -> std::result::Result<(), ClientError> {
        self.admin.overview().await
    }
}

impl<A: BrokerAdmin> Engine for RabbitMqEngine<A> {
    #[instrument(name = "rabbitmq.provision", skip(self), fields(vhosts = self.vhosts.len()))]
    async fn provision(&self, namespace: &str, name: &str) -> Result<Provisioned> {
        let principal = PrincipalName::new(namespace, name);
        let password = Uuid::new_v4().to_string();

        let settings = UserSettings {
            password: password.clone(),
            tags: self.tags.join(","),
        };
        self.admin
            .put_user(principal.as_str(), &settings)
            .await
            .map_err(|e| EngineError::backend(principal.as_str(), e))?;

        for entry in &self.vhosts {
            if let Err(source) = self
                .admin
                .set_permissions(&entry.vhost, principal.as_str(), &entry.permissions)
                .await
            {
                warn!(
                    principal = %principal,
                    vhost = %entry.vhost,
                    error = %source,
                    "RabbitMQ user created but permissions failed; user left in place"
                );
                return Err(EngineError::PartiallyProvisioned {
                    principal: principal.into_string(),
                    vhost: entry.vhost.clone(),
                    source,
                });
            }
        }

        info!(principal = %principal, "RabbitMQ user issued");

        Ok(Provisioned {
            revocation: RevocationToken::new(principal.as_str()),
            credentials: CredentialBundle::new()
                .with("username", principal.into_string())
                .with("password", password),
        })
    }

    #[instrument(name = "rabbitmq.revoke", skip_all)]
    async fn revoke(&self, revocation: &RevocationToken) -> Result<()> {
        let username =
            std::str::from_utf8(revocation.as_bytes()).map_err(|_| EngineError::InvalidRevocation)?;
        if username.is_empty() {
            return Err(EngineError::InvalidRevocation);
        }

        if let Err(e) = self.admin.delete_user(username).await {
            warn!(principal = %username, error = %e, "Failed to revoke RabbitMQ user");
            return Err(EngineError::backend(username, e));
        }

        info!(principal = %username, "RabbitMQ user revoked");
        Ok(())
    }
}
