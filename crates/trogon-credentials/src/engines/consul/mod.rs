//! Consul engine: issues ACL tokens.
//!
//! Provisioning creates an ACL entry named `{namespace}-{name}` with the
//! configured token type and rules. Consul deletes entries by secret token,
//! not by name, so the revocation token carries both:
//!
//! ```text
//! ["{principal}", "{secret token}"]
//! ```

mod client;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub use client::{AclClient, AclEntry, HttpAclClient};

use crate::credentials::{CredentialBundle, Provisioned, RevocationToken};
use crate::engine::Engine;
use crate::env::ReadEnv;
use crate::error::{EngineError, Result};
use crate::http::{DEFAULT_TIMEOUT_SECS, default_timeout_secs};
use crate::principal::PrincipalName;
use crate::revocation;

const ENV_CONSUL_ADDR: &str = "CONSUL_HTTP_ADDR";
const ENV_CONSUL_SCHEME: &str = "CONSUL_SCHEME";
const ENV_CONSUL_TOKEN: &str = "CONSUL_HTTP_TOKEN";
const ENV_CONSUL_TOKEN_TYPE: &str = "CONSUL_TOKEN_TYPE";
const ENV_CONSUL_POLICY: &str = "CONSUL_POLICY";

const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";
const DEFAULT_SCHEME: &str = "http";
const DEFAULT_TOKEN_TYPE: &str = "client";

/// Connection and policy settings for [`ConsulEngine`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// `host:port`, or a full URL (in which case `scheme` is ignored).
    pub address: String,
    pub scheme: String,
    /// Management token used to call the ACL API.
    pub token: String,
    /// `client` or `management`.
    pub token_type: String,
    /// HCL rules attached to every issued token.
    pub policy: String,
    pub timeout_secs: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            token: String::new(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            policy: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for ConsulConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsulConfig")
            .field("address", &self.address)
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("policy", &self.policy)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ConsulConfig {
    /// Build config from environment variables.
    ///
    /// - `CONSUL_HTTP_ADDR` (default: `127.0.0.1:8500`)
    /// - `CONSUL_SCHEME` (default: `http`)
    /// - `CONSUL_HTTP_TOKEN` (default: empty)
    /// - `CONSUL_TOKEN_TYPE` (default: `client`)
    /// - `CONSUL_POLICY` (default: empty)
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        Self {
            address: env
                .var(ENV_CONSUL_ADDR)
                .unwrap_or_else(|_| DEFAULT_ADDRESS.to_string()),
            scheme: env
                .var(ENV_CONSUL_SCHEME)
                .unwrap_or_else(|_| DEFAULT_SCHEME.to_string()),
            token: env.var(ENV_CONSUL_TOKEN).unwrap_or_default(),
            token_type: env
                .var(ENV_CONSUL_TOKEN_TYPE)
                .unwrap_or_else(|_| DEFAULT_TOKEN_TYPE.to_string()),
            policy: env.var(ENV_CONSUL_POLICY).unwrap_or_default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Issues Consul ACL tokens through an [`AclClient`].
pub struct ConsulEngine<C = HttpAclClient> {
    client: C,
    token_type: String,
    policy: String,
}

impl ConsulEngine<HttpAclClient> {
    pub fn new(config: &ConsulConfig) -> Result<Self> {
        let client = HttpAclClient::new(config)?;
        Ok(Self::with_client(
            client,
            config.token_type.clone(),
            config.policy.clone(),
        ))
    }
}

impl<C: AclClient> ConsulEngine<C> {
    pub fn with_client(client: C, token_type: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            client,
            token_type: token_type.into(),
            policy: policy.into(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: AclClient> Engine for ConsulEngine<C> {
    #[instrument(name = "consul.provision", skip(self))]
    async fn provision(&self, namespace: &str, name: &str) -> Result<Provisioned> {
        let principal = PrincipalName::new(namespace, name);
        let entry = AclEntry {
            name: principal.to_string(),
            token_type: self.token_type.clone(),
            rules: self.policy.clone(),
        };

        let secret = self
            .client
            .create(&entry)
            .await
            .map_err(|e| EngineError::backend(principal.as_str(), e))?;

        info!(principal = %principal, token_type = %self.token_type, "Consul ACL token issued");

        Ok(Provisioned {
            revocation: revocation::encode(&[principal.as_str(), &secret]),
            credentials: CredentialBundle::new().with("token", secret),
        })
    }

    #[instrument(name = "consul.revoke", skip_all)]
    async fn revoke(&self, revocation: &RevocationToken) -> Result<()> {
        let [principal, secret] = revocation::decode::<2>(revocation)?;

        if let Err(e) = self.client.destroy(&secret).await {
            warn!(principal = %principal, error = %e, "Failed to revoke Consul ACL token");
            return Err(EngineError::backend(principal, e));
        }

        info!(principal = %principal, "Consul ACL token revoked");
        Ok(())
    }
}
