//! [`Engine`] trait: the contract every credential backend satisfies.

use std::fmt;
use std::future::Future;

use crate::credentials::{Provisioned, RevocationToken};
use crate::engines::consul::{ConsulEngine, HttpAclClient};
use crate::engines::password::PasswordEngine;
#[cfg(feature = "postgres")]
use crate::engines::{database::PgExecutor, postgres::PostgresEngine};
use crate::engines::rabbitmq::{HttpBrokerAdmin, RabbitMqEngine};
use crate::error::Result;

/// A configured binding to one backend that can issue and revoke credentials.
///
/// Engines hold no per-call state: everything [`revoke`](Engine::revoke) needs
/// travels inside the [`RevocationToken`] returned by
/// [`provision`](Engine::provision). Implementations must be `Send + Sync` so
/// a single value can serve concurrent calls (e.g. behind an `Arc`).
///
/// Dropping a returned future cancels the in-flight backend request.
pub trait Engine: Send + Sync {
    /// Create a credential scoped to `namespace` / `name`.
    fn provision(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Provisioned>> + Send;

    /// Tear down whatever the matching `provision` call created.
    ///
    /// Not idempotent: revoking the same token twice may fail the second time.
    fn revoke(&self, revocation: &RevocationToken) -> impl Future<Output = Result<()>> + Send;
}

/// Which backend an [`AnyEngine`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Consul,
    RabbitMq,
    Postgres,
    Password,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consul => "consul",
            Self::RabbitMq => "rabbitmq",
            Self::Postgres => "postgres",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of production engines, selected at configuration time.
///
/// Build one with [`EngineConfig::build`](crate::EngineConfig::build).
pub enum AnyEngine {
    Consul(ConsulEngine<HttpAclClient>),
    RabbitMq(RabbitMqEngine<HttpBrokerAdmin>),
    #[cfg(feature = "postgres")]
    Postgres(PostgresEngine<PgExecutor>),
    Password(PasswordEngine),
}

impl AnyEngine {
    pub fn kind(&self) -> EngineKind {
        match self {
            Self::Consul(_) => EngineKind::Consul,
            Self::RabbitMq(_) => EngineKind::RabbitMq,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => EngineKind::Postgres,
            Self::Password(_) => EngineKind::Password,
        }
    }
}

impl fmt::Debug for AnyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyEngine").field(&self.kind()).finish()
    }
}

impl Engine for AnyEngine {
    async fn provision(&self, namespace: &str, name: &str) -> Result<Provisioned> {
        match self {
            Self::Consul(e) => e.provision(namespace, name).await,
            Self::RabbitMq(e) => e.provision(namespace, name).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.provision(namespace, name).await,
            Self::Password(e) => e.provision(namespace, name).await,
        }
    }

    async fn revoke(&self, revocation: &RevocationToken) -> Result<()> {
        match self {
            Self::Consul(e) => e.revoke(revocation).await,
            Self::RabbitMq(e) => e.revoke(revocation).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.revoke(revocation).await,
            Self::Password(e) => e.revoke(revocation).await,
        }
    }
}
