//! Dynamic credential provisioning and revocation.
//!
//! An [`Engine`] is a configured binding to one backend. `provision` creates a
//! credential for a `(namespace, name)` pair and returns the secret material
//! together with an opaque [`RevocationToken`]; `revoke` takes that token back
//! and tears the credential down. Backends:
//!
//! - **Consul**: legacy ACL tokens
//! - **RabbitMQ**: management-API users with per-vhost permissions
//! - **PostgreSQL**: login roles created from SQL templates
//! - **Password**: locally generated, nothing to revoke
//!
//! # Quick Start
//!
//! ```rust
//! use trogon_credentials::{Engine, EngineConfig, PasswordPolicy};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = EngineConfig::Password(PasswordPolicy::with_length(16))
//!     .build()
//!     .unwrap();
//!
//! let issued = engine.provision("billing", "worker").await.unwrap();
//! assert_eq!(issued.credentials.get("password").unwrap().len(), 16);
//!
//! engine.revoke(&issued.revocation).await.unwrap();
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod engine;
pub mod engines;
pub mod env;
pub mod error;
pub mod principal;
pub mod revocation;

mod http;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use config::EngineConfig;
pub use credentials::{CredentialBundle, Provisioned, RevocationToken};
pub use engine::{AnyEngine, Engine, EngineKind};
#[cfg(feature = "postgres")]
pub use engines::database::PgExecutor;
pub use engines::consul::{ConsulConfig, ConsulEngine};
pub use engines::database::{DatabaseEngine, SqlExecutor};
pub use engines::password::{GenerateError, PasswordEngine, PasswordPolicy};
pub use engines::postgres::{PostgresConfig, PostgresEngine};
pub use engines::rabbitmq::{Permissions, RabbitMqConfig, RabbitMqEngine, VHostPermissions};
pub use env::{ReadEnv, SystemEnv};
pub use error::{ClientError, EngineError, Result};
pub use principal::PrincipalName;
