use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{AnyEngine, EngineKind};
use crate::engines::consul::{ConsulConfig, ConsulEngine};
use crate::engines::password::{PasswordEngine, PasswordPolicy};
use crate::engines::postgres::PostgresConfig;
use crate::engines::rabbitmq::{RabbitMqConfig, RabbitMqEngine};
use crate::env::ReadEnv;
use crate::error::{EngineError, Result};

const ENV_CREDENTIALS_ENGINE: &str = "CREDENTIALS_ENGINE";

/// Which engine to build, and how.
///
/// ```json
/// {"type": "rabbitmq", "uri": "http://mq:15672", "vhosts": [{"vhost": "/", "configure": ".*", "write": ".*", "read": ".*"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineConfig {
    Consul(ConsulConfig),
    #[serde(rename = "rabbitmq")]
    RabbitMq(RabbitMqConfig),
    Postgres(PostgresConfig),
    Password(PasswordPolicy),
}

impl EngineConfig {
    pub fn kind(&self) -> EngineKind {
        match self {
            Self::Consul(_) => EngineKind::Consul,
            Self::RabbitMq(_) => EngineKind::RabbitMq,
            Self::Postgres(_) => EngineKind::Postgres,
            Self::Password(_) => EngineKind::Password,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Build config from environment variables.
    ///
    /// `CREDENTIALS_ENGINE` selects the variant (`consul`, `rabbitmq`,
    /// `postgres` or `password`); the variant's own loader reads the rest.
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self> {
        let kind: EngineKind = env
            .var(ENV_CREDENTIALS_ENGINE)
            .map_err(|_| EngineError::Config(format!("{ENV_CREDENTIALS_ENGINE} is not set")))?
            .parse()?;

        Ok(match kind {
            EngineKind::Consul => Self::Consul(ConsulConfig::from_env(env)),
            EngineKind::RabbitMq => Self::RabbitMq(RabbitMqConfig::from_env(env)),
            EngineKind::Postgres => Self::Postgres(PostgresConfig::from_env(env)),
            EngineKind::Password => Self::Password(PasswordPolicy::from_env(env)),
        })
    }

    /// Construct the engine. Malformed URIs and missing statements are
    /// reported here; no backend is contacted.
    pub fn build(&self) -> Result<AnyEngine> {
        let engine = match self {
            Self::Consul(config) => AnyEngine::Consul(ConsulEngine::new(config)?),
            Self::RabbitMq(config) => AnyEngine::RabbitMq(RabbitMqEngine::new(config)?),
            #[cfg(feature = "postgres")]
            Self::Postgres(config) => {
                AnyEngine::Postgres(crate::engines::postgres::PostgresEngine::new(config)?)
            }
            #[cfg(not(feature = "postgres"))]
            Self::Postgres(_) => {
                return Err(EngineError::Config(
                    "built without the `postgres` feature".to_string(),
                ));
            }
            Self::Password(policy) => AnyEngine::Password(PasswordEngine::new(policy.clone())),
        };
        info!(engine = %engine.kind(), "credentials engine configured");
        Ok(engine)
    }
}

impl FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "consul" => Ok(Self::Consul),
            "rabbitmq" => Ok(Self::RabbitMq),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "password" => Ok(Self::Password),
            other => Err(EngineError::Config(format!("unknown engine: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::rabbitmq::{Permissions, VHostPermissions};
    use crate::env::InMemoryEnv;

    #[test]
    fn kind_from_str() {
        assert_eq!("consul".parse::<EngineKind>().unwrap(), EngineKind::Consul);
        assert_eq!("RabbitMQ".parse::<EngineKind>().unwrap(), EngineKind::RabbitMq);
        assert_eq!("postgresql".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!(" password ".parse::<EngineKind>().unwrap(), EngineKind::Password);
        assert!(matches!(
            "vault".parse::<EngineKind>(),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn deserializes_tagged_json() {
        let config = EngineConfig::from_json(
            r#"{"type":"rabbitmq","uri":"http://mq:15672","tags":["monitoring"],
                "vhosts":[{"vhost":"/","configure":".*","write":".*","read":".*"}]}"#,
        )
        .unwrap();
        let EngineConfig::RabbitMq(mq) = &config else {
            panic!("expected rabbitmq, got {config:?}");
        };
        assert_eq!(config.kind(), EngineKind::RabbitMq);
        assert_eq!(mq.uri, "http://mq:15672");
        assert_eq!(mq.vhosts, vec![VHostPermissions::new("/", Permissions::all())]);
    }

    #[test]
    fn password_config_defaults_length() {
        let config = EngineConfig::from_json(r#"{"type":"password","digits":4}"#).unwrap();
        assert_eq!(
            config,
            EngineConfig::Password(PasswordPolicy {
                digits: 4,
                ..PasswordPolicy::default()
            })
        );
    }

    #[test]
    fn unknown_type_is_config_error() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"type":"vault"}"#),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn from_env_selects_variant() {
        let env = InMemoryEnv::new();
        env.set("CREDENTIALS_ENGINE", "consul");
        env.set("CONSUL_HTTP_ADDR", "consul:8500");

        let config = EngineConfig::from_env(&env).unwrap();
        assert_eq!(
            config,
            EngineConfig::Consul(ConsulConfig {
                address: "consul:8500".to_string(),
                ..ConsulConfig::default()
            })
        );
    }

    #[test]
    fn from_env_requires_selector() {
        assert!(matches!(
            EngineConfig::from_env(&InMemoryEnv::new()),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn build_reports_invalid_uri() {
        let config = EngineConfig::RabbitMq(RabbitMqConfig {
            uri: "not a uri".to_string(),
            ..RabbitMqConfig::default()
        });
        assert!(matches!(config.build(), Err(EngineError::InvalidUri(_))));
    }

    #[test]
    fn build_each_kind() {
        let consul = EngineConfig::Consul(ConsulConfig::default()).build().unwrap();
        assert_eq!(consul.kind(), EngineKind::Consul);

        let mq = EngineConfig::RabbitMq(RabbitMqConfig::default()).build().unwrap();
        assert_eq!(mq.kind(), EngineKind::RabbitMq);

        let password = EngineConfig::Password(PasswordPolicy::default()).build().unwrap();
        assert_eq!(password.kind(), EngineKind::Password);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn build_postgres_requires_creation_statements() {
        let config = EngineConfig::Postgres(PostgresConfig {
            uri: "postgres://db:5432/app".to_string(),
            ..PostgresConfig::default()
        });
        assert!(matches!(config.build(), Err(EngineError::Config(_))));

        let config = EngineConfig::Postgres(PostgresConfig {
            uri: "postgres://db:5432/app".to_string(),
            creation: vec![r#"CREATE ROLE "{{name}}""#.to_string()],
            ..PostgresConfig::default()
        });
        assert_eq!(config.build().unwrap().kind(), EngineKind::Postgres);
    }
}
