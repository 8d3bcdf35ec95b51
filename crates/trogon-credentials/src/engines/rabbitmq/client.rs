//! RabbitMQ management HTTP API client.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::RabbitMqConfig;
use crate::error::{ClientError, EngineError};
use crate::http;

/// Body of `PUT /api/users/{name}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct UserSettings {
    pub password: String,
    /// Comma-separated tag list, e.g. `"monitoring,management"`.
    pub tags: String,
}

impl fmt::Debug for UserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSettings")
            .field("password", &"<redacted>")
            .field("tags", &self.tags)
            .finish()
    }
}

/// Configure / write / read regular expressions granted on a vhost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub configure: String,
    pub write: String,
    pub read: String,
}

impl Permissions {
    /// Full access: `.*` for all three patterns.
    pub fn all() -> Self {
        Self {
            configure: ".*".to_string(),
            write: ".*".to_string(),
            read: ".*".to_string(),
        }
    }
}

/// The management operations the RabbitMQ engine needs.
pub trait BrokerAdmin: Send + Sync {
    /// Create or replace a user.
    fn put_user(
        &self,
        name: &str,
        settings: &UserSettings,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn delete_user(&self, name: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn set_permissions(
        &self,
        vhost: &str,
        user: &str,
        permissions: &Permissions,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Connectivity probe.
    fn overview(&self) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// [`BrokerAdmin`] backed by the management plugin's HTTP API (basic auth).
#[derive(Clone)]
pub struct HttpBrokerAdmin {
    client: Client,
    base: Url,
    username: String,
    password: String,
}

impl HttpBrokerAdmin {
    pub fn new(config: &RabbitMqConfig) -> Result<Self, EngineError> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(config.timeout_secs))?,
            base: http::parse_base(&config.uri)?,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }
}

impl BrokerAdmin for HttpBrokerAdmin {
    async fn put_user(&self, name: &str, settings: &UserSettings) -> Result<(), ClientError> {
        let url = http::endpoint(&self.base, &["api", "users", name])?;
        debug!(user = %name, tags = %settings.tags, "rabbitmq put user");

        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(settings)
            .send()
            .await?;
        http::check(resp).await?;
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> Result<(), ClientError> {
        let url = http::endpoint(&self.base, &["api", "users", name])?;
        debug!(user = %name, "rabbitmq delete user");

        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        http::check(resp).await?;
        Ok(())
    }

    async fn set_permissions(
        &self,
        vhost: &str,
        user: &str,
        permissions: &Permissions,
    ) -> Result<(), ClientError> {
        let url = http::endpoint(&self.base, &["api", "permissions", vhost, user])?;
        debug!(vhost = %vhost, user = %user, "rabbitmq set permissions");

        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(permissions)
            .send()
            .await?;
        http::check(resp).await?;
        Ok(())
    }

    async fn overview(&self) -> Result<(), ClientError> {
        let url = http::endpoint(&self.base, &["api", "overview"])?;
        let resp = self.request(reqwest::Method::GET, url).send().await?;
        http::check(resp).await?;
        Ok(())
    }
}
