//! Consul legacy ACL API client.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::ConsulConfig;
use crate::error::{ClientError, EngineError};
use crate::http;

/// ACL entry sent to `PUT /v1/acl/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub token_type: String,
    #[serde(rename = "Rules")]
    pub rules: String,
}

/// The two ACL operations the Consul engine needs.
pub trait AclClient: Send + Sync {
    /// Create an ACL entry and return its backend-generated secret token.
    fn create(
        &self,
        entry: &AclEntry,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;

    /// Destroy the ACL entry identified by its secret token.
    fn destroy(&self, token: &str) -> impl Future<Output = Result<(), ClientError>> + Send;
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(rename = "ID")]
    id: String,
}

/// [`AclClient`] backed by Consul's HTTP API.
#[derive(Clone)]
pub struct HttpAclClient {
    client: Client,
    base: Url,
    token: String,
}

impl HttpAclClient {
    pub fn new(config: &ConsulConfig) -> Result<Self, EngineError> {
        let raw = if config.address.contains("://") {
            config.address.clone()
        } else {
            format!("{}://{}", config.scheme, config.address)
        };
        Ok(Self {
            client: http::build_client(Duration::from_secs(config.timeout_secs))?,
            base: http::parse_base(&raw)?,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn put(&self, url: Url) -> reqwest::RequestBuilder {
        let req = self.client.put(url);
        if self.token.is_empty() {
            req
        } else {
            req.header("X-Consul-Token", &self.token)
        }
    }
}

impl AclClient for HttpAclClient {
    async fn create(&self, entry: &AclEntry) -> Result<String, ClientError> {
        let url = http::endpoint(&self.base, &["v1", "acl", "create"])?;
        debug!(name = %entry.name, token_type = %entry.token_type, "consul acl create");

        let resp = self.put(url).json(entry).send().await?;
        let created: CreateResponse = http::check(resp).await?.json().await?;
        Ok(created.id)
    }

    async fn destroy(&self, token: &str) -> Result<(), ClientError> {
        let url = http::endpoint(&self.base, &["v1", "acl", "destroy", token])?;
        debug!("consul acl destroy");

        let resp = self.put(url).send().await?;
        http::check(resp).await?;
        Ok(())
    }
}
