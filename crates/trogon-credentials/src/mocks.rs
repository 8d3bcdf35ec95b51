//! In-memory backends for unit testing without Consul, RabbitMQ or PostgreSQL.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! trogon-credentials = { path = "...", features = ["test-support"] }
//! ```

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use uuid::Uuid;

use crate::engines::consul::{AclClient, AclEntry};
use crate::engines::database::SqlExecutor;
use crate::engines::rabbitmq::{BrokerAdmin, Permissions, UserSettings};
use crate::error::ClientError;

fn api_error(status: u16, body: &str) -> ClientError {
    ClientError::Api {
        status,
        body: body.to_string(),
    }
}

// ── MockAclStore ──────────────────────────────────────────────────────────────

/// Consul ACL table keyed by secret token.
#[derive(Clone, Default)]
pub struct MockAclStore {
    entries: Arc<Mutex<HashMap<String, AclEntry>>>,
    deny_create: Arc<AtomicBool>,
}

impl MockAclStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, secret: &str) -> Option<AclEntry> {
        self.entries.lock().unwrap().get(secret).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `create` fails with HTTP 503.
    pub fn deny_create(&self) {
        self.deny_create.store(true, Ordering::SeqCst);
    }
}

impl AclClient for MockAclStore {
    async fn create(&self, entry: &AclEntry) -> Result<String, ClientError> {
        if self.deny_create.load(Ordering::SeqCst) {
            return Err(api_error(503, "No cluster leader"));
        }
        let secret = Uuid::new_v4().to_string();
        self.entries
            .lock()
            .unwrap()
            .insert(secret.clone(), entry.clone());
        Ok(secret)
    }

    async fn destroy(&self, token: &str) -> Result<(), ClientError> {
        match self.entries.lock().unwrap().remove(token) {
            Some(_) => Ok(()),
            None => Err(api_error(404, "ACL not found")),
        }
    }
}

// ── MockBrokerAdmin ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCall {
    pub vhost: String,
    pub user: String,
    pub permissions: Permissions,
}

/// RabbitMQ user table plus a log of every permission grant attempted.
#[derive(Clone, Default)]
pub struct MockBrokerAdmin {
    users: Arc<Mutex<HashMap<String, UserSettings>>>,
    permission_calls: Arc<Mutex<Vec<PermissionCall>>>,
    failing_vhosts: Arc<Mutex<Vec<String>>>,
    deny_put_user: Arc<AtomicBool>,
    deny_overview: Arc<AtomicBool>,
}

impl MockBrokerAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, name: &str) -> Option<UserSettings> {
        self.users.lock().unwrap().get(name).cloned()
    }

    /// Attempted grants in call order, including failed ones.
    pub fn permission_calls(&self) -> Vec<PermissionCall> {
        self.permission_calls.lock().unwrap().clone()
    }

    /// `set_permissions` on `vhost` fails with HTTP 400.
    pub fn fail_permissions_on(&self, vhost: impl Into<String>) {
        self.failing_vhosts.lock().unwrap().push(vhost.into());
    }

    pub fn deny_put_user(&self) {
        self.deny_put_user.store(true, Ordering::SeqCst);
    }

    pub fn deny_overview(&self) {
        self.deny_overview.store(true, Ordering::SeqCst);
    }
}

impl BrokerAdmin for MockBrokerAdmin {
    async fn put_user(&self, name: &str, settings: &UserSettings) -> Result<(), ClientError> {
        if self.deny_put_user.load(Ordering::SeqCst) {
            return Err(api_error(401, "Not_Authorized"));
        }
        self.users
            .lock()
            .unwrap()
            .insert(name.to_string(), settings.clone());
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> Result<(), ClientError> {
        match self.users.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(api_error(404, "Object Not Found")),
        }
    }

    async fn set_permissions(
        &self,
        vhost: &str,
        user: &str,
        permissions: &Permissions,
    ) -> Result<(), ClientError> {
        self.permission_calls.lock().unwrap().push(PermissionCall {
            vhost: vhost.to_string(),
            user: user.to_string(),
            permissions: permissions.clone(),
        });
        if self.failing_vhosts.lock().unwrap().iter().any(|v| v == vhost) {
            return Err(api_error(400, "vhost_not_found"));
        }
        Ok(())
    }

    async fn overview(&self) -> Result<(), ClientError> {
        if self.deny_overview.load(Ordering::SeqCst) {
            return Err(api_error(401, "Not_Authorized"));
        }
        Ok(())
    }
}

// ── MockSqlExecutor ───────────────────────────────────────────────────────────

/// One `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlBatch {
    pub connection_uri: String,
    pub statements: Vec<String>,
}

/// Records statement batches instead of running them.
#[derive(Clone, Default)]
pub struct MockSqlExecutor {
    batches: Arc<Mutex<Vec<SqlBatch>>>,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl MockSqlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `execute` call, successful or not.
    pub fn batches(&self) -> Vec<SqlBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// The next `execute` fails with `message` as a database error.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(message.into());
    }
}

impl SqlExecutor for MockSqlExecutor {
    async fn execute(&self, connection_uri: &str, statements: &[String]) -> Result<(), ClientError> {
        self.batches.lock().unwrap().push(SqlBatch {
            connection_uri: connection_uri.to_string(),
            statements: statements.to_vec(),
        });
        match self.fail_next.lock().unwrap().take() {
            Some(message) => Err(ClientError::Database(message)),
            None => Ok(()),
        }
    }
}
