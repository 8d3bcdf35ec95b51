//! SQL-templated database credentials.
//!
//! Creation and revocation are driven by configured SQL statements with
//! `{{name}}` and `{{password}}` placeholders. Statements are executed through
//! a [`SqlExecutor`], which runs each batch in a single transaction so a
//! failing statement leaves no half-created role behind.

use std::future::Future;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::credentials::{CredentialBundle, Provisioned, RevocationToken};
use crate::error::{ClientError, EngineError, Result};
use crate::principal::PrincipalName;
use crate::revocation;

/// Statements used when no revocation statements are configured.
pub const DEFAULT_REVOCATION: &[&str] = &[
    r#"REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA public FROM "{{name}}""#,
    r#"DROP ROLE "{{name}}""#,
];

pub(crate) fn default_revocation() -> Vec<String> {
    DEFAULT_REVOCATION.iter().map(|s| s.to_string()).collect()
}

/// Runs a batch of SQL statements against a database.
pub trait SqlExecutor: Send + Sync {
    /// Execute `statements` in order, in one transaction, on the database at
    /// `connection_uri`.
    fn execute(
        &self,
        connection_uri: &str,
        statements: &[String],
    ) -> impl Future<Output = std::result::Result<(), ClientError>> + Send;
}

/// Replace `{{key}}` placeholders in a single pass.
///
/// Substituted values are never re-scanned, and unknown placeholders are
/// left untouched. Values are inserted verbatim, with no SQL quoting: a
/// `"` inside a value ends a `"{{name}}"` identifier early.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after[..end].trim();
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Creation / revocation statement templates.
///
/// The principal is substituted into the SQL as is, so namespace and name
/// must come from trusted callers. Reject or double any embedded `"` before
/// calling [`provision`](Self::provision).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEngine {
    creation: Vec<String>,
    revocation: Vec<String>,
}

impl DatabaseEngine {
    /// An empty `revocation` list falls back to [`DEFAULT_REVOCATION`].
    pub fn new(creation: Vec<String>, revocation: Vec<String>) -> Result<Self> {
        if creation.iter().all(|s| s.trim().is_empty()) {
            return Err(EngineError::Config(
                "at least one creation statement is required".to_string(),
            ));
        }
        let revocation = if revocation.is_empty() {
            default_revocation()
        } else {
            revocation
        };
        Ok(Self {
            creation,
            revocation,
        })
    }

    pub fn creation(&self) -> &[String] {
        &self.creation
    }

    pub fn revocation(&self) -> &[String] {
        &self.revocation
    }

    /// Create role `{namespace}-{name}` with a random password.
    ///
    /// Token: `["{principal}"]`. Bundle: `username`, `password`.
    #[instrument(name = "database.provision", skip(self, executor, connection_uri))]
    pub async fn provision<X: SqlExecutor>(
        &self,
        executor: &X,
        connection_uri: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Provisioned> {
        let principal = PrincipalName::new(namespace, name);
        let password = Uuid::new_v4().to_string();

        let vars = [("name", principal.as_str()), ("password", password.as_str())];
        let statements: Vec<String> = self.creation.iter().map(|s| render(s, &vars)).collect();
        debug!(statements = statements.len(), "running creation statements");

        executor
            .execute(connection_uri, &statements)
            .await
            .map_err(|e| EngineError::backend(principal.as_str(), e))?;

        info!(principal = %principal, "database role issued");

        Ok(Provisioned {
            revocation: revocation::encode(&[principal.as_str()]),
            credentials: CredentialBundle::new()
                .with("username", principal.into_string())
                .with("password", password),
        })
    }

    #[instrument(name = "database.revoke", skip_all)]
    pub async fn revoke<X: SqlExecutor>(
        &self,
        executor: &X,
        connection_uri: &str,
        revocation: &RevocationToken,
    ) -> Result<()> {
        let [principal] = revocation::decode::<1>(revocation)?;

        let vars = [("name", principal.as_str())];
        let statements: Vec<String> = self.revocation.iter().map(|s| render(s, &vars)).collect();

        if let Err(e) = executor.execute(connection_uri, &statements).await {
            warn!(principal = %principal, error = %e, "Failed to revoke database role");
            return Err(EngineError::backend(principal, e));
        }

        info!(principal = %principal, "database role revoked");
        Ok(())
    }
}

#[cfg(feature = "postgres")]
pub use pg::PgExecutor;

#[cfg(feature = "postgres")]
mod pg {
    use tokio_postgres::NoTls;
    use tracing::warn;

    use super::SqlExecutor;
    use crate::error::ClientError;

    fn db_err(e: tokio_postgres::Error) -> ClientError {
        ClientError::Database(e.to_string())
    }

    /// [`SqlExecutor`] over `tokio-postgres`; one connection per batch.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct PgExecutor;

    impl SqlExecutor for PgExecutor {
        async fn execute(
            &self,
            connection_uri: &str,
            statements: &[String],
        ) -> Result<(), ClientError> {
            let (mut client, connection) = tokio_postgres::connect(connection_uri, NoTls)
                .await
                .map_err(db_err)?;

            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection error");
                }
            });

            let tx = client.transaction().await.map_err(db_err)?;
            for statement in statements {
                tx.batch_execute(statement).await.map_err(db_err)?;
            }
            tx.commit().await.map_err(db_err)
        }
    }
}
