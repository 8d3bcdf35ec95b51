//! Values handed back to the caller by [`Engine::provision`](crate::Engine::provision).

use std::collections::BTreeMap;
use std::fmt;

/// Opaque, engine-specific bytes needed to revoke a provisioned credential.
///
/// Must be passed back unmodified to the engine that produced it.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RevocationToken(Vec<u8>);

impl RevocationToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A token with nothing to revoke.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RevocationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevocationToken({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for RevocationToken {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RevocationToken {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for RevocationToken {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Secret fields returned to the caller, keyed by field name
/// (`"token"`, `"username"`, `"password"`, ...).
///
/// Keys differ between engine kinds. `Debug` never prints the values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle(BTreeMap<String, Vec<u8>>);

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, secret: impl Into<Vec<u8>>) {
        self.0.insert(field.into(), secret.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, field: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        self.insert(field, secret);
        self
    }

    pub fn get(&self, field: &str) -> Option<&[u8]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Field value as UTF-8, or `None` if absent or not valid UTF-8.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<u8>> {
        self.0
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// A freshly issued credential together with the token that revokes it.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub revocation: RevocationToken,
    pub credentials: CredentialBundle,
}
