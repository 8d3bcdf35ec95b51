//! Revocation token codec.
//!
//! Tokens are JSON arrays of strings:
//!
//! ```text
//! ["foo-bar", "b2c4...e9"]   consul:   [principal, secret id]
//! ["foo-bar"]                postgres: [principal]
//! ```
//!
//! Decoding checks the field count, so an engine never acts on a token with
//! a shape it did not produce.

use crate::credentials::RevocationToken;
use crate::error::{EngineError, Result};

/// Encode an ordered tuple of strings into a token.
pub fn encode(fields: &[&str]) -> RevocationToken {
    // Serializing a slice of &str cannot fail.
    let bytes = serde_json::to_vec(fields).unwrap_or_default();
    RevocationToken::new(bytes)
}

/// Decode a token produced by [`encode`] with exactly `N` fields.
pub fn decode<const N: usize>(token: &RevocationToken) -> Result<[String; N]> {
    let fields: Vec<String> =
        serde_json::from_slice(token.as_bytes()).map_err(|_| EngineError::InvalidRevocation)?;
    <[String; N]>::try_from(fields).map_err(|_| EngineError::InvalidRevocation)
}
