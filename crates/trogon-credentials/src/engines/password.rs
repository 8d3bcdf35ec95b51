//! Password-only engine: generates a random password locally.
//!
//! There is no backend principal, so the revocation token is empty and
//! revoking is a no-op.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::credentials::{CredentialBundle, Provisioned, RevocationToken};
use crate::engine::Engine;
use crate::env::{ReadEnv, flag};
use crate::error::Result;

pub const LOWER_LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPER_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

const DEFAULT_LENGTH: usize = 32;

fn default_length() -> usize {
    DEFAULT_LENGTH
}

/// Errors produced when a [`PasswordPolicy`] cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("number of digits and symbols must be less than total length")]
    ExceedsTotalLength,
    #[error("number of letters exceeds available letters and repeats are not allowed")]
    LettersExceedsAvailable,
    #[error("number of digits exceeds available digits and repeats are not allowed")]
    DigitsExceedsAvailable,
    #[error("number of symbols exceeds available symbols and repeats are not allowed")]
    SymbolsExceedsAvailable,
}

/// Shape of the generated password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Total length in characters.
    #[serde(default = "default_length")]
    pub length: usize,
    /// Exact number of digits.
    #[serde(default)]
    pub digits: usize,
    /// Exact number of symbols.
    #[serde(default)]
    pub symbols: usize,
    /// Only use lowercase letters.
    #[serde(default)]
    pub no_upper: bool,
    /// Allow the same character to appear more than once.
    #[serde(default)]
    pub allow_repeat: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::with_length(DEFAULT_LENGTH)
    }
}

impl PasswordPolicy {
    /// Letters only, upper and lower case, no repeats.
    pub fn with_length(length: usize) -> Self {
        Self {
            length,
            digits: 0,
            symbols: 0,
            no_upper: false,
            allow_repeat: false,
        }
    }

    pub fn with_digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_symbols(mut self, symbols: usize) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_no_upper(mut self) -> Self {
        self.no_upper = true;
        self
    }

    pub fn with_allow_repeat(mut self) -> Self {
        self.allow_repeat = true;
        self
    }

    /// Build a policy from environment variables.
    ///
    /// - `PASSWORD_LENGTH` (default: 32)
    /// - `PASSWORD_DIGITS`, `PASSWORD_SYMBOLS` (default: 0)
    /// - `PASSWORD_NO_UPPER`, `PASSWORD_ALLOW_REPEAT` (default: false)
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let number = |key: &str, default: usize| {
            env.var(key)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        Self {
            length: number("PASSWORD_LENGTH", DEFAULT_LENGTH),
            digits: number("PASSWORD_DIGITS", 0),
            symbols: number("PASSWORD_SYMBOLS", 0),
            no_upper: flag(env, "PASSWORD_NO_UPPER"),
            allow_repeat: flag(env, "PASSWORD_ALLOW_REPEAT"),
        }
    }
}

/// Generates passwords from a [`PasswordPolicy`] using the thread-local CSPRNG.
pub fn generate(policy: &PasswordPolicy) -> std::result::Result<String, GenerateError> {
    let letters = if policy.no_upper {
        LOWER_LETTERS.to_string()
    } else {
        format!("{LOWER_LETTERS}{UPPER_LETTERS}")
    };

    let num_letters = policy
        .length
        .checked_sub(policy.digits)
        .and_then(|n| n.checked_sub(policy.symbols))
        .ok_or(GenerateError::ExceedsTotalLength)?;

    if !policy.allow_repeat {
        if num_letters > letters.len() {
            return Err(GenerateError::LettersExceedsAvailable);
        }
        if policy.digits > DIGITS.len() {
            return Err(GenerateError::DigitsExceedsAvailable);
        }
        if policy.symbols > SYMBOLS.len() {
            return Err(GenerateError::SymbolsExceedsAvailable);
        }
    }

    let mut rng = rand::rng();
    let mut out: Vec<u8> = Vec::with_capacity(policy.length);

    for (alphabet, count) in [
        (letters.as_bytes(), num_letters),
        (DIGITS.as_bytes(), policy.digits),
        (SYMBOLS.as_bytes(), policy.symbols),
    ] {
        let mut placed = 0;
        while placed < count {
            let ch = alphabet[rng.random_range(0..alphabet.len())];
            if !policy.allow_repeat && out.contains(&ch) {
                continue;
            }
            let at = rng.random_range(0..=out.len());
            out.insert(at, ch);
            placed += 1;
        }
    }

    // Every alphabet is ASCII.
    Ok(out.into_iter().map(char::from).collect())
}

/// Engine that hands out a freshly generated password.
#[derive(Debug, Clone, Default)]
pub struct PasswordEngine {
    policy: PasswordPolicy,
}

impl PasswordEngine {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }
}

impl Engine for PasswordEngine {
    #[instrument(name = "password.provision", skip(self), fields(length = self.policy.length))]
    async fn provision(&self, namespace: &str, name: &str) -> Result<Provisioned> {
        let password = generate(&self.policy)?;
        debug!("password generated");
        Ok(Provisioned {
            revocation: RevocationToken::empty(),
            credentials: CredentialBundle::new().with("password", password),
        })
    }

    async fn revoke(&self, _revocation: &RevocationToken) -> Result<()> {
        Ok(())
    }
}
