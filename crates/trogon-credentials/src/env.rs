//! Environment variable access, abstracted so config loaders can be tested
//! without touching the process environment.

use std::env;

/// # Thread Safety
///
/// Does **not** require `Send + Sync`. Add the bounds at your call site.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;
}

/// Zero-sized type, delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;

#[cfg(any(test, feature = "test-support"))]
mod in_memory {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::env;

    use super::ReadEnv;

    /// `RefCell`-backed environment for tests. Not `Sync`.
    #[derive(Default)]
    pub struct InMemoryEnv {
        vars: RefCell<HashMap<String, String>>,
    }

    impl InMemoryEnv {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.borrow_mut().insert(key.into(), value.into());
        }

        pub fn remove(&self, key: &str) {
            self.vars.borrow_mut().remove(key);
        }
    }

    impl ReadEnv for InMemoryEnv {
        fn var(&self, key: &str) -> Result<String, env::VarError> {
            self.vars
                .borrow()
                .get(key)
                .cloned()
                .ok_or(env::VarError::NotPresent)
        }
    }
}

/// Parse a boolean flag: `1`, `true`, `yes`, `on` (case-insensitive).
pub(crate) fn flag<E: ReadEnv>(env: &E, key: &str) -> bool {
    env.var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Split a separated list, trimming entries and dropping empty ones.
pub(crate) fn list<E: ReadEnv>(env: &E, key: &str, sep: char) -> Vec<String> {
    env.var(key)
        .map(|raw| {
            raw.split(sep)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
