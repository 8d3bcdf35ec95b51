use std::fmt;

/// Backend-visible identity derived from a namespace and a logical name.
///
/// Format: `{namespace}-{name}`. No escaping is applied, so
/// `("a-b", "c")` and `("a", "b-c")` map to the same principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrincipalName(String);

impl PrincipalName {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self(format!("{namespace}-{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PrincipalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
