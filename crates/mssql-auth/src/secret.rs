//! Secret-holding wrapper types with optional automatic zeroization.
//!
//! [`Credentials`] already redacts its `Debug` output, but its fields are
//! `Cow<'static, str>`, which cannot be zeroized when borrowed. These types
//! give callers an owned, zeroize-capable alternative for the `zeroize`
//! feature without changing `Credentials` itself.

use std::fmt;
use std::ops::Deref;

#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

use crate::credentials::Credentials;

/// An owned string holding sensitive data (passwords, tokens).
///
/// `Debug` output is always redacted. When the `zeroize` feature is enabled,
/// the backing buffer is zeroized on drop.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a value as a secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value.
    ///
    /// Named distinctly from `Deref`/`AsRef` so call sites make exposure
    /// explicit rather than picking it up implicitly (e.g. via `format!`).
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Deref for SecretString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

#[cfg(feature = "zeroize")]
impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// [`Credentials`] wrapped for zeroize-aware storage.
///
/// Holding this instead of a bare `Credentials` signals that the caller
/// wants the strongest secret-handling guarantees the `zeroize` feature
/// provides, without changing `Credentials`'s own (already Copy-free,
/// redacted-Debug) shape.
#[derive(Clone)]
pub struct SecureCredentials(Credentials);

impl SecureCredentials {
    /// Wrap existing credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }

    /// Unwrap back into plain `Credentials`.
    #[must_use]
    pub fn into_inner(self) -> Credentials {
        self.0
    }
}

impl From<Credentials> for SecureCredentials {
    fn from(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl Deref for SecureCredentials {
    type Target = Credentials;

    fn deref(&self) -> &Credentials {
        &self.0
    }
}

impl fmt::Debug for SecureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_debug_redacted() {
        let secret = SecretString::new("hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn test_secret_string_deref() {
        let secret = SecretString::from("abc");
        assert_eq!(&*secret, "abc");
        assert_eq!(secret.len(), 3);
    }

    #[test]
    fn test_secure_credentials_roundtrip() {
        let creds = Credentials::sql_server("user", "pass");
        let secure = SecureCredentials::new(creds);
        assert!(secure.is_sql_auth());
        let creds = secure.into_inner();
        assert!(creds.is_sql_auth());
    }
}
