//! Redacted handling of hub access tokens.

use std::fmt;

/// Environment variable consulted for a hub token when none is configured.
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

/// A string that never prints its content.
///
/// Hub tokens travel through configuration structs that are logged with
/// `{:?}`; wrapping them keeps the token out of logs and error messages.
///
/// ```
/// use imtext_core::SecretString;
///
/// let token = SecretString::new("hf_abc123");
/// assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
/// assert_eq!(token.expose_secret(), "hf_abc123");
/// ```
#[derive(Clone, Default)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            inner: secret.into(),
        }
    }

    /// Pick the configured token, falling back to `HF_TOKEN`.
    ///
    /// Empty values count as absent.
    pub fn hub_token(configured: Option<&str>) -> Option<Self> {
        configured
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var(HF_TOKEN_ENV)
                    .ok()
                    .filter(|t| !t.trim().is_empty())
            })
            .map(Self::new)
    }

    /// Expose the secret value.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Check if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
