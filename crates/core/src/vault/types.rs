//! Credential vault types.

use async_trait::async_trait;
use thiserror::Error;

/// Error type for credential resolution.
///
/// Any vault failure is terminal for the task being executed: a missing
/// or broken credential will not self-resolve within the booking window.
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    /// No credentials stored for the account.
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// The vault backend could not be reached.
    #[error("credential vault unavailable: {0}")]
    Unavailable(String),
}

/// Usable login credentials for the booking provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Manual Debug so passwords never end up in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Trait for credential vault backends.
///
/// Credential storage and CRUD live outside the engine; this is the
/// narrow interface the engine consumes.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &str;

    /// Resolve an account id to usable credentials.
    async fn resolve(&self, account_id: &str) -> Result<Credentials, VaultError>;
}
