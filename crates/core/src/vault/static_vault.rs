//! Config-backed credential vault.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::AccountConfig;

use super::{CredentialVault, Credentials, VaultError};

/// Vault backed by `[[accounts]]` entries from the config file.
///
/// Good enough for a single-operator deployment; a networked vault can
/// slot in behind the same trait later.
pub struct StaticVault {
    accounts: HashMap<String, Credentials>,
}

impl StaticVault {
    /// Build a vault from configured accounts.
    pub fn new(accounts: &[AccountConfig]) -> Self {
        let accounts = accounts
            .iter()
            .map(|a| {
                (
                    a.id.clone(),
                    Credentials {
                        username: a.username.clone(),
                        password: a.password.clone(),
                    },
                )
            })
            .collect();

        Self { accounts }
    }

    /// Number of accounts held.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the vault holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl CredentialVault for StaticVault {
    fn name(&self) -> &str {
        "static"
    }

    async fn resolve(&self, account_id: &str) -> Result<Credentials, VaultError> {
        self.accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| VaultError::UnknownAccount(account_id.to_string()))
    }
}
