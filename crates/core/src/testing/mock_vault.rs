//! Mock credential vault for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::vault::{CredentialVault, Credentials, VaultError};

/// Mock implementation of the CredentialVault trait.
///
/// Provides controllable behavior for testing:
/// - Pre-populate accounts with the builder
/// - Track resolved account ids for assertions
/// - Simulate vault outages
pub struct MockVault {
    accounts: HashMap<String, Credentials>,
    resolved: Mutex<Vec<String>>,
    fail_with: Mutex<Option<VaultError>>,
}

impl Default for MockVault {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVault {
    /// Create an empty mock vault.
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            resolved: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    /// Add an account to the vault.
    pub fn with_account(mut self, id: &str, username: &str, password: &str) -> Self {
        self.accounts.insert(
            id.to_string(),
            Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        self
    }

    /// Make every resolve fail with the given error until cleared.
    pub fn set_fail(&self, error: VaultError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    /// Clear a previously set failure.
    pub fn clear_fail(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    /// Account ids that were resolved, in order.
    pub fn resolved_accounts(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialVault for MockVault {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(&self, account_id: &str) -> Result<Credentials, VaultError> {
        self.resolved.lock().unwrap().push(account_id.to_string());

        if let Some(error) = self.fail_with.lock().unwrap().clone() {
            return Err(error);
        }

        self.accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| VaultError::UnknownAccount(account_id.to_string()))
    }
}
