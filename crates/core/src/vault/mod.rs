//! Credential vault abstraction.
//!
//! Resolves an account id to usable login credentials. The engine only
//! consumes this interface; storing and managing credentials is an
//! external concern.

mod static_vault;
mod types;

pub use static_vault::StaticVault;
pub use types::{CredentialVault, Credentials, VaultError};
