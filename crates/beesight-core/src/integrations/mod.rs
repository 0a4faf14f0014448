pub mod beeminder;
pub mod insight;
pub mod traits;

pub use beeminder::BeeminderClient;
pub use insight::InsightClient;
pub use traits::{GoalGateway, SessionSource};

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "beesight";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Lookup for [`SyncSettings::resolve`](crate::storage::SyncSettings::resolve).
    /// An unavailable keyring reads as "no secret stored".
    pub fn lookup(key: &str) -> Option<String> {
        match get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key, error = %e, "keyring lookup failed");
                None
            }
        }
    }
}
