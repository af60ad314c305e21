//! Persisted sign-in credentials.
//!
//! After a successful validation the web client keeps the JWT pair (and, for
//! registration, the created user) under fixed keys:
//!
//! ```text
//! accessToken  -> "<jwt>"
//! refreshToken -> "<jwt>"
//! userData     -> {"id": .., "phone": "09..", ...}
//! ```

use tracing::warn;

use crate::api::{AuthResult, AuthTokens, AuthUser};
use crate::error::StorageError;
use crate::storage::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_DATA_KEY: &str = "userData";

pub struct CredentialStore<S> {
    store: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Store the tokens, and the user when the backend returned one.
    ///
    /// A stale `userData` from a previous account is removed when the new
    /// result carries no user.
    pub fn save(&self, result: &AuthResult) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, &result.tokens.access)?;
        self.store.set(REFRESH_TOKEN_KEY, &result.tokens.refresh)?;
        match &result.user {
            Some(user) => self.store.set(USER_DATA_KEY, &serde_json::to_string(user)?)?,
            None => self.store.remove(USER_DATA_KEY)?,
        }
        Ok(())
    }

    /// The signed-in credentials, if both tokens are present.
    pub fn load(&self) -> Result<Option<AuthResult>, StorageError> {
        let access = self.store.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.store.get(REFRESH_TOKEN_KEY)?;
        let (Some(access), Some(refresh)) = (access, refresh) else {
            return Ok(None);
        };

        let user = match self.store.get(USER_DATA_KEY)? {
            Some(raw) => match serde_json::from_str::<AuthUser>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "unreadable userData, ignoring");
                    None
                }
            },
            None => None,
        };

        Ok(Some(AuthResult {
            tokens: AuthTokens { access, refresh },
            user,
        }))
    }

    /// Sign out: remove all three keys.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.store.remove(USER_DATA_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn result(user: Option<AuthUser>) -> AuthResult {
        AuthResult {
            tokens: AuthTokens {
                access: "a.b.c".into(),
                refresh: "d.e.f".into(),
            },
            user,
        }
    }

    fn user() -> AuthUser {
        AuthUser {
            id: Some(7),
            username: None,
            email: None,
            phone: "09123456789".into(),
            full_name: Some("علی رضایی".into()),
            user_type: Some("JS".into()),
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let credentials = CredentialStore::new(store.clone());
        credentials.save(&result(Some(user()))).unwrap();

        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a.b.c"));
        assert_eq!(credentials.load().unwrap(), Some(result(Some(user()))));
    }

    #[test]
    fn test_login_result_drops_previous_user() {
        let store = MemoryStore::new();
        let credentials = CredentialStore::new(store.clone());
        credentials.save(&result(Some(user()))).unwrap();
        credentials.save(&result(None)).unwrap();

        assert_eq!(store.get(USER_DATA_KEY).unwrap(), None);
        assert_eq!(credentials.load().unwrap(), Some(result(None)));
    }

    #[test]
    fn test_missing_refresh_token_is_signed_out() {
        let store = MemoryStore::new();
        store.set(ACCESS_TOKEN_KEY, "a.b.c").unwrap();
        assert_eq!(CredentialStore::new(store).load().unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        let credentials = CredentialStore::new(store.clone());
        credentials.save(&result(Some(user()))).unwrap();
        credentials.clear().unwrap();
        assert!(store.is_empty());
    }
}
