//! Access token storage

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Bearer token with its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token that expires at the given instant
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Create a token issued now and valid for `lifetime`
    pub fn with_lifetime(value: impl Into<String>, lifetime: Duration) -> Self {
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(value, expires_at)
    }

    /// Expired from the instant `expires_at` is reached
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

/// Signed-in user, stored and cleared together with the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

/// Holder of the session's access token.
///
/// Implementations are synchronous and never block for long; the client
/// calls them outside of any `.await`.
pub trait TokenStore: Send + Sync {
    /// Current token, `None` if absent or expired
    fn get(&self) -> Option<Token>;

    /// Replace the token
    fn set(&self, token: Token);

    /// Forget the token and the user profile. Calling it twice is harmless.
    fn clear(&self);

    /// Profile of the signed-in user
    fn user(&self) -> Option<UserProfile> {
        None
    }

    /// Remember the signed-in user
    fn set_user(&self, _user: UserProfile) {}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    token: Option<Token>,
    #[serde(default)]
    user: Option<UserProfile>,
}

impl StoredSession {
    fn live_token(&self) -> Option<Token> {
        self.token.clone().filter(|token| !token.is_expired())
    }
}

/// Token store living only as long as the process
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    session: Mutex<StoredSession>,
}

impl InMemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `token`
    pub fn with_token(token: Token) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self) -> Option<Token> {
        self.session.lock().live_token()
    }

    fn set(&self, token: Token) {
        self.session.lock().token = Some(token);
    }

    fn clear(&self) {
        *self.session.lock() = StoredSession::default();
    }

    fn user(&self) -> Option<UserProfile> {
        self.session.lock().user.clone()
    }

    fn set_user(&self, user: UserProfile) {
        self.session.lock().user = Some(user);
    }
}

/// Errors opening a file token store
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Failed to read token file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Token file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Token store persisted as a JSON file so sessions survive restarts.
///
/// Writes are best effort: a failed write is logged and the in-memory copy
/// stays authoritative for this process.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    session: Mutex<StoredSession>,
}

impl FileTokenStore {
    /// Open the store at `path`; a missing file is an empty session
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let path = path.as_ref().to_path_buf();

        let session = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => StoredSession::default(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| TokenStoreError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSession::default(),
            Err(source) => {
                return Err(TokenStoreError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };

        debug!("Opened token store at {}", path.display());
        Ok(Self {
            path,
            session: Mutex::new(session),
        })
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, session: &StoredSession) {
        if session.token.is_none() && session.user.is_none() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove token file {}: {}", self.path.display(), e),
            }
            return;
        }

        let result = serde_json::to_vec_pretty(session)
            .map_err(std::io::Error::other)
            .and_then(|content| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, content)
            });

        if let Err(e) = result {
            warn!("Failed to write token file {}: {}", self.path.display(), e);
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Token> {
        self.session.lock().live_token()
    }

    fn set(&self, token: Token) {
        let mut session = self.session.lock();
        session.token = Some(token);
        self.persist(&session);
    }

    fn clear(&self) {
        let mut session = self.session.lock();
        *session = StoredSession::default();
        self.persist(&session);
    }

    fn user(&self) -> Option<UserProfile> {
        self.session.lock().user.clone()
    }

    fn set_user(&self, user: UserProfile) {
        let mut session = self.session.lock();
        session.user = Some(user);
        self.persist(&session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: 12,
            email: "pat@example.org".to_string(),
            first_name: Some("Pat".to_string()),
            last_name: None,
            user_type: Some("PATIENT".to_string()),
        }
    }

    #[test]
    fn test_expired_token_is_absent() {
        let store = InMemoryTokenStore::new();
        store.set(Token::new("old", Utc::now() - chrono::Duration::seconds(1)));
        assert!(store.get().is_none());

        store.set(Token::with_lifetime("fresh", Duration::from_secs(60)));
        assert_eq!(store.get().map(|t| t.value), Some("fresh".to_string()));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = InMemoryTokenStore::with_token(Token::with_lifetime("t", Duration::from_secs(60)));
        store.set_user(profile());

        store.clear();
        store.clear();
        assert!(store.get().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_bearer_header() {
        let token = Token::with_lifetime("abc", Duration::from_secs(1));
        assert_eq!(token.bearer(), "Bearer abc");
    }

    #[test]
    fn test_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("token.json");

        let store = FileTokenStore::open(&path).unwrap();
        assert!(store.get().is_none());
        store.set(Token::with_lifetime("persisted", Duration::from_secs(3600)));
        store.set_user(profile());

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.get().map(|t| t.value), Some("persisted".to_string()));
        assert_eq!(reopened.user(), Some(profile()));

        reopened.clear();
        assert!(!path.exists());
        assert!(FileTokenStore::open(&path).unwrap().get().is_none());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileTokenStore::open(&path),
            Err(TokenStoreError::Parse { .. })
        ));
    }
}
