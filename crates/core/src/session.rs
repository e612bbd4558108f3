//! Authentication session shared by the transport, the auth service and the coordinator.
//!
//! A [`Session`] is an explicit context object: it is created once, handed to every
//! component at construction, started on login and ended on logout.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::model::User;

static COOKIE_FILE: &str = "cookies.json";
static FALLBACK_TOKEN_FILE: &str = "token";
const COOKIE_MAX_AGE_DAYS: i64 = 7;

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionState>>,
}

impl Session {
    /// A session with no credentials. Requests go out unauthenticated.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Rebuild a session from persisted credentials: the session cookie first,
    /// the fallback token file second.
    pub fn restore(store: &CredentialStore) -> Self {
        let session = Self::anonymous();
        match store.load() {
            Some(stored) => {
                let mut state = session.inner.write();
                state.token = Some(stored.token);
                state.user = stored.user;
            }
            None => tracing::debug!("no stored credentials, starting anonymous session"),
        }
        session
    }

    pub fn begin(&self, token: impl Into<String>, user: Option<User>) {
        let mut state = self.inner.write();
        state.token = Some(token.into());
        state.user = user;
    }

    pub fn end(&self) {
        let mut state = self.inner.write();
        state.token = None;
        state.user = None;
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.inner.read().token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.read().user.clone()
    }

    pub fn set_user(&self, user: Option<User>) {
        self.inner.write().user = user;
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().token.is_some()
    }
}

/// Credentials read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: String,
    pub user: Option<User>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CookieJar {
    auth_token: String,
    #[serde(default)]
    auth_user: Option<User>,
    expires_at: DateTime<Utc>,
}

/// On-disk credential persistence: a session cookie jar with an expiry, plus a bare
/// token file kept for clients that only ever wrote that.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    cookie_path: PathBuf,
    fallback_path: PathBuf,
}

impl CredentialStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::in_dir(config.data_dir())
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cookie_path: dir.join(COOKIE_FILE),
            fallback_path: dir.join(FALLBACK_TOKEN_FILE),
        }
    }

    pub fn load(&self) -> Option<StoredCredentials> {
        if let Some(jar) = self.read_cookie_jar() {
            tracing::debug!("token found in session cookie");
            return Some(StoredCredentials {
                token: jar.auth_token,
                user: jar.auth_user,
            });
        }

        let token = fs::read_to_string(&self.fallback_path).ok()?;
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        tracing::debug!("token found in fallback store");
        Some(StoredCredentials {
            token: token.to_string(),
            user: None,
        })
    }

    pub fn save(&self, token: &str, user: Option<&User>) -> Result<()> {
        let jar = CookieJar {
            auth_token: token.to_string(),
            auth_user: user.cloned(),
            expires_at: Utc::now() + Duration::days(COOKIE_MAX_AGE_DAYS),
        };
        let encoded = serde_json::to_string_pretty(&jar)?;
        if let Some(parent) = self.cookie_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.cookie_path, encoded)
            .with_context(|| format!("Failed to write {}", self.cookie_path.display()))?;
        fs::write(&self.fallback_path, token)
            .with_context(|| format!("Failed to write {}", self.fallback_path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        for path in [&self.cookie_path, &self.fallback_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to remove {}", path.display()))
                }
            }
        }
        Ok(())
    }

    fn read_cookie_jar(&self) -> Option<CookieJar> {
        let raw = fs::read_to_string(&self.cookie_path).ok()?;
        let jar: CookieJar = match serde_json::from_str(&raw) {
            Ok(jar) => jar,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable session cookie");
                return None;
            }
        };
        if jar.expires_at <= Utc::now() {
            tracing::debug!("session cookie expired");
            return None;
        }
        Some(jar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn user() -> User {
        User {
            id: 1,
            name: "Ada".into(),
            email: "ada@example.test".into(),
        }
    }

    #[test]
    fn saved_credentials_restore_a_session() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.save("tok-1", Some(&user())).unwrap();

        let session = Session::restore(&store);
        assert_eq!(session.bearer_token().as_deref(), Some("tok-1"));
        assert_eq!(session.current_user(), Some(user()));
    }

    #[test]
    fn fallback_token_is_used_without_cookie() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(FALLBACK_TOKEN_FILE), "legacy-token\n").unwrap();

        let loaded = CredentialStore::in_dir(dir.path()).load().unwrap();
        assert_eq!(loaded.token, "legacy-token");
        assert!(loaded.user.is_none());
    }

    #[test]
    fn cookie_takes_precedence_over_fallback() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.save("cookie-token", None).unwrap();
        fs::write(dir.path().join(FALLBACK_TOKEN_FILE), "stale").unwrap();

        assert_eq!(store.load().unwrap().token, "cookie-token");
    }

    #[test]
    fn expired_cookie_is_ignored() {
        let dir = TempDir::new().unwrap();
        let jar = CookieJar {
            auth_token: "old".into(),
            auth_user: None,
            expires_at: Utc::now() - Duration::days(1),
        };
        fs::write(
            dir.path().join(COOKIE_FILE),
            serde_json::to_string(&jar).unwrap(),
        )
        .unwrap();

        assert!(CredentialStore::in_dir(dir.path()).load().is_none());
    }

    #[test]
    fn clear_removes_everything_and_tolerates_missing_files() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.clear().unwrap();
        store.save("tok", None).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn begin_and_end_toggle_authentication() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        session.begin("abc", Some(user()));
        assert!(session.is_authenticated());
        session.end();
        assert!(session.bearer_token().is_none());
        assert!(session.current_user().is_none());
    }
}
