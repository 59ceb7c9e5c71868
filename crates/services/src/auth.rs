//! Token pipeline and sign-in flow.
//!
//! `AuthSession` owns the credentials used by one HTTP pipeline. Requests that
//! hit a 401 call `refresh_after` with the token they sent; the refresh gate
//! makes concurrent callers wait for a single refresh and reuse its result.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use quiz_core::model::UserId;
use storage::repository::{CredentialStore, Credentials};

use crate::error::{ApiError, AuthError};

/// Tokens returned by the token endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    /// Absent when the server keeps the existing refresh token valid.
    pub refresh: Option<String>,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` when the server rejects the refresh token.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Remote calls needed to sign in.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` for rejected credentials or transport failures.
    async fn request_tokens(&self, username: &str, password: &str)
    -> Result<TokenPair, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` for transport or decoding failures.
    async fn fetch_user_id(&self, access_token: &str) -> Result<Option<UserId>, ApiError>;
}

/// Who is playing, if anyone.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn current_user_id(&self) -> Option<UserId>;
}

pub struct AuthSession {
    store: Arc<dyn CredentialStore>,
    credentials: Mutex<Option<Credentials>>,
    refresh_gate: AsyncMutex<()>,
}

impl AuthSession {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            credentials: Mutex::new(None),
            refresh_gate: AsyncMutex::new(()),
        }
    }

    /// Loads previously stored credentials into memory.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be read.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        let stored = self.store.load_credentials().await?;
        let found = stored.is_some();
        self.replace(stored);
        Ok(found)
    }

    /// Persists and activates `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the credentials cannot be written.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<(), AuthError> {
        self.store.save_credentials(&credentials).await?;
        self.replace(Some(credentials));
        Ok(())
    }

    /// Forgets the credentials in memory and on disk.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be cleared.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.replace(None);
        self.store.clear_credentials().await?;
        Ok(())
    }

    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.lock().clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.lock().as_ref().map(|c| c.access_token.clone())
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.lock().as_ref().and_then(|c| c.user_id.clone())
    }

    /// Refreshes the access token after `stale` was rejected.
    ///
    /// Returns the token to retry with, or `None` when nobody is signed in.
    /// A caller that waited on the gate while another refresh succeeded gets
    /// the already refreshed token without a second round trip.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` when the refresh request fails.
    pub async fn refresh_after(
        &self,
        stale: &str,
        refresher: &dyn TokenRefresher,
    ) -> Result<Option<String>, AuthError> {
        let _gate = self.refresh_gate.lock().await;

        let Some(current) = self.credentials() else {
            return Ok(None);
        };
        if current.access_token != stale {
            return Ok(Some(current.access_token));
        }

        let pair = refresher.refresh_tokens(&current.refresh_token).await?;
        let mut updated = current;
        updated.access_token = pair.access;
        if let Some(refresh) = pair.refresh {
            updated.refresh_token = refresh;
        }
        let access = updated.access_token.clone();

        if let Err(err) = self.store.save_credentials(&updated).await {
            log::warn!("refreshed token could not be persisted: {err}");
        }
        self.replace(Some(updated));
        log::debug!("access token refreshed");
        Ok(Some(access))
    }

    fn replace(&self, credentials: Option<Credentials>) {
        *self.lock() = credentials;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Credentials>> {
        self.credentials
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentitySource for AuthSession {
    async fn current_user_id(&self) -> Option<UserId> {
        self.user_id()
    }
}

/// Sign-in, sign-out and identity lookups for the front end.
#[derive(Clone)]
pub struct AuthService {
    api: Arc<dyn AuthApi>,
    session: Arc<AuthSession>,
}

impl AuthService {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, session: Arc<AuthSession>) -> Self {
        Self { api, session }
    }

    /// Obtains tokens, resolves the user id and stores both.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` for rejected credentials,
    /// `AuthError::MissingUserId` when the id lookup comes back empty, or
    /// `AuthError::Storage` if the credentials cannot be saved.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials, AuthError> {
        let pair = self.api.request_tokens(username.trim(), password).await?;
        let user_id = self
            .api
            .fetch_user_id(&pair.access)
            .await?
            .ok_or(AuthError::MissingUserId)?;

        let mut credentials = Credentials::new(pair.access, pair.refresh.unwrap_or_default());
        credentials.user_id = Some(user_id);
        credentials.username = Some(username.trim().to_owned());
        self.session.sign_in(credentials.clone()).await?;
        log::info!("signed in as {}", username.trim());
        Ok(credentials)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if stored credentials cannot be removed.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.session.sign_out().await?;
        log::info!("signed out");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` when no user is known.
    pub fn current_user(&self) -> Result<UserId, AuthError> {
        self.session.user_id().ok_or(AuthError::NotSignedIn)
    }

    #[must_use]
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use storage::repository::InMemoryRepository;

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(TokenPair {
                access: format!("access-{n}-{refresh_token}"),
                refresh: None,
            })
        }
    }

    struct FakeAuthApi {
        user: Option<&'static str>,
    }

    #[async_trait]
    impl AuthApi for FakeAuthApi {
        async fn request_tokens(
            &self,
            _username: &str,
            _password: &str,
        ) -> Result<TokenPair, ApiError> {
            Ok(TokenPair {
                access: "a0".into(),
                refresh: Some("r0".into()),
            })
        }

        async fn fetch_user_id(&self, _access_token: &str) -> Result<Option<UserId>, ApiError> {
            Ok(self.user.and_then(UserId::new))
        }
    }

    async fn signed_in_session(repo: &InMemoryRepository) -> Arc<AuthSession> {
        let session = Arc::new(AuthSession::new(Arc::new(repo.clone())));
        session
            .sign_in(Credentials::new("stale", "r1"))
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn concurrent_refreshes_hit_the_server_once() {
        let repo = InMemoryRepository::new();
        let session = signed_in_session(&repo).await;
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });

        let mut handles = Vec::new();
        for _ in 0..4 {
            let session = Arc::clone(&session);
            let refresher = Arc::clone(&refresher);
            handles.push(tokio::spawn(async move {
                session
                    .refresh_after("stale", refresher.as_ref())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("access-1-r1"));
        }

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        let stored = repo.load_credentials().await.unwrap().unwrap();
        assert_eq!(stored.access_token, "access-1-r1");
        assert_eq!(stored.refresh_token, "r1");
    }

    #[tokio::test]
    async fn refresh_without_credentials_yields_none() {
        let session = AuthSession::new(Arc::new(InMemoryRepository::new()));
        let refresher = CountingRefresher {
            calls: AtomicUsize::new(0),
        };
        assert!(session.refresh_after("x", &refresher).await.unwrap().is_none());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_stores_tokens_and_user() {
        let repo = InMemoryRepository::new();
        let session = Arc::new(AuthSession::new(Arc::new(repo.clone())));
        let auth = AuthService::new(Arc::new(FakeAuthApi { user: Some("42") }), session);

        let creds = auth.login(" jozef ", "pw").await.unwrap();
        assert_eq!(creds.username.as_deref(), Some("jozef"));
        assert_eq!(auth.current_user().unwrap().as_str(), "42");
        assert_eq!(repo.load_credentials().await.unwrap(), Some(creds));

        auth.logout().await.unwrap();
        assert!(matches!(auth.current_user(), Err(AuthError::NotSignedIn)));
        assert!(repo.load_credentials().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_without_user_id_fails_and_stores_nothing() {
        let repo = InMemoryRepository::new();
        let session = Arc::new(AuthSession::new(Arc::new(repo.clone())));
        let auth = AuthService::new(Arc::new(FakeAuthApi { user: None }), session);

        let err = auth.login("jozef", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingUserId));
        assert!(repo.load_credentials().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_reads_stored_credentials() {
        let repo = InMemoryRepository::new();
        let mut creds = Credentials::new("a", "r");
        creds.user_id = UserId::new("5");
        repo.save_credentials(&creds).await.unwrap();

        let session = AuthSession::new(Arc::new(repo));
        assert!(session.restore().await.unwrap());
        assert_eq!(session.current_user_id().await, UserId::new("5"));
    }
}
