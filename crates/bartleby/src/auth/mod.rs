//! Sign-in state for the current user.
//!
//! The backend issues a session cookie on login, which the shared API client keeps.
//! The user record itself is remembered in a [`UserStore`] so a restart stays signed in.

pub mod store;

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::api::{AuthApi, LoginResponse, User, UserExport};
use crate::error::{ApiError, AuthError, Result, ValidationError};

pub use store::UserStore;

const EMAIL_LOGIN_FAILED: &str = "Login failed";
const EMAIL_LOGIN_ERROR: &str = "An error occurred during login";
const GOOGLE_LOGIN_FAILED: &str = "Google login failed";
const GOOGLE_LOGIN_ERROR: &str = "An error occurred during Google login";

pub struct AuthSession {
    api: Arc<dyn AuthApi>,
    store: Option<UserStore>,
    user: RwLock<Option<User>>,
}

impl AuthSession {
    /// Creates a session, restoring a previously saved user from `store`.
    pub fn new(api: Arc<dyn AuthApi>, store: Option<UserStore>) -> Self {
        let user = store.as_ref().and_then(UserStore::load);
        if let Some(user) = &user {
            info!(user_id = %user.id_param(), "Restored signed-in user");
        }
        Self {
            api,
            store,
            user: RwLock::new(user),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }

    pub async fn login_email(&self, email: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ValidationError::InvalidEmail.into());
        }
        let response = self
            .api
            .login_email(email)
            .await
            .map_err(|e| rejected(e, EMAIL_LOGIN_ERROR))?;
        self.accept(response, EMAIL_LOGIN_FAILED)
    }

    /// Signs in with a Google ID token obtained from the OAuth provider.
    pub async fn login_google(&self, token: &str) -> Result<User> {
        let response = self
            .api
            .login_google(token.trim())
            .await
            .map_err(|e| rejected(e, GOOGLE_LOGIN_ERROR))?;
        self.accept(response, GOOGLE_LOGIN_FAILED)
    }

    pub fn logout(&self) -> Result<()> {
        self.set_user(None);
        if let Some(store) = &self.store {
            store.clear()?;
        }
        info!("Signed out");
        Ok(())
    }

    /// Exports previously generated for the signed-in user.
    pub async fn exports(&self) -> Result<Vec<UserExport>> {
        let user = self.current_user().ok_or(AuthError::NotSignedIn)?;
        Ok(self.api.user_exports(&user.id_param()).await?)
    }

    fn accept(&self, response: LoginResponse, fallback: &str) -> Result<User> {
        let user = match response {
            LoginResponse {
                success: true,
                user: Some(user),
                ..
            } => user,
            LoginResponse { message, .. } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string());
                return Err(AuthError::Rejected(message).into());
            }
        };

        if let Some(store) = &self.store {
            // The session still works without the saved copy.
            if let Err(e) = store.save(&user) {
                warn!(error = %e, "Failed to remember signed-in user");
            }
        }
        info!(user_id = %user.id_param(), "Signed in");
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    fn set_user(&self, user: Option<User>) {
        match self.user.write() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }
}

fn rejected(err: ApiError, fallback: &str) -> AuthError {
    warn!(error = %err, "Login request failed");
    AuthError::Rejected(
        err.backend_message()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BartlebyError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeAuth {
        login: Mutex<Option<std::result::Result<LoginResponse, ApiError>>>,
        export_requests: Mutex<Vec<String>>,
    }

    impl FakeAuth {
        fn replying(login: std::result::Result<LoginResponse, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                login: Mutex::new(Some(login)),
                export_requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn login_email(&self, _email: &str) -> std::result::Result<LoginResponse, ApiError> {
            self.login.lock().unwrap().take().unwrap()
        }

        async fn login_google(&self, _token: &str) -> std::result::Result<LoginResponse, ApiError> {
            self.login.lock().unwrap().take().unwrap()
        }

        async fn user_exports(
            &self,
            user_id: &str,
        ) -> std::result::Result<Vec<UserExport>, ApiError> {
            self.export_requests
                .lock()
                .unwrap()
                .push(user_id.to_string());
            Ok(Vec::new())
        }
    }

    fn success() -> LoginResponse {
        serde_json::from_value(json!({
            "success": true,
            "user": {"id": 11, "email": "lin@example.com"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_persists_and_restores() {
        let temp = TempDir::new().unwrap();
        let store = UserStore::new(temp.path().join("user.json"));

        let session = AuthSession::new(FakeAuth::replying(Ok(success())), Some(store.clone()));
        assert!(!session.is_signed_in());
        let user = session.login_email("lin@example.com").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("lin@example.com"));

        let restored = AuthSession::new(FakeAuth::replying(Ok(success())), Some(store));
        assert_eq!(restored.current_user(), Some(user));
    }

    #[tokio::test]
    async fn test_invalid_email_sends_nothing() {
        let api = FakeAuth::replying(Ok(success()));
        let session = AuthSession::new(api.clone(), None);

        let err = session.login_email("not-an-email").await.unwrap_err();

        assert_eq!(err.user_message(), "Please enter a valid email address");
        assert!(api.login.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unsuccessful_login_messages() {
        let response = serde_json::from_value(json!({"success": false})).unwrap();
        let session = AuthSession::new(FakeAuth::replying(Ok(response)), None);
        let err = session.login_email("a@b.c").await.unwrap_err();
        assert_eq!(err.user_message(), "Login failed");

        let response =
            serde_json::from_value(json!({"success": false, "message": "Account locked"}))
                .unwrap();
        let session = AuthSession::new(FakeAuth::replying(Ok(response)), None);
        let err = session.login_google("token").await.unwrap_err();
        assert_eq!(err.user_message(), "Account locked");

        let response = serde_json::from_value(json!({"success": false})).unwrap();
        let session = AuthSession::new(FakeAuth::replying(Ok(response)), None);
        let err = session.login_google("token").await.unwrap_err();
        assert_eq!(err.user_message(), "Google login failed");
    }

    #[tokio::test]
    async fn test_transport_failure_message() {
        let session = AuthSession::new(
            FakeAuth::replying(Err(ApiError::Transport {
                endpoint: "api/auth/login".to_string(),
                message: "dns error".to_string(),
            })),
            None,
        );
        let err = session.login_email("a@b.c").await.unwrap_err();
        assert_eq!(err.user_message(), "An error occurred during login");
    }

    #[tokio::test]
    async fn test_logout_and_exports() {
        let temp = TempDir::new().unwrap();
        let store = UserStore::new(temp.path().join("user.json"));
        let api = FakeAuth::replying(Ok(success()));
        let session = AuthSession::new(api.clone(), Some(store.clone()));

        let err = session.exports().await.unwrap_err();
        assert!(matches!(err, BartlebyError::Auth(AuthError::NotSignedIn)));

        session.login_email("lin@example.com").await.unwrap();
        session.exports().await.unwrap();
        assert_eq!(*api.export_requests.lock().unwrap(), vec!["11".to_string()]);

        session.logout().unwrap();
        assert!(!session.is_signed_in());
        assert!(!store.path().exists());
    }
}
