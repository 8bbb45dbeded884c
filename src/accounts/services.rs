use std::{future::Future, sync::Arc};

use anyhow::Context;
use axum::extract::FromRef;
use tracing::{error, info, instrument, warn};

use crate::{
    config::TokenConfig,
    error::AppError,
    mailer::Mailer,
    permissions::{PermissionStore, MOVIES_READ},
    state::AppState,
    tokens::{IssuedToken, Scope, TokenService},
    users::{Credentials, User},
};

/// Registration, activation and login on top of the credential and token services.
#[derive(Clone)]
pub struct AccountManager {
    credentials: Credentials,
    tokens: TokenService,
    permissions: Arc<dyn PermissionStore>,
    mailer: Arc<dyn Mailer>,
    policy: TokenConfig,
}

impl FromRef<AppState> for AccountManager {
    fn from_ref(state: &AppState) -> Self {
        Self {
            credentials: Credentials::from_ref(state),
            tokens: TokenService::from_ref(state),
            permissions: state.permissions.clone(),
            mailer: state.mailer.clone(),
            policy: state.config.tokens.clone(),
        }
    }
}

impl AccountManager {
    /// Create an unactivated user, grant read access and mail an activation token.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let user = self.credentials.create_user(name, email, password).await?;
        self.permissions.grant(user.id, &[MOVIES_READ]).await?;

        let token = self
            .tokens
            .issue(user.id, Scope::Activation, self.policy.activation_ttl())
            .await?;
        self.deliver_activation(&user, &token).await;

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Spend an activation token. Activating an already active account is a no-op.
    ///
    /// The token is only revoked once the version-checked write has landed, so a
    /// caller that gets `EditConflict` can retry with the same plaintext.
    #[instrument(skip(self, plaintext))]
    pub async fn activate(&self, plaintext: &str) -> Result<User, AppError> {
        let mut user = self.tokens.validate(plaintext, Scope::Activation).await?;
        if user.activated {
            let user = self.tokens.consume(plaintext, Scope::Activation).await?;
            info!(user_id = user.id, "user already activated");
            return Ok(user);
        }

        user.activated = true;
        let user = self.credentials.update(&user).await?;
        self.tokens
            .revoke_all_for_scope(user.id, Scope::Activation)
            .await?;

        info!(user_id = user.id, version = user.version, "user activated");
        Ok(user)
    }

    /// Issue an authentication token. Activation is not required to log in.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AppError> {
        let user = self.credentials.authenticate(email, password).await?;
        if self.policy.single_session {
            self.tokens
                .revoke_all_for_scope(user.id, Scope::Authentication)
                .await?;
        }
        let token = self
            .tokens
            .issue(user.id, Scope::Authentication, self.policy.authentication_ttl())
            .await?;
        info!(user_id = user.id, "user logged in");
        Ok(token)
    }

    /// Replace any outstanding activation token with a fresh one.
    #[instrument(skip(self))]
    pub async fn resend_activation(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.credentials.find_by_email(email).await? else {
            warn!("activation resend for unknown email");
            return Err(AppError::field("email", "no matching email address found"));
        };
        if user.activated {
            return Err(AppError::field("email", "user has already been activated"));
        }

        self.tokens
            .revoke_all_for_scope(user.id, Scope::Activation)
            .await?;
        let token = self
            .tokens
            .issue(user.id, Scope::Activation, self.policy.activation_ttl())
            .await?;
        self.deliver_activation(&user, &token).await;
        Ok(())
    }

    async fn deliver_activation(&self, user: &User, token: &IssuedToken) {
        if let Err(e) = self.mailer.send_activation(user, token).await {
            error!(error = ?e, user_id = user.id, "activation email failed");
        }
    }
}

/// Run `fut` on its own task so a dropped request cannot abandon it halfway.
pub async fn run_to_completion<F, T>(fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .context("account task panicked")?
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use time::Duration;
    use tokio::sync::Barrier;

    use super::*;
    use crate::{
        error::StoreError,
        mailer::RecordingMailer,
        memory::MemoryStore,
        users::{repo_types::NewUser, UserStore},
    };

    fn manager() -> (AccountManager, AppState, Arc<RecordingMailer>) {
        let (state, mailer) = AppState::fake();
        (AccountManager::from_ref(&state), state, mailer)
    }

    #[tokio::test]
    async fn register_grants_read_and_mails_token() {
        let (mgr, state, mailer) = manager();
        let user = mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        assert!(!user.activated);

        let perms = state.permissions.for_user(user.id).await.unwrap();
        assert!(perms.includes(MOVIES_READ));
        assert!(!perms.includes(crate::permissions::MOVIES_WRITE));

        let token = mailer.last_token_for("a@x.com").unwrap();
        assert_eq!(token.len(), 26);
    }

    #[tokio::test]
    async fn activation_flips_flag_and_bumps_version() {
        let (mgr, _, mailer) = manager();
        mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let token = mailer.last_token_for("a@x.com").unwrap();

        let user = mgr.activate(&token).await.unwrap();
        assert!(user.activated);
        assert_eq!(user.version, 2);

        let err = mgr.activate(&token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn activation_revokes_sibling_tokens() {
        let (mgr, state, mailer) = manager();
        let user = mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let first = mailer.last_token_for("a@x.com").unwrap();
        let sibling = TokenService::from_ref(&state)
            .issue(user.id, Scope::Activation, Duration::days(3))
            .await
            .unwrap();

        mgr.activate(&first).await.unwrap();
        let err = mgr.activate(sibling.plaintext()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn activating_an_active_account_is_idempotent() {
        let (mgr, state, mailer) = manager();
        mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let user = mgr
            .activate(&mailer.last_token_for("a@x.com").unwrap())
            .await
            .unwrap();

        let late = TokenService::from_ref(&state)
            .issue(user.id, Scope::Activation, Duration::days(3))
            .await
            .unwrap();
        let again = mgr.activate(late.plaintext()).await.unwrap();
        assert!(again.activated);
        assert_eq!(again.version, user.version);

        let err = mgr.activate(late.plaintext()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn login_does_not_require_activation() {
        let (mgr, _, _) = manager();
        let user = mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        assert!(!user.activated);
        let token = mgr.login("a@x.com", "longenough1").await.unwrap();
        assert!(token.expiry() > time::OffsetDateTime::now_utc());
        assert_eq!(token.record().scope, Scope::Authentication);
    }

    #[tokio::test]
    async fn single_session_policy_revokes_older_logins() {
        let (mut mgr, state, _) = manager();
        mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let tokens = TokenService::from_ref(&state);

        let first = mgr.login("a@x.com", "longenough1").await.unwrap();
        let second = mgr.login("a@x.com", "longenough1").await.unwrap();
        assert!(tokens.validate(first.plaintext(), Scope::Authentication).await.is_ok());
        assert!(tokens.validate(second.plaintext(), Scope::Authentication).await.is_ok());

        mgr.policy.single_session = true;
        let third = mgr.login("a@x.com", "longenough1").await.unwrap();
        assert!(tokens.validate(first.plaintext(), Scope::Authentication).await.is_err());
        assert!(tokens.validate(second.plaintext(), Scope::Authentication).await.is_err());
        assert!(tokens.validate(third.plaintext(), Scope::Authentication).await.is_ok());
    }

    #[tokio::test]
    async fn resend_replaces_outstanding_token() {
        let (mgr, _, mailer) = manager();
        mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let old = mailer.last_token_for("a@x.com").unwrap();

        mgr.resend_activation("A@X.com").await.unwrap();
        let new = mailer.last_token_for("a@x.com").unwrap();
        assert_ne!(old, new);
        assert_eq!(mailer.sent_count(), 2);

        assert!(matches!(
            mgr.activate(&old).await.unwrap_err(),
            AppError::InvalidOrExpiredToken
        ));
        mgr.activate(&new).await.unwrap();

        let err = mgr.resend_activation("a@x.com").await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors["email"], "user has already been activated");

        let err = mgr.resend_activation("b@x.com").await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors["email"], "no matching email address found");
    }

    /// Delegates to a `MemoryStore`, optionally failing the first update or
    /// holding every update until `gate` has been reached by all callers.
    struct ContendedUsers {
        inner: Arc<MemoryStore>,
        fail_first_update: AtomicBool,
        gate: Option<Barrier>,
    }

    #[async_trait]
    impl UserStore for ContendedUsers {
        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            UserStore::insert(self.inner.as_ref(), user).await
        }

        async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.inner.get_by_email(email).await
        }

        async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
            self.inner.get_by_id(id).await
        }

        async fn update(&self, user: &User) -> Result<User, StoreError> {
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            if self.fail_first_update.swap(false, Ordering::SeqCst) {
                return Err(StoreError::EditConflict);
            }
            UserStore::update(self.inner.as_ref(), user).await
        }
    }

    fn contended_manager(
        fail_first_update: bool,
        gate: Option<Barrier>,
    ) -> (AccountManager, Arc<MemoryStore>, Arc<RecordingMailer>) {
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn UserStore> = Arc::new(ContendedUsers {
            inner: store.clone(),
            fail_first_update: AtomicBool::new(fail_first_update),
            gate,
        });
        let mailer = Arc::new(RecordingMailer::default());
        let mgr = AccountManager {
            credentials: Credentials::new(users.clone()),
            tokens: TokenService::new(store.clone(), users),
            permissions: store.clone(),
            mailer: mailer.clone(),
            policy: TokenConfig::default(),
        };
        (mgr, store, mailer)
    }

    #[tokio::test]
    async fn edit_conflict_leaves_token_usable_for_retry() {
        let (mgr, store, mailer) = contended_manager(true, None);
        let user = mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let token = mailer.last_token_for("a@x.com").unwrap();

        let err = mgr.activate(&token).await.unwrap_err();
        assert!(matches!(err, AppError::EditConflict), "{err:?}");
        let stored = store.get_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.activated);

        let user = mgr.activate(&token).await.unwrap();
        assert!(user.activated);
        assert_eq!(user.version, 2);

        let err = mgr.activate(&token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_activations_apply_once() {
        let (mgr, store, mailer) = contended_manager(false, Some(Barrier::new(2)));
        let user = mgr.register("A", "a@x.com", "longenough1").await.unwrap();
        let a = mailer.last_token_for("a@x.com").unwrap();
        let b = mgr
            .tokens
            .issue(user.id, Scope::Activation, Duration::days(3))
            .await
            .unwrap()
            .plaintext()
            .to_string();

        let (m1, m2) = (mgr.clone(), mgr.clone());
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { m1.activate(&a).await }),
            tokio::spawn(async move { m2.activate(&b).await }),
        );
        let results = [r1.unwrap(), r2.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::EditConflict)))
                .count(),
            1
        );

        let stored = store.get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.activated);
        assert_eq!(stored.version, 2);
        assert!(store.stored_tokens().is_empty());
    }

    #[tokio::test]
    async fn run_to_completion_passes_results_through() {
        let ok = run_to_completion(async { Ok::<_, AppError>(5) }).await.unwrap();
        assert_eq!(ok, 5);
        let err = run_to_completion(async { Err::<(), _>(AppError::NotFound) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
