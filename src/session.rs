use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::LogoutPolicy;
use crate::error::Result;
use crate::store::LocalStore;
use crate::types::SessionUser;

// ---------------------------------------------------------------------------
// Identity provider capability
// ---------------------------------------------------------------------------

/// Email + one-time-code identity exchange, supplied by an external provider.
/// The core never sees credentials — only the resolved user stream.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` until the provider has determined whether a session exists.
    fn current_user(&self) -> watch::Receiver<Option<SessionUser>>;

    /// Starts the challenge for `email` (the provider delivers the code).
    async fn request_challenge(&self, email: &str) -> Result<()>;

    /// Completes the exchange with the delivered code.
    async fn submit_challenge(&self, email: &str, code: &str) -> Result<SessionUser>;

    async fn logout(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Session state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Identity not yet determined.
    Unresolved,
    /// Confirmed logged out; guest browsing only.
    Anonymous,
    Authenticated(SessionUser),
}

/// Session-level coordinator between the identity provider and the local
/// store. The only transition allowed to touch data is logout: under
/// [`LogoutPolicy::FullWipe`] every local collection is cleared before the
/// state returns to `Unresolved`.
pub struct SessionTracker {
    store: Arc<LocalStore>,
    policy: LogoutPolicy,
    state_tx: watch::Sender<SessionState>,
}

impl SessionTracker {
    pub fn new(store: Arc<LocalStore>, policy: LogoutPolicy) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unresolved);
        Self {
            store,
            policy,
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Applies the identity provider's latest resolution.
    pub async fn resolve(&self, user: Option<SessionUser>) -> Result<()> {
        let next = match user {
            None => SessionState::Unresolved,
            Some(u) if u.is_logged_in => SessionState::Authenticated(u),
            Some(_) => SessionState::Anonymous,
        };
        let prev = self.current();
        if prev == next {
            return Ok(());
        }

        // An authenticated session only ends through logout(); a provider
        // downgrade out of one gets the same treatment, policy included.
        if matches!(prev, SessionState::Authenticated(_))
            && !matches!(next, SessionState::Authenticated(_))
        {
            return self.logout().await;
        }

        info!(state = ?next, "session state changed");
        let _ = self.state_tx.send(next);
        Ok(())
    }

    /// Ends the session and returns the state to `Unresolved`. Under
    /// `FullWipe` the entire local store is cleared first.
    pub async fn logout(&self) -> Result<()> {
        match self.policy {
            LogoutPolicy::FullWipe => {
                self.store.wipe_all().await?;
                info!("logout: local store wiped");
            }
            LogoutPolicy::SoftSignOut => {
                info!("logout: session dropped, local data kept");
            }
        }
        let _ = self.state_tx.send(SessionState::Unresolved);
        Ok(())
    }

    /// Forwards a provider's user stream into the state machine. Runs until
    /// the provider goes away.
    pub async fn track(self: Arc<Self>, mut users: watch::Receiver<Option<SessionUser>>) {
        loop {
            let update = users.borrow_and_update().clone();
            if let Err(e) = self.resolve(update).await {
                error!("session resolution failed: {e}");
            }
            if users.changed().await.is_err() {
                break;
            }
        }
    }
}
