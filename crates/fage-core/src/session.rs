//! Session store with tokio::watch + parking_lot::Mutex
//!
//! The watch channel carries the latest committed [`SessionState`]; the mutex
//! guards a session epoch. Every commit checks the epoch under that lock and
//! every sign-out bumps it, so a late profile fetch can never resurrect a
//! cleared session and a 401 from an older session never logs out a newer one.
//!
//! At most one profile fetch is in flight: a second boot returns at once and a
//! sign-in waits for the running boot before it starts.

use crate::error::{ApiError, SessionError, StorageError};
use crate::event::{EventBus, SessionEvent, SignOutReason};
use crate::models::Profile;
use crate::token::{SessionToken, TokenStorage};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

/// Session-issuing and profile endpoints
pub trait AuthBackend: Send + Sync {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<SessionToken, ApiError>> + Send;

    fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> impl Future<Output = Result<SessionToken, ApiError>> + Send;

    fn fetch_profile(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Result<Profile, ApiError>> + Send;
}

/// Where the session stands
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Resolving: either boot has not run yet (`token: None`) or a profile
    /// fetch for `token` is in flight
    Authenticating { token: Option<SessionToken> },
    Unauthenticated,
    Authenticated { token: SessionToken, user: Profile },
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Authenticating { .. })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&SessionToken> {
        match self {
            SessionState::Authenticating { token } => token.as_ref(),
            SessionState::Authenticated { token, .. } => Some(token),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn user(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }
}

/// How [`SessionStore::boot`] ended
#[derive(Debug, Clone, PartialEq)]
pub enum BootOutcome {
    /// No stored token; no network call was made
    Anonymous,
    /// Stored token validated
    Restored(Profile),
    /// Stored token was refused and has been discarded
    Rejected,
    /// Another boot is still resolving
    AlreadyResolving,
    /// Logout happened while the profile fetch was in flight
    Superseded,
}

/// Bearer token tagged with the session it was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: SessionToken,
    epoch: u64,
}

impl Credential {
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Single owner of session state and of the durable token
pub struct SessionStore<B> {
    backend: B,

    /// Durable token, written only from here
    storage: Arc<dyn TokenStorage>,

    /// Latest committed state
    state: watch::Sender<SessionState>,

    /// Bumped on every sign-in and sign-out
    epoch: Mutex<u64>,

    /// Held by boot and sign-in for their whole profile round trip
    resolving: AsyncMutex<()>,

    events: EventBus,
}

impl<B: AuthBackend> SessionStore<B> {
    /// Create a store in the loading state; call [`boot`](Self::boot) next
    pub fn new(backend: B, storage: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(SessionState::Authenticating { token: None });
        Self {
            backend,
            storage,
            state,
            epoch: Mutex::new(0),
            resolving: AsyncMutex::new(()),
            events: EventBus::default_capacity(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Latest committed state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that always yields the most recent state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Resolve the stored token, if any, into a session
    pub async fn boot(&self) -> BootOutcome {
        let Ok(_resolving) = self.resolving.try_lock() else {
            debug!("Boot already resolving");
            return BootOutcome::AlreadyResolving;
        };

        let start = *self.epoch.lock();
        let stored = match self.storage.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Token storage unreadable, treating as logged out");
                None
            }
        };

        let Some(token) = stored else {
            let epoch = self.epoch.lock();
            if *epoch != start {
                return BootOutcome::Superseded;
            }
            self.state.send_replace(SessionState::Unauthenticated);
            drop(epoch);
            self.events.publish(SessionEvent::Resolved {
                authenticated: false,
            });
            debug!("No stored session");
            return BootOutcome::Anonymous;
        };

        {
            let epoch = self.epoch.lock();
            if *epoch != start {
                return BootOutcome::Superseded;
            }
            self.state.send_replace(SessionState::Authenticating {
                token: Some(token.clone()),
            });
        }

        debug!("Validating stored session");
        let result = self.backend.fetch_profile(&token).await;

        let mut epoch = self.epoch.lock();
        if *epoch != start {
            debug!("Session changed during boot, dropping profile result");
            return BootOutcome::Superseded;
        }

        match result {
            Ok(user) => {
                info!(email = %user.email, "Session restored");
                self.state.send_replace(SessionState::Authenticated {
                    token,
                    user: user.clone(),
                });
                drop(epoch);
                self.events.publish(SessionEvent::Resolved {
                    authenticated: true,
                });
                BootOutcome::Restored(user)
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected");
                if let Err(clear_err) = self.sign_out_locked(&mut epoch, SignOutReason::Rejected) {
                    warn!(error = %clear_err, "Failed to discard rejected token");
                }
                drop(epoch);
                self.events.publish(SessionEvent::Resolved {
                    authenticated: false,
                });
                BootOutcome::Rejected
            }
        }
    }

    /// Log in and fetch the profile; the token is stored before this returns
    pub async fn login(&self, email: &str, password: &str) -> Result<Profile, SessionError> {
        let _resolving = self.resolving.lock().await;
        let start = *self.epoch.lock();
        debug!(email, "Logging in");
        let token = self
            .backend
            .login(email, password)
            .await
            .inspect_err(|_| self.settle_failed_sign_in())?;
        self.establish(start, token).await
    }

    /// Register and sign in with the returned token
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Profile, SessionError> {
        let _resolving = self.resolving.lock().await;
        let start = *self.epoch.lock();
        debug!(email, "Registering");
        let token = self
            .backend
            .register(email, password, full_name)
            .await
            .inspect_err(|_| self.settle_failed_sign_in())?;
        self.establish(start, token).await
    }

    /// A refused sign-in before boot leaves nothing to resolve
    fn settle_failed_sign_in(&self) {
        let _epoch = self.epoch.lock();
        self.state.send_if_modified(|state| {
            if *state == (SessionState::Authenticating { token: None }) {
                *state = SessionState::Unauthenticated;
                true
            } else {
                false
            }
        });
    }

    async fn establish(&self, start: u64, token: SessionToken) -> Result<Profile, SessionError> {
        let issued = {
            let mut epoch = self.epoch.lock();
            if *epoch != start {
                return Err(SessionError::Superseded);
            }
            self.storage.store(&token)?;
            *epoch += 1;
            self.state.send_replace(SessionState::Authenticating {
                token: Some(token.clone()),
            });
            *epoch
        };

        let result = self.backend.fetch_profile(&token).await;

        let mut epoch = self.epoch.lock();
        if *epoch != issued {
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(user) => {
                self.state.send_replace(SessionState::Authenticated {
                    token,
                    user: user.clone(),
                });
                drop(epoch);
                info!(email = %user.email, "Signed in");
                self.events.publish(SessionEvent::SignedIn {
                    email: user.email.clone(),
                });
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Profile fetch after sign-in failed");
                if let Err(clear_err) = self.sign_out_locked(&mut epoch, SignOutReason::Rejected) {
                    warn!(error = %clear_err, "Failed to discard token");
                }
                Err(e.into())
            }
        }
    }

    /// Clear the token and reset to `Unauthenticated`, without network access
    ///
    /// The state is reset even when the token file cannot be removed.
    pub fn logout(&self) -> Result<(), SessionError> {
        let mut epoch = self.epoch.lock();
        self.sign_out_locked(&mut epoch, SignOutReason::UserRequested)?;
        info!("Logged out");
        Ok(())
    }

    /// Current token tagged with its session, for authenticated calls
    pub fn credential(&self) -> Result<Credential, SessionError> {
        let epoch = self.epoch.lock();
        let state = self.state.borrow();
        state
            .token()
            .map(|token| Credential {
                token: token.clone(),
                epoch: *epoch,
            })
            .ok_or(SessionError::NotAuthenticated)
    }

    /// Pass an authenticated API result through, ending the session on a 401
    ///
    /// Only a 401 for a credential of the current session logs out.
    pub fn observe<T>(
        &self,
        credential: &Credential,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                let mut epoch = self.epoch.lock();
                if *epoch == credential.epoch {
                    warn!("Session expired, signing out");
                    if let Err(clear_err) = self.sign_out_locked(&mut epoch, SignOutReason::Expired)
                    {
                        warn!(error = %clear_err, "Failed to clear expired token");
                    }
                } else {
                    debug!(
                        stale = credential.epoch,
                        current = *epoch,
                        "Ignoring 401 from an earlier session"
                    );
                }
            }
        }
        result
    }

    /// Caller holds the epoch lock
    fn sign_out_locked(&self, epoch: &mut u64, reason: SignOutReason) -> Result<(), StorageError> {
        *epoch += 1;
        let cleared = self.storage.clear();
        self.state.send_replace(SessionState::Unauthenticated);
        self.events.publish(SessionEvent::SignedOut(reason));
        cleared
    }
}
