//! In-memory token authority for the active session.
//!
//! `SessionCredentials` owns the tokens every request is signed with and
//! mirrors them into the `TokenStore`. Each change bumps a generation counter;
//! teardown also cancels the session scope so in-flight requests are dropped.

use crate::models::{Session, TokenPair};
use parking_lot::Mutex;
use std::sync::Arc;
use token_store::TokenStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Inner {
    tokens: Option<TokenPair>,
    scope: CancellationToken,
    generation: u64,
}

/// Point-in-time view of the credentials a request was issued under.
#[derive(Debug, Clone)]
pub struct CredentialSnapshot {
    pub tokens: Option<TokenPair>,
    /// Cancelled when the session this snapshot belongs to is torn down.
    pub scope: CancellationToken,
    pub generation: u64,
}

impl CredentialSnapshot {
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    /// False once the owning session has been torn down.
    pub fn is_live(&self) -> bool {
        self.tokens.is_some() && !self.scope.is_cancelled()
    }
}

/// Active session tokens, mirrored to durable storage.
pub struct SessionCredentials {
    store: Arc<TokenStore>,
    inner: Mutex<Inner>,
}

impl SessionCredentials {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self {
            store,
            inner: Mutex::new(Inner {
                tokens: None,
                scope: CancellationToken::new(),
                generation: 0,
            }),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        let inner = self.inner.lock();
        CredentialSnapshot {
            tokens: inner.tokens.clone(),
            scope: inner.scope.clone(),
            generation: inner.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Adopt the session persisted by a previous run.
    ///
    /// Returns `None` unless both tokens and the profile are readable. A
    /// partial leftover is removed so it cannot be mistaken for a session later.
    pub fn load_from_store(&self) -> Option<Session> {
        let mut inner = self.inner.lock();

        let access = self.store.get_access_token();
        let refresh = self.store.get_refresh_token();
        let profile = self.store.get_profile();

        match (access, refresh, profile) {
            (Some(access), Some(refresh), Some(profile)) => {
                let tokens = TokenPair::new(access, refresh);
                inner.tokens = Some(tokens.clone());
                inner.generation += 1;
                debug!(username = %profile.username, "Loaded stored session");
                Some(Session::new(tokens, profile))
            }
            (None, None, None) => None,
            _ => {
                info!("Stored session is incomplete, clearing it");
                self.store.clear_all();
                None
            }
        }
    }

    /// Make `session` the active one and persist it.
    ///
    /// Returns whether the session reached durable storage. The in-memory
    /// session is active either way.
    pub fn install(&self, session: &Session) -> bool {
        let mut inner = self.inner.lock();
        inner.tokens = Some(session.tokens.clone());
        inner.generation += 1;

        let persisted = self.store.set_all(
            &session.tokens.access_token,
            &session.tokens.refresh_token,
            &session.profile,
        );
        if !persisted {
            warn!("Session could not be persisted and will not survive a restart");
        }
        persisted
    }

    /// Replace the tokens with the result of a refresh started from `basis`.
    ///
    /// Rejected when anything changed the credentials since `basis` was taken
    /// (another refresh, a login, or a teardown), so a late refresh result is
    /// never applied to a session that no longer exists.
    pub fn commit_refresh(&self, basis: &CredentialSnapshot, tokens: TokenPair) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != basis.generation || basis.scope.is_cancelled() {
            debug!(
                basis = basis.generation,
                current = inner.generation,
                "Discarding stale refresh result"
            );
            return false;
        }

        // The previous refresh token is spent server-side, so a stored pair
        // that cannot be updated is dropped rather than left behind.
        if !self
            .store
            .set_tokens(&tokens.access_token, &tokens.refresh_token)
        {
            warn!("Refreshed tokens could not be persisted, clearing stored session");
            self.store.clear_all();
        }

        inner.tokens = Some(tokens);
        inner.generation += 1;
        true
    }

    /// Persist a freshly fetched profile for the active session.
    pub fn update_profile(&self, profile: &token_store::AdminProfile) -> bool {
        let inner = self.inner.lock();
        if inner.tokens.is_none() {
            return false;
        }
        self.store.set_profile(profile)
    }

    /// End the active session: cancel in-flight requests, forget the tokens
    /// and clear the store.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        Self::teardown_locked(&mut inner, &self.store);
    }

    /// Tear down only if the credentials are still those of `basis`.
    pub fn teardown_if_current(&self, basis: &CredentialSnapshot) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != basis.generation || basis.scope.is_cancelled() {
            return false;
        }
        Self::teardown_locked(&mut inner, &self.store);
        true
    }

    fn teardown_locked(inner: &mut Inner, store: &TokenStore) {
        inner.scope.cancel();
        inner.scope = CancellationToken::new();
        inner.tokens = None;
        inner.generation += 1;
        store.clear_all();
        debug!(generation = inner.generation, "Session credentials torn down");
    }
}
