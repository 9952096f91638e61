//! Session gate: is an authenticated identity present in the store?
//!
//! The identity record lives in the shared [`LocalStore`], so every open view
//! of the application sees the same session. Each gate keeps its own view of
//! that state in a watch channel and reconciles it on store change
//! notifications, with a fixed-interval re-check for writers the channel
//! cannot see.

use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config;
use crate::db::DatabaseError;
use crate::models::Identity;
use crate::store::{profile_key, LocalStore, StoreChange, IDENTITY_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No check has completed yet.
    Pending,
    Anonymous,
    Authenticated(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Outcome of guarding a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    Loading,
    Granted(Identity),
    Redirect(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Identity requires a name and an email")]
    IncompleteIdentity,
    #[error("Local store error: {0}")]
    Store(#[from] DatabaseError),
}

pub struct SessionGate {
    store: LocalStore,
    state: watch::Sender<AuthState>,
}

impl SessionGate {
    pub fn new(store: LocalStore) -> Self {
        let (state, _) = watch::channel(AuthState::Pending);
        Self { store, state }
    }

    /// Last known state, without touching the store.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Re-read the identity record and publish the result if it changed.
    pub fn refresh(&self) -> AuthState {
        let next = match self.store.get_json::<Identity>(IDENTITY_KEY) {
            Ok(Some(identity)) if identity.is_complete() => AuthState::Authenticated(identity),
            Ok(_) => AuthState::Anonymous,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable identity record, treating as logged out");
                AuthState::Anonymous
            }
        };
        self.publish(next.clone());
        next
    }

    fn publish(&self, next: AuthState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                tracing::debug!(authenticated = next.identity().is_some(), "Session state changed");
                *current = next;
                true
            }
        });
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.refresh(), AuthState::Authenticated(_))
    }

    pub fn current_identity(&self) -> Option<Identity> {
        match self.refresh() {
            AuthState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn login(&self, identity: Identity) -> Result<(), SessionError> {
        if !identity.is_complete() {
            return Err(SessionError::IncompleteIdentity);
        }
        self.store.set_json(IDENTITY_KEY, &identity)?;
        tracing::info!(email = %identity.email, "Logged in");
        self.publish(AuthState::Authenticated(identity));
        Ok(())
    }

    /// Remove the identity and the cached profile belonging to it.
    /// Other identities' profiles and preferences are left alone.
    pub fn logout(&self) -> Result<(), SessionError> {
        let identity = self.store.get_json::<Identity>(IDENTITY_KEY).ok().flatten();
        self.store.remove(IDENTITY_KEY)?;
        if let Some(identity) = &identity {
            self.store.remove(&profile_key(&identity.email))?;
            tracing::info!(email = %identity.email, "Logged out");
        }
        self.publish(AuthState::Anonymous);
        Ok(())
    }

    /// Guard for a protected view: re-checks the store on every call.
    pub fn mount(&self) -> RouteAccess {
        match self.refresh() {
            AuthState::Authenticated(identity) => RouteAccess::Granted(identity),
            _ => RouteAccess::Redirect(config::LOGIN_ROUTE),
        }
    }

    /// Guard from the last known state; `Loading` until a check has run.
    pub fn route_access(&self) -> RouteAccess {
        match self.state() {
            AuthState::Pending => RouteAccess::Loading,
            AuthState::Anonymous => RouteAccess::Redirect(config::LOGIN_ROUTE),
            AuthState::Authenticated(identity) => RouteAccess::Granted(identity),
        }
    }

    /// Keep this gate in step with the store: re-check on every identity
    /// change notification and once per poll interval. The task ends once
    /// the gate is dropped.
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let gate: Weak<Self> = Arc::downgrade(self);
        let mut changes = self.store.subscribe();
        self.refresh();

        tokio::spawn(async move {
            let mut poll = tokio::time::interval(config::SESSION_POLL_INTERVAL);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                let recheck = tokio::select! {
                    change = changes.recv() => match change {
                        Ok(StoreChange::Key(key)) => key == IDENTITY_KEY,
                        Ok(StoreChange::Pinned) => false,
                        Err(broadcast::error::RecvError::Lagged(_)) => true,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = poll.tick() => true,
                };
                let Some(strong) = gate.upgrade() else { break };
                if recheck {
                    strong.refresh();
                }
            }
            tracing::debug!("Session sync stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::PartialProfile;
    use crate::store::THEME_KEY;

    fn ada() -> Identity {
        Identity::new("Ada", "ada@example.com")
    }

    async fn wait_for(rx: &mut watch::Receiver<AuthState>, want: impl Fn(&AuthState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| want(s)))
            .await
            .expect("state did not arrive in time")
            .unwrap();
    }

    #[test]
    fn starts_pending_until_first_check() {
        let gate = SessionGate::new(LocalStore::open_in_memory().unwrap());
        assert_eq!(gate.route_access(), RouteAccess::Loading);
        assert_eq!(gate.mount(), RouteAccess::Redirect("/login"));
        assert_eq!(gate.route_access(), RouteAccess::Redirect("/login"));
    }

    #[test]
    fn login_grants_access() {
        let gate = SessionGate::new(LocalStore::open_in_memory().unwrap());
        gate.login(ada()).unwrap();
        assert!(gate.is_authenticated());
        assert_eq!(gate.mount(), RouteAccess::Granted(ada()));
    }

    #[test]
    fn login_rejects_incomplete_identity() {
        let gate = SessionGate::new(LocalStore::open_in_memory().unwrap());
        let result = gate.login(Identity::new("Ada", "  "));
        assert!(matches!(result, Err(SessionError::IncompleteIdentity)));
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn mount_rechecks_store_each_time() {
        let store = LocalStore::open_in_memory().unwrap();
        let gate = SessionGate::new(store.view());
        gate.login(ada()).unwrap();

        store.remove(IDENTITY_KEY).unwrap();
        assert_eq!(gate.mount(), RouteAccess::Redirect("/login"));
    }

    #[test]
    fn logout_evicts_only_own_profile() {
        let store = LocalStore::open_in_memory().unwrap();
        let gate = SessionGate::new(store.view());
        gate.login(ada()).unwrap();
        store.set_json(&profile_key("ada@example.com"), &PartialProfile::default()).unwrap();
        store.set_json(&profile_key("bob@example.com"), &PartialProfile::default()).unwrap();
        store.set(THEME_KEY, "dark").unwrap();

        gate.logout().unwrap();

        assert!(!gate.is_authenticated());
        assert!(store.get(&profile_key("ada@example.com")).unwrap().is_none());
        assert!(store.get(&profile_key("bob@example.com")).unwrap().is_some());
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn malformed_identity_is_anonymous() {
        let store = LocalStore::open_in_memory().unwrap();
        store.set(IDENTITY_KEY, "not json").unwrap();
        let gate = SessionGate::new(store);
        assert_eq!(gate.refresh(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn other_view_sees_login_and_logout_by_notification() {
        let store = LocalStore::open_in_memory().unwrap();
        let tab_a = Arc::new(SessionGate::new(store.view()));
        let tab_b = Arc::new(SessionGate::new(store.view()));
        let _sync = tab_b.spawn_sync();
        let mut rx = tab_b.subscribe();

        tab_a.login(ada()).unwrap();
        wait_for(&mut rx, |s| *s == AuthState::Authenticated(ada())).await;

        tab_a.logout().unwrap();
        wait_for(&mut rx, |s| *s == AuthState::Anonymous).await;
    }

    #[tokio::test]
    async fn other_process_is_seen_by_polling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let ours = Arc::new(SessionGate::new(LocalStore::open(&path).unwrap()));
        let theirs = SessionGate::new(LocalStore::open(&path).unwrap());
        let _sync = ours.spawn_sync();
        let mut rx = ours.subscribe();

        theirs.login(ada()).unwrap();
        wait_for(&mut rx, |s| matches!(s, AuthState::Authenticated(_))).await;
    }

    #[tokio::test]
    async fn sync_task_ends_when_gate_dropped() {
        let gate = Arc::new(SessionGate::new(LocalStore::open_in_memory().unwrap()));
        let handle = gate.spawn_sync();
        drop(gate);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sync task kept running")
            .unwrap();
    }
}
