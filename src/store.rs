//! Process-wide local store shared by every open view of the application.
//!
//! A thin layer over the SQLite repositories that adds typed JSON access and
//! in-process change notification. Views created with [`LocalStore::view`]
//! share one connection and one notification channel; a store opened
//! separately on the same file (another process) shares neither, and its
//! writes are only seen by re-reading.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config;
use crate::db::{self, DatabaseError};
use crate::models::{PinnedEntry, RiskRecord};

/// Key of the authenticated identity record.
pub const IDENTITY_KEY: &str = "user";
pub const THEME_KEY: &str = "theme";
pub const NOTIFICATIONS_KEY: &str = "notifications";

/// Capacity of the change channel. Lagging receivers re-read the store.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Key of the cached profile for one identity.
pub fn profile_key(email: &str) -> String {
    format!("userProfile_{email}")
}

/// A write made through some view of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Key(String),
    Pinned,
}

#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    events: broadcast::Sender<StoreChange>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("path", &self.path)
            .field("views", &self.events.receiver_count())
            .finish()
    }
}

impl LocalStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = db::open_database(path)?;
        Ok(Self::from_connection(conn, Some(path.to_path_buf())))
    }

    /// Open the store at the default location under the app data directory.
    pub fn open_default() -> Result<Self, DatabaseError> {
        Self::open(&config::store_path())
    }

    /// Private in-memory store (tests, ephemeral sessions).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(db::open_memory_database()?, None))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            events,
            path,
        }
    }

    /// Another handle on the same connection and change channel.
    pub fn view(&self) -> Self {
        self.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Changes made through any view sharing this store's channel.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.events.subscribe()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    fn notify(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.events.send(change);
    }

    // ── Key/value ───────────────────────────────────────────

    pub fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        self.with_conn(|conn| db::get_value(conn, key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.with_conn(|conn| db::set_value(conn, key, value))?;
        self.notify(StoreChange::Key(key.to_string()));
        Ok(())
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, DatabaseError> {
        let removed = self.with_conn(|conn| db::delete_value(conn, key))?;
        if removed {
            self.notify(StoreChange::Key(key.to_string()));
        }
        Ok(removed)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    // ── Pinned analyses ─────────────────────────────────────

    pub fn pin(&self, record: &RiskRecord) -> Result<PinnedEntry, DatabaseError> {
        let pinned_at = Utc::now();
        let id = self.with_conn(|conn| db::insert_pinned(conn, record, pinned_at))?;
        self.notify(StoreChange::Pinned);
        Ok(PinnedEntry {
            id,
            pinned_at,
            record: record.clone(),
        })
    }

    pub fn unpin(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self.with_conn(|conn| db::delete_pinned(conn, id))?;
        if removed {
            self.notify(StoreChange::Pinned);
        }
        Ok(removed)
    }

    pub fn pinned(&self) -> Result<Vec<PinnedEntry>, DatabaseError> {
        self.with_conn(db::list_pinned)
    }

    pub fn clear_pinned(&self) -> Result<usize, DatabaseError> {
        let removed = self.with_conn(db::clear_pinned)?;
        self.notify(StoreChange::Pinned);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    #[test]
    fn json_round_trip_through_store() {
        let store = LocalStore::open_in_memory().unwrap();
        let identity = Identity::new("Ada", "ada@example.com");
        store.set_json(IDENTITY_KEY, &identity).unwrap();
        let back: Option<Identity> = store.get_json(IDENTITY_KEY).unwrap();
        assert_eq!(back, Some(identity));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let store = LocalStore::open_in_memory().unwrap();
        store.set(IDENTITY_KEY, "{not json").unwrap();
        let result: Result<Option<Identity>, _> = store.get_json(IDENTITY_KEY);
        assert!(matches!(result, Err(DatabaseError::Serialization(_))));
    }

    #[test]
    fn views_share_data_and_notifications() {
        let store = LocalStore::open_in_memory().unwrap();
        let other = store.view();
        let mut rx = store.subscribe();

        other.set(THEME_KEY, "dark").unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Key(THEME_KEY.into()));
    }

    #[test]
    fn removing_absent_key_sends_nothing() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();
        assert!(!store.remove("missing").unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn separately_opened_stores_share_file_not_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let a = LocalStore::open(&path).unwrap();
        let b = LocalStore::open(&path).unwrap();
        let mut rx = a.subscribe();

        b.set(NOTIFICATIONS_KEY, "false").unwrap();
        assert_eq!(a.get(NOTIFICATIONS_KEY).unwrap().as_deref(), Some("false"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn pin_and_unpin_notify() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();
        let record = RiskRecord::new("r".into(), Utc::now(), vec![], 0.4, vec![], None);
        let entry = store.pin(&record).unwrap();
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Pinned);
        assert!(store.unpin(entry.id).unwrap());
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Pinned);
        assert!(store.pinned().unwrap().is_empty());
    }

    #[test]
    fn profile_key_is_per_email() {
        assert_eq!(profile_key("a@b.c"), "userProfile_a@b.c");
    }
}
