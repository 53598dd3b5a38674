//! Session store: the current user, persisted to local storage.
//!
//! Authentication is mocked. `login` and `signup` accept any credentials and
//! always succeed; the password is never checked or stored. Every mutation
//! writes storage first and only then replaces the in-memory session and
//! notifies subscribers, so a failed write leaves the previous state intact.

use crate::storage::{Storage, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default storage key for the persisted user record
pub const DEFAULT_SESSION_KEY: &str = "user";

/// Identity of the logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
        }
    }
}

/// Current session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    LoggedOut,
    LoggedIn(User),
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        match self {
            Session::LoggedOut => None,
            Session::LoggedIn(user) => Some(user),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Session::LoggedIn(_))
    }

    /// Name shown in the header badge: the email, or "Guest"
    pub fn display_name(&self) -> &str {
        match self {
            Session::LoggedIn(user) if !user.email.is_empty() => &user.email,
            _ => "Guest",
        }
    }

    /// Avatar fallback letter: first letter of the email, or 'G'
    pub fn avatar_initial(&self) -> char {
        self.user()
            .and_then(|user| user.email.chars().next())
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('G')
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user().cloned(),
            is_logged_in: self.is_logged_in(),
        }
    }
}

/// Read-only view handed to consumers: `{ user, isLoggedIn }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_logged_in: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode user record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&Session)>;

/// Owns the session and its persisted copy
pub struct SessionStore {
    storage: Box<dyn Storage>,
    key: String,
    session: Session,
    observers: BTreeMap<SubscriptionId, Observer>,
    next_id: u64,
}

impl SessionStore {
    /// Restore the session from `storage`.
    ///
    /// A record that does not parse as a user is treated as logged out and
    /// removed from storage.
    pub fn initialize(storage: Box<dyn Storage>, key: &str) -> Result<Self, SessionError> {
        let mut store = Self {
            storage,
            key: key.to_string(),
            session: Session::LoggedOut,
            observers: BTreeMap::new(),
            next_id: 0,
        };

        let Some(raw) = store.storage.get_item(key)? else {
            tracing::debug!(key, "no stored session");
            return Ok(store);
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) => {
                tracing::debug!(key, email = %user.email, "restored session");
                store.session = Session::LoggedIn(user);
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed stored session");
                if let Err(e) = store.storage.remove_item(key) {
                    tracing::warn!(key, error = %e, "failed to remove malformed stored session");
                }
            }
        }

        Ok(store)
    }

    pub fn current(&self) -> &Session {
        &self.session
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Mock login: any credentials succeed
    pub fn login(&mut self, email: &str, _password: &str) -> Result<(), SessionError> {
        tracing::info!(email, "login");
        self.transition(Session::LoggedIn(User::new(email)))
    }

    /// Mock signup: identical to login, no account registry
    pub fn signup(&mut self, email: &str, _password: &str) -> Result<(), SessionError> {
        tracing::info!(email, "signup");
        self.transition(Session::LoggedIn(User::new(email)))
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        tracing::info!("logout");
        self.transition(Session::LoggedOut)
    }

    /// Register an observer called after every session change.
    ///
    /// Only changes of value notify: logging in again as the current user,
    /// or logging out while logged out, persists but calls no observer.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Session) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.insert(id, Box::new(observer));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    fn transition(&mut self, next: Session) -> Result<(), SessionError> {
        self.persist(&next)?;

        if next == self.session {
            return Ok(());
        }
        self.session = next;

        for observer in self.observers.values_mut() {
            observer(&self.session);
        }
        Ok(())
    }

    fn persist(&mut self, session: &Session) -> Result<(), SessionError> {
        match session {
            Session::LoggedIn(user) => {
                let record = serde_json::to_string(user)?;
                self.storage.set_item(&self.key, &record)?;
            }
            Session::LoggedOut => self.storage.remove_item(&self.key)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Memory storage that can be shared with the test after being handed
    /// to a store
    #[derive(Clone, Default)]
    struct SharedStorage(Rc<RefCell<MemoryStorage>>);

    impl Storage for SharedStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.borrow().get_item(key)
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.0.borrow_mut().set_item(key, value)
        }

        fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
            self.0.borrow_mut().remove_item(key)
        }
    }

    /// Storage whose writes always fail
    struct ReadOnlyStorage(MemoryStorage);

    impl Storage for ReadOnlyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get_item(key)
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(read_only_error())
        }

        fn remove_item(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(read_only_error())
        }
    }

    fn read_only_error() -> StorageError {
        StorageError::Write {
            path: "read-only".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        }
    }

    fn store_with(storage: &SharedStorage) -> SessionStore {
        SessionStore::initialize(Box::new(storage.clone()), DEFAULT_SESSION_KEY).unwrap()
    }

    #[test]
    fn test_empty_storage_starts_logged_out() {
        let store = store_with(&SharedStorage::default());
        assert_eq!(store.current(), &Session::LoggedOut);
        assert_eq!(
            store.current().snapshot(),
            SessionSnapshot {
                user: None,
                is_logged_in: false
            }
        );
    }

    #[test]
    fn test_login_ignores_password() {
        for password in ["", "x", "correct horse", "\u{1f511}"] {
            let mut store = store_with(&SharedStorage::default());
            store.login("a@b.com", password).unwrap();
            let snapshot = store.current().snapshot();
            assert!(snapshot.is_logged_in);
            assert_eq!(snapshot.user.unwrap().email, "a@b.com");
        }
    }

    #[test]
    fn test_login_persists_user_record() {
        let storage = SharedStorage::default();
        let mut store = store_with(&storage);
        store.login("a@b.com", "x").unwrap();

        let raw = storage.get_item(DEFAULT_SESSION_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "email": "a@b.com" }));
    }

    #[test]
    fn test_session_survives_restart() {
        let storage = SharedStorage::default();
        let mut store = store_with(&storage);
        store.login("a@b.com", "x").unwrap();
        drop(store);

        let restored = store_with(&storage);
        assert!(restored.current().is_logged_in());
        assert_eq!(restored.current().user().unwrap().email, "a@b.com");
    }

    #[test]
    fn test_session_survives_restart_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local_storage.json");

        let storage = FileStorage::open(&path).unwrap();
        let mut store = SessionStore::initialize(Box::new(storage), "user").unwrap();
        store.signup("disk@test.com", "pw").unwrap();
        drop(store);

        let storage = FileStorage::open(&path).unwrap();
        let store = SessionStore::initialize(Box::new(storage), "user").unwrap();
        assert_eq!(store.current().user().unwrap().email, "disk@test.com");
    }

    #[test]
    fn test_logout_clears_session_and_storage() {
        let storage = SharedStorage::default();
        let mut store = store_with(&storage);
        store.login("u@test.com", "pw1").unwrap();
        assert_eq!(store.current().user().unwrap().email, "u@test.com");

        store.logout().unwrap();
        assert!(store.current().user().is_none());
        assert!(!store.current().is_logged_in());
        assert!(storage.get_item(DEFAULT_SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let storage = SharedStorage::default();
        let mut store = store_with(&storage);
        store.login("u@test.com", "pw").unwrap();

        store.logout().unwrap();
        let once = store.current().snapshot();
        store.logout().unwrap();
        assert_eq!(store.current().snapshot(), once);
        assert!(storage.get_item(DEFAULT_SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let storage = SharedStorage::default();
        let mut store = store_with(&storage);
        store.signup("new@test.com", "pw").unwrap();
        store.login("other@test.com", "pw2").unwrap();

        assert_eq!(store.current().user().unwrap().email, "other@test.com");
        let restored = store_with(&storage);
        assert_eq!(restored.current().user().unwrap().email, "other@test.com");
    }

    #[test]
    fn test_malformed_record_falls_back_to_logged_out() {
        for raw in ["not json", "null", "{}", "{\"email\": 3}", ""] {
            let storage = SharedStorage::default();
            storage
                .0
                .borrow_mut()
                .set_item(DEFAULT_SESSION_KEY, raw)
                .unwrap();

            let store = store_with(&storage);
            assert_eq!(store.current(), &Session::LoggedOut, "record {raw:?}");
            assert!(storage.get_item(DEFAULT_SESSION_KEY).unwrap().is_none());
        }
    }

    #[test]
    fn test_malformed_record_with_failing_cleanup_still_starts() {
        let mut memory = MemoryStorage::new();
        memory.set_item(DEFAULT_SESSION_KEY, "not json").unwrap();

        let store =
            SessionStore::initialize(Box::new(ReadOnlyStorage(memory)), DEFAULT_SESSION_KEY)
                .unwrap();
        assert_eq!(store.current(), &Session::LoggedOut);
    }

    #[test]
    fn test_extra_fields_in_record_are_ignored() {
        let storage = SharedStorage::default();
        storage
            .0
            .borrow_mut()
            .set_item("user", r#"{"email":"x@y.z","displayName":"X"}"#)
            .unwrap();

        let store = store_with(&storage);
        assert_eq!(store.current().user().unwrap().email, "x@y.z");
    }

    #[test]
    fn test_custom_key() {
        let storage = SharedStorage::default();
        let mut store = SessionStore::initialize(Box::new(storage.clone()), "vxfb.user").unwrap();
        store.login("a@b.com", "").unwrap();

        assert_eq!(store.key(), "vxfb.user");
        assert!(storage.get_item("vxfb.user").unwrap().is_some());
        assert!(storage.get_item(DEFAULT_SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_observers_notified_in_subscription_order() {
        let mut store = store_with(&SharedStorage::default());
        let events = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&events);
        store.subscribe(move |s| first.borrow_mut().push(format!("first:{}", s.display_name())));
        let second = Rc::clone(&events);
        store.subscribe(move |s| second.borrow_mut().push(format!("second:{}", s.display_name())));

        store.login("a@b.com", "x").unwrap();
        store.logout().unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                "first:a@b.com",
                "second:a@b.com",
                "first:Guest",
                "second:Guest"
            ]
        );
    }

    #[test]
    fn test_unchanged_state_does_not_notify() {
        let mut store = store_with(&SharedStorage::default());
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        store.subscribe(move |_| *counter.borrow_mut() += 1);

        store.logout().unwrap();
        store.login("a@b.com", "x").unwrap();
        store.login("a@b.com", "y").unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut store = store_with(&SharedStorage::default());
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        let id = store.subscribe(move |_| *counter.borrow_mut() += 1);

        store.login("a@b.com", "x").unwrap();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.logout().unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let mut store =
            SessionStore::initialize(Box::new(ReadOnlyStorage(MemoryStorage::new())), "user")
                .unwrap();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        store.subscribe(move |_| *counter.borrow_mut() += 1);

        let err = store.login("a@b.com", "x").unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(store.current(), &Session::LoggedOut);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_display_name_and_avatar() {
        let session = Session::LoggedOut;
        assert_eq!(session.display_name(), "Guest");
        assert_eq!(session.avatar_initial(), 'G');

        let session = Session::LoggedIn(User::new("zoe@example.com"));
        assert_eq!(session.display_name(), "zoe@example.com");
        assert_eq!(session.avatar_initial(), 'Z');

        let session = Session::LoggedIn(User::new(""));
        assert_eq!(session.display_name(), "Guest");
        assert_eq!(session.avatar_initial(), 'G');
    }

    #[test]
    fn test_snapshot_json_shape() {
        let session = Session::LoggedIn(User::new("a@b.com"));
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "user": { "email": "a@b.com" }, "isLoggedIn": true })
        );

        let json = serde_json::to_value(Session::LoggedOut.snapshot()).unwrap();
        assert_eq!(json, serde_json::json!({ "user": null, "isLoggedIn": false }));
    }
}
