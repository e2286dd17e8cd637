//! User directory keyed by username, with login/logout sessions.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::sessions::SessionRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: String,
    pub user_status: i32,
}

#[derive(Debug)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
    sessions: SessionRegistry,
}

impl UserDirectory {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions,
        }
    }

    pub fn get(&self, username: &str) -> StoreResult<User> {
        self.users
            .read()
            .get(username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Replace the stored user with the same username.
    pub fn put(&self, user: User) -> StoreResult<()> {
        validate(&user)?;
        let mut users = self.users.write();
        let slot = users.get_mut(&user.username).ok_or(StoreError::NotFound)?;
        debug!(username = %user.username, "user replaced");
        *slot = user;
        Ok(())
    }

    pub fn create(&self, user: User) -> StoreResult<()> {
        validate(&user)?;
        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(duplicate(&user.username));
        }
        debug!(username = %user.username, "user created");
        users.insert(user.username.clone(), user);
        Ok(())
    }

    /// Insert every user or none of them. Fails with `Conflict` if any
    /// username already exists or appears twice in the batch.
    pub fn create_many(&self, batch: Vec<User>) -> StoreResult<usize> {
        if batch.is_empty() {
            return Err(StoreError::BadInput(String::from("user batch is empty")));
        }
        for user in &batch {
            validate(user)?;
        }

        let repeated = {
            let mut seen = HashSet::with_capacity(batch.len());
            batch
                .iter()
                .find(|user| !seen.insert(user.username.as_str()))
                .map(|user| user.username.clone())
        };
        if let Some(username) = repeated {
            return Err(duplicate(&username));
        }

        let mut users = self.users.write();
        if let Some(existing) = batch.iter().find(|user| users.contains_key(&user.username)) {
            return Err(duplicate(&existing.username));
        }

        let count = batch.len();
        users.extend(batch.into_iter().map(|user| (user.username.clone(), user)));
        debug!(count, "user batch created");
        Ok(count)
    }

    /// Remove the user and end any session it holds.
    ///
    /// Lock order is users then sessions, matching `login`.
    pub fn delete(&self, username: &str) -> StoreResult<()> {
        let mut users = self.users.write();
        users.remove(username).ok_or(StoreError::NotFound)?;
        self.sessions.end(username);
        drop(users);
        debug!(username, "user deleted");
        Ok(())
    }

    /// Check the password against the stored user and open a session.
    ///
    /// The users read guard is held until the session is recorded.
    pub fn login(&self, username: &str, password: &str) -> StoreResult<User> {
        let users = self.users.read();
        let refreshed = self.sessions.is_logged_in(username);
        let mut matched = None;
        self.sessions.login(username, password, |username, password| {
            matched = users
                .get(username)
                .filter(|user| password_matches(&user.password, password))
                .cloned();
            matched.is_some()
        })?;
        drop(users);
        debug!(username, refreshed, "user logged in");
        matched.ok_or(StoreError::Unauthorized)
    }

    pub fn logout(&self, username: &str) -> StoreResult<()> {
        self.sessions.logout(username)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

fn validate(user: &User) -> StoreResult<()> {
    if user.username.trim().is_empty() {
        return Err(StoreError::BadInput(String::from("username is required")));
    }
    Ok(())
}

fn duplicate(username: &str) -> StoreError {
    StoreError::Conflict(format!("username {username} already exists"))
}

fn password_matches(stored: &str, presented: &str) -> bool {
    !stored.is_empty() && stored.as_bytes().ct_eq(presented.as_bytes()).into()
}
