//! In-memory user accounts and sessions.
//!
//! Passwords are stored as Argon2 PHC strings. Sessions are opaque v4 UUIDs mapped to a user id;
//! they live until logout or process exit.

use crate::models::{SettingsRes, Theme};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use leafdoc_types::NonEmptyText;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Login failed")]
    InvalidCredentials,
    #[error("Not logged in")]
    Unauthenticated,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

pub type AccountResult<T> = std::result::Result<T, AccountError>;

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: NonEmptyText,
    /// Stored lowercased
    pub email: NonEmptyText,
    password_hash: String,
    pub theme: Theme,
    pub notifications: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn settings(&self) -> SettingsRes {
        SettingsRes {
            username: self.username.to_string(),
            email: self.email.to_string(),
            theme: self.theme,
            notifications: self.notifications,
        }
    }
}

#[derive(Default)]
struct Accounts {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Uuid>,
}

impl Accounts {
    fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email.as_str() == email)
    }
}

/// User store, sessions and settings behind a single lock.
#[derive(Default)]
pub struct AccountService {
    inner: RwLock<Accounts>,
}

impl AccountService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a user. Email is trimmed and lowercased, username trimmed.
    ///
    /// The password is hashed before the store is locked. Like [`AccountService::login`] this
    /// blocks on Argon2.
    ///
    /// # Errors
    ///
    /// Email uniqueness is checked before username uniqueness, so a request clashing on both
    /// reports `EmailTaken`.
    pub fn register(&self, username: &str, email: &str, password: &str) -> AccountResult<User> {
        let username = NonEmptyText::new(username)
            .map_err(|_| AccountError::InvalidInput("username is required".into()))?;
        let email = NonEmptyText::new(email.trim().to_lowercase())
            .map_err(|_| AccountError::InvalidInput("email is required".into()))?;
        if password.is_empty() {
            return Err(AccountError::InvalidInput("password is required".into()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AccountError::Hashing(e.to_string()))?
            .to_string();

        let mut accounts = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if accounts.find_by_email(email.as_str()).is_some() {
            return Err(AccountError::EmailTaken);
        }
        if accounts.users.values().any(|u| u.username == username) {
            return Err(AccountError::UsernameTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            theme: Theme::default(),
            notifications: false,
            created_at: Utc::now(),
        };
        accounts.users.insert(user.id, user.clone());
        tracing::info!("registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Checks credentials and opens a session, returning its token.
    ///
    /// Blocks for the duration of an Argon2 verification; async callers should run it on a
    /// blocking thread.
    pub fn login(&self, email: &str, password: &str) -> AccountResult<Uuid> {
        let user_id = self.verify_credentials(email, password)?;

        let mut accounts = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !accounts.users.contains_key(&user_id) {
            return Err(AccountError::InvalidCredentials);
        }
        let token = Uuid::new_v4();
        accounts.sessions.insert(token, user_id);
        Ok(token)
    }

    /// The id of the user matching `email` and `password`.
    ///
    /// The hash is copied out under a read lock and verified with no lock held.
    fn verify_credentials(&self, email: &str, password: &str) -> AccountResult<Uuid> {
        let email = email.trim().to_lowercase();
        let (user_id, password_hash) = {
            let accounts = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let user = accounts
                .find_by_email(&email)
                .ok_or(AccountError::InvalidCredentials)?;
            (user.id, user.password_hash.clone())
        };

        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AccountError::InvalidCredentials)?;
        Ok(user_id)
    }

    /// Drops a session. Unknown tokens are ignored.
    pub fn logout(&self, token: Uuid) {
        let mut accounts = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        accounts.sessions.remove(&token);
    }

    /// The user owning `token`.
    pub fn user_for_token(&self, token: Uuid) -> AccountResult<User> {
        let accounts = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        accounts
            .sessions
            .get(&token)
            .and_then(|id| accounts.users.get(id))
            .cloned()
            .ok_or(AccountError::Unauthenticated)
    }

    /// Replaces the settings of the session's user.
    pub fn update_settings(
        &self,
        token: Uuid,
        theme: Theme,
        notifications: bool,
    ) -> AccountResult<User> {
        let mut accounts = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let user_id = *accounts
            .sessions
            .get(&token)
            .ok_or(AccountError::Unauthenticated)?;
        let user = accounts
            .users
            .get_mut(&user_id)
            .ok_or(AccountError::Unauthenticated)?;
        user.theme = theme;
        user.notifications = notifications;
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    fn service_with_user() -> AccountService {
        let accounts = AccountService::new();
        accounts
            .register("tani", "Tani@Example.com", "s3cret")
            .unwrap();
        accounts
    }

    #[test]
    fn register_normalises_email_and_hashes_password() {
        let accounts = AccountService::new();
        let user = accounts
            .register("  tani ", " Tani@Example.COM ", "s3cret")
            .unwrap();

        assert_eq!(user.username.as_str(), "tani");
        assert_eq!(user.email.as_str(), "tani@example.com");
        assert!(user.password_hash.starts_with("$argon2"));
        assert_ne!(user.password_hash, "s3cret");
        assert_eq!(user.theme, Theme::Light);
        assert!(!user.notifications);
    }

    #[test]
    fn duplicate_email_is_checked_before_username() {
        let accounts = service_with_user();

        assert_eq!(
            accounts
                .register("tani", "tani@example.com", "x")
                .unwrap_err(),
            AccountError::EmailTaken
        );
        let err = accounts
            .register("tani", "other@example.com", "x")
            .unwrap_err();
        assert_eq!(err, AccountError::UsernameTaken);
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[test]
    fn blank_fields_are_rejected() {
        let accounts = AccountService::new();
        assert!(matches!(
            accounts.register(" ", "a@b.c", "pw"),
            Err(AccountError::InvalidInput(_))
        ));
        assert!(matches!(
            accounts.register("a", "", "pw"),
            Err(AccountError::InvalidInput(_))
        ));
        assert!(matches!(
            accounts.register("a", "a@b.c", ""),
            Err(AccountError::InvalidInput(_))
        ));
    }

    #[test]
    fn login_issues_session_and_logout_ends_it() {
        let accounts = service_with_user();

        let token = accounts.login("TANI@example.com", "s3cret").unwrap();
        assert_eq!(
            accounts.user_for_token(token).unwrap().username.as_str(),
            "tani"
        );

        accounts.logout(token);
        assert_eq!(
            accounts.user_for_token(token).unwrap_err(),
            AccountError::Unauthenticated
        );
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let accounts = service_with_user();
        assert_eq!(
            accounts.login("tani@example.com", "wrong").unwrap_err(),
            AccountError::InvalidCredentials
        );
        assert_eq!(
            accounts.login("nobody@example.com", "s3cret").unwrap_err(),
            AccountError::InvalidCredentials
        );
    }

    #[test]
    fn settings_are_updated_for_session_user() {
        let accounts = service_with_user();
        let token = accounts.login("tani@example.com", "s3cret").unwrap();

        let user = accounts.update_settings(token, Theme::Dark, true).unwrap();
        assert_eq!(user.theme, Theme::Dark);

        let settings = accounts.user_for_token(token).unwrap().settings();
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.notifications);
        assert_eq!(settings.email, "tani@example.com");

        assert_eq!(
            accounts
                .update_settings(Uuid::new_v4(), Theme::Light, false)
                .unwrap_err(),
            AccountError::Unauthenticated
        );
    }

    #[test]
    fn password_check_does_not_need_write_lock() {
        let accounts = Arc::new(service_with_user());
        let reader = accounts.inner.read().unwrap();

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&accounts);
        std::thread::spawn(move || {
            tx.send(worker.verify_credentials("tani@example.com", "s3cret"))
                .ok();
        });
        let result = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("credential check waited on the account lock");
        drop(reader);

        let user_id = result.unwrap();
        let token = accounts.login("tani@example.com", "s3cret").unwrap();
        assert_eq!(accounts.user_for_token(token).unwrap().id, user_id);
    }
}
