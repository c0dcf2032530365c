//! User account store
//!
//! Emails are trimmed, lower-cased and unique. Passwords are hashed by the
//! injected [`PasswordHasher`] and never leave the store: every read strips
//! them.

use crate::errors::{KeywardError, Result};
use crate::events::{AccountEvent, EventBus};
use keyward_core::store::{optional, CollectionExt};
use keyward_core::{
    Clock, Collection, Entity, EntityMeta, PasswordHasher, ReadTxn, Relationships,
    ValidationErrors,
};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Index holding the normalized email
pub const EMAILS: &str = "emails";

/// Accepted password lengths in characters
pub const PASSWORD_LENGTH: RangeInclusive<usize> = 6..=24;

/// A registered account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Id and timestamps
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Trimmed, lower-cased and unique
    pub email: String,
    /// Hash from the injected hasher; empty on reads
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Email ownership confirmed
    #[serde(default)]
    pub verified: bool,
    /// Administratively deactivated
    #[serde(default)]
    pub disabled: bool,
    /// Unix seconds of the last login
    #[serde(rename = "lastLoggedInAt", default, skip_serializing_if = "Option::is_none")]
    pub last_logged_in_at: Option<i64>,
}

impl User {
    fn without_password(mut self) -> Self {
        self.password.clear();
        self
    }
}

impl Entity for User {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn relationships(&self) -> Relationships {
        Relationships::new().with(EMAILS, self.email.clone())
    }
}

/// Canonical form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User account store
#[derive(Clone)]
pub struct Users {
    users: Arc<dyn Collection<User>>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl Users {
    /// Create the store publishing on `events`
    pub fn new(
        users: Arc<dyn Collection<User>>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            users,
            hasher,
            clock,
            events,
        }
    }

    /// Bus carrying this store's account events
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register a new account
    pub fn new_user(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let mut errors = ValidationErrors::new();
        errors.require(&email, "email is required");
        check_password(&mut errors, password);
        errors.finish()?;

        let user = User {
            email,
            password: self.hasher.hash(password)?,
            ..Default::default()
        };
        self.insert(user)
    }

    /// Store a user whose password is already hashed
    pub fn insert(&self, mut user: User) -> Result<User> {
        user.email = normalize_email(&user.email);
        let mut errors = ValidationErrors::new();
        errors
            .require(&user.email, "email is required")
            .require(&user.password, "password is required");
        errors.finish()?;

        let created = self.users.write(move |txn| {
            ensure_email_free(txn.as_read(), &user.email, None)?;
            txn.create(user)
        })?;

        tracing::info!(user_id = %created.id(), "User created");
        self.events.publish(AccountEvent::UserCreated {
            user_id: created.id().to_string(),
            email: created.email.clone(),
        });
        Ok(created.without_password())
    }

    /// Look up by id, password stripped
    pub fn get(&self, user_id: &str) -> Result<User> {
        self.get_with_password(user_id).map(User::without_password)
    }

    /// Look up by email, password stripped
    pub fn get_by_email(&self, email: &str) -> Result<User> {
        self.get_by_email_with_password(email)
            .map(User::without_password)
    }

    /// Every account, passwords stripped
    pub fn list(&self) -> Result<Vec<User>> {
        let users = self.users.read(|txn| txn.all())?;
        Ok(users.into_iter().map(User::without_password).collect())
    }

    /// Change the email; `Conflict` when another account holds it
    pub fn update_email(&self, user_id: &str, email: &str) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(KeywardError::validation("email is required"));
        }

        let updated = self.users.write(|txn| {
            ensure_email_free(txn.as_read(), &email, Some(user_id))?;
            txn.update(user_id, &mut |u: &mut User| {
                u.email = email.clone();
                Ok(())
            })
        });
        let updated = updated.map_err(user_not_found)?;

        self.events.publish(AccountEvent::EmailUpdated {
            user_id: user_id.to_string(),
            email: updated.email.clone(),
        });
        Ok(updated.without_password())
    }

    /// Validate, hash and store a new password
    pub fn update_password(&self, user_id: &str, password: &str) -> Result<User> {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, password);
        errors.finish()?;

        let hashed = self.hasher.hash(password)?;
        let updated = self.modify(user_id, move |u| u.password = hashed.clone())?;
        tracing::info!(user_id, "Password updated");
        self.events.publish(AccountEvent::PasswordUpdated {
            user_id: user_id.to_string(),
        });
        Ok(updated)
    }

    /// Set the verified flag
    pub fn update_verified(&self, user_id: &str, verified: bool) -> Result<User> {
        self.modify(user_id, |u| u.verified = verified)
    }

    /// Set the disabled flag
    pub fn update_disabled(&self, user_id: &str, disabled: bool) -> Result<User> {
        let updated = self.modify(user_id, |u| u.disabled = disabled)?;
        tracing::info!(user_id, disabled, "User disabled flag changed");
        Ok(updated)
    }

    /// Stamp the current time as the last login
    pub fn update_last_logged_in_at(&self, user_id: &str) -> Result<User> {
        let now = self.clock.unix_now();
        self.modify(user_id, |u| u.last_logged_in_at = Some(now))
    }

    /// Verify an email/password pair, returning the user id
    pub fn match_email(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .get_by_email_with_password(email)
            .map_err(invalid_credentials)?;
        self.check_credentials(&user, password)?;
        Ok(user.meta.id)
    }

    /// Verify a user id/password pair, returning the email
    pub fn match_id(&self, user_id: &str, password: &str) -> Result<String> {
        let user = self
            .get_with_password(user_id)
            .map_err(invalid_credentials)?;
        self.check_credentials(&user, password)?;
        Ok(user.email)
    }

    /// Release the collection
    pub fn close(&self) -> Result<()> {
        self.users.close()
    }

    fn check_credentials(&self, user: &User, password: &str) -> Result<()> {
        if !self.hasher.matches(&user.password, password) {
            return Err(KeywardError::invalid_credentials("invalid email or password"));
        }
        if user.disabled {
            return Err(KeywardError::disabled("account is disabled"));
        }
        Ok(())
    }

    fn get_with_password(&self, user_id: &str) -> Result<User> {
        self.users
            .read(|txn| txn.get(user_id))
            .map_err(user_not_found)
    }

    fn get_by_email_with_password(&self, email: &str) -> Result<User> {
        let email = normalize_email(email);
        self.users
            .read(|txn| txn.get_first(EMAILS, &email))
            .map_err(user_not_found)
    }

    fn modify<F>(&self, user_id: &str, mut f: F) -> Result<User>
    where
        F: FnMut(&mut User) + Send,
    {
        self.users
            .write(move |txn| {
                txn.update(user_id, &mut |u: &mut User| {
                    f(u);
                    Ok(())
                })
            })
            .map(User::without_password)
            .map_err(user_not_found)
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    let length = password.chars().count();
    if !PASSWORD_LENGTH.contains(&length) {
        errors.push(format!(
            "password must be between {} and {} characters",
            PASSWORD_LENGTH.start(),
            PASSWORD_LENGTH.end()
        ));
    }
}

fn ensure_email_free(txn: &dyn ReadTxn<User>, email: &str, owner: Option<&str>) -> Result<()> {
    match optional(txn.get_first(EMAILS, email))? {
        Some(existing) if Some(existing.id()) != owner => {
            Err(KeywardError::conflict("email address already in use"))
        }
        _ => Ok(()),
    }
}

fn user_not_found(err: KeywardError) -> KeywardError {
    if err.is_not_found() {
        KeywardError::not_found("user not found")
    } else {
        err
    }
}

fn invalid_credentials(err: KeywardError) -> KeywardError {
    if err.is_not_found() {
        KeywardError::invalid_credentials("invalid email or password")
    } else {
        err
    }
}
