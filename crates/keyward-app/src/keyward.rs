//! Credential facade
//!
//! The only entry point the transport layer touches. Composes the account,
//! credential and permission stores; owns no data of its own.

use crate::credentials::Credentials;
use keyward_authentication::sso::Entry;
use keyward_authentication::{
    ApiKey, ApiKeys, EventBus, SessionPair, Sessions, SsoCodes, User, Users,
};
use keyward_authorization::{resource_key, Action, Groups, Pair, Permissions, Resource};
use keyward_core::{
    Clock, Collection, Entity, IdGenerator, KeywardConfig, KeywardError, PasswordHasher, Result,
};
use keyward_store::MemoryCollection;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resource name under which each user's own record is protected
pub const USER_RESOURCE: &str = "user";

/// Name of the API key issued with every new account
pub const PRIMARY_KEY_NAME: &str = "primary";

/// The stores a [`Keyward`] composes
#[derive(Clone)]
pub struct Stores {
    /// User accounts
    pub users: Users,
    /// API keys
    pub api_keys: ApiKeys,
    /// Interactive sessions
    pub sessions: Sessions,
    /// SSO login codes
    pub sso: SsoCodes,
    /// Group membership
    pub groups: Groups,
    /// Resource ACLs
    pub permissions: Permissions,
}

impl Stores {
    /// Every store backed by an in-memory collection
    pub fn in_memory(
        config: &KeywardConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let groups = Groups::new(memory("groups", &ids, &clock));
        Self {
            users: Users::new(
                memory("users", &ids, &clock),
                hasher,
                clock.clone(),
                EventBus::default(),
            ),
            api_keys: ApiKeys::new(memory("apikeys", &ids, &clock), ids.clone(), clock.clone()),
            sessions: Sessions::new(
                memory("sessions", &ids, &clock),
                ids.clone(),
                clock.clone(),
                config.sessions.clone(),
            ),
            sso: SsoCodes::new(
                memory("sso", &ids, &clock),
                ids.clone(),
                clock.clone(),
                config.sso.clone(),
            ),
            permissions: Permissions::new(memory("resources", &ids, &clock), groups.clone()),
            groups,
        }
    }
}

fn memory<T: Entity>(
    name: &str,
    ids: &Arc<dyn IdGenerator>,
    clock: &Arc<dyn Clock>,
) -> Arc<dyn Collection<T>> {
    MemoryCollection::<T>::shared(name, ids.clone(), clock.clone())
}

/// A freshly registered account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// The stored account, password stripped
    pub user: User,
    /// The primary API key issued at registration
    pub api_key: ApiKey,
}

/// A successful interactive login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedIn {
    /// Authenticated user
    pub user_id: String,
    /// Halves of the newly opened session
    pub session: SessionPair,
}

/// Identity resolution and permission checks over the Keyward stores
pub struct Keyward {
    config: KeywardConfig,
    stores: Stores,
}

impl Keyward {
    /// Compose `stores` and start the session purge loop and SSO expiration
    /// scheduler on the current tokio runtime
    pub fn open(config: KeywardConfig, stores: Stores) -> Result<Self> {
        config.validate()?;
        stores.sessions.spawn_purge_loop()?;
        stores.sso.spawn_scheduler()?;
        tracing::info!(admin_group = %config.permissions.admin_group, "Keyward opened");
        Ok(Self { config, stores })
    }

    /// [`open`](Self::open) over in-memory stores
    pub fn in_memory(
        config: KeywardConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self> {
        let stores = Stores::in_memory(&config, clock, ids, hasher);
        Self::open(config, stores)
    }

    /// Validated configuration
    pub fn config(&self) -> &KeywardConfig {
        &self.config
    }

    /// User account store
    pub fn users(&self) -> &Users {
        &self.stores.users
    }

    /// API key store
    pub fn api_keys(&self) -> &ApiKeys {
        &self.stores.api_keys
    }

    /// Session store
    pub fn sessions(&self) -> &Sessions {
        &self.stores.sessions
    }

    /// SSO code store
    pub fn sso(&self) -> &SsoCodes {
        &self.stores.sso
    }

    /// Group membership store
    pub fn groups(&self) -> &Groups {
        &self.stores.groups
    }

    /// Resource ACL store
    pub fn permissions(&self) -> &Permissions {
        &self.stores.permissions
    }

    /// Who is calling. API keys win over sessions; disabled users are
    /// rejected.
    pub fn resolve(&self, credentials: &Credentials) -> Result<String> {
        let user_id = if let Some(key) = credentials.api_key_value() {
            let api_key = self.stores.api_keys.get(key)?;
            if let Err(err) = self.stores.api_keys.touch(key) {
                tracing::warn!(
                    user_id = %api_key.user_id,
                    error = %err,
                    "Failed to record API key use"
                );
            }
            api_key.user_id
        } else if let Some((key, token)) = credentials.session_pair() {
            self.stores.sessions.get(key, token)?.user_id
        } else {
            return Err(KeywardError::invalid_credentials("no credentials presented"));
        };

        self.ensure_enabled(&user_id)?;
        Ok(user_id)
    }

    /// Check an email/password pair and open a session
    pub fn login(&self, email: &str, password: &str) -> Result<LoggedIn> {
        let user_id = self.stores.users.match_email(email, password)?;
        let session = self.stores.sessions.new_session(&user_id)?;
        self.record_login(&user_id);
        Ok(LoggedIn { user_id, session })
    }

    /// End the session identified by the pair
    pub fn logout(&self, key: &str, token: &str) -> Result<()> {
        self.stores.sessions.remove(key, token)
    }

    /// Open a session for an already-authenticated user
    pub fn new_session(&self, user_id: &str) -> Result<SessionPair> {
        self.ensure_enabled(user_id)?;
        self.stores.sessions.new_session(user_id)
    }

    /// Issue a login code for an existing user
    pub fn new_sso_entry(&self, user_id: &str) -> Result<Entry> {
        self.ensure_enabled(user_id)?;
        self.stores.sso.new_entry(user_id)
    }

    /// Consume a single-use login code and open a session
    pub fn sso_login(&self, login_code: &str) -> Result<LoggedIn> {
        let user_id = self.stores.sso.login(login_code)?;
        self.session_for(user_id)
    }

    /// Log in through a multi-use code, extending it by the configured grace
    pub fn sso_multi_login(&self, login_code: &str) -> Result<LoggedIn> {
        let grace = self.config.sso.multi_login_grace();
        let user_id = self.stores.sso.multi_login(login_code, grace)?;
        self.session_for(user_id)
    }

    /// Register an account.
    ///
    /// The user joins a group named after its own id (first) plus `groups`,
    /// receives a primary API key, and both that group and the admin group
    /// get full access to `user::<id>`.
    pub fn create_user<I, S>(&self, email: &str, password: &str, groups: I) -> Result<NewAccount>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let user = self.stores.users.new_user(email, password)?;
        let user_id = user.id().to_string();

        let memberships: Vec<String> = std::iter::once(user_id.clone())
            .chain(groups.into_iter().map(Into::into))
            .collect();
        self.stores.groups.add_groups(&user_id, memberships)?;

        let api_key = self.stores.api_keys.new_key(&user_id, PRIMARY_KEY_NAME)?;

        let admin_group = &self.config.permissions.admin_group;
        self.stores.permissions.set_multi_permissions(
            &resource_key(USER_RESOURCE, &user_id),
            &[
                Pair::new(&user_id, Action::ADMIN),
                Pair::new(admin_group, Action::ADMIN),
            ],
        )?;

        tracing::info!(user_id = %user_id, "Account created");
        Ok(NewAccount { user, api_key })
    }

    /// Grant `actions` to `group` and `admin_actions` to the admin group
    pub fn set_permission(
        &self,
        resource_key: &str,
        group: &str,
        actions: Action,
        admin_actions: Action,
    ) -> Result<Resource> {
        let admin_group = &self.config.permissions.admin_group;
        self.stores.permissions.set_multi_permissions(
            resource_key,
            &[Pair::new(group, actions), Pair::new(admin_group, admin_actions)],
        )
    }

    /// Drop every action `group` holds on `resource_key`
    pub fn unset_permission(&self, resource_key: &str, group: &str) -> Result<()> {
        self.stores.permissions.unset_permissions(resource_key, group)
    }

    /// Add `user_id` to `groups`, returning the full set
    pub fn add_to_group<I, S>(&self, user_id: &str, groups: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stores.groups.add_groups(user_id, groups)
    }

    /// Remove `user_id` from `groups`, returning what remains
    pub fn remove_from_group<I, S>(&self, user_id: &str, groups: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stores.groups.remove_groups(user_id, groups)
    }

    /// Deactivate the account and end every session it holds
    pub fn disable_user(&self, user_id: &str) -> Result<()> {
        self.stores.users.update_disabled(user_id, true)?;
        self.stores.sessions.invalidate_user(user_id)?;
        Ok(())
    }

    /// Reactivate a disabled account
    pub fn enable_user(&self, user_id: &str) -> Result<()> {
        self.stores.users.update_disabled(user_id, false)?;
        Ok(())
    }

    /// Fail-closed permission check
    pub fn can(&self, user_id: &str, resource_key: &str, action: Action) -> bool {
        self.stores.permissions.can(user_id, resource_key, action)
    }

    /// Permission check for a request: `method` selects the action, and a
    /// grant on either `name::id` or the collection-wide `name` suffices
    pub fn check(
        &self,
        user_id: &str,
        resource_name: &str,
        resource_id: &str,
        method: &str,
    ) -> bool {
        let Some(action) = Action::for_method(method) else {
            tracing::debug!(method, "No action for method");
            return false;
        };
        let instance = resource_key(resource_name, resource_id);
        if self.can(user_id, &instance, action) {
            return true;
        }
        !resource_id.is_empty() && self.can(user_id, resource_name, action)
    }

    /// Stop background tasks and release every store
    pub async fn close(&self) -> Result<()> {
        let results = [
            self.stores.sessions.close().await,
            self.stores.sso.close().await,
            self.stores.users.close(),
            self.stores.api_keys.close(),
            self.stores.permissions.close(),
            self.stores.groups.close(),
        ];
        tracing::info!("Keyward closed");
        results.into_iter().collect()
    }

    fn session_for(&self, user_id: String) -> Result<LoggedIn> {
        self.ensure_enabled(&user_id)?;
        let session = self.stores.sessions.new_session(&user_id)?;
        self.record_login(&user_id);
        Ok(LoggedIn { user_id, session })
    }

    fn ensure_enabled(&self, user_id: &str) -> Result<()> {
        if self.stores.users.get(user_id)?.disabled {
            return Err(KeywardError::disabled(format!("user {user_id} is disabled")));
        }
        Ok(())
    }

    fn record_login(&self, user_id: &str) {
        if let Err(err) = self.stores.users.update_last_logged_in_at(user_id) {
            tracing::warn!(user_id, error = %err, "Failed to record login time");
        }
    }
}
