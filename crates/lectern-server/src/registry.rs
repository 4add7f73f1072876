//! Process-wide map from session key to hub.

use std::collections::HashMap;
use std::sync::Arc;

use lectern_core::ElementCatalog;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::auth::{Authenticator, generate_admin_secret};
use crate::config::HubConfig;
use crate::errors::RegistryError;
use crate::hub::SessionHub;

/// Result of [`SessionRegistry::get_or_create`].
#[derive(Debug, Clone)]
pub enum Entry {
    /// The session already existed.
    Existing(Arc<SessionHub>),
    /// The session was created by this call.
    Created(Arc<SessionHub>),
}

impl Entry {
    /// The hub, however it was obtained.
    pub fn hub(&self) -> &Arc<SessionHub> {
        match self {
            Self::Existing(hub) | Self::Created(hub) => hub,
        }
    }

    /// Whether this call created the session.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Owns every live session hub.
pub struct SessionRegistry {
    hubs: Mutex<HashMap<String, Arc<SessionHub>>>,
    catalog: Arc<ElementCatalog>,
    hub_config: HubConfig,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("guarded", &self.requires_credentials())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Registry whose sessions anyone may create.
    pub fn new(catalog: Arc<ElementCatalog>, hub_config: HubConfig) -> Self {
        Self {
            hubs: Mutex::new(HashMap::new()),
            catalog,
            hub_config,
            authenticator: None,
        }
    }

    /// Require credentials accepted by `authenticator` to create sessions.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Whether creating a session needs credentials.
    pub fn requires_credentials(&self) -> bool {
        self.authenticator.is_some()
    }

    /// Element catalog shared by every hub.
    pub fn catalog(&self) -> &Arc<ElementCatalog> {
        &self.catalog
    }

    /// Return the hub for `key`, creating it if allowed.
    ///
    /// Existing sessions never need credentials. Authentication runs outside
    /// the map lock; a concurrent creator of the same key wins and this call
    /// returns its hub as [`Entry::Existing`].
    pub fn get_or_create(
        &self,
        key: &str,
        credentials: Option<(&str, &str)>,
    ) -> Result<Entry, RegistryError> {
        if let Some(hub) = self.lookup(key) {
            return Ok(Entry::Existing(hub));
        }
        if let Some(authenticator) = &self.authenticator {
            let Some((user, password)) = credentials.filter(|(u, p)| !u.is_empty() && !p.is_empty())
            else {
                return Err(RegistryError::CredentialsRequired);
            };
            if !authenticator.authenticate(user, password)? {
                return Err(RegistryError::Rejected);
            }
        }

        let mut hubs = self.hubs.lock();
        if let Some(hub) = hubs.get(key) {
            return Ok(Entry::Existing(hub.clone()));
        }
        let hub = SessionHub::spawn(
            key,
            generate_admin_secret(),
            self.catalog.clone(),
            self.hub_config.clone(),
        );
        let _ = hubs.insert(key.to_string(), hub.clone());
        info!(session = key, sessions = hubs.len(), "session created");
        Ok(Entry::Created(hub))
    }

    /// Existing hub for `key`.
    pub fn lookup(&self, key: &str) -> Option<Arc<SessionHub>> {
        self.hubs.lock().get(key).cloned()
    }

    /// Hub for `key` if `secret` is its admin secret.
    pub fn authorize_admin(&self, key: &str, secret: &str) -> Option<Arc<SessionHub>> {
        self.lookup(key).filter(|hub| hub.check_admin_secret(secret))
    }

    /// Remove `key` and shut its hub down.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.hubs.lock().remove(key);
        match removed {
            Some(hub) => {
                let _ = hub.shutdown();
                true
            }
            None => false,
        }
    }

    /// Shut down and remove every hub without connections.
    ///
    /// Runs under the map lock so a concurrent `get_or_create` cannot hand
    /// out a hub that is being reaped. Returns the removed keys.
    pub fn reap_idle(&self) -> Vec<String> {
        let mut hubs = self.hubs.lock();
        let idle: Vec<String> = hubs
            .iter()
            .filter(|(_, hub)| !hub.has_connections())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            if let Some(hub) = hubs.remove(key) {
                if !hub.shutdown() {
                    warn!(session = %key, "reaped hub was already shut down");
                }
            }
        }
        idle
    }

    /// Shut down every hub.
    pub fn shutdown_all(&self) -> usize {
        let hubs: Vec<_> = self.hubs.lock().drain().map(|(_, hub)| hub).collect();
        let count = hubs.iter().filter(|hub| hub.shutdown()).count();
        info!(sessions = count, "all sessions shut down");
        count
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.hubs.lock().len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.hubs.lock().is_empty()
    }

    /// Attached connections across every session.
    pub fn connection_count(&self) -> usize {
        let hubs: Vec<_> = self.hubs.lock().values().cloned().collect();
        hubs.iter().map(|hub| hub.connection_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::auth::CredentialTable;
    use crate::errors::AuthError;
    use crate::websocket::connection::Role;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(ElementCatalog::new()), HubConfig::default())
    }

    fn guarded() -> SessionRegistry {
        let mut table = BTreeMap::new();
        let _ = table.insert("alice".to_string(), "pw".to_string());
        registry().with_authenticator(Arc::new(CredentialTable::new(table)))
    }

    struct Broken;

    impl Authenticator for Broken {
        fn authenticate(&self, _user: &str, _password: &str) -> Result<bool, AuthError> {
            Err(AuthError::Backend("directory unreachable".into()))
        }
    }

    #[tokio::test]
    async fn creates_once_then_returns_existing() {
        let reg = registry();
        let first = reg.get_or_create("room", None).unwrap();
        assert!(first.is_created());
        let second = reg.get_or_create("room", None).unwrap();
        assert!(!second.is_created());
        assert!(Arc::ptr_eq(first.hub(), second.hub()));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn each_session_gets_its_own_secret() {
        let reg = registry();
        let a = reg.get_or_create("a", None).unwrap();
        let b = reg.get_or_create("b", None).unwrap();
        assert_ne!(a.hub().admin_secret(), b.hub().admin_secret());
    }

    #[tokio::test]
    async fn guarded_creation_needs_accepted_credentials() {
        let reg = guarded();
        assert!(matches!(
            reg.get_or_create("room", None),
            Err(RegistryError::CredentialsRequired)
        ));
        assert!(matches!(
            reg.get_or_create("room", Some(("alice", ""))),
            Err(RegistryError::CredentialsRequired)
        ));
        assert!(matches!(
            reg.get_or_create("room", Some(("alice", "nope"))),
            Err(RegistryError::Rejected)
        ));
        assert!(reg.is_empty());
        assert!(reg.get_or_create("room", Some(("alice", "pw"))).unwrap().is_created());
        // Entering an existing session needs nothing.
        assert!(!reg.get_or_create("room", None).unwrap().is_created());
    }

    #[tokio::test]
    async fn authenticator_failure_surfaces() {
        let reg = registry().with_authenticator(Arc::new(Broken));
        assert!(matches!(
            reg.get_or_create("room", Some(("a", "b"))),
            Err(RegistryError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn authorize_admin_checks_secret() {
        let reg = registry();
        let secret = reg.get_or_create("room", None).unwrap().hub().admin_secret().to_string();
        assert!(reg.authorize_admin("room", &secret).is_some());
        assert!(reg.authorize_admin("room", "wrong").is_none());
        assert!(reg.authorize_admin("other", &secret).is_none());
    }

    #[tokio::test]
    async fn reap_removes_only_idle_hubs_once() {
        let reg = registry();
        let idle = reg.get_or_create("idle", None).unwrap().hub().clone();
        let busy = reg.get_or_create("busy", None).unwrap().hub().clone();
        let (conn, _rx) = busy.new_connection(Role::User);
        busy.attach_user(conn).unwrap();

        assert_eq!(reg.reap_idle(), vec!["idle".to_string()]);
        assert!(idle.is_closed());
        assert!(!idle.shutdown());
        assert!(!busy.is_closed());
        assert!(reg.reap_idle().is_empty());
        assert!(reg.lookup("idle").is_none());
        assert_eq!(reg.connection_count(), 1);
    }

    #[tokio::test]
    async fn reaped_key_is_recreated_fresh() {
        let reg = registry();
        let old = reg.get_or_create("room", None).unwrap().hub().clone();
        let _ = reg.reap_idle();
        let new = reg.get_or_create("room", None).unwrap();
        assert!(new.is_created());
        assert!(!Arc::ptr_eq(&old, new.hub()));
    }

    #[tokio::test]
    async fn remove_and_shutdown_all() {
        let reg = registry();
        let a = reg.get_or_create("a", None).unwrap().hub().clone();
        let _ = reg.get_or_create("b", None).unwrap();
        let _ = reg.get_or_create("c", None).unwrap();
        assert!(reg.remove("a"));
        assert!(!reg.remove("a"));
        assert!(a.is_closed());
        assert_eq!(reg.shutdown_all(), 2);
        assert!(reg.is_empty());
    }
}
