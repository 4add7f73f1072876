//! Per-role connection sets and fan-out.

use std::collections::BTreeMap;
use std::sync::Arc;

use lectern_core::Envelope;
use tracing::{debug, warn};

use super::connection::{ClientConnection, Role};

/// Admin and user connections of one session.
#[derive(Debug, Default)]
pub struct Members {
    admins: BTreeMap<u64, Arc<ClientConnection>>,
    users: BTreeMap<u64, Arc<ClientConnection>>,
}

impl Members {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, role: Role) -> &BTreeMap<u64, Arc<ClientConnection>> {
        match role {
            Role::Admin => &self.admins,
            Role::User => &self.users,
        }
    }

    /// Add a connection under its own role.
    pub fn insert(&mut self, connection: Arc<ClientConnection>) {
        let set = match connection.role {
            Role::Admin => &mut self.admins,
            Role::User => &mut self.users,
        };
        let _ = set.insert(connection.id, connection);
    }

    /// Remove a connection by ID from whichever set holds it.
    pub fn remove(&mut self, id: u64) -> Option<Arc<ClientConnection>> {
        self.admins.remove(&id).or_else(|| self.users.remove(&id))
    }

    /// Look up a connection by ID.
    pub fn get(&self, id: u64) -> Option<&Arc<ClientConnection>> {
        self.admins.get(&id).or_else(|| self.users.get(&id))
    }

    /// Whether both sets are empty.
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty() && self.users.is_empty()
    }

    /// Number of connections with `role`.
    pub fn count(&self, role: Role) -> usize {
        self.set(role).len()
    }

    /// Total number of connections.
    pub fn len(&self) -> usize {
        self.admins.len() + self.users.len()
    }

    /// Send an envelope to every connection with `role`.
    ///
    /// The envelope is encoded once. Full queues drop the frame; returns the
    /// number of connections that accepted it.
    pub fn broadcast(&self, role: Role, envelope: &Envelope) -> usize {
        let frame = match envelope.encode() {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                warn!(action = %envelope.action, error = %e, "failed to encode envelope");
                return 0;
            }
        };
        let set = self.set(role);
        let delivered = set.values().filter(|conn| conn.send(frame.clone())).count();
        debug!(
            %role,
            action = %envelope.action,
            recipients = set.len(),
            delivered,
            "broadcast envelope"
        );
        delivered
    }
}
