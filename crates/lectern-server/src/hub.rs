//! One session's actor: connection sets, the active element, and fan-out.
//!
//! Every mutation of a session runs on the hub's event loop, one event at a
//! time. Readers hand frames over through a bounded inbound queue; element
//! output and the connected-count tick are multiplexed on the same loop.
//! `attach_*` / `detach` run on the caller's task and take the state mutex
//! directly, so a new connection gets its snapshot without a round-trip.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lectern_core::{
    Action, DataChannels, DataPorts, Element, ElementCatalog, ElementChannels, ElementPorts,
    Envelope, Icon, IconCounters,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::secrets_match;
use crate::config::HubConfig;
use crate::errors::HubError;
use crate::websocket::broadcast::Members;
use crate::websocket::connection::{ClientConnection, Role};

/// One frame handed from a reader task to the hub loop.
#[derive(Debug)]
struct Inbound {
    conn_id: u64,
    role: Role,
    frame: String,
}

struct ActiveElement {
    name: String,
    element: Box<dyn Element>,
}

#[derive(Default)]
struct HubState {
    members: Members,
    active: Option<ActiveElement>,
    icons: IconCounters,
    closed: bool,
}

/// Handle to a running session hub.
pub struct SessionHub {
    key: String,
    admin_secret: String,
    state: Arc<Mutex<HubState>>,
    inbound: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
    next_conn_id: AtomicU64,
    config: HubConfig,
}

impl std::fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHub")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionHub {
    /// Create a hub and start its event loop on the current runtime.
    pub fn spawn(
        key: impl Into<String>,
        admin_secret: impl Into<String>,
        catalog: Arc<ElementCatalog>,
        config: HubConfig,
    ) -> Arc<Self> {
        let key = key.into();
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let state = Arc::new(Mutex::new(HubState::default()));
        let cancel = CancellationToken::new();

        let event_loop = HubLoop {
            key: key.clone(),
            state: state.clone(),
            catalog,
            queue_capacity: config.element_queue_capacity,
            wiring: Wiring::default(),
        };
        drop(tokio::spawn(event_loop.run(
            inbound_rx,
            cancel.clone(),
            config.tick_interval,
        )));
        info!(session = %key, "session hub started");

        Arc::new(Self {
            key,
            admin_secret: admin_secret.into(),
            state,
            inbound: inbound_tx,
            cancel,
            next_conn_id: AtomicU64::new(1),
            config,
        })
    }

    /// Session key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Secret that grants admin access.
    pub fn admin_secret(&self) -> &str {
        &self.admin_secret
    }

    /// Whether `provided` is this session's admin secret.
    pub fn check_admin_secret(&self, provided: &str) -> bool {
        secrets_match(&self.admin_secret, provided)
    }

    /// Allocate a connection and its outbound queue. Not yet attached.
    pub fn new_connection(&self, role: Role) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        (Arc::new(ClientConnection::new(id, role, tx, &self.cancel)), rx)
    }

    /// Register an admin and send it the current session snapshot.
    pub fn attach_admin(&self, conn: Arc<ClientConnection>) -> Result<(), HubError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(HubError::Closed);
        }
        state.members.insert(conn.clone());

        if let Some(active) = &state.active {
            let html = active.element.last_admin_html();
            let _ = conn.send_envelope(&Envelope::new(&active.name, Action::HtmlUpdate, html));
        }
        for (icon, count) in state.icons.iter() {
            let _ = conn.send_envelope(&Envelope::global(Action::IconCount(icon), count.to_string()));
        }
        let users = state.members.count(Role::User);
        let _ = conn.send_envelope(&Envelope::global(Action::ConnectedCount, users.to_string()));
        if let Some(active) = &state.active {
            if active.element.as_downloadable().is_some() {
                let _ = conn.send_envelope(&Envelope::global(Action::CanDownload, "true"));
            }
        }
        debug!(session = %self.key, conn_id = conn.id, "admin attached");
        Ok(())
    }

    /// Register a user and send it the current view.
    pub fn attach_user(&self, conn: Arc<ClientConnection>) -> Result<(), HubError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(HubError::Closed);
        }
        state.members.insert(conn.clone());
        if let Some(active) = &state.active {
            let html = active.element.last_user_html();
            let _ = conn.send_envelope(&Envelope::new(&active.name, Action::HtmlUpdate, html));
        }
        debug!(session = %self.key, conn_id = conn.id, "user attached");
        Ok(())
    }

    /// Attach under the connection's own role.
    pub fn attach(&self, conn: Arc<ClientConnection>) -> Result<(), HubError> {
        match conn.role {
            Role::Admin => self.attach_admin(conn),
            Role::User => self.attach_user(conn),
        }
    }

    /// Remove a connection from whichever set holds it.
    pub fn detach(&self, conn_id: u64) {
        if let Some(conn) = self.state.lock().members.remove(conn_id) {
            debug!(
                session = %self.key,
                conn_id,
                role = %conn.role,
                dropped = conn.drop_count(),
                "connection detached"
            );
        }
    }

    /// Whether any admin or user is attached.
    pub fn has_connections(&self) -> bool {
        !self.state.lock().members.is_empty()
    }

    /// Number of attached connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().members.len()
    }

    /// Name of the active element, if any.
    pub fn active_element(&self) -> Option<String> {
        self.state.lock().active.as_ref().map(|a| a.name.clone())
    }

    /// Current icon counters.
    pub fn icon_counts(&self) -> IconCounters {
        self.state.lock().icons.clone()
    }

    /// Hand a frame from `conn` to the event loop.
    ///
    /// Waits at most the configured inbound timeout; on timeout the frame is
    /// dropped and `false` returned.
    pub async fn deliver(&self, conn: &ClientConnection, frame: String) -> bool {
        let msg = Inbound {
            conn_id: conn.id,
            role: conn.role,
            frame,
        };
        match self.inbound.send_timeout(msg, self.config.inbound_timeout).await {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(session = %self.key, conn_id = conn.id, "hub busy, dropping inbound frame");
                false
            }
            Err(SendTimeoutError::Closed(_)) => false,
        }
    }

    /// Deactivate the element and stop the loop.
    ///
    /// Returns `true` only for the call that actually shut the hub down.
    pub fn shutdown(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            if let Some(mut active) = state.active.take() {
                active.element.deactivate();
                debug!(session = %self.key, element = %active.name, "element deactivated");
            }
            state.members = Members::new();
        }
        self.cancel.cancel();
        info!(session = %self.key, "session hub stopped");
        true
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Hub-side ends of the active element's channels.
#[derive(Default)]
struct Wiring {
    element: String,
    admin_html: Option<mpsc::Receiver<String>>,
    user_html: Option<mpsc::Receiver<String>>,
    admin_data: Option<mpsc::Receiver<String>>,
    user_data: Option<mpsc::Receiver<String>>,
    admin_input: Option<mpsc::Sender<String>>,
    user_input: Option<mpsc::Sender<String>>,
}

impl Wiring {
    fn new(element: &str, ports: ElementPorts, data: Option<DataPorts>) -> Self {
        let (admin_data, user_data) = match data {
            Some(d) => (Some(d.admin_data), Some(d.user_data)),
            None => (None, None),
        };
        Self {
            element: element.to_string(),
            admin_html: Some(ports.admin_html),
            user_html: Some(ports.user_html),
            admin_data,
            user_data,
            admin_input: Some(ports.admin_input),
            user_input: Some(ports.user_input),
        }
    }
}

/// Next message from an optional receiver; pends forever when unset.
///
/// A closed channel clears the slot.
async fn next_output(slot: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    let Some(rx) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let msg = rx.recv().await;
    if msg.is_none() {
        *slot = None;
    }
    msg
}

struct HubLoop {
    key: String,
    state: Arc<Mutex<HubState>>,
    catalog: Arc<ElementCatalog>,
    queue_capacity: usize,
    wiring: Wiring,
}

impl HubLoop {
    async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        cancel: CancellationToken,
        tick_interval: std::time::Duration,
    ) {
        let mut tick = interval_at(Instant::now() + tick_interval, tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(msg) = inbound.recv() => self.handle_inbound(msg),
                Some(html) = next_output(&mut self.wiring.admin_html) => {
                    self.fan_out(Role::Admin, Action::HtmlUpdate, html);
                }
                Some(html) = next_output(&mut self.wiring.user_html) => {
                    self.fan_out(Role::User, Action::HtmlUpdate, html);
                }
                Some(data) = next_output(&mut self.wiring.admin_data) => {
                    self.fan_out(Role::Admin, Action::DataUpdate, data);
                }
                Some(data) = next_output(&mut self.wiring.user_data) => {
                    self.fan_out(Role::User, Action::DataUpdate, data);
                }
                _ = tick.tick() => self.publish_connected(),
            }
        }
        debug!(session = %self.key, "hub loop exited");
    }

    fn handle_inbound(&mut self, msg: Inbound) {
        let envelope = match Envelope::decode(&msg.frame) {
            Ok(env) => env,
            Err(e) => {
                warn!(
                    session = %self.key,
                    conn_id = msg.conn_id,
                    role = %msg.role,
                    error = %e,
                    "dropping malformed envelope"
                );
                return;
            }
        };
        match (msg.role, &envelope.action) {
            (Role::Admin, Action::ResetIcons) => self.reset_icons(),
            (Role::Admin, Action::Activate) => self.activate(&envelope.from, &envelope.data),
            (Role::Admin, Action::AdminData) => self.forward(Role::Admin, &envelope),
            (Role::Admin, Action::RequestDownload) => self.download(msg.conn_id),
            (Role::User, Action::IconEvent) => self.raise_icon(&envelope.data),
            (Role::User, Action::UserData) => self.forward(Role::User, &envelope),
            (role, action) => {
                debug!(session = %self.key, %role, %action, "ignoring envelope");
            }
        }
    }

    fn reset_icons(&self) {
        let mut state = self.state.lock();
        state.icons.reset();
        for icon in Icon::ALL {
            let _ = state
                .members
                .broadcast(Role::Admin, &Envelope::global(Action::IconCount(icon), "0"));
        }
    }

    fn raise_icon(&self, data: &str) {
        let Ok(icon) = data.parse::<Icon>() else {
            debug!(session = %self.key, icon = data, "unknown icon");
            return;
        };
        let mut state = self.state.lock();
        let count = state.icons.increment(icon);
        let _ = state.members.broadcast(
            Role::Admin,
            &Envelope::global(Action::IconCount(icon), count.to_string()),
        );
    }

    fn activate(&mut self, name: &str, payload: &str) {
        let mut state = self.state.lock();
        if state.closed {
            debug!(session = %self.key, element = name, "hub closed, ignoring activation");
            return;
        }
        if let Some(mut old) = state.active.take() {
            old.element.deactivate();
            debug!(session = %self.key, element = %old.name, "element deactivated");
        }
        self.wiring = Wiring::default();

        let Some(mut element) = self.catalog.create(name) else {
            warn!(session = %self.key, element = name, "unknown element");
            withdraw_download(&state.members);
            return;
        };
        let (channels, ports) = ElementChannels::pair(self.queue_capacity);
        element.wire(channels);
        let data_ports = element.as_data_element().map(|data| {
            let (channels, ports) = DataChannels::pair(self.queue_capacity);
            data.wire_data(channels);
            ports
        });
        if let Err(e) = element.activate(payload) {
            warn!(session = %self.key, element = name, error = %e, "element activation failed");
            withdraw_download(&state.members);
            return;
        }

        let downloadable = element.as_downloadable().is_some();
        self.wiring = Wiring::new(name, ports, data_ports);
        state.active = Some(ActiveElement {
            name: name.to_string(),
            element,
        });
        let _ = state.members.broadcast(
            Role::Admin,
            &Envelope::global(Action::CanDownload, downloadable.to_string()),
        );
        info!(session = %self.key, element = name, downloadable, "element activated");
    }

    fn forward(&self, role: Role, envelope: &Envelope) {
        if self.wiring.element.is_empty() || envelope.from != self.wiring.element {
            debug!(session = %self.key, from = %envelope.from, "input for inactive element");
            return;
        }
        let input = match role {
            Role::Admin => &self.wiring.admin_input,
            Role::User => &self.wiring.user_input,
        };
        let Some(input) = input else { return };
        match input.try_send(envelope.data.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(session = %self.key, element = %envelope.from, %role, "element input full, dropping");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session = %self.key, element = %envelope.from, %role, "element input closed");
            }
        }
    }

    fn download(&self, conn_id: u64) {
        let state = self.state.lock();
        let Some(active) = &state.active else { return };
        let Some(exporter) = active.element.as_downloadable() else {
            debug!(session = %self.key, element = %active.name, "element is not downloadable");
            return;
        };
        let data = STANDARD.encode(exporter.export_result());
        if let Some(conn) = state.members.get(conn_id) {
            let _ = conn.send_envelope(&Envelope::global(Action::DownloadPayload, data));
        }
    }

    fn fan_out(&self, role: Role, action: Action, data: String) {
        let envelope = Envelope::new(self.wiring.element.clone(), action, data);
        let _ = self.state.lock().members.broadcast(role, &envelope);
    }

    fn publish_connected(&self) {
        let state = self.state.lock();
        let users = state.members.count(Role::User);
        let _ = state
            .members
            .broadcast(Role::Admin, &Envelope::global(Action::ConnectedCount, users.to_string()));
    }
}

/// Tell admins the download button no longer applies.
fn withdraw_download(members: &Members) {
    let _ = members.broadcast(Role::Admin, &Envelope::global(Action::CanDownload, "false"));
}
