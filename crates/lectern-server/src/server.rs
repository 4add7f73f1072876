//! `LecternServer`: axum HTTP + WebSocket surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::rejection::{ExtensionRejection, FormRejection};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, Form, Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use lectern_core::ConfigDescriptor;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::{RegistryError, ServerError};
use crate::health::{self, HealthResponse};
use crate::hub::SessionHub;
use crate::real_ip::resolve_real_ip;
use crate::reaper::run_reaper;
use crate::registry::{Entry, SessionRegistry};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::Role;
use crate::websocket::session::{Liveness, run_ws_session};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Every live session.
    pub registry: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The Lectern server.
pub struct LecternServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

/// Handle returned by [`LecternServer::listen`]; owns the background tasks.
#[derive(Debug)]
pub struct ServerHandle {
    /// Bound address.
    pub addr: SocketAddr,
    server: JoinHandle<()>,
    reaper: JoinHandle<()>,
}

impl ServerHandle {
    /// Bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Background tasks, for [`ShutdownCoordinator::graceful_shutdown`].
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        vec![self.server, self.reaper]
    }
}

impl LecternServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router, nested under `server_path` when one is set.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        let routes = Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .route("/{*key}", get(session_entry).post(session_entry))
            .with_state(state);

        let routes = if self.config.server_path.is_empty() {
            routes
        } else {
            Router::new().nest(&self.config.server_path, routes)
        };
        routes.layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and start serving and reaping in the background.
    pub async fn listen(&self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let service = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, service)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server stopped with error");
            }
        });
        let reaper = tokio::spawn(run_reaper(
            self.registry.clone(),
            self.config.reaper_interval,
            self.shutdown.token(),
        ));

        info!(
            addr = %local_addr,
            server_path = %self.config.server_path,
            "lectern server listening"
        );
        Ok(ServerHandle {
            addr: local_addr,
            server,
            reaper,
        })
    }

    /// Shut every session down and wait for the background tasks.
    pub async fn stop(&self, handle: ServerHandle, timeout: Option<Duration>) {
        self.shutdown
            .graceful_shutdown(&self.registry, handle.into_tasks(), timeout)
            .await;
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.len(),
        state.registry.connection_count(),
    ))
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPage {
    /// Public base URL.
    pub server_name: String,
    /// Registered element names.
    pub elements: Vec<String>,
    /// Whether creating a session needs a login.
    pub require_auth_for_new: bool,
}

/// GET /
async fn index_handler(State(state): State<AppState>) -> Json<IndexPage> {
    Json(IndexPage {
        server_name: state.config.server_name.clone(),
        elements: state.registry.catalog().names(),
        require_auth_for_new: state.registry.requires_credentials(),
    })
}

/// Query parameters of a session URL.
#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    /// Admin secret.
    pub admin: Option<String>,
    /// Present on WebSocket upgrade requests.
    pub ws: Option<String>,
}

/// Login form posted to create a guarded session.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    /// Username.
    pub name: String,
    /// Password.
    pub password: String,
}

/// One element offered on the admin page.
#[derive(Debug, Serialize)]
pub struct ElementEntry {
    /// Registered name.
    pub name: String,
    /// Configuration form.
    pub config: ConfigDescriptor,
}

/// Descriptor returned to an admin's non-upgrade request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPage {
    /// Session key.
    pub key: String,
    /// Public URL to hand to the audience.
    pub url: String,
    /// WebSocket path for the admin view.
    pub socket: String,
    /// Elements the admin can activate.
    pub elements: Vec<ElementEntry>,
}

/// Descriptor returned to a user's non-upgrade request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    /// Session key.
    pub key: String,
    /// WebSocket path for the user view.
    pub socket: String,
}

/// Descriptor asking for credentials before a session is created.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPage {
    /// Session key that would be created.
    pub key: String,
    /// Always `true`.
    pub login_required: bool,
}

/// GET|POST /{key}
#[allow(clippy::too_many_arguments)]
async fn session_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<EntryQuery>,
    method: Method,
    headers: HeaderMap,
    peer: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let peer = peer.ok().map(|ConnectInfo(addr)| addr);
    let wants_socket = query.ws.is_some();

    if let Some(secret) = &query.admin {
        let Some(hub) = state.registry.authorize_admin(&key, secret) else {
            log_failed_login(&state, peer, &headers, &key, "wrong admin secret");
            return StatusCode::FORBIDDEN.into_response();
        };
        if wants_socket {
            return upgrade_to(upgrade, &state, hub, Role::Admin);
        }
        return Json(admin_page(&state, &key, secret)).into_response();
    }

    if let Some(hub) = state.registry.lookup(&key) {
        if wants_socket {
            return upgrade_to(upgrade, &state, hub, Role::User);
        }
        return Json(UserPage {
            socket: socket_path(&state.config, &key, None),
            key,
        })
        .into_response();
    }

    if wants_socket {
        return StatusCode::NOT_FOUND.into_response();
    }

    let is_post = method == Method::POST;
    if state.registry.requires_credentials() && !is_post {
        return Json(LoginPage {
            key,
            login_required: true,
        })
        .into_response();
    }

    let credentials = match &form {
        Ok(Form(login)) if is_post => Some((login.name.as_str(), login.password.as_str())),
        _ => None,
    };
    match state.registry.get_or_create(&key, credentials) {
        Ok(Entry::Created(hub)) => redirect(&format!(
            "{}/{key}?admin={}",
            state.config.server_path,
            hub.admin_secret()
        )),
        Ok(Entry::Existing(_)) => redirect(&format!("{}/{key}", state.config.server_path)),
        Err(RegistryError::CredentialsRequired | RegistryError::Rejected) => {
            log_failed_login(&state, peer, &headers, &key, "session creation rejected");
            StatusCode::FORBIDDEN.into_response()
        }
        Err(e) => {
            error!(session = %key, error = %e, "session creation failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn upgrade_to(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    state: &AppState,
    hub: Arc<SessionHub>,
    role: Role,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let liveness = Liveness {
        ping_interval: state.config.ping_interval,
        pong_timeout: state.config.pong_timeout,
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, hub, role, liveness))
}

fn admin_page(state: &AppState, key: &str, secret: &str) -> AdminPage {
    AdminPage {
        key: key.to_string(),
        url: state.config.public_url(key),
        socket: socket_path(&state.config, key, Some(secret)),
        elements: state
            .registry
            .catalog()
            .descriptors()
            .into_iter()
            .map(|(name, config)| ElementEntry { name, config })
            .collect(),
    }
}

fn socket_path(config: &ServerConfig, key: &str, admin: Option<&str>) -> String {
    match admin {
        Some(secret) => format!("{}/{key}?admin={secret}&ws=1", config.server_path),
        None => format!("{}/{key}?ws=1", config.server_path),
    }
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn log_failed_login(
    state: &AppState,
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    key: &str,
    reason: &str,
) {
    if state.config.log_failed_login {
        let ip = resolve_real_ip(peer, headers);
        warn!(session = %key, %ip, reason, "failed login");
    }
}
