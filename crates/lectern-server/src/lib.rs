//! # lectern-server
//!
//! Session hubs, the session registry, and the axum HTTP + `WebSocket`
//! surface.
//!
//! - One [`SessionHub`] actor per session owns its connections and the
//!   active element, and fans element output out per role
//! - The [`SessionRegistry`] maps session keys to hubs and guards creation
//! - The idle reaper removes hubs nobody is connected to
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod real_ip;
pub mod reaper;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{Authenticator, CredentialTable};
pub use config::{HubConfig, ServerConfig};
pub use errors::{AuthError, HubError, RegistryError, ServerError};
pub use hub::SessionHub;
pub use registry::{Entry, SessionRegistry};
pub use server::{LecternServer, ServerHandle};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
pub use websocket::connection::Role;
