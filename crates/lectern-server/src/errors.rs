//! Server error types.

use thiserror::Error;

/// Failures reported by an [`Authenticator`](crate::auth::Authenticator) backend.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend could not answer (unreachable directory, unreadable file, ...).
    #[error("authentication backend failed: {0}")]
    Backend(String),
}

/// Why a session could not be entered or created.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Creating a session requires credentials and none were supplied.
    #[error("credentials required to create a session")]
    CredentialsRequired,
    /// The supplied credentials were rejected.
    #[error("credentials rejected")]
    Rejected,
    /// The authenticator itself failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Hub operations that can fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// The hub has been shut down; no new connections are accepted.
    #[error("session hub is closed")]
    Closed,
}

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Reading the bound address or serving failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_wraps_auth_error() {
        let err: RegistryError = AuthError::Backend("ldap down".into()).into();
        assert_eq!(err.to_string(), "authentication backend failed: ldap down");
    }

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:80".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("failed to bind 0.0.0.0:80"));
    }

    #[test]
    fn hub_closed_message() {
        assert_eq!(HubError::Closed.to_string(), "session hub is closed");
    }
}
