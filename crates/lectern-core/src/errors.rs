//! Error types shared by the envelope codec, elements, and the catalog.

use thiserror::Error;

/// Failure to decode or encode a wire envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame was not a valid JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure reported by an element's activation entry point.
#[derive(Debug, Error)]
pub enum ElementError {
    /// The configuration payload could not be parsed.
    #[error("invalid activation payload: {0}")]
    Payload(#[from] serde_json::Error),
    /// The payload parsed but is missing something the element needs.
    #[error("incomplete activation payload: {0}")]
    Incomplete(String),
    /// The element was activated before its channels were wired.
    #[error("element channels not wired")]
    NotWired,
}

/// Failure to register an element factory.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// A factory with this name already exists.
    #[error("element already registered: {0}")]
    AlreadyRegistered(String),
    /// Names starting with `_` collide with the global sender namespace.
    #[error("element name is reserved: {0}")]
    ReservedName(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
