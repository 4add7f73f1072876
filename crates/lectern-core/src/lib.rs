//! # lectern-core
//!
//! Shared vocabulary for the Lectern live-interaction server.
//!
//! - **Envelopes**: the `{From, Action, Data}` wire message and its codec
//! - **Icons**: the five reaction icons and their per-session counters
//! - **Elements**: the capability-tagged contract every interaction element
//!   implements, plus the channel bundles the hub wires into it
//! - **Catalog**: the named factory table elements are instantiated from
//! - **Errors**: `thiserror` enums for each of the above

#![deny(unsafe_code)]

pub mod catalog;
pub mod element;
pub mod envelope;
pub mod errors;
pub mod icons;

pub use catalog::{ElementCatalog, ElementFactory};
pub use element::{
    ConfigDescriptor, DataChannels, DataElement, DataPorts, Downloadable, Element,
    ElementChannels, ElementPorts,
};
pub use envelope::{Action, Envelope, GLOBAL_SENDER};
pub use errors::{CatalogError, ElementError, EnvelopeError};
pub use icons::{Icon, IconCounters};
