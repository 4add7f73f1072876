//! The interaction element contract.
//!
//! An element is a pluggable interaction type (poll, word cloud, free text,
//! ...). The hub treats every element as an opaque [`Element`] and only
//! drives its lifecycle:
//!
//! 1. instantiate from the [`ElementCatalog`](crate::ElementCatalog)
//! 2. [`Element::wire`] the four base channels, and, if the element answers
//!    [`Element::as_data_element`], the two auxiliary data channels
//! 3. [`Element::activate`] with the admin's configuration payload
//! 4. [`Element::deactivate`] when superseded or when the session ends
//!
//! All channels are one-way and bounded. Elements must never block the
//! caller of these methods: long-running work belongs in a task spawned
//! from `activate` and stopped from `deactivate`.

use tokio::sync::mpsc;

use crate::errors::ElementError;

/// Name and configuration form an element advertises to admins.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ConfigDescriptor {
    /// Display name; also the `From` value the element answers to.
    pub name: String,
    /// One-line HTML snippet admins use to configure the element.
    pub html: String,
}

/// Element side of the four base channels.
#[derive(Debug)]
pub struct ElementChannels {
    /// Full admin view updates.
    pub admin_html: mpsc::Sender<String>,
    /// Full user view updates.
    pub user_html: mpsc::Sender<String>,
    /// Admin-originated input (`Action::AdminData` payloads).
    pub admin_input: mpsc::Receiver<String>,
    /// User-originated input (`Action::UserData` payloads).
    pub user_input: mpsc::Receiver<String>,
}

/// Hub side of the four base channels.
#[derive(Debug)]
pub struct ElementPorts {
    /// Receives admin view updates.
    pub admin_html: mpsc::Receiver<String>,
    /// Receives user view updates.
    pub user_html: mpsc::Receiver<String>,
    /// Forwards admin input to the element.
    pub admin_input: mpsc::Sender<String>,
    /// Forwards user input to the element.
    pub user_input: mpsc::Sender<String>,
}

impl ElementChannels {
    /// Create a fresh set of base channels with the given capacity.
    pub fn pair(capacity: usize) -> (ElementChannels, ElementPorts) {
        let (admin_html_tx, admin_html_rx) = mpsc::channel(capacity);
        let (user_html_tx, user_html_rx) = mpsc::channel(capacity);
        let (admin_input_tx, admin_input_rx) = mpsc::channel(capacity);
        let (user_input_tx, user_input_rx) = mpsc::channel(capacity);
        (
            ElementChannels {
                admin_html: admin_html_tx,
                user_html: user_html_tx,
                admin_input: admin_input_rx,
                user_input: user_input_rx,
            },
            ElementPorts {
                admin_html: admin_html_rx,
                user_html: user_html_rx,
                admin_input: admin_input_tx,
                user_input: user_input_tx,
            },
        )
    }
}

/// Element side of the auxiliary data-only channels.
#[derive(Debug, Clone)]
pub struct DataChannels {
    /// Incremental payloads for admin visualizations.
    pub admin_data: mpsc::Sender<String>,
    /// Incremental payloads for user visualizations.
    pub user_data: mpsc::Sender<String>,
}

/// Hub side of the auxiliary data-only channels.
#[derive(Debug)]
pub struct DataPorts {
    /// Receives admin data payloads.
    pub admin_data: mpsc::Receiver<String>,
    /// Receives user data payloads.
    pub user_data: mpsc::Receiver<String>,
}

impl DataChannels {
    /// Create a fresh pair of data channels with the given capacity.
    pub fn pair(capacity: usize) -> (DataChannels, DataPorts) {
        let (admin_tx, admin_rx) = mpsc::channel(capacity);
        let (user_tx, user_rx) = mpsc::channel(capacity);
        (
            DataChannels {
                admin_data: admin_tx,
                user_data: user_tx,
            },
            DataPorts {
                admin_data: admin_rx,
                user_data: user_rx,
            },
        )
    }
}

/// Base capability every element implements.
pub trait Element: Send {
    /// Name and configuration form shown to admins.
    fn config_descriptor(&self) -> ConfigDescriptor;

    /// Hand the element its base channels. Called once, before `activate`.
    fn wire(&mut self, channels: ElementChannels);

    /// Start the element with the admin-supplied configuration.
    fn activate(&mut self, payload: &str) -> Result<(), ElementError>;

    /// Stop the element and release everything it holds.
    fn deactivate(&mut self);

    /// Snapshot of the admin view, sent to admins that attach late.
    fn last_admin_html(&self) -> String;

    /// Snapshot of the user view, sent to users that attach late.
    fn last_user_html(&self) -> String;

    /// Data-channel capability, if supported.
    fn as_data_element(&mut self) -> Option<&mut dyn DataElement> {
        None
    }

    /// Export capability, if supported.
    fn as_downloadable(&self) -> Option<&dyn Downloadable> {
        None
    }
}

/// Elements that push incremental visualization payloads.
pub trait DataElement {
    /// Hand the element its data channels. Called once, before `activate`.
    fn wire_data(&mut self, channels: DataChannels);
}

/// Elements whose result an admin can download.
pub trait Downloadable {
    /// Serialize the current result.
    fn export_result(&self) -> Vec<u8>;
}
