//! The `{From, Action, Data}` envelope exchanged over every connection.
//!
//! Envelopes are the only unit of exchange between a browser and its hub,
//! and between the hub and the active element. On the wire each envelope is
//! one JSON object per WebSocket text frame:
//!
//! ```json
//! {"From": "Question", "Action": "user", "Data": "0"}
//! ```
//!
//! `From` names either the active element or [`GLOBAL_SENDER`] for messages
//! that belong to the hub itself (icon counters, connected count, download
//! advertisement).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::EnvelopeError;
use crate::icons::Icon;

/// Reserved `From` value for hub-global messages.
pub const GLOBAL_SENDER: &str = "_global";

/// What an envelope asks for or reports.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Action {
    /// Admin → hub: activate the element named in `From` with `Data` as config.
    Activate,
    /// User → element: element-specific input.
    UserData,
    /// Admin → element: element-specific input.
    AdminData,
    /// Admin → hub: zero all reaction counters.
    ResetIcons,
    /// User → hub: raise the reaction named in `Data`.
    IconEvent,
    /// Hub → admin: new value of one reaction counter.
    IconCount(Icon),
    /// Hub → client: replace the element view with `Data`.
    HtmlUpdate,
    /// Hub → client: incremental visualization payload.
    DataUpdate,
    /// Admin → hub: export the active element's result.
    RequestDownload,
    /// Hub → one admin: exported result.
    DownloadPayload,
    /// Hub → admin: number of connected users.
    ConnectedCount,
    /// Hub → admin: whether the active element can be exported.
    CanDownload,
    /// Anything else; decoded so it can be ignored rather than rejected.
    #[default]
    Unknown,
}

impl Action {
    /// Wire spelling of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::UserData => "user",
            Self::AdminData => "admin",
            Self::ResetIcons => "resetIcon",
            Self::IconEvent => "icon",
            Self::IconCount(icon) => icon.as_str(),
            Self::HtmlUpdate => "html",
            Self::DataUpdate => "data",
            Self::RequestDownload => "admindownload",
            Self::DownloadPayload => "download",
            Self::ConnectedCount => "connected",
            Self::CanDownload => "candownload",
            Self::Unknown => "",
        }
    }

    /// Parse a wire spelling; unrecognized values map to [`Action::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s {
            "activate" => Self::Activate,
            "user" => Self::UserData,
            "admin" => Self::AdminData,
            "resetIcon" => Self::ResetIcons,
            "icon" => Self::IconEvent,
            "html" => Self::HtmlUpdate,
            "data" => Self::DataUpdate,
            "admindownload" => Self::RequestDownload,
            "download" => Self::DownloadPayload,
            "connected" => Self::ConnectedCount,
            "candownload" => Self::CanDownload,
            other => other.parse::<Icon>().map_or(Self::Unknown, Self::IconCount),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One wire message.
///
/// Missing fields decode as empty strings / [`Action::Unknown`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Element name or [`GLOBAL_SENDER`].
    #[serde(rename = "From", default)]
    pub from: String,
    /// Requested or reported action.
    #[serde(rename = "Action", default)]
    pub action: Action,
    /// Action payload; always text on the wire.
    #[serde(rename = "Data", default)]
    pub data: String,
}

impl Envelope {
    /// Build an envelope attributed to an element.
    pub fn new(from: impl Into<String>, action: Action, data: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            action,
            data: data.into(),
        }
    }

    /// Build a hub-global envelope.
    pub fn global(action: Action, data: impl Into<String>) -> Self {
        Self::new(GLOBAL_SENDER, action, data)
    }

    /// Whether this envelope carries the global sentinel as sender.
    pub fn is_global(&self) -> bool {
        self.from == GLOBAL_SENDER
    }

    /// Decode a single text frame.
    pub fn decode(frame: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Encode to a single text frame.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
