//! Payloads carried by the lifecycle bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;
use crate::timing::ComputedResourceDetails;
use crate::types::{ApplicationId, SessionId};

/// Where an error was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorOrigin {
    Agent,
    Console,
    Network,
    Source,
}

/// A captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub message: String,
    pub origin: ErrorOrigin,
    /// Error class name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Milliseconds since the navigation origin.
    #[serde(default)]
    pub start_time: f64,
}

/// How a request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Xhr,
    Fetch,
}

impl From<RequestKind> for ResourceKind {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Xhr => Self::Xhr,
            RequestKind::Fetch => Self::Fetch,
        }
    }
}

/// A completed XHR or fetch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub kind: RequestKind,
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Milliseconds since the navigation origin.
    pub start_time: f64,
    /// Milliseconds.
    pub duration: f64,
}

/// A custom user action reported through the public API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub name: String,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// A resource load ready for aggregation.
///
/// Durations and phase metrics are in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RumResourceEvent {
    pub date: DateTime<Utc>,
    pub application_id: ApplicationId,
    pub session_id: SessionId,
    pub url: String,
    pub kind: ResourceKind,
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ComputedResourceDetails>,
}
