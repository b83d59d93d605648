//! User session sampling.
//!
//! A session is sampled once, when it starts, and the decision holds for its
//! whole lifetime. Resource collection has its own gate on top of the
//! session-level one so resource volume can be bounded independently.
//!
//! Persisting the decision (cookies, storage) belongs to the host; it only
//! needs the string form of [`SessionTrackingType`] to restore a session.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::Configuration;
use crate::types::SessionId;

/// The queries the rest of the agent asks of a session.
pub trait SessionState {
    /// Opaque session identifier.
    fn id(&self) -> &SessionId;

    /// Whether the session is sampled in at all.
    fn is_tracked(&self) -> bool;

    /// Whether resource timing is collected for this session.
    fn is_tracked_with_resource(&self) -> bool;
}

/// Error type for unknown tracking type strings.
#[derive(Debug, Clone, Error)]
#[error("invalid session tracking type: {0}")]
pub struct UnknownTrackingType(String);

/// Sampling outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTrackingType {
    NotTracked,
    TrackedWithResources,
    TrackedWithoutResources,
}

impl SessionTrackingType {
    /// Compact form used when persisting the decision.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotTracked => "0",
            Self::TrackedWithResources => "1",
            Self::TrackedWithoutResources => "2",
        }
    }

    /// Draws a tracking type from the configured sample rates.
    pub fn draw<R: Rng + ?Sized>(configuration: &Configuration, rng: &mut R) -> Self {
        if !configuration.sample_rate.admits(rng.gen_range(0.0..100.0)) {
            Self::NotTracked
        } else if !configuration
            .resource_sample_rate
            .admits(rng.gen_range(0.0..100.0))
        {
            Self::TrackedWithoutResources
        } else {
            Self::TrackedWithResources
        }
    }
}

impl fmt::Display for SessionTrackingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionTrackingType {
    type Err = UnknownTrackingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Self::NotTracked),
            "1" => Ok(Self::TrackedWithResources),
            "2" => Ok(Self::TrackedWithoutResources),
            _ => Err(UnknownTrackingType(s.to_string())),
        }
    }
}

/// The agent's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RumSession {
    id: SessionId,
    tracking_type: SessionTrackingType,
}

impl RumSession {
    /// Starts a new session with a fresh id and a sampling decision.
    pub fn start<R: Rng + ?Sized>(configuration: &Configuration, rng: &mut R) -> Self {
        let tracking_type = SessionTrackingType::draw(configuration, rng);
        let id = SessionId::generate();
        tracing::debug!(session_id = %id, tracking_type = ?tracking_type, "session started");
        Self { id, tracking_type }
    }

    /// Rebuilds a session whose decision was persisted by the host.
    pub const fn restore(id: SessionId, tracking_type: SessionTrackingType) -> Self {
        Self { id, tracking_type }
    }

    pub const fn tracking_type(&self) -> SessionTrackingType {
        self.tracking_type
    }
}

impl SessionState for RumSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn is_tracked(&self) -> bool {
        self.tracking_type != SessionTrackingType::NotTracked
    }

    fn is_tracked_with_resource(&self) -> bool {
        self.tracking_type == SessionTrackingType::TrackedWithResources
    }
}
