//! Lifecycle event type enum as the single source of truth for bus channels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categories of events carried by the [`LifeCycle`](crate::LifeCycle) bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifeCycleEventType {
    /// An error was captured.
    ErrorCollected,
    /// An XHR or fetch request completed.
    RequestCompleted,
    /// The host reported a raw performance entry.
    PerformanceEntryCollected,
    /// A resource event is ready for aggregation.
    ResourceCollected,
    /// A user action was reported through the public API.
    UserActionCollected,
}

impl LifeCycleEventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::ErrorCollected,
        Self::RequestCompleted,
        Self::PerformanceEntryCollected,
        Self::ResourceCollected,
        Self::UserActionCollected,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorCollected => "error",
            Self::RequestCompleted => "request",
            Self::PerformanceEntryCollected => "performance_entry",
            Self::ResourceCollected => "resource",
            Self::UserActionCollected => "user_action",
        }
    }
}

impl fmt::Display for LifeCycleEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifeCycleEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

impl Serialize for LifeCycleEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LifeCycleEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown lifecycle event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}
