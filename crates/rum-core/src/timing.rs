//! Raw resource timing records and the phase metrics derived from them.
//!
//! # Units
//!
//! Records arrive in fractional milliseconds relative to the navigation
//! origin, exactly as the browser reports them. Everything the agent derives
//! is expressed in integral nanoseconds so later aggregation never has to
//! round floats again.
//!
//! # The `0` sentinel
//!
//! A `0` in any `*Start`/`*End` field means "not available" (cross-origin
//! redaction, reused connection, no redirect...). It is never a real instant.
//! Fields are always structurally present; missing JSON fields deserialize
//! to `0` so there is a single representation of "absent".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nanoseconds per millisecond.
const NS_PER_MS: f64 = 1_000_000.0;

/// Converts a millisecond value to integral nanoseconds.
#[expect(
    clippy::cast_possible_truncation,
    reason = "timing values are far below i64::MAX nanoseconds"
)]
pub fn ms_to_ns(ms: f64) -> i64 {
    (ms * NS_PER_MS).round() as i64
}

/// One browser-reported resource load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingRecord {
    pub start_time: f64,
    pub fetch_start: f64,
    pub redirect_start: f64,
    pub redirect_end: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub secure_connection_start: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub duration: f64,
    /// Entry category (`resource`, `navigation`, ...).
    pub entry_type: String,
    /// The resource URL.
    pub name: String,
    /// What triggered the load (`script`, `fetch`, `xmlhttprequest`, ...).
    pub initiator_type: String,
}

impl TimingRecord {
    /// Whether this record describes a sub-resource load.
    pub fn is_resource(&self) -> bool {
        self.entry_type == "resource"
    }
}

/// Returns `Some(value)` unless the value is the `0` "unavailable" sentinel.
pub(crate) fn available(value: f64) -> Option<f64> {
    if value == 0.0 { None } else { Some(value) }
}

/// A derived sub-phase of a network load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseMetric {
    /// Offset from the record's `startTime`, in nanoseconds.
    pub start: i64,
    /// Phase length in nanoseconds.
    pub duration: i64,
}

impl PhaseMetric {
    /// Builds a phase from raw millisecond bounds, relative to `origin`.
    pub fn between(origin: f64, start: f64, end: f64) -> Self {
        Self {
            start: ms_to_ns(start - origin),
            duration: ms_to_ns(end - start),
        }
    }
}

/// The network phases the agent can derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Redirect,
    Dns,
    Connect,
    Ssl,
    FirstByte,
    Download,
}

impl Phase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Ssl => "ssl",
            Self::FirstByte => "firstByte",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases that could be validly derived from one record.
///
/// An absent optional phase means "did not happen for this load" (no redirect,
/// reused connection, plain HTTP), never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedResourceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<PhaseMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<PhaseMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<PhaseMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<PhaseMetric>,
    pub first_byte: PhaseMetric,
    pub download: PhaseMetric,
}

impl ComputedResourceDetails {
    /// Returns the metric for a phase, if it was derived.
    pub const fn get(&self, phase: Phase) -> Option<PhaseMetric> {
        match phase {
            Phase::Redirect => self.redirect,
            Phase::Dns => self.dns,
            Phase::Connect => self.connect,
            Phase::Ssl => self.ssl,
            Phase::FirstByte => Some(self.first_byte),
            Phase::Download => Some(self.download),
        }
    }

    /// Iterates over the present phases in load order.
    pub fn phases(&self) -> impl Iterator<Item = (Phase, PhaseMetric)> + '_ {
        [
            Phase::Redirect,
            Phase::Dns,
            Phase::Connect,
            Phase::Ssl,
            Phase::FirstByte,
            Phase::Download,
        ]
        .into_iter()
        .filter_map(|phase| self.get(phase).map(|metric| (phase, metric)))
    }
}
