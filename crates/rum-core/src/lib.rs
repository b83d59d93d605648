//! Core logic for the browser RUM agent.
//!
//! This crate contains the fundamental types and logic for:
//! - Resource timing: deriving network phases and durations from raw timing records
//! - Session sampling: deciding once per session what gets collected
//! - Configuration: validating user input and building intake endpoints
//! - Lifecycle bus: the typed synchronous channel between collectors and consumers

pub mod agent;
pub mod collection;
pub mod configuration;
pub mod event_type;
pub mod events;
pub mod lifecycle;
pub mod resource;
pub mod session;
pub mod timing;
pub mod types;

pub use agent::{InitError, InternalContext, RumAgent};
pub use configuration::{BuildEnv, Configuration, UserConfiguration};
pub use event_type::{LifeCycleEventType, UnknownEventType};
pub use events::{ErrorMessage, ErrorOrigin, RequestDetails, RequestKind, RumResourceEvent, UserAction};
pub use lifecycle::{Delivery, LifeCycle, LifeCycleEvent, Subscription, WeakLifeCycle};
pub use resource::{
    ResourceKind, compute_performance_resource_details, compute_performance_resource_duration,
    compute_resource_kind, should_track_resource,
};
pub use session::{RumSession, SessionState, SessionTrackingType};
pub use timing::{ComputedResourceDetails, Phase, PhaseMetric, TimingRecord};
pub use types::{ApplicationId, ClientToken, Percentage, SessionId, ValidationError};
