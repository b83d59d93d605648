//! The top-level agent object.
//!
//! A [`RumAgent`] starts uninitialized and moves to initialized exactly once.
//! Everything the agent owns (configuration, session, bus, collections) only
//! exists in the initialized state, so no call can observe a half-built
//! agent.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::collection::{
    CollectionContext, start_performance_collection, start_request_collection,
};
use crate::configuration::{BuildEnv, Configuration, UserConfiguration};
use crate::events::{ErrorMessage, RequestDetails, UserAction};
use crate::lifecycle::{
    Delivery, ErrorCollected, LifeCycle, PerformanceEntryCollected, RequestCompleted,
    Subscription, UserActionCollected,
};
use crate::session::{RumSession, SessionState};
use crate::timing::TimingRecord;
use crate::types::{ApplicationId, SessionId, ValidationError};

/// Reasons an `init` call is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InitError {
    #[error("RUM agent is already initialized")]
    AlreadyInitialized,

    #[error("client token is not configured, no RUM data will be sent")]
    MissingClientToken,

    #[error("application id is not configured, no RUM data will be collected")]
    MissingApplicationId,

    #[error(transparent)]
    Configuration(#[from] ValidationError),
}

/// Identifiers other agents running on the page can correlate with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalContext {
    pub application_id: ApplicationId,
    /// Absent when the session is not tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

#[derive(Debug)]
struct RunningAgent {
    application_id: ApplicationId,
    configuration: Rc<Configuration>,
    session: Rc<RumSession>,
    lifecycle: LifeCycle,
    collections: Vec<Subscription>,
}

#[derive(Debug, Default)]
enum AgentState {
    #[default]
    Uninitialized,
    Initialized(Box<RunningAgent>),
}

/// The RUM agent.
#[derive(Debug, Default)]
pub struct RumAgent {
    build_env: BuildEnv,
    state: AgentState,
}

impl RumAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// An agent built for `build_env`; see [`BuildEnv`].
    pub const fn with_build_env(build_env: BuildEnv) -> Self {
        Self {
            build_env,
            state: AgentState::Uninitialized,
        }
    }

    /// Initializes the agent, starting its session now.
    pub fn init(&mut self, user: &UserConfiguration) -> Result<(), InitError> {
        self.init_with(user, Utc::now(), &mut rand::thread_rng())
    }

    /// Initializes the agent with an explicit time origin and random source.
    ///
    /// A rejected call is logged and leaves the agent as it was.
    pub fn init_with<R: Rng + ?Sized>(
        &mut self,
        user: &UserConfiguration,
        time_origin: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), InitError> {
        let result = self.try_init(user, time_origin, rng);
        if let Err(err) = &result {
            tracing::error!(error = %err, "RUM agent initialization rejected");
        }
        result
    }

    fn try_init<R: Rng + ?Sized>(
        &mut self,
        user: &UserConfiguration,
        time_origin: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), InitError> {
        if self.is_initialized() {
            return Err(InitError::AlreadyInitialized);
        }
        if user.token().is_none() {
            return Err(InitError::MissingClientToken);
        }
        let application_id = user
            .application_id
            .as_deref()
            .and_then(|id| ApplicationId::new(id).ok())
            .ok_or(InitError::MissingApplicationId)?;

        let user = UserConfiguration {
            is_collecting_error: Some(true),
            ..user.clone()
        };
        let configuration = Rc::new(Configuration::build(&user, self.build_env)?);
        let session = Rc::new(RumSession::start(&configuration, rng));
        let lifecycle = LifeCycle::new();

        let context = CollectionContext {
            application_id: application_id.clone(),
            time_origin,
            configuration: Rc::clone(&configuration),
            session: Rc::clone(&session),
        };
        let collections = vec![
            start_performance_collection(&lifecycle, context.clone()),
            start_request_collection(&lifecycle, context),
        ];

        tracing::info!(
            application_id = %application_id,
            session_id = %session.id(),
            tracking_type = %session.tracking_type(),
            "RUM agent initialized"
        );
        self.state = AgentState::Initialized(Box::new(RunningAgent {
            application_id,
            configuration,
            session,
            lifecycle,
            collections,
        }));
        Ok(())
    }

    pub const fn is_initialized(&self) -> bool {
        matches!(self.state, AgentState::Initialized(_))
    }

    fn running(&self, operation: &'static str) -> Option<&RunningAgent> {
        match &self.state {
            AgentState::Initialized(running) => Some(running.as_ref()),
            AgentState::Uninitialized => {
                tracing::warn!(operation, "RUM agent is not initialized, call ignored");
                None
            }
        }
    }

    fn initialized(&self) -> Option<&RunningAgent> {
        match &self.state {
            AgentState::Initialized(running) => Some(running.as_ref()),
            AgentState::Uninitialized => None,
        }
    }

    pub fn lifecycle(&self) -> Option<&LifeCycle> {
        self.initialized().map(|running| &running.lifecycle)
    }

    pub fn session(&self) -> Option<&RumSession> {
        self.initialized().map(|running| running.session.as_ref())
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.initialized().map(|running| running.configuration.as_ref())
    }

    /// Reports a captured error.
    pub fn add_error(&self, error: &ErrorMessage) -> Delivery {
        self.running("add_error")
            .map(|running| running.lifecycle.notify::<ErrorCollected>(error))
            .unwrap_or_default()
    }

    /// Reports a completed XHR or fetch request.
    pub fn add_request(&self, request: &RequestDetails) -> Delivery {
        self.running("add_request")
            .map(|running| running.lifecycle.notify::<RequestCompleted>(request))
            .unwrap_or_default()
    }

    /// Reports a raw performance entry.
    pub fn add_performance_entry(&self, entry: &TimingRecord) -> Delivery {
        self.running("add_performance_entry")
            .map(|running| running.lifecycle.notify::<PerformanceEntryCollected>(entry))
            .unwrap_or_default()
    }

    /// Reports a custom user action.
    pub fn add_user_action(
        &self,
        name: impl Into<String>,
        context: serde_json::Map<String, serde_json::Value>,
    ) -> Delivery {
        let Some(running) = self.running("add_user_action") else {
            return Delivery::default();
        };
        let action = UserAction {
            name: name.into(),
            context,
        };
        running.lifecycle.notify::<UserActionCollected>(&action)
    }

    /// Identifiers for correlation, or `None` before initialization.
    pub fn internal_context(&self) -> Option<InternalContext> {
        let running = self.running("internal_context")?;
        Some(InternalContext {
            application_id: running.application_id.clone(),
            session_id: running
                .session
                .is_tracked()
                .then(|| running.session.id().clone()),
        })
    }

    /// Unsubscribes the built-in collections; the agent stays initialized.
    ///
    /// Returns how many collections were removed.
    pub fn stop_collections(&mut self) -> usize {
        let AgentState::Initialized(running) = &mut self.state else {
            return 0;
        };
        running
            .collections
            .drain(..)
            .map(Subscription::unsubscribe)
            .filter(|removed| *removed)
            .count()
    }
}
