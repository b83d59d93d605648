//! Collections that turn raw observations into resource events.
//!
//! Both collections listen on the lifecycle bus and publish
//! [`RumResourceEvent`]s back on it:
//!
//! - performance collection handles resource timing entries, except script
//!   requests (xhr, fetch) which request collection reports;
//! - request collection handles completed xhr/fetch calls.
//!
//! Both apply [`should_track_resource`] first.

use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::configuration::Configuration;
use crate::events::{RequestDetails, RumResourceEvent};
use crate::lifecycle::{
    LifeCycle, PerformanceEntryCollected, RequestCompleted, ResourceCollected, Subscription,
};
use crate::resource::{
    compute_performance_resource_details, compute_performance_resource_duration,
    compute_resource_kind, should_track_resource,
};
use crate::session::SessionState;
use crate::timing::{TimingRecord, ms_to_ns};
use crate::types::ApplicationId;

/// What collections need to filter and stamp events.
#[derive(Debug)]
pub struct CollectionContext<S> {
    pub application_id: ApplicationId,
    /// Wall-clock instant of the navigation origin.
    pub time_origin: DateTime<Utc>,
    pub configuration: Rc<Configuration>,
    pub session: Rc<S>,
}

impl<S> Clone for CollectionContext<S> {
    fn clone(&self) -> Self {
        Self {
            application_id: self.application_id.clone(),
            time_origin: self.time_origin,
            configuration: Rc::clone(&self.configuration),
            session: Rc::clone(&self.session),
        }
    }
}

impl<S: SessionState> CollectionContext<S> {
    /// Wall-clock date of an instant relative to the navigation origin.
    pub fn date_at(&self, relative_ms: f64) -> DateTime<Utc> {
        self.time_origin + TimeDelta::nanoseconds(ms_to_ns(relative_ms))
    }

    fn should_track(&self, url: &str) -> bool {
        should_track_resource(url, &self.configuration, self.session.as_ref())
    }

    /// Builds the resource event for a performance entry, if it is reported.
    pub fn resource_from_entry(&self, entry: &TimingRecord) -> Option<RumResourceEvent> {
        if !entry.is_resource() || !self.should_track(&entry.name) {
            return None;
        }
        let kind = compute_resource_kind(entry);
        if kind.is_request() {
            return None;
        }

        Some(RumResourceEvent {
            date: self.date_at(entry.start_time),
            application_id: self.application_id.clone(),
            session_id: self.session.id().clone(),
            url: entry.name.clone(),
            kind,
            duration: compute_performance_resource_duration(entry),
            method: None,
            status: None,
            details: compute_performance_resource_details(entry),
        })
    }

    /// Builds the resource event for a completed request, if it is reported.
    pub fn resource_from_request(&self, request: &RequestDetails) -> Option<RumResourceEvent> {
        if !self.should_track(&request.url) {
            return None;
        }

        Some(RumResourceEvent {
            date: self.date_at(request.start_time),
            application_id: self.application_id.clone(),
            session_id: self.session.id().clone(),
            url: request.url.clone(),
            kind: request.kind.into(),
            duration: ms_to_ns(request.duration),
            method: Some(request.method.clone()),
            status: Some(request.status),
            details: None,
        })
    }
}

/// Subscribes performance collection to the bus.
pub fn start_performance_collection<S>(
    lifecycle: &LifeCycle,
    context: CollectionContext<S>,
) -> Subscription
where
    S: SessionState + 'static,
{
    let bus = lifecycle.downgrade();
    lifecycle.subscribe::<PerformanceEntryCollected, _>(move |entry| {
        if let Some(resource) = context.resource_from_entry(entry) {
            bus.notify::<ResourceCollected>(&resource);
        }
        Ok(())
    })
}

/// Subscribes request collection to the bus.
pub fn start_request_collection<S>(
    lifecycle: &LifeCycle,
    context: CollectionContext<S>,
) -> Subscription
where
    S: SessionState + 'static,
{
    let bus = lifecycle.downgrade();
    lifecycle.subscribe::<RequestCompleted, _>(move |request| {
        if let Some(resource) = context.resource_from_request(request) {
            bus.notify::<ResourceCollected>(&resource);
        }
        Ok(())
    })
}
