//! Replay command: feed recorded observations through a live agent.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use rum_core::lifecycle::{ErrorCollected, ResourceCollected, UserActionCollected};
use rum_core::{
    ErrorMessage, LifeCycle, LifeCycleEvent, LifeCycleEventType, RequestDetails, RumAgent,
    Subscription, TimingRecord, UserAction,
};

use crate::Config;

/// One recorded observation, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Observation {
    Resource(TimingRecord),
    Request(RequestDetails),
    Error(ErrorMessage),
    Action(UserAction),
}

#[derive(Debug, Serialize)]
struct Collected {
    #[serde(rename = "type")]
    event_type: LifeCycleEventType,
    event: Box<RawValue>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Navigation origin; now when unset.
    pub time_origin: Option<DateTime<Utc>>,
    /// Seed for session sampling; entropy when unset.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub observations: usize,
    pub collected: usize,
}

pub fn run<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    config: &Config,
    options: ReplayOptions,
) -> Result<ReplaySummary> {
    let observations = parse_observations(reader)?;

    let mut agent = RumAgent::with_build_env(config.build_env());
    let time_origin = options.time_origin.unwrap_or_else(Utc::now);
    let initialized = match options.seed {
        Some(seed) => agent.init_with(&config.agent, time_origin, &mut StdRng::seed_from_u64(seed)),
        None => agent.init_with(&config.agent, time_origin, &mut rand::thread_rng()),
    };
    initialized.context("failed to initialize RUM agent")?;

    let lifecycle = agent
        .lifecycle()
        .context("RUM agent has no lifecycle after initialization")?;
    let collected = Rc::new(RefCell::new(Vec::new()));
    let _subscriptions = [
        record::<ResourceCollected>(lifecycle, &collected),
        record::<ErrorCollected>(lifecycle, &collected),
        record::<UserActionCollected>(lifecycle, &collected),
    ];

    let total = observations.len();
    for observation in observations {
        let delivery = match observation {
            Observation::Resource(mut entry) => {
                if entry.entry_type.is_empty() {
                    "resource".clone_into(&mut entry.entry_type);
                }
                agent.add_performance_entry(&entry)
            }
            Observation::Request(request) => agent.add_request(&request),
            Observation::Error(error) => agent.add_error(&error),
            Observation::Action(action) => agent.add_user_action(action.name, action.context),
        };
        if delivery.failed > 0 {
            tracing::warn!(failed = delivery.failed, "handlers failed during replay");
        }
    }

    let collected = collected.take();
    for event in &collected {
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
    }

    Ok(ReplaySummary {
        observations: total,
        collected: collected.len(),
    })
}

fn record<E>(lifecycle: &LifeCycle, sink: &Rc<RefCell<Vec<Collected>>>) -> Subscription
where
    E: LifeCycleEvent,
    E::Payload: Serialize,
{
    let sink = Rc::clone(sink);
    lifecycle.subscribe::<E, _>(move |payload| {
        let event = serde_json::value::to_raw_value(payload)?;
        sink.borrow_mut().push(Collected {
            event_type: E::TYPE,
            event,
        });
        Ok(())
    })
}

fn parse_observations<R: BufRead>(reader: R) -> Result<Vec<Observation>> {
    let mut observations = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let observation = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid observation on line {}", idx + 1))?;
        observations.push(observation);
    }
    Ok(observations)
}
