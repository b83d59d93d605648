//! Track command: would the agent report a request to this URL?

use std::io::Write;

use anyhow::{Context, Result};

use rum_core::{RumSession, SessionId, SessionTrackingType, should_track_resource};

use crate::Config;

/// Writes `keep` or `drop` for `url` and returns the decision.
pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    url: &str,
    without_resources: bool,
) -> Result<bool> {
    let configuration = config
        .configuration()
        .context("invalid agent configuration")?;
    let tracking_type = if without_resources {
        SessionTrackingType::TrackedWithoutResources
    } else {
        SessionTrackingType::TrackedWithResources
    };
    let session = RumSession::restore(SessionId::generate(), tracking_type);

    let keep = should_track_resource(url, &configuration, &session);
    writeln!(writer, "{}", if keep { "keep" } else { "drop" })?;
    Ok(keep)
}
