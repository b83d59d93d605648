//! Config command for showing the effective agent configuration.

use std::io::Write;

use anyhow::{Context, Result};

use rum_core::BuildEnv;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let configuration = config
        .configuration()
        .context("invalid agent configuration")?;

    let build = match config.build_env() {
        BuildEnv::Release => "release",
        BuildEnv::E2eTest => "e2e-test",
    };

    writeln!(writer, "RUM agent configuration")?;
    writeln!(writer, "Build: {build}")?;
    writeln!(writer, "Site: {}", configuration.site)?;
    writeln!(
        writer,
        "Application: {}",
        config.agent.application_id.as_deref().unwrap_or("(not set)")
    )?;
    writeln!(writer, "Sample rate: {}", configuration.sample_rate)?;
    writeln!(
        writer,
        "Resource sample rate: {}",
        configuration.resource_sample_rate
    )?;
    writeln!(writer, "Intake endpoints:")?;
    writeln!(writer, "- logs: {}", configuration.logs_endpoint)?;
    writeln!(writer, "- rum: {}", configuration.rum_endpoint)?;
    writeln!(writer, "- trace: {}", configuration.trace_endpoint)?;
    if let Some(endpoint) = &configuration.internal_monitoring_endpoint {
        writeln!(writer, "- internal monitoring: {endpoint}")?;
    }

    Ok(())
}
