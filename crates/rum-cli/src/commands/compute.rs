//! Compute command: resolve duration and phases for raw timing records.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use rum_core::{
    ComputedResourceDetails, TimingRecord, compute_performance_resource_details,
    compute_performance_resource_duration,
};

#[derive(Debug, Serialize)]
struct ComputedRecord<'a> {
    name: &'a str,
    /// Nanoseconds.
    duration: i64,
    details: Option<ComputedResourceDetails>,
}

/// Reads JSONL timing records and writes one JSON line per record.
///
/// Returns the number of records processed.
pub fn run<R: BufRead, W: Write>(reader: R, writer: &mut W) -> Result<usize> {
    let mut processed = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: TimingRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid timing record on line {}", idx + 1))?;

        let computed = ComputedRecord {
            name: &record.name,
            duration: compute_performance_resource_duration(&record),
            details: compute_performance_resource_details(&record),
        };
        serde_json::to_writer(&mut *writer, &computed)?;
        writeln!(writer)?;
        processed += 1;
    }
    Ok(processed)
}
