//! Inspect command implementation.

use super::OutputFormat;
use crate::error::CliResult;
use serde::Serialize;
use snapstore_core::Store;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Resolved store path.
    pub path: String,
    /// Number of live keys.
    pub keys: usize,
    /// Snapshots alive in the registry.
    pub live_snapshots: usize,
    /// Leases held by callers.
    pub outstanding_leases: usize,
    /// Sequence of the current snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_sequence: Option<u64>,
}

/// Gathers the inspection result.
pub fn inspect(store: &Store) -> CliResult<InspectResult> {
    let stats = store.stats();
    Ok(InspectResult {
        path: store.path().display().to_string(),
        keys: store.scan(b"", 0)?.len(),
        live_snapshots: stats.live_snapshots,
        outstanding_leases: stats.outstanding_leases,
        current_sequence: stats.current_sequence.map(|s| s.as_u64()),
    })
}

/// Runs the inspect command.
pub fn run(store: &Store, format: OutputFormat) -> CliResult<()> {
    let result = inspect(store)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            println!("Store: {}", result.path);
            println!("Keys: {}", result.keys);
            println!("Live snapshots: {}", result.live_snapshots);
            println!("Outstanding leases: {}", result.outstanding_leases);
            match result.current_sequence {
                Some(seq) => println!("Current snapshot sequence: {seq}"),
                None => println!("Current snapshot sequence: none"),
            }
        }
    }
    Ok(())
}
