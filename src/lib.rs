//! # Scorebook - cricket match unnesting
//!
//! Normalizes per-match, ball-by-ball JSON documents into a fixed relational
//! schema (matches, innings, overs, deliveries, dismissals, players) and
//! resolves player identity across inconsistent naming.
//!
//! ## Quick Start
//!
//! ```rust
//! use scorebook::unnest::{extract, MemorySource};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut source = MemorySource::new();
//! source.push_value("64012", &json!({
//!     "info": {"teams": ["Kent", "Essex"], "registry": {"people": {"ZF Crawley": "c1"}}},
//!     "innings": [{"team": "Kent", "overs": [{"over": 0, "deliveries": [
//!         {"batter": "ZF Crawley", "bowler": "SR Harmer", "non_striker": "DJ Bell-Drummond",
//!          "runs": {"batter": 4, "extras": 0, "total": 4}}
//!     ]}]}]
//! }));
//!
//! let run = extract(&source, 500)?;
//! assert_eq!(run.tables.deliveries[0].delivery_id, "64012_1_0_1");
//! assert_eq!(run.tables.deliveries[0].batter_id.as_deref(), Some("c1"));
//! assert_eq!(run.tables.players.len(), 3);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::Path;

pub mod error;
pub mod unnest;

pub use error::{ReadError, UnnestError};
pub use unnest::{
    extract, persist, BatchCoordinator, DirectorySource, Extraction, ExtractConfig, JsonlSink,
    PlayerResolver, Tables,
};

/// Main entry point: extract a directory of match files and write the tables
/// as JSON Lines into `output_dir`
pub fn unnest_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output_dir: Q,
    config: ExtractConfig,
) -> Result<Extraction> {
    let source = DirectorySource::new(input_dir.as_ref(), config.file_extension.clone());
    let mut extraction = BatchCoordinator::new(config)
        .run(&source)
        .with_context(|| format!("Failed to extract {}", input_dir.as_ref().display()))?;

    let mut sink = JsonlSink::new(output_dir)?;
    extraction.report.tables_loaded = persist(&extraction.tables, &mut sink)?;
    sink.flush()?;

    Ok(extraction)
}
