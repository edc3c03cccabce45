//! Unnesting - normalize nested match documents into relational tables
//!
//! Each match document nests ball-by-ball detail under
//! innings -> overs -> deliveries. This module flattens that tree into
//! `matches`, `innings`, `overs`, `deliveries`, `dismissals` and `players`
//! row-sets with composite keys, resolving every player name to one id for
//! the whole run.
//!
//! ## Memory
//!
//! Documents are processed in bounded batches by `BatchCoordinator`; only the
//! accumulated rows and the `PlayerResolver` outlive a batch.

pub mod accessor;
pub mod batch;
pub mod extractor;
pub mod reader;
pub mod resolver;
pub mod types;
pub mod writer;

pub use accessor::{Field, FieldPath, Segment};
pub use batch::{extract, BatchCoordinator, BatchFailure, Extraction, RunReport, UnitFailure};
pub use extractor::TableExtractor;
pub use reader::{DirectorySource, Document, DocumentSource, MemorySource, SourceUnit};
pub use resolver::{PlayerResolver, Registry};
pub use types::{
    DeliveryRow, DismissalRow, ExtractConfig, Fielder, InningsRow, MatchDate, MatchRow,
    NameVariant, OverRow, PlayerRow, TableKind, Tables,
};
pub use writer::{persist, JsonlSink, MemorySink, TableLoad, TableSink};
