//! Batch coordination
//!
//! Units are split into contiguous batches. Each batch is read, extracted
//! into its own `Tables`, and merged into the run totals only once it has
//! completed; its document trees are dropped before the next batch starts.
//! The resolver is the only state that outlives a batch.
//!
//! Within a batch the extractor works table by table: player of the match
//! is resolved for every document before any delivery is. A name first seen
//! unregistered in one document can therefore take its id from the registry
//! of a later document in the same batch, while with a smaller batch size it
//! would already have been given a synthetic id. Output is reproducible for
//! a fixed unit order and batch size, and only for corpora whose registries
//! never introduce a name that an earlier document left unregistered is it
//! independent of the batch size.

use crate::error::{ReadError, UnnestError};
use crate::unnest::extractor::TableExtractor;
use crate::unnest::reader::{read_document, Document, DocumentSource, SourceUnit};
use crate::unnest::resolver::PlayerResolver;
use crate::unnest::types::{ExtractConfig, TableKind, Tables};
use crate::unnest::writer::TableLoad;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A unit that was skipped
#[derive(Debug)]
pub struct UnitFailure {
    pub unit_id: String,
    pub location: PathBuf,
    pub error: ReadError,
}

/// A batch that was abandoned before extraction
#[derive(Debug)]
pub struct BatchFailure {
    /// 1-based batch number
    pub batch: usize,
    pub first_unit: usize,
    pub unit_count: usize,
    pub message: String,
}

/// What happened during a run, alongside the tables
#[derive(Debug, Default)]
pub struct RunReport {
    pub units_total: usize,
    pub documents_read: usize,
    pub batches: usize,
    pub unit_failures: Vec<UnitFailure>,
    pub batch_failures: Vec<BatchFailure>,
    pub registries_folded: usize,
    pub synthetic_ids: usize,
    /// Filled in once the tables are persisted
    pub tables_loaded: Vec<TableLoad>,
}

/// Tables plus run report
#[derive(Debug)]
pub struct Extraction {
    pub tables: Tables,
    pub report: RunReport,
}

impl Extraction {
    pub fn row_counts(&self) -> Vec<(TableKind, usize)> {
        TableKind::ALL
            .iter()
            .map(|&kind| (kind, self.tables.row_count(kind)))
            .collect()
    }
}

/// Drives reading and extraction batch by batch
pub struct BatchCoordinator {
    config: ExtractConfig,
}

impl BatchCoordinator {
    pub fn new(config: ExtractConfig) -> Self {
        BatchCoordinator { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Run a full extraction with a fresh resolver
    pub fn run(&self, source: &dyn DocumentSource) -> Result<Extraction, UnnestError> {
        let mut resolver = PlayerResolver::from_config(&self.config);
        self.run_with(source, &mut resolver)
    }

    /// Run a full extraction against a caller-owned resolver
    pub fn run_with(
        &self,
        source: &dyn DocumentSource,
        resolver: &mut PlayerResolver,
    ) -> Result<Extraction, UnnestError> {
        self.config.validate()?;
        let units = source.units()?;
        if units.is_empty() {
            return Err(UnnestError::NoInput);
        }

        let batch_size = self.config.batch_size.max(1);
        let batch_count = units.len().div_ceil(batch_size);
        info!(
            units = units.len(),
            batch_size,
            batches = batch_count,
            "starting extraction"
        );

        let mut tables = Tables::default();
        let mut report = RunReport {
            units_total: units.len(),
            ..RunReport::default()
        };
        let mut seen_ids = HashSet::new();

        for (idx, batch_units) in units.chunks(batch_size).enumerate() {
            let batch = idx + 1;
            let first_unit = idx * batch_size;
            report.batches += 1;

            if let Err(err) = source.check_available() {
                warn!(batch, error = %err, "source unavailable; skipping batch");
                report.batch_failures.push(BatchFailure {
                    batch,
                    first_unit,
                    unit_count: batch_units.len(),
                    message: err.to_string(),
                });
                continue;
            }

            debug!(
                batch,
                first = first_unit + 1,
                last = first_unit + batch_units.len(),
                "reading batch"
            );
            let documents = self.read_batch(source, batch_units, &mut seen_ids, &mut report);
            if documents.is_empty() {
                continue;
            }

            let batch_tables = TableExtractor::new(resolver).extract_batch(&documents);
            self.fold_registries(&documents, resolver, &mut report);
            report.documents_read += documents.len();

            info!(
                batch,
                documents = documents.len(),
                deliveries = batch_tables.deliveries.len(),
                "batch completed"
            );
            tables.merge(batch_tables);
            // Trees are released here, before the next batch is read
            drop(documents);
        }

        if report.documents_read == 0 {
            if report.batch_failures.is_empty() {
                return Err(UnnestError::NoReadableInput {
                    failed: report.unit_failures.len(),
                });
            }
            return Err(UnnestError::InputUnavailable {
                failed_batches: report.batch_failures.len(),
                failed_units: report.unit_failures.len(),
            });
        }

        tables.players = resolver.players();
        report.synthetic_ids = resolver.synthetic_count();

        info!(
            matches = tables.matches.len(),
            deliveries = tables.deliveries.len(),
            players = tables.players.len(),
            synthetic_ids = report.synthetic_ids,
            unit_failures = report.unit_failures.len(),
            batch_failures = report.batch_failures.len(),
            "extraction finished"
        );

        Ok(Extraction { tables, report })
    }

    fn read_batch(
        &self,
        source: &dyn DocumentSource,
        units: &[SourceUnit],
        seen_ids: &mut HashSet<String>,
        report: &mut RunReport,
    ) -> Vec<Document> {
        let mut documents = Vec::with_capacity(units.len());

        for unit in units {
            let result = if seen_ids.contains(&unit.id) {
                Err(ReadError::DuplicateMatchId(unit.id.clone()))
            } else {
                read_document(source, unit)
            };

            match result {
                Ok(doc) => {
                    seen_ids.insert(unit.id.clone());
                    documents.push(doc);
                }
                Err(error) => {
                    warn!(unit = %unit.location.display(), error = %error, "skipping unit");
                    report.unit_failures.push(UnitFailure {
                        unit_id: unit.id.clone(),
                        location: unit.location.clone(),
                        error,
                    });
                }
            }
        }

        documents
    }

    /// Fold document registries into the resolver, up to the configured limit
    fn fold_registries(
        &self,
        documents: &[Document],
        resolver: &mut PlayerResolver,
        report: &mut RunReport,
    ) {
        for doc in documents {
            if self
                .config
                .registry_scan_limit
                .is_some_and(|limit| report.registries_folded >= limit)
            {
                return;
            }
            let registry = resolver.registry(doc.people());
            resolver.observe_registry(&registry);
            report.registries_folded += 1;
        }
    }
}

/// Extract every table from `source` in batches of `batch_size`
pub fn extract(source: &dyn DocumentSource, batch_size: usize) -> Result<Extraction, UnnestError> {
    let config = ExtractConfig {
        batch_size,
        ..ExtractConfig::default()
    };
    BatchCoordinator::new(config).run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unnest::reader::MemorySource;
    use serde_json::{json, Value};
    use std::cell::Cell;

    fn match_doc(batter: &str, registry: Value) -> Value {
        json!({
            "info": {"teams": ["A", "B"], "registry": {"people": registry}},
            "innings": [{"team": "A", "overs": [{"over": 0, "deliveries": [{
                "batter": batter,
                "bowler": "Bowler",
                "non_striker": "Partner",
                "runs": {"batter": 1, "extras": 0, "total": 1}
            }]}]}]
        })
    }

    fn corpus(n: usize) -> MemorySource {
        let mut source = MemorySource::new();
        for i in 0..n {
            source.push_value(format!("m{}", i), &match_doc("Batter", json!({})));
        }
        source
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let source = MemorySource::new();
        assert!(matches!(extract(&source, 10), Err(UnnestError::NoInput)));
    }

    #[test]
    fn test_all_units_unreadable_is_rejected() {
        let mut source = MemorySource::new();
        source.push("bad1", "{");
        source.push("bad2", "not json");
        assert!(matches!(
            extract(&source, 10),
            Err(UnnestError::NoReadableInput { failed: 2 })
        ));
    }

    #[test]
    fn test_bad_units_are_skipped_and_reported() {
        let mut source = corpus(3);
        source.push("broken", "{\"info\": ");
        source.push_value("m1", &match_doc("Other", json!({})));

        let run = extract(&source, 2).unwrap();
        assert_eq!(run.tables.matches.len(), 3);
        assert_eq!(run.report.documents_read, 3);
        assert_eq!(run.report.batches, 3);

        let failed: Vec<&str> = run
            .report
            .unit_failures
            .iter()
            .map(|f| f.unit_id.as_str())
            .collect();
        assert_eq!(failed, vec!["broken", "m1"]);
        assert!(matches!(
            run.report.unit_failures[1].error,
            ReadError::DuplicateMatchId(_)
        ));
    }

    #[test]
    fn test_batch_size_does_not_change_uniform_corpus() {
        let source = corpus(7);
        let one = extract(&source, 1).unwrap();
        let many = extract(&source, 3).unwrap();
        let all = extract(&source, 100).unwrap();

        assert_eq!(one.report.batches, 7);
        assert_eq!(many.report.batches, 3);
        assert_eq!(all.report.batches, 1);
        assert_eq!(one.row_counts(), all.row_counts());
        assert_eq!(many.tables.deliveries, all.tables.deliveries);
        assert_eq!(one.tables.players, all.tables.players);
        assert_eq!(all.tables.players.len(), 3);
    }

    #[test]
    fn test_later_registry_in_same_batch_names_earlier_batter() {
        let mut source = MemorySource::new();
        source.push_value("d1", &match_doc("X", json!({})));
        let mut d2 = match_doc("Other", json!({"X": "b"}));
        d2["info"]["player_of_match"] = json!(["X"]);
        source.push_value("d2", &d2);

        let batter_of_d1 = |run: &Extraction| {
            run.tables
                .deliveries
                .iter()
                .find(|d| d.match_id == "d1")
                .and_then(|d| d.batter_id.clone())
        };

        let split = extract(&source, 1).unwrap();
        let together = extract(&source, 2).unwrap();
        assert_eq!(batter_of_d1(&split).as_deref(), Some("SYNTH_1000000"));
        assert_eq!(batter_of_d1(&together).as_deref(), Some("b"));

        // d2 itself follows its own registry either way
        let pom = |run: &Extraction| run.tables.matches[1].player_of_match_id.clone();
        assert_eq!(pom(&split).as_deref(), Some("b"));
        assert_eq!(pom(&together).as_deref(), Some("b"));
    }

    #[test]
    fn test_empty_synthetic_prefix_is_rejected() {
        let mut source = MemorySource::new();
        source.push_value("m0", &match_doc("X", json!({"X": "P1"})));

        let config = ExtractConfig {
            synthetic_prefix: String::new(),
            ..ExtractConfig::default()
        };
        assert!(matches!(
            BatchCoordinator::new(config).run(&source),
            Err(UnnestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_batch_size_is_treated_as_one() {
        let run = extract(&corpus(2), 0).unwrap();
        assert_eq!(run.report.batches, 2);
    }

    #[test]
    fn test_registry_fold_limit_still_covers_referenced_players() {
        let mut source = MemorySource::new();
        source.push_value("m0", &match_doc("First", json!({"First": "p1", "Bench": "p2"})));
        source.push_value("m1", &match_doc("Second", json!({"Second": "p3", "Reserve": "p4"})));

        let config = ExtractConfig {
            batch_size: 1,
            registry_scan_limit: Some(1),
            ..ExtractConfig::default()
        };
        let run = BatchCoordinator::new(config).run(&source).unwrap();
        let ids: Vec<&str> = run
            .tables
            .players
            .iter()
            .map(|p| p.player_id.as_str())
            .collect();

        assert_eq!(run.report.registries_folded, 1);
        assert!(ids.contains(&"p2"));
        assert!(!ids.contains(&"p4"));
        // Referenced in a later document, so present regardless of the limit
        assert!(ids.contains(&"p3"));
        for delivery in &run.tables.deliveries {
            assert!(ids.contains(&delivery.batter_id.as_deref().unwrap()));
        }
    }

    /// Source whose storage disappears after a number of availability checks
    struct FlakySource {
        inner: MemorySource,
        checks_left: Cell<usize>,
    }

    impl DocumentSource for FlakySource {
        fn units(&self) -> Result<Vec<SourceUnit>, UnnestError> {
            self.inner.units()
        }

        fn check_available(&self) -> std::io::Result<()> {
            if self.checks_left.get() == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "volume gone"));
            }
            self.checks_left.set(self.checks_left.get() - 1);
            Ok(())
        }

        fn read(&self, unit: &SourceUnit) -> Result<Vec<u8>, ReadError> {
            self.inner.read(unit)
        }
    }

    #[test]
    fn test_failed_batch_keeps_prior_results() {
        let source = FlakySource {
            inner: corpus(4),
            checks_left: Cell::new(1),
        };

        let run = extract(&source, 2).unwrap();
        assert_eq!(run.tables.matches.len(), 2);
        assert_eq!(run.report.batch_failures.len(), 1);
        assert_eq!(run.report.batch_failures[0].batch, 2);
        assert_eq!(run.report.batch_failures[0].first_unit, 2);
        assert_eq!(run.tables.players.len(), 3);
    }

    #[test]
    fn test_every_batch_unavailable_is_rejected() {
        let source = FlakySource {
            inner: corpus(2),
            checks_left: Cell::new(0),
        };

        assert!(matches!(
            extract(&source, 1),
            Err(UnnestError::InputUnavailable {
                failed_batches: 2,
                failed_units: 0
            })
        ));
    }
}
