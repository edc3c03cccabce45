use crate::unnest::types::{TableKind, Tables};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub type Row = Map<String, Value>;

/// Storage that final row-sets are handed to
pub trait TableSink {
    /// Create `name`, replacing any existing table of that name
    fn create_or_replace_table(&mut self, name: &str, rows: Vec<Row>) -> Result<()>;

    fn create_index(&mut self, table: &str, columns: &[&str]) -> Result<()>;
}

/// Writes each table to `<dir>/<table>.jsonl` and records indexes in
/// `<dir>/_indexes.jsonl`
pub struct JsonlSink {
    dir: PathBuf,
    index_catalog: Option<BufWriter<File>>,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        Ok(JsonlSink {
            dir: output_dir.as_ref().to_path_buf(),
            index_catalog: None,
        })
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", name))
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(catalog) = self.index_catalog.as_mut() {
            catalog.flush().context("Failed to flush index catalog")?;
        }
        Ok(())
    }
}

impl TableSink for JsonlSink {
    fn create_or_replace_table(&mut self, name: &str, rows: Vec<Row>) -> Result<()> {
        let path = self.table_path(name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create table file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        for row in &rows {
            let json = serde_json::to_string(row).context("Failed to serialize row")?;
            writeln!(writer, "{}", json).context("Failed to write row")?;
        }
        writer.flush().context("Failed to flush table file")?;
        Ok(())
    }

    fn create_index(&mut self, table: &str, columns: &[&str]) -> Result<()> {
        if self.index_catalog.is_none() {
            let path = self.dir.join("_indexes.jsonl");
            let file = File::create(&path)
                .with_context(|| format!("Failed to create index catalog: {}", path.display()))?;
            self.index_catalog = Some(BufWriter::new(file));
        }

        let entry = serde_json::json!({
            "index": format!("idx_{}_{}", table, columns.join("_")),
            "table": table,
            "columns": columns,
        });
        if let Some(catalog) = self.index_catalog.as_mut() {
            writeln!(catalog, "{}", entry).context("Failed to write index entry")?;
        }
        Ok(())
    }
}

/// Holds tables in memory; handy for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tables: HashMap<String, Vec<Row>>,
    pub indexes: Vec<(String, Vec<String>)>,
}

impl TableSink for MemorySink {
    fn create_or_replace_table(&mut self, name: &str, rows: Vec<Row>) -> Result<()> {
        self.tables.insert(name.to_string(), rows);
        Ok(())
    }

    fn create_index(&mut self, table: &str, columns: &[&str]) -> Result<()> {
        self.indexes.push((
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        Ok(())
    }
}

/// Outcome of loading one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoad {
    pub kind: TableKind,
    pub rows: usize,
    /// Rows skipped because an earlier row had the same primary key
    pub duplicates_dropped: usize,
}

/// Serialize rows, dropping repeats of a primary key (first one wins)
fn to_rows<T: Serialize>(kind: TableKind, rows: &[T]) -> Result<(Vec<Row>, usize)> {
    let key = kind.primary_key();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let Value::Object(map) = serde_json::to_value(row).context("Failed to serialize row")? else {
            anyhow::bail!("{} row did not serialize to an object", kind.name());
        };
        let Some(id) = map.get(key).and_then(Value::as_str) else {
            anyhow::bail!("{} row has no {} value", kind.name(), key);
        };
        if seen.insert(id.to_string()) {
            out.push(map);
        }
    }

    let dropped = rows.len() - out.len();
    if dropped > 0 {
        warn!(table = kind.name(), dropped, "dropped rows with a duplicate primary key");
    }
    Ok((out, dropped))
}

/// Load every table into the sink and create its indexes
pub fn persist(tables: &Tables, sink: &mut dyn TableSink) -> Result<Vec<TableLoad>> {
    let mut loads = Vec::with_capacity(TableKind::ALL.len());

    for kind in TableKind::ALL {
        let (rows, duplicates_dropped) = match kind {
            TableKind::Matches => to_rows(kind, &tables.matches)?,
            TableKind::Innings => to_rows(kind, &tables.innings)?,
            TableKind::Overs => to_rows(kind, &tables.overs)?,
            TableKind::Deliveries => to_rows(kind, &tables.deliveries)?,
            TableKind::Dismissals => to_rows(kind, &tables.dismissals)?,
            TableKind::Players => to_rows(kind, &tables.players)?,
        };
        let count = rows.len();

        sink.create_or_replace_table(kind.name(), rows)
            .with_context(|| format!("Failed to load table {}", kind.name()))?;
        for column in kind.indexes() {
            sink.create_index(kind.name(), &[*column])
                .with_context(|| format!("Failed to index {}.{}", kind.name(), column))?;
        }
        info!(table = kind.name(), rows = count, "table loaded");
        loads.push(TableLoad {
            kind,
            rows: count,
            duplicates_dropped,
        });
    }
    Ok(loads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unnest::types::{InningsRow, PlayerRow};

    fn innings_row(id: &str, team: &str) -> InningsRow {
        InningsRow {
            innings_id: id.to_string(),
            match_id: "1".to_string(),
            innings_number: 1,
            batting_team: Some(team.to_string()),
            bowling_team: None,
            powerplay_start_over: None,
            powerplay_end_over: None,
        }
    }

    #[test]
    fn test_persist_dedupes_and_indexes() {
        let tables = Tables {
            innings: vec![innings_row("1_1", "A"), innings_row("1_1", "B")],
            players: vec![PlayerRow {
                player_id: "p1".to_string(),
                player_name: "X".to_string(),
                name_variations: vec![],
                variant_count: 1,
                is_synthetic: false,
            }],
            ..Tables::default()
        };

        let mut sink = MemorySink::default();
        let loads = persist(&tables, &mut sink).unwrap();

        let innings = loads.iter().find(|l| l.kind == TableKind::Innings).unwrap();
        assert_eq!(innings.rows, 1);
        assert_eq!(innings.duplicates_dropped, 1);
        assert!(loads
            .iter()
            .filter(|l| l.kind != TableKind::Innings)
            .all(|l| l.duplicates_dropped == 0));

        assert_eq!(sink.tables.len(), TableKind::ALL.len());
        assert!(sink.tables["matches"].is_empty());
        assert_eq!(sink.tables["innings"].len(), 1);
        assert_eq!(sink.tables["innings"][0]["batting_team"], "A");
        assert_eq!(sink.tables["players"][0]["player_id"], "p1");
        assert!(sink
            .indexes
            .contains(&("deliveries".to_string(), vec!["bowler_id".to_string()])));
    }

    #[test]
    fn test_jsonl_sink_replaces_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::new(dir.path()).unwrap();

        let tables = Tables {
            innings: vec![innings_row("1_1", "A"), innings_row("1_2", "B")],
            ..Tables::default()
        };
        persist(&tables, &mut sink).unwrap();
        persist(&Tables::default(), &mut sink).unwrap();
        sink.flush().unwrap();

        let innings = std::fs::read_to_string(sink.table_path("innings")).unwrap();
        assert!(innings.is_empty());

        let catalog = std::fs::read_to_string(dir.path().join("_indexes.jsonl")).unwrap();
        assert!(catalog.contains("idx_matches_match_id"));
    }
}
