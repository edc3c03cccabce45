//! Document reading: source units in, parsed match trees out
//!
//! A `DocumentSource` lists its units in a fixed order and hands back raw
//! bytes per unit. Parsing goes through simd-json straight into a
//! `serde_json::Value`, which keeps the document's key order.

use crate::error::{ReadError, UnnestError};
use crate::unnest::accessor::Field;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One input unit with its stable identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Stable identifier; becomes the `match_id`
    pub id: String,

    /// Where the bytes live (file path for directories, label otherwise)
    pub location: PathBuf,
}

impl SourceUnit {
    /// Identifier from a file name: everything before the first `.`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let location = path.into();
        let id = location
            .file_name()
            .map(|name| name.to_string_lossy())
            .map(|name| name.split('.').next().unwrap_or_default().to_string())
            .unwrap_or_default();
        SourceUnit { id, location }
    }
}

/// Provider of raw match documents
pub trait DocumentSource {
    /// Every unit, in processing order
    fn units(&self) -> Result<Vec<SourceUnit>, UnnestError>;

    /// Checked before each batch; an error aborts that batch only
    fn check_available(&self) -> std::io::Result<()>;

    fn read(&self, unit: &SourceUnit) -> Result<Vec<u8>, ReadError>;
}

/// A directory of per-match JSON files, processed in file-name order
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        DirectorySource {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for DirectorySource {
    fn units(&self) -> Result<Vec<SourceUnit>, UnnestError> {
        let unavailable = |source: std::io::Error| UnnestError::SourceUnavailable {
            path: self.root.clone(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(unavailable)? {
            let path = entry.map_err(unavailable)?.path();
            let matches_ext = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
            if path.is_file() && matches_ext {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths.into_iter().map(SourceUnit::from_path).collect())
    }

    fn check_available(&self) -> std::io::Result<()> {
        std::fs::metadata(&self.root).map(|_| ())
    }

    fn read(&self, unit: &SourceUnit) -> Result<Vec<u8>, ReadError> {
        std::fs::read(&unit.location).map_err(|source| ReadError::Io {
            path: unit.location.clone(),
            source,
        })
    }
}

/// In-memory documents keyed by identifier, in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Vec<(SourceUnit, Vec<u8>)>,
    // location -> position in `documents`
    positions: HashMap<PathBuf, usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let id = id.into();
        let position = self.documents.len();
        // Position keeps the location unique when an id is pushed twice
        let unit = SourceUnit {
            location: PathBuf::from(format!("memory:{}/{}", position, id)),
            id,
        };
        self.positions.insert(unit.location.clone(), position);
        self.documents.push((unit, bytes.into()));
    }

    /// Add a document tree, serialized the way it would sit on disk
    pub fn push_value(&mut self, id: impl Into<String>, value: &Value) {
        self.push(id, value.to_string());
    }
}

impl DocumentSource for MemorySource {
    fn units(&self) -> Result<Vec<SourceUnit>, UnnestError> {
        Ok(self.documents.iter().map(|(unit, _)| unit.clone()).collect())
    }

    fn check_available(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn read(&self, unit: &SourceUnit) -> Result<Vec<u8>, ReadError> {
        self.positions
            .get(&unit.location)
            .and_then(|&position| self.documents.get(position))
            .filter(|(candidate, _)| candidate == unit)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ReadError::Io {
                path: unit.location.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
            })
    }
}

/// A parsed match document tagged with its source identifier
#[derive(Debug, Clone)]
pub struct Document {
    pub match_id: String,
    pub tree: Value,
}

impl Document {
    pub fn parse(match_id: impl Into<String>, mut bytes: Vec<u8>) -> Result<Self, ReadError> {
        let tree: Value = simd_json::serde::from_slice(&mut bytes)?;
        if !tree.is_object() {
            return Err(ReadError::NotAnObject);
        }
        Ok(Document {
            match_id: match_id.into(),
            tree,
        })
    }

    pub fn root(&self) -> Field<'_> {
        Field::new(&self.tree)
    }

    pub fn info(&self) -> Field<'_> {
        self.root().key("info")
    }

    /// `info.registry.people`
    pub fn people(&self) -> Field<'_> {
        self.info().at("registry.people")
    }
}

/// Read and parse one unit
pub fn read_document(source: &dyn DocumentSource, unit: &SourceUnit) -> Result<Document, ReadError> {
    let bytes = source.read(unit)?;
    Document::parse(unit.id.clone(), bytes)
}
