//! # Persistence Module
//!
//! Saving and loading the store's on-disk state. Three files in the data
//! directory form a single consistency unit:
//!
//! - `vectors.bin` - bincode, the full slot array (vectors are the source
//!   of truth on any divergence)
//! - `state.json` - pretty JSON, both ID map directions plus the metadata
//!   records
//! - `index.bin` - bincode, the serialized flat index
//!
//! Every file carries a version/format header. Writes go to a `.tmp`
//! sibling first and are renamed into place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::FlatIndex;

const FORMAT_VERSION: &str = "1.0.0";
const VECTORS_FORMAT: &str = "vectormatch-vectors";
const STATE_FORMAT: &str = "vectormatch-state";
const INDEX_FORMAT: &str = "vectormatch-index";

/// Error types for persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

/// Locations of the three persisted files for one store.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub vectors: PathBuf,
    pub state: PathBuf,
    pub index: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            vectors: dir.join("vectors.bin"),
            state: dir.join("state.json"),
            index: dir.join("index.bin"),
        }
    }
}

/// File header containing version and format information
#[derive(Debug, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: String,
    pub format: String,
    pub saved_at: DateTime<Utc>,
}

impl FileHeader {
    fn new(format: &str) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            format: format.to_string(),
            saved_at: Utc::now(),
        }
    }

    fn validate(&self, format: &str) -> Result<(), PersistenceError> {
        if self.version != FORMAT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: FORMAT_VERSION.to_string(),
                actual: self.version.clone(),
            });
        }
        if self.format != format {
            return Err(PersistenceError::InvalidFormat(format!(
                "Expected format '{}', got '{}'",
                format, self.format
            )));
        }
        Ok(())
    }
}

/// On-disk layout of `vectors.bin`
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorsFile {
    pub header: FileHeader,
    pub dim: usize,
    pub vectors: Vec<Vec<f32>>,
}

/// On-disk layout of `state.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct StateFile {
    pub header: FileHeader,
    pub id_to_internal: HashMap<String, u64>,
    pub internal_to_id: HashMap<u64, String>,
    pub metadata: HashMap<u64, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    header: FileHeader,
    index: FlatIndex,
}

/// Write bytes to a temporary sibling, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

pub fn save_vectors(
    path: &Path,
    dim: usize,
    vectors: &[Vec<f32>],
) -> Result<(), PersistenceError> {
    let file = VectorsFile {
        header: FileHeader::new(VECTORS_FORMAT),
        dim,
        vectors: vectors.to_vec(),
    };
    write_atomic(path, &bincode::serialize(&file)?)
}

pub fn load_vectors(path: &Path) -> Result<VectorsFile, PersistenceError> {
    let bytes = fs::read(path)?;
    let file: VectorsFile = bincode::deserialize(&bytes)?;
    file.header.validate(VECTORS_FORMAT)?;

    if let Some(bad) = file.vectors.iter().find(|v| v.len() != file.dim) {
        return Err(PersistenceError::InvalidFormat(format!(
            "Vector of length {} in a dimension-{} store",
            bad.len(),
            file.dim
        )));
    }

    Ok(file)
}

pub fn save_state(
    path: &Path,
    id_to_internal: &HashMap<String, u64>,
    internal_to_id: &HashMap<u64, String>,
    metadata: &HashMap<u64, serde_json::Value>,
) -> Result<(), PersistenceError> {
    let file = StateFile {
        header: FileHeader::new(STATE_FORMAT),
        id_to_internal: id_to_internal.clone(),
        internal_to_id: internal_to_id.clone(),
        metadata: metadata.clone(),
    };
    write_atomic(path, serde_json::to_string_pretty(&file)?.as_bytes())
}

pub fn load_state(path: &Path) -> Result<StateFile, PersistenceError> {
    let json_data = fs::read_to_string(path)?;
    let file: StateFile = serde_json::from_str(&json_data)?;
    file.header.validate(STATE_FORMAT)?;
    Ok(file)
}

pub fn save_index(path: &Path, index: &FlatIndex) -> Result<(), PersistenceError> {
    let file = IndexFile {
        header: FileHeader::new(INDEX_FORMAT),
        index: index.clone(),
    };
    write_atomic(path, &bincode::serialize(&file)?)
}

pub fn load_index(path: &Path) -> Result<FlatIndex, PersistenceError> {
    let bytes = fs::read(path)?;
    let file: IndexFile = bincode::deserialize(&bytes)?;
    file.header.validate(INDEX_FORMAT)?;
    Ok(file.index)
}
